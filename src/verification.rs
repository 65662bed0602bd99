use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::{ApiClient, HttpError};
use crate::models::{
    major_units, Confirmation, EventRecord, GatewayConfig, PaymentCompletion, RegistrationResult,
};

const VERIFY_PATH: &str = "EventManagement/Website/payment/success";
pub const GENERIC_VERIFICATION_FAILURE: &str = "Payment verification failed";

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("verification rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("registration id missing; cannot verify payment")]
    MissingRegistrationId,
}

#[derive(Debug, Serialize)]
struct VerificationPayload<'a> {
    razorpay_payment_id: &'a str,
    razorpay_order_id: &'a str,
    razorpay_signature: &'a str,
    product_id: i64,
    #[serde(rename = "totalAmount")]
    total_amount: Value,
}

impl<'a> VerificationPayload<'a> {
    fn new(event: &EventRecord, config: &GatewayConfig, completion: &'a PaymentCompletion) -> Self {
        Self {
            razorpay_payment_id: &completion.payment_id,
            razorpay_order_id: &completion.order_id,
            razorpay_signature: &completion.signature,
            product_id: event.id,
            total_amount: major_units(config.amount),
        }
    }
}

/// Confirms a completed checkout with the backend. Only a 2xx reply counts
/// as verified.
pub async fn verify_payment(
    client: &ApiClient,
    event: &EventRecord,
    registration: &RegistrationResult,
    config: &GatewayConfig,
    completion: &PaymentCompletion,
) -> Result<Confirmation, VerificationError> {
    let supplied = registration.redirect_urls.payment_success.as_deref();
    if registration.registration_id.is_none() && supplied.is_none() {
        return Err(VerificationError::MissingRegistrationId);
    }
    let event_id = event.id.to_string();
    let default_url = client.endpoint_with(
        VERIFY_PATH,
        &[event.slug.as_str(), event_id.as_str(), registration.registration_no()],
    );
    let url = client.resolve_url(supplied, &default_url);

    let payload = VerificationPayload::new(event, config, completion);
    let response = client.post_json(&url, &payload).await?;
    if !response.is_ok() {
        return Err(VerificationError::Rejected {
            status: response.status.as_u16(),
            message: response
                .message()
                .unwrap_or_else(|| GENERIC_VERIFICATION_FAILURE.to_string()),
        });
    }

    log::info!(
        "payment {} verified for registration {}",
        completion.payment_id,
        registration.registration_no()
    );
    Ok(Confirmation {
        payment_id: completion.payment_id.clone(),
        registration_no: registration.registration_no().to_string(),
        amount_minor: config.amount,
        product_name: event.title.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_converts_minor_units() {
        let event = EventRecord {
            id: 31,
            slug: "forensic-conclave-2025".to_string(),
            title: "Forensic Conclave 2025".to_string(),
            date: String::new(),
            location: String::new(),
            price: "1500".to_string(),
            image: String::new(),
        };
        let config = GatewayConfig {
            key: "rzp".to_string(),
            amount: 150_000,
            currency: "INR".to_string(),
            order_id: "order_1".to_string(),
            name: String::new(),
            description: String::new(),
        };
        let completion = PaymentCompletion {
            payment_id: "pay_1".to_string(),
            order_id: "order_1".to_string(),
            signature: "sig".to_string(),
        };
        let payload = serde_json::to_value(VerificationPayload::new(&event, &config, &completion))
            .expect("serialize");
        assert_eq!(
            payload,
            json!({
                "razorpay_payment_id": "pay_1",
                "razorpay_order_id": "order_1",
                "razorpay_signature": "sig",
                "product_id": 31,
                "totalAmount": 1500
            })
        );
    }
}
