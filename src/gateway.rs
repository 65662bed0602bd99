use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;
use crate::http::{ApiClient, HttpError};
use crate::models::{EventRecord, GatewayConfig, RegistrationResult};

const GATEWAY_PATH: &str = "EventManagement/Website/payment/gateway";
pub const GENERIC_GATEWAY_FAILURE: &str = "Unable to initialise payment. Please try again.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("registration id missing; cannot request payment gateway")]
    MissingRegistrationId,
}

/// Values used when the gateway reply leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayDefaults {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
}

impl GatewayDefaults {
    pub fn for_event(config: &AppConfig, event: &EventRecord) -> Self {
        Self {
            key: config.payment_key.clone().unwrap_or_default(),
            amount: event.price_minor_units(),
            currency: config.currency.clone(),
            name: config.merchant_name.clone(),
            description: event.title.clone(),
        }
    }
}

fn text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
}

fn minor_amount(record: &Value) -> Option<i64> {
    match record.get("amount")? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.round() as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|value| value.round() as i64),
        _ => None,
    }
}

impl GatewayConfig {
    /// The gateway reply is sometimes wrapped in `data`, sometimes not; this
    /// is the one place that shape is untangled.
    pub fn from_response(body: &Value, defaults: &GatewayDefaults) -> Self {
        let record = body
            .get("data")
            .filter(|data| data.is_object())
            .unwrap_or(body);

        Self {
            key: text(record, &["key", "key_id", "razorpay_key"])
                .unwrap_or_else(|| defaults.key.clone()),
            amount: minor_amount(record).unwrap_or(defaults.amount),
            currency: text(record, &["currency"]).unwrap_or_else(|| defaults.currency.clone()),
            order_id: text(record, &["order_id", "razorpay_order_id"]).unwrap_or_default(),
            name: text(record, &["name"]).unwrap_or_else(|| defaults.name.clone()),
            description: text(record, &["description"])
                .unwrap_or_else(|| defaults.description.clone()),
        }
    }
}

/// Asks the backend for checkout parameters, preferring the gateway URL it
/// handed out at registration.
pub async fn fetch_gateway_config(
    client: &ApiClient,
    event: &EventRecord,
    registration: &RegistrationResult,
    defaults: &GatewayDefaults,
) -> Result<GatewayConfig, GatewayError> {
    let supplied = registration.redirect_urls.payment_gateway.as_deref();
    if registration.registration_id.is_none() && supplied.is_none() {
        return Err(GatewayError::MissingRegistrationId);
    }
    let event_id = event.id.to_string();
    let default_url = client.endpoint_with(
        GATEWAY_PATH,
        &[event.slug.as_str(), event_id.as_str(), registration.registration_no()],
    );
    let url = client.resolve_url(supplied, &default_url);

    let response = client.get_json(&url).await?;
    if !response.is_ok() || response.success_flag() == Some(false) {
        return Err(GatewayError::Rejected {
            status: response.status.as_u16(),
            message: response
                .message()
                .unwrap_or_else(|| GENERIC_GATEWAY_FAILURE.to_string()),
        });
    }

    let config = GatewayConfig::from_response(&response.body, defaults);
    log::info!(
        "gateway order {} for {} ({} {})",
        config.order_id,
        event.slug,
        config.amount,
        config.currency
    );
    Ok(config)
}
