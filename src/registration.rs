use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::{backend_message, ApiClient, HttpError};
use crate::models::{ApplicantForm, Country, EventRecord, RedirectUrls, RegistrationResult};

const REGISTER_PATH: &str = "EventManagement/Website/register";
const FREE_REDIRECT: &str = "payment_success";
const FREE_PACKAGE_MARKER: &str = "free package";
pub const GENERIC_FAILURE: &str = "Registration failed. Please try again.";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct RegistrationPayload<'a> {
    name: &'a str,
    organisation: &'a str,
    email: &'a str,
    mobile: &'a str,
    message: &'a str,
    country: &'a Country,
}

impl<'a> From<&'a ApplicantForm> for RegistrationPayload<'a> {
    fn from(form: &'a ApplicantForm) -> Self {
        Self {
            name: &form.name,
            organisation: &form.organisation,
            email: &form.email,
            mobile: &form.mobile,
            message: &form.address,
            country: &form.country,
        }
    }
}

/// How a registration reply should be read, whatever its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// Registered; payment still owed.
    Success(RegistrationResult),
    /// Registered under a free package; checkout is skipped.
    FreeSuccess(RegistrationResult),
    Failure { message: String },
}

/// The backend reports free registrations inconsistently: sometimes as a
/// success, sometimes as `success: false` or even a non-2xx status. Free
/// markers therefore win over both the status and the `success` flag.
pub fn classify_registration_outcome(ok: bool, body: &Value) -> RegistrationOutcome {
    if is_free_package(body) {
        return RegistrationOutcome::FreeSuccess(registration_result(body, true));
    }
    if ok && body.get("success").and_then(Value::as_bool) == Some(true) {
        return RegistrationOutcome::Success(registration_result(body, false));
    }
    RegistrationOutcome::Failure {
        message: backend_message(body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
    }
}

fn scopes(body: &Value) -> [Option<&Value>; 2] {
    [Some(body), body.get("data").filter(|data| data.is_object())]
}

fn is_free_package(body: &Value) -> bool {
    scopes(body).into_iter().flatten().any(|scope| {
        let redirects_to_success = scope
            .get("redirect_to")
            .and_then(Value::as_str)
            .is_some_and(|target| target.trim() == FREE_REDIRECT);
        let mentions_free_package = scope
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.to_lowercase().contains(FREE_PACKAGE_MARKER));
        redirects_to_success || mentions_free_package
    })
}

/// `applicant_id` outranks `id`; `data` outranks the root.
fn registration_id(body: &Value) -> Option<String> {
    let data = body.get("data");
    let candidates = [
        (data, "applicant_id"),
        (Some(body), "applicant_id"),
        (data, "id"),
        (Some(body), "id"),
    ];
    candidates
        .into_iter()
        .filter_map(|(scope, key)| scope.and_then(|scope| scope.get(key)))
        .find_map(|value| match value {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
}

fn redirect_urls(body: &Value) -> RedirectUrls {
    let [root, data] = scopes(body);
    data.and_then(|data| data.get("redirect_urls"))
        .or_else(|| root.and_then(|root| root.get("redirect_urls")))
        .and_then(|urls| serde_json::from_value(urls.clone()).ok())
        .unwrap_or_default()
}

fn registration_result(body: &Value, is_free_redirect: bool) -> RegistrationResult {
    RegistrationResult {
        registration_id: registration_id(body),
        redirect_urls: redirect_urls(body),
        is_free_redirect,
    }
}

/// Posts the applicant to the event's registration endpoint.
pub async fn submit(
    client: &ApiClient,
    event: &EventRecord,
    form: &ApplicantForm,
) -> Result<RegistrationResult, RegistrationError> {
    let event_id = event.id.to_string();
    let url = client.endpoint_with(REGISTER_PATH, &[event.slug.as_str(), event_id.as_str()]);
    let response = client
        .post_json(&url, &RegistrationPayload::from(form))
        .await?;

    match classify_registration_outcome(response.is_ok(), &response.body) {
        RegistrationOutcome::Success(result) => {
            log::info!(
                "registered for {} as {}",
                event.slug,
                result.registration_no()
            );
            Ok(result)
        }
        RegistrationOutcome::FreeSuccess(result) => {
            if !response.is_ok() {
                log::warn!(
                    "free registration for {} reported with status {}",
                    event.slug,
                    response.status
                );
            }
            log::info!("free registration for {} confirmed", event.slug);
            Ok(result)
        }
        RegistrationOutcome::Failure { message } => {
            log::warn!("registration for {} rejected: {message}", event.slug);
            Err(RegistrationError::Rejected(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paid_success_requires_ok_and_success_flag() {
        let body = json!({"success": true, "data": {"applicant_id": 777}});
        match classify_registration_outcome(true, &body) {
            RegistrationOutcome::Success(result) => {
                assert_eq!(result.registration_id.as_deref(), Some("777"));
                assert!(!result.is_free_redirect);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            classify_registration_outcome(false, &body),
            RegistrationOutcome::Failure { .. }
        ));
    }

    #[test]
    fn redirect_to_payment_success_is_free_regardless_of_status() {
        let body = json!({"success": true, "data": {"redirect_to": "payment_success", "id": 4}});
        for ok in [true, false] {
            match classify_registration_outcome(ok, &body) {
                RegistrationOutcome::FreeSuccess(result) => {
                    assert!(result.is_free_redirect);
                    assert_eq!(result.registration_id.as_deref(), Some("4"));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn free_package_message_overrides_failure_flag() {
        let body = json!({"success": false, "message": "Registered under Free Package"});
        assert!(matches!(
            classify_registration_outcome(false, &body),
            RegistrationOutcome::FreeSuccess(_)
        ));
    }

    #[test]
    fn failure_carries_backend_message_or_generic_text() {
        let body = json!({"success": false, "message": "Email already registered"});
        assert_eq!(
            classify_registration_outcome(true, &body),
            RegistrationOutcome::Failure {
                message: "Email already registered".to_string()
            }
        );
        assert_eq!(
            classify_registration_outcome(false, &Value::Null),
            RegistrationOutcome::Failure {
                message: GENERIC_FAILURE.to_string()
            }
        );
    }

    #[test]
    fn applicant_id_takes_precedence_over_id() {
        assert_eq!(
            registration_id(&json!({"applicant_id": 42, "id": 99})).as_deref(),
            Some("42")
        );
        assert_eq!(
            registration_id(&json!({"id": 99, "data": {"applicant_id": "A-42"}})).as_deref(),
            Some("A-42")
        );
        assert_eq!(registration_id(&json!({"data": {"id": 7}})).as_deref(), Some("7"));
        assert_eq!(registration_id(&json!({})), None);
    }

    #[test]
    fn redirect_urls_are_read_from_data_or_root() {
        let body = json!({
            "success": true,
            "data": {
                "redirect_urls": {
                    "payment_gateway": "https://pay.test/gw",
                    "payment_success": "/verify/1"
                }
            }
        });
        let urls = redirect_urls(&body);
        assert_eq!(urls.payment_gateway.as_deref(), Some("https://pay.test/gw"));
        assert_eq!(urls.payment_success.as_deref(), Some("/verify/1"));

        let root = json!({"redirect_urls": {"payment_gateway": "/gw"}});
        assert_eq!(redirect_urls(&root).payment_gateway.as_deref(), Some("/gw"));
    }

    #[test]
    fn gateway_url_alone_is_not_verifiable() {
        let paid = |body: serde_json::Value| match classify_registration_outcome(true, &body) {
            RegistrationOutcome::Success(result) => result,
            other => panic!("unexpected outcome {other:?}"),
        };
        let gateway_only = paid(json!({
            "success": true,
            "data": {"redirect_urls": {"payment_gateway": "/gw"}}
        }));
        assert!(!gateway_only.can_verify());

        let with_verify_url = paid(json!({
            "success": true,
            "data": {"redirect_urls": {"payment_gateway": "/gw", "payment_success": "/ok"}}
        }));
        assert!(with_verify_url.can_verify());
        assert!(paid(json!({"success": true, "applicant_id": 777})).can_verify());
    }

    #[test]
    fn payload_sends_address_as_message() {
        let form = ApplicantForm {
            name: "Asha".to_string(),
            organisation: "NFSU".to_string(),
            email: "asha@example.com".to_string(),
            mobile: "9876543210".to_string(),
            country: Country::default(),
            address: "Gandhinagar".to_string(),
        };
        let payload = serde_json::to_value(RegistrationPayload::from(&form)).expect("serialize");
        assert_eq!(
            payload,
            json!({
                "name": "Asha",
                "organisation": "NFSU",
                "email": "asha@example.com",
                "mobile": "9876543210",
                "message": "Gandhinagar",
                "country": "IND"
            })
        );
    }
}
