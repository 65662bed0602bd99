use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::{ApplicantForm, GatewayConfig, PaymentCompletion};

pub const GENERIC_PAYMENT_FAILURE: &str = "Payment failed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

impl From<&ApplicantForm> for Prefill {
    fn from(form: &ApplicantForm) -> Self {
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            contact: form.mobile.clone(),
        }
    }
}

/// Everything the hosted checkout needs to open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub config: GatewayConfig,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Completed(PaymentCompletion),
    Failed {
        code: Option<String>,
        description: String,
    },
    /// The user closed the checkout without paying.
    Dismissed,
}

/// A hosted checkout widget. `open` suspends until the user pays, the
/// provider reports a failure, or the checkout is dismissed.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Whether the provider's client library is available at all.
    fn is_loaded(&self) -> bool {
        true
    }

    async fn open(&self, request: &CheckoutRequest) -> CheckoutOutcome;
}

/// Terminal stand-in for the hosted widget: prints the checkout parameters
/// and reads the provider's reply from stdin.
///
/// Accepted replies:
/// * `<payment_id> [order_id] [signature]`: completed payment
/// * `fail <description>`: provider-reported failure
/// * an empty line or end of input: dismissed
#[derive(Default)]
pub struct ConsoleCheckout;

#[async_trait]
impl PaymentProvider for ConsoleCheckout {
    async fn open(&self, request: &CheckoutRequest) -> CheckoutOutcome {
        match serde_json::to_string_pretty(request) {
            Ok(rendered) => println!("Checkout parameters:\n{rendered}"),
            Err(err) => log::warn!("unable to render checkout parameters: {err}"),
        }
        println!(
            "Enter `<payment_id> [order_id] [signature]`, `fail <reason>`, \
             or a blank line to cancel:"
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => parse_reply(&line, &request.config.order_id),
            Ok(None) => CheckoutOutcome::Dismissed,
            Err(err) => CheckoutOutcome::Failed {
                code: None,
                description: format!("unable to read checkout reply: {err}"),
            },
        }
    }
}

pub fn parse_reply(line: &str, default_order_id: &str) -> CheckoutOutcome {
    let line = line.trim();
    if line.is_empty() {
        return CheckoutOutcome::Dismissed;
    }
    if let Some(rest) = line
        .strip_prefix("fail")
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        let description = rest.trim();
        return CheckoutOutcome::Failed {
            code: None,
            description: if description.is_empty() {
                GENERIC_PAYMENT_FAILURE.to_string()
            } else {
                description.to_string()
            },
        };
    }

    let mut parts = line.split_whitespace();
    let payment_id = parts.next().unwrap_or_default().to_string();
    let order_id = parts.next().unwrap_or(default_order_id).to_string();
    let signature = parts.next().unwrap_or_default().to_string();
    CheckoutOutcome::Completed(PaymentCompletion {
        payment_id,
        order_id,
        signature,
    })
}
