//! The registration checkout as a single forward-only workflow:
//! resolve the event, register the applicant, open the hosted checkout and
//! verify the payment. Every stage runs to completion or failure before the
//! next starts; nothing is retried.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::checkout::{CheckoutOutcome, CheckoutRequest, PaymentProvider, Prefill};
use crate::config::AppConfig;
use crate::events::EventResolver;
use crate::gateway::{self, GatewayDefaults, GatewayError, GENERIC_GATEWAY_FAILURE};
use crate::http::ApiClient;
use crate::models::{ApplicantForm, Confirmation, EventRecord, EVENTS_PATH};
use crate::registration::{self, RegistrationError, GENERIC_FAILURE};
use crate::verification::{self, VerificationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    ResolvingEvent,
    NotFound,
    Ready,
    Submitting,
    PaymentPending,
    Paying,
    Verifying,
    Confirmed,
    PaymentFailed,
}

impl FlowState {
    /// States that can only be left by starting over.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowState::NotFound | FlowState::Confirmed | FlowState::PaymentFailed
        )
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("checkout is not ready for registration (state {0:?})")]
    NotReady(FlowState),
    #[error("invalid registration form: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),
    #[error("payment SDK not loaded")]
    SdkUnavailable,
    #[error("payment gateway failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("payment failed: {description}")]
    PaymentFailed {
        code: Option<String>,
        description: String,
    },
    #[error("payment cancelled by user")]
    PaymentCancelled,
    #[error("payment {payment_id} captured but verification failed: {source}")]
    Verification {
        payment_id: String,
        #[source]
        source: VerificationError,
    },
}

impl FlowError {
    /// Text shown to the applicant in the blocking alert.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::NotReady(_) => {
                "Event details are not available. Please reload the page.".to_string()
            }
            FlowError::Validation(errors) => {
                let mut fields: Vec<String> =
                    errors.field_errors().keys().map(|key| key.to_string()).collect();
                fields.sort_unstable();
                format!("Please check the following fields: {}", fields.join(", "))
            }
            FlowError::Registration(RegistrationError::Rejected(message)) => message.clone(),
            FlowError::Registration(RegistrationError::Http(_)) => GENERIC_FAILURE.to_string(),
            FlowError::SdkUnavailable => {
                "Payment SDK not loaded. Please refresh the page and try again.".to_string()
            }
            FlowError::Gateway(_) => GENERIC_GATEWAY_FAILURE.to_string(),
            FlowError::PaymentFailed { description, .. } => {
                format!("Payment failed: {description}")
            }
            FlowError::PaymentCancelled => {
                "Payment was cancelled. Please register again to complete payment.".to_string()
            }
            FlowError::Verification { payment_id, source } => {
                let reason = match source {
                    VerificationError::Rejected { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                format!(
                    "Your payment was successful but verification failed ({reason}). \
                     Please contact support with payment ID {payment_id}."
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// Registered under a free package; no checkout was opened.
    FreeRegistration(Confirmation),
    PaidRegistration(Confirmation),
}

impl FlowOutcome {
    pub fn confirmation(&self) -> &Confirmation {
        match self {
            FlowOutcome::FreeRegistration(confirmation)
            | FlowOutcome::PaidRegistration(confirmation) => confirmation,
        }
    }
}

/// State for one event page: the resolved event and the progress of a
/// single registration attempt.
pub struct EventCheckout {
    client: ApiClient,
    config: AppConfig,
    resolver: EventResolver,
    provider: Arc<dyn PaymentProvider>,
    state: FlowState,
    event: Option<EventRecord>,
    is_submitting: bool,
}

impl EventCheckout {
    pub fn new(config: AppConfig, provider: Arc<dyn PaymentProvider>) -> Self {
        let client = ApiClient::new(config.api_base_url.clone());
        let resolver = EventResolver::standard(&client, &config);
        Self::with_resolver(config, client, resolver, provider)
    }

    pub fn with_resolver(
        config: AppConfig,
        client: ApiClient,
        resolver: EventResolver,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            client,
            config,
            resolver,
            provider,
            state: FlowState::Idle,
            event: None,
            is_submitting: false,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn event(&self) -> Option<&EventRecord> {
        self.event.as_ref()
    }

    /// True while a submission is in flight; the submit control stays disabled.
    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    /// Where a visitor is sent by hand when the event cannot be found.
    pub fn not_found_path(&self) -> &'static str {
        EVENTS_PATH
    }

    fn transition(&mut self, next: FlowState) {
        log::debug!("checkout state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn load(&mut self, slug: &str) -> Option<&EventRecord> {
        self.event = None;
        self.transition(FlowState::ResolvingEvent);
        match self.resolver.resolve(slug).await {
            Some(event) => {
                self.event = Some(event);
                self.transition(FlowState::Ready);
            }
            None => self.transition(FlowState::NotFound),
        }
        self.event.as_ref()
    }

    /// Runs registration through to confirmation. A rejected registration
    /// leaves the form editable; any failure after that is terminal.
    pub async fn submit(&mut self, form: ApplicantForm) -> Result<FlowOutcome, FlowError> {
        if self.state != FlowState::Ready {
            return Err(FlowError::NotReady(self.state));
        }
        let event = self.event.clone().ok_or(FlowError::NotReady(self.state))?;
        let form = form.trimmed();
        form.validate()?;

        self.is_submitting = true;
        self.transition(FlowState::Submitting);
        let result = self.run(&event, &form).await;
        self.is_submitting = false;

        match &result {
            Ok(outcome) => {
                log::info!("registration confirmed: {}", outcome.confirmation().path());
                self.transition(FlowState::Confirmed);
            }
            Err(FlowError::Registration(_)) => self.transition(FlowState::Ready),
            Err(err) => {
                log::error!("checkout for {} failed: {err}", event.slug);
                self.transition(FlowState::PaymentFailed);
            }
        }
        result
    }

    async fn run(
        &mut self,
        event: &EventRecord,
        form: &ApplicantForm,
    ) -> Result<FlowOutcome, FlowError> {
        let registration = registration::submit(&self.client, event, form).await?;
        if registration.is_free_redirect {
            return Ok(FlowOutcome::FreeRegistration(Confirmation::free(
                &registration,
                event,
            )));
        }

        self.transition(FlowState::PaymentPending);
        if !self.provider.is_loaded() {
            return Err(FlowError::SdkUnavailable);
        }
        // Checkout only opens for registrations that can be verified afterwards.
        if !registration.can_verify() {
            return Err(GatewayError::MissingRegistrationId.into());
        }
        let defaults = GatewayDefaults::for_event(&self.config, event);
        let config =
            gateway::fetch_gateway_config(&self.client, event, &registration, &defaults).await?;

        let request = CheckoutRequest {
            config: config.clone(),
            prefill: Prefill::from(form),
            notes: BTreeMap::from([
                ("event".to_string(), event.slug.clone()),
                (
                    "registration_id".to_string(),
                    registration.registration_no().to_string(),
                ),
            ]),
        };
        self.transition(FlowState::Paying);
        let completion = match self.provider.open(&request).await {
            CheckoutOutcome::Completed(completion) => completion,
            CheckoutOutcome::Failed { code, description } => {
                return Err(FlowError::PaymentFailed { code, description });
            }
            CheckoutOutcome::Dismissed => return Err(FlowError::PaymentCancelled),
        };

        self.transition(FlowState::Verifying);
        let confirmation =
            verification::verify_payment(&self.client, event, &registration, &config, &completion)
                .await
                .map_err(|source| FlowError::Verification {
                    payment_id: completion.payment_id.clone(),
                    source,
                })?;
        Ok(FlowOutcome::PaidRegistration(confirmation))
    }
}
