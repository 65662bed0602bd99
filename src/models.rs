use std::{convert::Infallible, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

pub const FREE_PRICE: &str = "FREE";
pub const THANK_YOU_PATH: &str = "/payment/thank-you";
pub const EVENTS_PATH: &str = "/events";

static MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid mobile regex"));

/// An event resolved from either event API, normalized to one shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub date: String,
    pub location: String,
    /// `"FREE"` or a bare numeric string such as `"2500"`.
    pub price: String,
    pub image: String,
}

impl EventRecord {
    pub fn is_free(&self) -> bool {
        self.price == FREE_PRICE
    }

    /// Price in minor currency units, `0` for free events.
    pub fn price_minor_units(&self) -> i64 {
        if self.is_free() {
            return 0;
        }
        self.price
            .parse::<f64>()
            .map(|major| (major * 100.0).round() as i64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Country {
    #[default]
    India,
    UnitedStates,
    UnitedKingdom,
    UnitedArabEmirates,
    Nepal,
    Bangladesh,
    SriLanka,
    Other(String),
}

impl Country {
    pub fn code(&self) -> &str {
        match self {
            Country::India => "IND",
            Country::UnitedStates => "USA",
            Country::UnitedKingdom => "GBR",
            Country::UnitedArabEmirates => "ARE",
            Country::Nepal => "NPL",
            Country::Bangladesh => "BGD",
            Country::SriLanka => "LKA",
            Country::Other(code) => code,
        }
    }
}

impl FromStr for Country {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_uppercase();
        Ok(match code.as_str() {
            "" | "IND" | "IN" | "INDIA" => Country::India,
            "USA" | "US" => Country::UnitedStates,
            "GBR" | "UK" | "GB" => Country::UnitedKingdom,
            "ARE" | "UAE" => Country::UnitedArabEmirates,
            "NPL" => Country::Nepal,
            "BGD" => Country::Bangladesh,
            "LKA" => Country::SriLanka,
            _ => Country::Other(code),
        })
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Country {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Applicant details collected by the registration form.
#[derive(Debug, Clone, Default, Validate)]
pub struct ApplicantForm {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub organisation: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(regex(path = *MOBILE_RE, message = "a valid mobile number is required"))]
    pub mobile: String,
    pub country: Country,
    pub address: String,
}

impl ApplicantForm {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            organisation: self.organisation.trim().to_string(),
            email: self.email.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            country: self.country,
            address: self.address.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedirectUrls {
    pub payment_gateway: Option<String>,
    pub payment_success: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    pub registration_id: Option<String>,
    pub redirect_urls: RedirectUrls,
    pub is_free_redirect: bool,
}

impl RegistrationResult {
    pub fn registration_no(&self) -> &str {
        self.registration_id.as_deref().unwrap_or_default()
    }

    /// A payment can only be verified against a registration id or a
    /// backend-supplied verification URL.
    pub fn can_verify(&self) -> bool {
        self.registration_id.is_some() || self.redirect_urls.payment_success.is_some()
    }
}

/// Parameters handed opaquely to the hosted checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayConfig {
    pub key: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub name: String,
    pub description: String,
}

/// Identifiers reported by the provider when checkout completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompletion {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

/// Converts minor units to the major-unit number the backend expects.
pub fn major_units(minor: i64) -> serde_json::Value {
    if minor % 100 == 0 {
        serde_json::Value::from(minor / 100)
    } else {
        serde_json::Value::from(minor as f64 / 100.0)
    }
}

fn major_units_display(minor: i64) -> String {
    if minor % 100 == 0 {
        (minor / 100).to_string()
    } else {
        format!("{}.{:02}", minor / 100, (minor % 100).abs())
    }
}

/// The thank-you route reached once a registration is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confirmation {
    /// Empty for free registrations.
    pub payment_id: String,
    pub registration_no: String,
    pub amount_minor: i64,
    pub product_name: String,
}

impl Confirmation {
    pub fn free(registration: &RegistrationResult, event: &EventRecord) -> Self {
        Self {
            payment_id: String::new(),
            registration_no: registration.registration_no().to_string(),
            amount_minor: 0,
            product_name: event.title.clone(),
        }
    }

    pub fn amount(&self) -> String {
        major_units_display(self.amount_minor)
    }

    pub fn path(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payment_id", &self.payment_id)
            .append_pair("registration_no", &self.registration_no)
            .append_pair("type", "event")
            .append_pair("amount", &self.amount())
            .append_pair("product_name", &self.product_name)
            .finish();
        format!("{THANK_YOU_PATH}?{query}")
    }

    pub fn absolute_url(&self, site_base: &str) -> String {
        crate::utils::join_url(site_base, &self.path())
    }
}
