//! Stripe event payload types.
//!
//! Only the fields this service reads are modelled; everything else in the
//! event envelope is ignored during deserialization.

use serde::Deserialize;

/// Event type signalling a successful checkout session.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Signed event envelope posted by Stripe.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The event's subject, left raw until the event type is known.
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// Interpret the event object as a checkout session.
    pub fn checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        CheckoutSession::deserialize(&self.data.object)
    }
}

/// Checkout session object (`data.object` of a checkout event).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Email supplied when the session was created, if any
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

/// Form value collected on the checkout page.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    pub key: String,
    #[serde(default)]
    pub text: Option<TextValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    #[serde(default)]
    pub value: Option<String>,
}

impl CheckoutSession {
    /// Buyer email, preferring the collected customer details.
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| non_blank(d.email.as_deref()))
            .or_else(|| non_blank(self.customer_email.as_deref()))
    }

    /// Text value of the first custom field with `key` that carries one.
    pub fn custom_field(&self, key: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .filter(|f| f.key == key)
            .find_map(|f| f.text.as_ref().and_then(|t| non_blank(t.value.as_deref())))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
