//! Resend email API client.
//! Reference: https://resend.com/docs/api-reference/emails/send-email

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};

use super::{Mailer, SendOutcome};
use crate::purchase::NotificationRequest;

#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    base_url: url::Url,
    api_key: String,
}

impl ResendMailer {
    pub fn new(client: Client, base_url: url::Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &NotificationRequest) -> SendOutcome {
        let url = match self.base_url.join("emails") {
            Ok(url) => url,
            Err(e) => return SendOutcome::failed(format!("invalid Resend endpoint: {}", e)),
        };

        info!(to = %email.to, subject = %email.subject, "resend_send_starting");

        let response = match self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, is_timeout = e.is_timeout(), "resend_send_request_error");
                return SendOutcome::failed(e.to_string());
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return SendOutcome::failed(e.to_string()),
        };

        let outcome = normalize_response(status.is_success(), status.as_u16(), &text);

        info!(
            status_code = status.as_u16(),
            email_id = ?outcome.id,
            error = ?outcome.error,
            "resend_send_complete"
        );

        outcome
    }
}

/// Fold the response shapes Resend and its SDKs have produced into one result:
/// `{id}`, `{data: {id}}`, `{error: "..."}`, `{error: {message}}` and
/// `{message}` on non-2xx.
fn normalize_response(success: bool, status: u16, text: &str) -> SendOutcome {
    let value: Value = serde_json::from_str(text).unwrap_or(Value::Null);

    let error = match value.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ),
        _ => None,
    };

    if let Some(error) = error {
        return SendOutcome::failed(error);
    }

    if !success {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {}: {}", status, text.trim()));
        return SendOutcome::failed(message);
    }

    let id = value
        .get("id")
        .or_else(|| value.get("data").and_then(|d| d.get("id")))
        .and_then(Value::as_str)
        .map(str::to_string);

    SendOutcome::sent(id)
}
