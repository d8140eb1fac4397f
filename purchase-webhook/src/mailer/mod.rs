//! Confirmation email delivery.
//!
//! Every mailer reports through [`SendOutcome`], so callers never branch on
//! the provider's response shape.

pub mod resend;

use async_trait::async_trait;

use crate::purchase::NotificationRequest;

pub use resend::ResendMailer;

/// Normalized delivery result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Provider message id on success
    pub id: Option<String>,
    /// Failure description
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent(id: Option<String>) -> Self {
        Self { id, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Email collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email. Failures are reported in the outcome, never raised.
    async fn send(&self, email: &NotificationRequest) -> SendOutcome;
}
