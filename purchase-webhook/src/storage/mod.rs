//! Purchase persistence.
//!
//! The handler only sees the [`PurchaseStore`] trait; [`SupabaseStore`] is the
//! production implementation backed by Supabase's PostgREST API.

pub mod supabase;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::purchase::PurchaseRecord;

pub use supabase::SupabaseStore;

/// Result of a successful insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredPurchase {
    /// Identifier of the stored row, when the backend reports one
    pub id: Option<String>,
}

/// Structured error body returned by PostgREST. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("unknown error"))?;
        if let Some(code) = &self.code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage rejected insert with status {status}: {body}")]
    Api { status: u16, body: ApiErrorBody },

    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid storage endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Persistence collaborator for purchase records.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn insert(&self, record: &PurchaseRecord) -> Result<StoredPurchase, StorageError>;
}
