//! Supabase (PostgREST) purchase store.
//!
//! Inserts go to `POST {url}/rest/v1/{table}` with the service-role key.
//! Reference: https://postgrest.org/en/stable/references/api/tables_views.html#insert

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{ApiErrorBody, PurchaseStore, StorageError, StoredPurchase};
use crate::purchase::PurchaseRecord;

/// Row sent to PostgREST.
///
/// `id` and `source` are only written when deduplicating, so tables with just
/// `email`, `full_name` and `domain` columns keep working.
#[derive(Debug, Serialize)]
struct PurchaseRow<'a> {
    email: Option<&'a str>,
    full_name: Option<&'a str>,
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

/// Purchase store writing to a Supabase table.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: url::Url,
    api_key: String,
    table: String,
    deduplicate: bool,
}

impl SupabaseStore {
    pub fn new(
        client: Client,
        base_url: url::Url,
        api_key: String,
        table: String,
        deduplicate: bool,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            table,
            deduplicate,
        }
    }

    fn endpoint(&self) -> Result<url::Url, url::ParseError> {
        let mut url = self.base_url.join(&format!("rest/v1/{}", self.table))?;
        if self.deduplicate {
            url.query_pairs_mut().append_pair("on_conflict", "id");
        }
        Ok(url)
    }

    fn row<'a>(&self, record: &'a PurchaseRecord) -> PurchaseRow<'a> {
        PurchaseRow {
            email: record.email.as_deref(),
            full_name: record.full_name.as_deref(),
            domain: record.domain.as_deref(),
            id: self
                .deduplicate
                .then_some(record.external_reference.as_str()),
            source: self.deduplicate.then_some(record.source.as_str()),
        }
    }

    fn prefer_header(&self) -> &'static str {
        if self.deduplicate {
            "return=representation,resolution=ignore-duplicates"
        } else {
            "return=representation"
        }
    }
}

#[async_trait]
impl PurchaseStore for SupabaseStore {
    async fn insert(&self, record: &PurchaseRecord) -> Result<StoredPurchase, StorageError> {
        let url = self.endpoint()?;

        info!(
            table = %self.table,
            external_reference = %record.external_reference,
            deduplicate = self.deduplicate,
            "supabase_insert_starting"
        );

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", self.prefer_header())
            .json(&self.row(record))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = parse_error_body(&text);
            warn!(
                status_code = status.as_u16(),
                message = ?body.message,
                details = ?body.details,
                hint = ?body.hint,
                code = ?body.code,
                "supabase_insert_rejected"
            );
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let id = if status == StatusCode::NO_CONTENT {
            None
        } else {
            extract_row_id(&text)
        };

        info!(
            status_code = status.as_u16(),
            purchase_id = ?id,
            "supabase_insert_complete"
        );

        Ok(StoredPurchase { id })
    }
}

/// Parse a PostgREST error body, keeping non-JSON text as the message.
fn parse_error_body(text: &str) -> ApiErrorBody {
    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(body) => body,
        Err(_) => ApiErrorBody {
            message: Some(text.trim().to_string()).filter(|s| !s.is_empty()),
            ..Default::default()
        },
    }
}

/// Pull the `id` of the first returned row, which PostgREST sends as an array.
fn extract_row_id(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    let row = match &value {
        Value::Array(rows) => rows.first()?,
        other => other,
    };
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
