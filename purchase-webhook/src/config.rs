//! Configuration module for environment variable parsing.
//!
//! Credentials are required and checked once at startup; everything else has
//! a default.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Custom-field key that carries the buyer's full name.
pub const DEFAULT_FULL_NAME_FIELD_KEY: &str = "websiteurlsubdomainssoldseparately";

/// Custom-field key that carries the purchased domain.
pub const DEFAULT_DOMAIN_FIELD_KEY: &str = "websiteurlsubdomainssoldseparately1";

const DEFAULT_EMAIL_FROM: &str = "onboarding@resend.dev";
const DEFAULT_EMAIL_SUBJECT: &str = "Thanks for your purchase";
const DEFAULT_EMAIL_HTML: &str = "<p>Hi {{full_name}},</p>\
<p>Thanks for your purchase. We are setting up <strong>{{domain}}</strong> for you.</p>\
<p>Order reference: {{purchase_id}}</p>";

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Custom-field keys used to pull values out of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    pub full_name: String,
    pub domain: String,
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self {
            full_name: DEFAULT_FULL_NAME_FIELD_KEY.to_string(),
            domain: DEFAULT_DOMAIN_FIELD_KEY.to_string(),
        }
    }
}

/// Confirmation email content.
///
/// `subject` and `html` may contain `{{full_name}}`, `{{domain}}`, `{{email}}`
/// and `{{purchase_id}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub from: String,
    pub subject: String,
    pub html: String,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self {
            from: DEFAULT_EMAIL_FROM.to_string(),
            subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            html: DEFAULT_EMAIL_HTML.to_string(),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Route the payment processor posts events to
    pub webhook_path: String,

    /// Stripe endpoint signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,

    /// Maximum clock distance in seconds between the signed timestamp and now
    pub signature_tolerance_secs: u64,

    /// Supabase project URL
    pub supabase_url: url::Url,

    /// Supabase service-role key
    pub supabase_key: String,

    /// Table purchases are inserted into
    pub purchases_table: String,

    /// Value written to the `source` column when deduplication is on
    pub purchase_source: String,

    /// Write the session id to the `id` column (plus `source`) and ignore
    /// inserts whose id already exists. Requires the table to have `id` as a
    /// unique text column and a `source` column; when off, only `email`,
    /// `full_name` and `domain` are written.
    pub deduplicate_purchases: bool,

    /// Resend API key
    pub resend_api_key: String,

    /// Resend API base URL
    pub resend_base_url: url::Url,

    /// Outbound HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    pub field_keys: FieldKeys,

    pub email: EmailTemplate,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let stripe_webhook_secret =
            get("STRIPE_WEBHOOK_SECRET").ok_or(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        let supabase_url = get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let supabase_url = parse_url("SUPABASE_URL", &supabase_url)?;

        let supabase_key = get("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|| get("SUPABASE_SECRET"))
            .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?;

        let resend_api_key = get("RESEND_API_KEY").ok_or(ConfigError::Missing("RESEND_API_KEY"))?;

        let resend_base_url = match get("RESEND_BASE_URL") {
            Some(raw) => parse_url("RESEND_BASE_URL", &raw)?,
            None => parse_url("RESEND_BASE_URL", "https://api.resend.com")?,
        };

        let defaults = EmailTemplate::default();

        Ok(Config {
            port: parse_or("PORT", get("PORT"), 8080),

            webhook_path: parse_route("WEBHOOK_PATH", get("WEBHOOK_PATH"), "/api/webhook"),

            stripe_webhook_secret,

            signature_tolerance_secs: parse_or(
                "STRIPE_SIGNATURE_TOLERANCE_SECS",
                get("STRIPE_SIGNATURE_TOLERANCE_SECS"),
                300,
            ),

            supabase_url,

            supabase_key,

            purchases_table: get("PURCHASES_TABLE").unwrap_or_else(|| "purchases".to_string()),

            purchase_source: get("PURCHASE_SOURCE").unwrap_or_else(|| "stripe".to_string()),

            deduplicate_purchases: parse_bool(
                "DEDUPLICATE_PURCHASES",
                get("DEDUPLICATE_PURCHASES"),
                false,
            ),

            resend_api_key,

            resend_base_url,

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", get("REQUEST_TIMEOUT_MS"), 10_000),

            field_keys: FieldKeys {
                full_name: get("FULL_NAME_FIELD_KEY")
                    .unwrap_or_else(|| DEFAULT_FULL_NAME_FIELD_KEY.to_string()),
                domain: get("DOMAIN_FIELD_KEY")
                    .unwrap_or_else(|| DEFAULT_DOMAIN_FIELD_KEY.to_string()),
            },

            email: EmailTemplate {
                from: get("EMAIL_FROM").unwrap_or(defaults.from),
                subject: get("EMAIL_SUBJECT").unwrap_or(defaults.subject),
                html: get("EMAIL_HTML_TEMPLATE").unwrap_or(defaults.html),
            },
        })
    }

    /// Timeout applied to every outbound collaborator request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a base URL, ending its path with `/` so `Url::join` appends to it.
fn parse_url(name: &'static str, raw: &str) -> Result<url::Url, ConfigError> {
    let mut url = url::Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl {
        name,
        value: raw.to_string(),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Router paths must be absolute.
fn parse_route(name: &str, raw: Option<String>, default: &str) -> String {
    match raw.map(|s| s.trim().to_string()) {
        None => default.to_string(),
        Some(path) if path.starts_with('/') => path,
        Some(path) => {
            warn!(env_var = name, value = %path, "Route must start with '/', using default");
            default.to_string()
        }
    }
}

/// Parse an optional value, warning and falling back to `default` when invalid.
fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
    }
}

fn parse_bool(name: &str, raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        Some(v) => {
            warn!(env_var = name, value = %v, "Invalid boolean, using default");
            default
        }
    }
}
