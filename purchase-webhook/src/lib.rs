//! Purchase webhook - records Stripe checkouts and emails the buyer.
//!
//! ## Flow
//!
//! ```text
//! Stripe → POST /api/webhook → verify signature → PurchaseStore (Supabase)
//!                                               → Mailer (Resend)
//! ```
//!
//! Storage and email failures are logged and never change the response;
//! only a wrong method (405) or a bad signature (400) does.

pub mod config;
pub mod event;
pub mod mailer;
pub mod purchase;
pub mod storage;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError, EmailTemplate, FieldKeys};
pub use event::{CheckoutSession, StripeEvent, CHECKOUT_SESSION_COMPLETED};
pub use mailer::{Mailer, ResendMailer, SendOutcome};
pub use purchase::{NotificationRequest, PurchaseRecord};
pub use storage::{PurchaseStore, StorageError, StoredPurchase, SupabaseStore};
pub use web::{router, AppState};
