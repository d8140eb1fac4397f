//! Purchase records and confirmation emails derived from checkout sessions.
//!
//! ```text
//! CheckoutSession → PurchaseRecord → NotificationRequest
//! ```

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{EmailTemplate, FieldKeys};
use crate::event::CheckoutSession;

/// Purchase derived from a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub domain: Option<String>,
    /// Checkout session id, the natural deduplication key
    pub external_reference: String,
    pub source: String,
}

impl PurchaseRecord {
    /// Build a record from a checkout session.
    ///
    /// Missing custom fields are not an error; they resolve to `None`.
    pub fn from_session(session: &CheckoutSession, keys: &FieldKeys, source: &str) -> Self {
        let record = Self {
            email: session.email().map(str::to_string),
            full_name: session.custom_field(&keys.full_name).map(str::to_string),
            domain: session.custom_field(&keys.domain).map(str::to_string),
            external_reference: session.id.clone(),
            source: source.to_string(),
        };

        if record.full_name.is_none() || record.domain.is_none() {
            warn!(
                external_reference = %record.external_reference,
                has_full_name = record.full_name.is_some(),
                has_domain = record.domain.is_some(),
                custom_field_count = session.custom_fields.len(),
                "purchase_custom_field_missing"
            );
        }

        info!(
            external_reference = %record.external_reference,
            has_email = record.email.is_some(),
            full_name = ?record.full_name,
            domain = ?record.domain,
            "purchase_record_built"
        );

        record
    }
}

/// Email to send to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl NotificationRequest {
    /// Render the confirmation email for `record`.
    ///
    /// Returns `None` when the record has no recipient address.
    pub fn for_purchase(
        record: &PurchaseRecord,
        template: &EmailTemplate,
        purchase_id: Option<&str>,
    ) -> Option<Self> {
        let to = record.email.as_deref()?;

        let vars = [
            ("full_name", record.full_name.as_deref().unwrap_or("")),
            ("domain", record.domain.as_deref().unwrap_or("")),
            ("email", to),
            ("purchase_id", purchase_id.unwrap_or(&record.external_reference)),
        ];

        Some(Self {
            from: template.from.clone(),
            to: to.to_string(),
            subject: render(&template.subject, &vars, false),
            html: render(&template.html, &vars, true),
        })
    }
}

/// Substitute `{{name}}` placeholders in one pass over the template.
///
/// Substituted values are never rescanned; unknown placeholders are kept as-is.
fn render(template: &str, vars: &[(&str, &str)], escape: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after_open[..end].trim();
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) if escape => out.push_str(&escape_html(value)),
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }

        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(json: &str) -> CheckoutSession {
        serde_json::from_str(json).unwrap()
    }

    fn keys() -> FieldKeys {
        FieldKeys {
            full_name: "fullname".to_string(),
            domain: "domain".to_string(),
        }
    }

    #[test]
    fn test_from_session() {
        let s = session(
            r#"{"id": "cs_1", "customer_details": {"email": "a@example.com"},
                "custom_fields": [
                    {"key": "domain", "text": {"value": "example.org"}},
                    {"key": "fullname", "text": {"value": "Jane"}}
                ]}"#,
        );
        let record = PurchaseRecord::from_session(&s, &keys(), "stripe");
        assert_eq!(
            record,
            PurchaseRecord {
                email: Some("a@example.com".to_string()),
                full_name: Some("Jane".to_string()),
                domain: Some("example.org".to_string()),
                external_reference: "cs_1".to_string(),
                source: "stripe".to_string(),
            }
        );
    }

    #[test]
    fn test_from_session_missing_fields() {
        let record = PurchaseRecord::from_session(&session(r#"{"id": "cs_2"}"#), &keys(), "stripe");
        assert_eq!(record.email, None);
        assert_eq!(record.full_name, None);
        assert_eq!(record.domain, None);
    }

    #[test]
    fn test_notification_rendering() {
        let record = PurchaseRecord {
            email: Some("a@example.com".to_string()),
            full_name: Some("Jane <b>".to_string()),
            domain: None,
            external_reference: "cs_1".to_string(),
            source: "stripe".to_string(),
        };
        let template = EmailTemplate {
            from: "shop@example.com".to_string(),
            subject: "Hi {{full_name}}".to_string(),
            html: "<p>{{full_name}}|{{domain}}|{{email}}|{{purchase_id}}</p>".to_string(),
        };

        let email = NotificationRequest::for_purchase(&record, &template, Some("42")).unwrap();
        assert_eq!(email.from, "shop@example.com");
        assert_eq!(email.to, "a@example.com");
        assert_eq!(email.subject, "Hi Jane <b>");
        assert_eq!(email.html, "<p>Jane &lt;b&gt;||a@example.com|42</p>");

        let email = NotificationRequest::for_purchase(&record, &template, None).unwrap();
        assert!(email.html.ends_with("|cs_1</p>"));
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let record = PurchaseRecord {
            email: Some("a@example.com".to_string()),
            full_name: Some("{{email}}".to_string()),
            domain: Some("{{purchase_id}}".to_string()),
            external_reference: "cs_1".to_string(),
            source: "stripe".to_string(),
        };
        let template = EmailTemplate {
            from: "shop@example.com".to_string(),
            subject: "{{full_name}}".to_string(),
            html: "<p>{{full_name}}/{{domain}}</p>".to_string(),
        };

        let email = NotificationRequest::for_purchase(&record, &template, Some("42")).unwrap();
        assert_eq!(email.subject, "{{email}}");
        assert_eq!(email.html, "<p>{{email}}/{{purchase_id}}</p>");
    }

    #[test]
    fn test_render_placeholders() {
        let vars = [("name", "Jane")];
        assert_eq!(render("Hi {{name}}!", &vars, false), "Hi Jane!");
        assert_eq!(render("Hi {{ name }}", &vars, false), "Hi Jane");
        assert_eq!(render("{{unknown}} {{name}}", &vars, false), "{{unknown}} Jane");
        assert_eq!(render("open {{name", &vars, false), "open {{name");
        assert_eq!(render("{{name}}{{name}}", &vars, false), "JaneJane");
    }

    #[test]
    fn test_notification_requires_recipient() {
        let record = PurchaseRecord {
            email: None,
            full_name: None,
            domain: None,
            external_reference: "cs_1".to_string(),
            source: "stripe".to_string(),
        };
        assert!(NotificationRequest::for_purchase(&record, &EmailTemplate::default(), None).is_none());
    }
}
