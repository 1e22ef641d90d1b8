use erp_events::EventType;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use super::secret::{SecretError, generate_secret};

/// Default advisory retry count stored on new subscriptions.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Characters of the secret exposed by [`SubscriptionView`].
const SECRET_PREVIEW_CHARS: usize = 8;

/// Errors raised while validating a new subscription
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    UnknownEvent(#[from] erp_events::UnknownEventType),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Subscription name must not be empty")]
    EmptyName,

    #[error("Failed to generate secret: {0}")]
    Secret(#[from] SecretError),
}

/// Shared signing key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Full secret, for signing only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to show to administrators.
    pub fn preview(&self) -> String {
        let shown = SECRET_PREVIEW_CHARS.min(self.0.chars().count() / 2);
        let prefix: String = self.0.chars().take(shown).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(****)")
    }
}

/// Administrative request to register a receiver
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub name: String,
    pub event: String,
    pub target_url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub retry_count: Option<u32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A registered receiver for one event type.
///
/// Deliberately not `Serialize`: external reads go through [`SubscriptionView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub id: Uuid,

    pub name: String,

    pub event: EventType,

    pub target_url: Url,

    secret: WebhookSecret,

    /// Extra headers; applied after the engine's own headers.
    pub headers: BTreeMap<String, String>,

    pub is_active: bool,

    /// Stored intent only, the dispatch path does not retry.
    pub retry_count: u32,

    pub created_at: OffsetDateTime,
}

impl WebhookSubscription {
    /// Create an active subscription with no extra headers
    pub fn new(name: String, event: EventType, target_url: Url, secret: WebhookSecret) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            event,
            target_url,
            secret,
            headers: BTreeMap::new(),
            is_active: true,
            retry_count: DEFAULT_RETRY_COUNT,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Validate an administrative request and build the subscription.
    ///
    /// A secret is generated when the request carries none.
    pub fn create(request: NewSubscription, require_https: bool) -> Result<Self, SubscriptionError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(SubscriptionError::EmptyName);
        }

        let event: EventType = request.event.parse()?;
        let target_url = validate_target_url(&request.target_url, require_https)?;
        validate_headers(&request.headers)?;

        let secret = match request.secret {
            Some(s) if !s.trim().is_empty() => WebhookSecret::new(s),
            _ => generate_secret()?,
        };

        let mut subscription = Self::new(name.to_string(), event, target_url, secret)
            .with_headers(request.headers)
            .with_retry_count(request.retry_count.unwrap_or(DEFAULT_RETRY_COUNT));
        if request.is_active == Some(false) {
            subscription.disable();
        }

        Ok(subscription)
    }

    pub fn secret(&self) -> &WebhookSecret {
        &self.secret
    }

    /// Check if this subscription should receive a given event type
    pub fn matches_event(&self, event: EventType) -> bool {
        self.is_active && self.event == event
    }

    /// Set extra delivery headers
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the advisory retry count
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn disable(&mut self) {
        self.is_active = false;
    }

    pub fn toggle(&mut self) {
        self.is_active = !self.is_active;
    }
}

/// Parse a target URL and check it is an absolute http(s) URL with a host.
pub fn validate_target_url(raw: &str, require_https: bool) -> Result<Url, SubscriptionError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| SubscriptionError::InvalidUrl(format!("{raw}: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if !require_https => {}
        "http" => {
            return Err(SubscriptionError::InvalidUrl(format!(
                "{raw}: HTTPS is required"
            )));
        }
        scheme => {
            return Err(SubscriptionError::InvalidUrl(format!(
                "{raw}: unsupported scheme {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SubscriptionError::InvalidUrl(format!("{raw}: missing host")));
    }

    Ok(parsed)
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), SubscriptionError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| SubscriptionError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        HeaderValue::from_str(value).map_err(|e| SubscriptionError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Read model returned by the administrative API. Carries only a secret preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: Uuid,
    pub name: String,
    pub event: EventType,
    pub target_url: String,
    pub secret_preview: String,
    pub headers: BTreeMap<String, String>,
    pub is_active: bool,
    pub retry_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&WebhookSubscription> for SubscriptionView {
    fn from(sub: &WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            name: sub.name.clone(),
            event: sub.event,
            target_url: sub.target_url.to_string(),
            secret_preview: sub.secret.preview(),
            headers: sub.headers.clone(),
            is_active: sub.is_active,
            retry_count: sub.retry_count,
            created_at: sub.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(event: &str, url: &str) -> NewSubscription {
        NewSubscription {
            name: "Accounting sync".to_string(),
            event: event.to_string(),
            target_url: url.to_string(),
            secret: None,
            headers: BTreeMap::new(),
            retry_count: None,
            is_active: None,
        }
    }

    #[test]
    fn test_create_generates_secret_and_defaults() -> Result<(), SubscriptionError> {
        let sub = WebhookSubscription::create(
            request("invoice.paid", "https://hooks.example.com/erp"),
            false,
        )?;

        assert_eq!(sub.event, EventType::InvoicePaid);
        assert_eq!(sub.target_url.as_str(), "https://hooks.example.com/erp");
        assert_eq!(sub.secret().expose().len(), 64);
        assert_eq!(sub.retry_count, DEFAULT_RETRY_COUNT);
        assert!(sub.is_active);
        Ok(())
    }

    #[test]
    fn test_create_keeps_supplied_secret() -> Result<(), SubscriptionError> {
        let mut req = request("vendor.updated", "http://localhost:8080/hook");
        req.secret = Some("whsec_supplied".to_string());
        req.retry_count = Some(7);
        req.is_active = Some(false);

        let sub = WebhookSubscription::create(req, false)?;
        assert_eq!(sub.secret().expose(), "whsec_supplied");
        assert_eq!(sub.retry_count, 7);
        assert!(!sub.is_active);
        Ok(())
    }

    #[test]
    fn test_blank_secret_is_replaced() -> Result<(), SubscriptionError> {
        let mut req = request("vendor.updated", "https://example.com/hook");
        req.secret = Some("   ".to_string());

        let sub = WebhookSubscription::create(req, false)?;
        assert_eq!(sub.secret().expose().len(), 64);
        Ok(())
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result =
            WebhookSubscription::create(request("invoice.exploded", "https://example.com"), false);
        assert!(matches!(result, Err(SubscriptionError::UnknownEvent(_))));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        for url in ["not a url", "/relative/path", "ftp://example.com/x", "mailto:ops@example.com"] {
            let result = WebhookSubscription::create(request("invoice.paid", url), false);
            assert!(
                matches!(result, Err(SubscriptionError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_require_https() {
        assert!(validate_target_url("http://example.com/hook", true).is_err());
        assert!(validate_target_url("https://example.com/hook", true).is_ok());
        assert!(validate_target_url("http://example.com/hook", false).is_ok());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut req = request("invoice.paid", "https://example.com/hook");
        req.headers
            .insert("bad header".to_string(), "value".to_string());

        let result = WebhookSubscription::create(req, false);
        assert!(matches!(result, Err(SubscriptionError::InvalidHeader { .. })));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut req = request("invoice.paid", "https://example.com/hook");
        req.name = "  ".to_string();
        assert!(matches!(
            WebhookSubscription::create(req, false),
            Err(SubscriptionError::EmptyName)
        ));
    }

    #[test]
    fn test_matches_event_respects_active_flag() -> Result<(), SubscriptionError> {
        let mut sub = WebhookSubscription::create(
            request("invoice.paid", "https://example.com/hook"),
            false,
        )?;

        assert!(sub.matches_event(EventType::InvoicePaid));
        assert!(!sub.matches_event(EventType::InvoiceSent));

        sub.toggle();
        assert!(!sub.matches_event(EventType::InvoicePaid));
        sub.toggle();
        assert!(sub.matches_event(EventType::InvoicePaid));
        Ok(())
    }

    #[test]
    fn test_view_exposes_only_preview() -> Result<(), Box<dyn std::error::Error>> {
        let sub = WebhookSubscription::create(
            request("invoice.paid", "https://example.com/hook"),
            false,
        )?;
        let secret = sub.secret().expose().to_string();

        let view = SubscriptionView::from(&sub);
        assert_eq!(view.secret_preview, format!("{}...", &secret[..8]));

        let json = serde_json::to_string(&view)?;
        assert!(!json.contains(&secret));
        assert!(json.contains("secretPreview"));
        assert!(json.contains("targetUrl"));
        Ok(())
    }

    #[test]
    fn test_debug_redacts_secret() {
        let sub = WebhookSubscription::new(
            "debug".to_string(),
            EventType::VendorCreated,
            Url::parse("https://example.com").unwrap(),
            WebhookSecret::new("super-secret-value"),
        );

        let rendered = format!("{sub:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("WebhookSecret(****)"));
    }

    #[test]
    fn test_short_secret_preview_hides_most_of_it() {
        let secret = WebhookSecret::new("abcd");
        assert_eq!(secret.preview(), "ab...");
    }

    #[test]
    fn test_new_subscription_deserializes_camel_case() -> Result<(), serde_json::Error> {
        let req: NewSubscription = serde_json::from_str(
            r#"{
                "name": "Payroll",
                "event": "payroll.processed",
                "targetUrl": "https://example.com/payroll",
                "headers": {"X-Tenant": "acme"},
                "retryCount": 5
            }"#,
        )?;

        assert_eq!(req.target_url, "https://example.com/payroll");
        assert_eq!(req.headers.get("X-Tenant").map(String::as_str), Some("acme"));
        assert_eq!(req.retry_count, Some(5));
        assert!(req.secret.is_none());
        Ok(())
    }
}
