//! Razorpay webhook payloads.
//!
//! Only the fields the handlers read are modelled; everything else in the
//! provider's envelope is ignored.

use chrono::{DateTime, Utc};
use painscout_core::BillingError;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub payload: EventPayload,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub subscription: Option<Entity<SubscriptionEntity>>,
    #[serde(default)]
    pub payment: Option<Entity<PaymentEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEntity {
    pub id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_end: Option<i64>,
    #[serde(default)]
    pub notes: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub notes: Value,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Razorpay sends `notes` as an object, or as `[]` when empty.
fn note<'a>(notes: &'a Value, key: &str) -> Option<&'a str> {
    notes
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl SubscriptionEntity {
    pub fn user_id(&self) -> Option<&str> {
        note(&self.notes, "user_id")
    }

    pub fn current_period_end(&self) -> Option<DateTime<Utc>> {
        self.current_end.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

impl PaymentEntity {
    pub fn user_id(&self) -> Option<&str> {
        note(&self.notes, "user_id")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SubscriptionActivated,
    SubscriptionCharged,
    SubscriptionCancelled,
    SubscriptionCompleted,
    SubscriptionPaused,
    SubscriptionResumed,
    PaymentCaptured,
    PaymentFailed,
    Other(String),
}

impl EventKind {
    pub fn parse(event: &str) -> Self {
        match event {
            "subscription.activated" => EventKind::SubscriptionActivated,
            "subscription.charged" => EventKind::SubscriptionCharged,
            "subscription.cancelled" => EventKind::SubscriptionCancelled,
            "subscription.completed" => EventKind::SubscriptionCompleted,
            "subscription.paused" => EventKind::SubscriptionPaused,
            "subscription.resumed" => EventKind::SubscriptionResumed,
            "payment.captured" => EventKind::PaymentCaptured,
            "payment.failed" => EventKind::PaymentFailed,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SubscriptionActivated => "subscription.activated",
            EventKind::SubscriptionCharged => "subscription.charged",
            EventKind::SubscriptionCancelled => "subscription.cancelled",
            EventKind::SubscriptionCompleted => "subscription.completed",
            EventKind::SubscriptionPaused => "subscription.paused",
            EventKind::SubscriptionResumed => "subscription.resumed",
            EventKind::PaymentCaptured => "payment.captured",
            EventKind::PaymentFailed => "payment.failed",
            EventKind::Other(name) => name,
        };
        f.write_str(name)
    }
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self, BillingError> {
        serde_json::from_slice(body).map_err(|e| BillingError::InvalidPayload {
            details: e.to_string(),
        })
    }

    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event)
    }

    pub fn subscription(&self) -> Result<&SubscriptionEntity, BillingError> {
        self.payload
            .subscription
            .as_ref()
            .map(|s| &s.entity)
            .ok_or_else(|| BillingError::InvalidPayload {
                details: format!("{} without a subscription entity", self.event),
            })
    }

    pub fn payment(&self) -> Result<&PaymentEntity, BillingError> {
        self.payload
            .payment
            .as_ref()
            .map(|p| &p.entity)
            .ok_or_else(|| BillingError::InvalidPayload {
                details: format!("{} without a payment entity", self.event),
            })
    }
}

/// Header id if present, then the payload id, then a digest of the body so
/// byte-identical redeliveries still collapse to one event.
pub fn resolve_event_id(header: Option<&str>, payload: &WebhookPayload, body: &[u8]) -> String {
    header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| payload.id.clone().filter(|id| !id.is_empty()))
        .unwrap_or_else(|| format!("sha256:{}", hex::encode(Sha256::digest(body))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVATED: &str = r#"{
        "entity": "event",
        "event": "subscription.activated",
        "payload": {
            "subscription": {
                "entity": {
                    "id": "sub_123",
                    "plan_id": "plan_pro",
                    "status": "active",
                    "current_end": 1767225600,
                    "notes": {"user_id": "user-1"}
                }
            }
        },
        "created_at": 1764547200
    }"#;

    #[test]
    fn parses_subscription_event() {
        let payload = WebhookPayload::parse(ACTIVATED.as_bytes()).unwrap();
        assert_eq!(payload.kind(), EventKind::SubscriptionActivated);
        let sub = payload.subscription().unwrap();
        assert_eq!(sub.id, "sub_123");
        assert_eq!(sub.user_id(), Some("user-1"));
        assert_eq!(sub.current_period_end().unwrap().timestamp(), 1767225600);
        assert!(payload.payment().is_err());
    }

    #[test]
    fn empty_notes_array_has_no_user() {
        let body = r#"{"event":"payment.failed","payload":{"payment":{"entity":
            {"id":"pay_1","amount":49900,"currency":"INR","notes":[]}}}}"#;
        let payload = WebhookPayload::parse(body.as_bytes()).unwrap();
        let payment = payload.payment().unwrap();
        assert_eq!(payment.user_id(), None);
        assert_eq!(payment.amount, 49900);
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(matches!(
            WebhookPayload::parse(b"not json"),
            Err(BillingError::InvalidPayload { .. })
        ));
        assert!(matches!(
            WebhookPayload::parse(br#"{"payload":{}}"#),
            Err(BillingError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn event_id_precedence() {
        let body = ACTIVATED.as_bytes();
        let mut payload = WebhookPayload::parse(body).unwrap();

        assert_eq!(resolve_event_id(Some("evt_header"), &payload, body), "evt_header");

        payload.id = Some("evt_body".to_string());
        assert_eq!(resolve_event_id(Some(" "), &payload, body), "evt_body");

        payload.id = None;
        let hashed = resolve_event_id(None, &payload, body);
        assert!(hashed.starts_with("sha256:"));
        assert_eq!(hashed, resolve_event_id(None, &payload, body));
    }

    #[test]
    fn unknown_event_names_round_trip() {
        let kind = EventKind::parse("refund.created");
        assert_eq!(kind, EventKind::Other("refund.created".to_string()));
        assert_eq!(kind.to_string(), "refund.created");
        assert_eq!(EventKind::PaymentFailed.to_string(), "payment.failed");
    }
}
