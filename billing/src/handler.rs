use crate::events::{resolve_event_id, EventKind, PaymentEntity, SubscriptionEntity, WebhookPayload};
use crate::mailer::{Email, Mailer};
use crate::signature::verify_signature;
use crate::state::{next_status, Transition};
use chrono::{DateTime, Utc};
use database::{ClaimOutcome, Database};
use painscout_core::{
    BillingError, CoreError, ErrorExt, PaymentTransaction, Subscription, SubscriptionStatus,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Raw pieces of an incoming webhook delivery.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    pub body: &'a [u8],
    pub signature: Option<&'a str>,
    pub event_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { event_id: String },
    /// Acknowledged without side effects; no handler for this event.
    Ignored { event_id: String, event: String },
    Duplicate { event_id: String },
}

impl WebhookOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            WebhookOutcome::Processed { event_id }
            | WebhookOutcome::Ignored { event_id, .. }
            | WebhookOutcome::Duplicate { event_id } => event_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, WebhookOutcome::Duplicate { .. })
    }
}

/// Verifies, deduplicates and applies billing webhooks.
pub struct WebhookProcessor {
    db: Database,
    secret: String,
    mailer: Arc<dyn Mailer>,
}

impl WebhookProcessor {
    pub fn new(db: Database, secret: String, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, secret, mailer }
    }

    pub async fn process(&self, request: WebhookRequest<'_>) -> Result<WebhookOutcome, CoreError> {
        self.process_at(request, Utc::now()).await
    }

    pub async fn process_at(
        &self,
        request: WebhookRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, CoreError> {
        verify_signature(request.body, request.signature, &self.secret)?;
        let payload = WebhookPayload::parse(request.body)?;
        let event_id = resolve_event_id(request.event_id, &payload, request.body);

        match self
            .db
            .claim_webhook_event(&event_id, &payload.event, now)
            .await?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::AlreadyProcessed => {
                info!("Duplicate webhook {} ({}) acknowledged", event_id, payload.event);
                return Ok(WebhookOutcome::Duplicate { event_id });
            }
            ClaimOutcome::InFlight => {
                return Err(BillingError::EventInFlight { event_id }.into());
            }
        }

        match self.dispatch(&payload, now).await {
            Ok(handled) => {
                // Side effects already ran. Failing here would make the
                // provider redeliver and run them twice, so acknowledge anyway.
                if let Err(e) = self.db.mark_webhook_processed(&event_id, now).await {
                    error!("Could not mark webhook {} as processed: {}", event_id, e);
                }
                if handled {
                    info!("Processed webhook {} ({})", event_id, payload.event);
                    Ok(WebhookOutcome::Processed { event_id })
                } else {
                    debug!("No handler for {}; acknowledged {}", payload.event, event_id);
                    Ok(WebhookOutcome::Ignored {
                        event_id,
                        event: payload.event,
                    })
                }
            }
            Err(e) => {
                e.log_error();
                if let Err(mark_err) = self.db.mark_webhook_failed(&event_id, &e.to_string()).await
                {
                    error!("Could not mark webhook {} as failed: {}", event_id, mark_err);
                }
                Err(e)
            }
        }
    }

    /// Returns `false` for events without a handler.
    async fn dispatch(&self, payload: &WebhookPayload, now: DateTime<Utc>) -> Result<bool, CoreError> {
        let kind = payload.kind();
        match &kind {
            EventKind::SubscriptionActivated => {
                self.on_activated(payload.subscription()?, now).await?
            }
            EventKind::SubscriptionCharged => {
                let sub = payload.subscription()?;
                let updated = self.transition(sub, Transition::Charge, &kind, now).await?;
                if let Ok(payment) = payload.payment() {
                    let user_id = updated.as_ref().map(|s| s.user_id.as_str());
                    self.record_payment(payment, user_id, Some(&sub.id), "captured", now)
                        .await?;
                }
                if let Some(updated) = updated {
                    self.notify(
                        Some(&updated.user_id),
                        None,
                        "Payment received",
                        "Your subscription payment went through. Thanks for staying with us.",
                    )
                    .await;
                }
            }
            EventKind::SubscriptionCancelled => {
                self.transition_and_notify(
                    payload.subscription()?,
                    Transition::Cancel,
                    &kind,
                    now,
                    "Subscription cancelled",
                    "Your subscription has been cancelled. You keep access until the end of the current period.",
                )
                .await?
            }
            EventKind::SubscriptionCompleted => {
                self.transition_and_notify(
                    payload.subscription()?,
                    Transition::Complete,
                    &kind,
                    now,
                    "Subscription completed",
                    "Your subscription has reached the end of its billing cycles.",
                )
                .await?
            }
            EventKind::SubscriptionPaused => {
                self.transition_and_notify(
                    payload.subscription()?,
                    Transition::Pause,
                    &kind,
                    now,
                    "Subscription paused",
                    "Your subscription is paused. Resume it any time from your billing page.",
                )
                .await?
            }
            EventKind::SubscriptionResumed => {
                self.transition_and_notify(
                    payload.subscription()?,
                    Transition::Resume,
                    &kind,
                    now,
                    "Subscription resumed",
                    "Welcome back. Your subscription is active again.",
                )
                .await?
            }
            EventKind::PaymentCaptured => {
                self.on_payment(payload.payment()?, Transition::PaymentCaptured, &kind, now)
                    .await?
            }
            EventKind::PaymentFailed => {
                self.on_payment(payload.payment()?, Transition::PaymentFailed, &kind, now)
                    .await?
            }
            EventKind::Other(_) => return Ok(false),
        }
        Ok(true)
    }

    async fn on_activated(&self, sub: &SubscriptionEntity, now: DateTime<Utc>) -> Result<(), CoreError> {
        let existing = self.db.get_subscription(&sub.id).await?;
        let user_id = sub
            .user_id()
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|s| s.user_id.clone()))
            .ok_or_else(|| BillingError::UnknownSubscription {
                subscription_id: sub.id.clone(),
            })?;

        let current = existing.as_ref().map(|s| s.status).unwrap_or_default();
        let Some(status) = next_status(current, Transition::Activate) else {
            log_rejected(&sub.id, current, &EventKind::SubscriptionActivated);
            return Ok(());
        };

        self.db
            .upsert_subscription(&Subscription {
                id: sub.id.clone(),
                user_id: user_id.clone(),
                plan_id: sub.plan_id.clone(),
                status,
                current_period_end: sub.current_period_end(),
                updated_at: now,
            })
            .await?;
        self.sync_user(&user_id, status, sub.plan_id.as_deref()).await?;

        info!("Subscription {} active for user {}", sub.id, user_id);
        self.notify(
            Some(&user_id),
            None,
            "Your subscription is active",
            "Thanks for subscribing. Your plan is now active.",
        )
        .await;
        Ok(())
    }

    /// Applies `transition` to a stored subscription. `Ok(None)` means the
    /// move was not allowed and nothing changed.
    async fn transition(
        &self,
        sub: &SubscriptionEntity,
        transition: Transition,
        event: &EventKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, CoreError> {
        let stored = match self.db.get_subscription(&sub.id).await? {
            Some(stored) => stored,
            // A charge can arrive before activation; the notes carry the owner.
            None => match sub.user_id() {
                Some(user_id) => Subscription {
                    id: sub.id.clone(),
                    user_id: user_id.to_string(),
                    plan_id: sub.plan_id.clone(),
                    status: SubscriptionStatus::None,
                    current_period_end: None,
                    updated_at: now,
                },
                None => {
                    return Err(BillingError::UnknownSubscription {
                        subscription_id: sub.id.clone(),
                    }
                    .into())
                }
            },
        };

        self.apply(stored, transition, sub.current_period_end(), event, now)
            .await
    }

    async fn apply(
        &self,
        mut stored: Subscription,
        transition: Transition,
        period_end: Option<DateTime<Utc>>,
        event: &EventKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, CoreError> {
        let Some(next) = next_status(stored.status, transition) else {
            log_rejected(&stored.id, stored.status, event);
            return Ok(None);
        };

        if stored.status == SubscriptionStatus::None {
            stored.status = next;
            stored.current_period_end = period_end;
            stored.updated_at = now;
            self.db.upsert_subscription(&stored).await?;
        } else {
            self.db
                .update_subscription_status(&stored.id, next, period_end, now)
                .await?;
            if stored.status != next {
                info!("Subscription {}: {} -> {}", stored.id, stored.status, next);
            }
            stored.status = next;
        }
        self.sync_user(&stored.user_id, next, stored.plan_id.as_deref())
            .await?;
        Ok(Some(stored))
    }

    async fn transition_and_notify(
        &self,
        sub: &SubscriptionEntity,
        transition: Transition,
        event: &EventKind,
        now: DateTime<Utc>,
        subject: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        if let Some(updated) = self.transition(sub, transition, event, now).await? {
            self.notify(Some(&updated.user_id), None, subject, text).await;
        }
        Ok(())
    }

    async fn on_payment(
        &self,
        payment: &PaymentEntity,
        transition: Transition,
        event: &EventKind,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let subscription = match payment.subscription_id.as_deref() {
            Some(id) => self.db.get_subscription(id).await?,
            None => None,
        };
        let user_id = payment
            .user_id()
            .map(str::to_string)
            .or_else(|| subscription.as_ref().map(|s| s.user_id.clone()));

        let status = match transition {
            Transition::PaymentFailed => "failed",
            _ => "captured",
        };
        self.record_payment(
            payment,
            user_id.as_deref(),
            payment.subscription_id.as_deref(),
            status,
            now,
        )
        .await?;

        // One-off payments have no subscription to move.
        if let Some(stored) = subscription {
            self.apply(stored, transition, None, event, now).await?;
        }

        let (subject, text) = match transition {
            Transition::PaymentFailed => (
                "Payment failed",
                format!(
                    "We couldn't process your payment of {}. {}",
                    format_amount(payment.amount, &payment.currency),
                    payment
                        .error_description
                        .as_deref()
                        .unwrap_or("Please update your payment method.")
                ),
            ),
            _ => (
                "Payment receipt",
                format!(
                    "We received your payment of {}.",
                    format_amount(payment.amount, &payment.currency)
                ),
            ),
        };
        self.notify(user_id.as_deref(), payment.email.as_deref(), subject, &text)
            .await;
        Ok(())
    }

    async fn record_payment(
        &self,
        payment: &PaymentEntity,
        user_id: Option<&str>,
        subscription_id: Option<&str>,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.db
            .record_payment(&PaymentTransaction {
                id: payment.id.clone(),
                user_id: user_id.map(str::to_string),
                subscription_id: subscription_id.map(str::to_string),
                amount: payment.amount,
                currency: payment.currency.clone(),
                status: payment.status.clone().unwrap_or_else(|| status.to_string()),
                error_description: payment.error_description.clone(),
                created_at: now,
            })
            .await
    }

    async fn sync_user(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        plan_id: Option<&str>,
    ) -> Result<(), CoreError> {
        if !self.db.set_user_subscription(user_id, status, plan_id).await? {
            warn!("No user row for {}; subscription state kept on the subscription only", user_id);
        }
        Ok(())
    }

    /// Best effort: failures are logged and never fail the webhook.
    async fn notify(&self, user_id: Option<&str>, fallback: Option<&str>, subject: &str, text: &str) {
        let to = match user_id {
            Some(id) => match self.db.get_user(id).await {
                Ok(Some(user)) => Some(user.email),
                Ok(None) => None,
                Err(e) => {
                    warn!("Email lookup for {} failed: {}", id, e);
                    None
                }
            },
            None => None,
        }
        .or_else(|| fallback.map(str::to_string));

        let Some(to) = to else {
            debug!("No recipient for '{}'", subject);
            return;
        };

        let email = Email {
            to,
            subject: subject.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = self.mailer.send(&email).await {
            warn!("Email '{}' to {} failed: {}", email.subject, email.to, e);
        }
    }
}

fn log_rejected(subscription_id: &str, current: SubscriptionStatus, event: &EventKind) {
    warn!(
        "{}",
        BillingError::InvalidTransition {
            from: current.to_string(),
            event: event.to_string(),
        }
    );
    debug!("Subscription {} left unchanged", subscription_id);
}

/// Amounts arrive in the currency's minor unit.
fn format_amount(amount: i64, currency: &str) -> String {
    format!("{} {}.{:02}", currency, amount / 100, (amount % 100).abs())
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_amount(49900, "INR"), "INR 499.00");
        assert_eq!(format_amount(1999, "USD"), "USD 19.99");
        assert_eq!(format_amount(5, "INR"), "INR 0.05");
    }

    #[test]
    fn outcome_accessors() {
        let dup = WebhookOutcome::Duplicate {
            event_id: "evt_1".to_string(),
        };
        assert!(dup.is_duplicate());
        assert_eq!(dup.event_id(), "evt_1");
        assert!(!WebhookOutcome::Processed {
            event_id: "evt_2".to_string()
        }
        .is_duplicate());
    }
}
