#[cfg(test)]
mod tests {
    use crate::mailer::{Email, Mailer};
    use crate::signature::sign;
    use crate::{WebhookOutcome, WebhookProcessor, WebhookRequest};
    use async_trait::async_trait;
    use chrono::Utc;
    use database::Database;
    use painscout_core::{
        BillingError, CoreError, Subscription, SubscriptionStatus, User, WebhookEventStatus,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const SECRET: &str = "whsec_test";

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<Email> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> Result<(), CoreError> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail {
                return Err(BillingError::EmailFailed {
                    reason: "smtp down".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    async fn setup(mailer: Arc<RecordingMailer>) -> (Database, WebhookProcessor) {
        let db = Database::connect_in_memory().await.unwrap();
        db.upsert_user(&User {
            id: "user-1".to_string(),
            email: "founder@example.com".to_string(),
            name: Some("Founder".to_string()),
            subscription_status: SubscriptionStatus::None,
            plan_id: None,
        })
        .await
        .unwrap();
        let processor = WebhookProcessor::new(db.clone(), SECRET.to_string(), mailer);
        (db, processor)
    }

    async fn seed_subscription(db: &Database, status: SubscriptionStatus) {
        db.upsert_subscription(&Subscription {
            id: "sub_1".to_string(),
            user_id: "user-1".to_string(),
            plan_id: Some("plan_pro".to_string()),
            status,
            current_period_end: None,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    fn subscription_event(event: &str, notes: serde_json::Value) -> Vec<u8> {
        json!({
            "entity": "event",
            "event": event,
            "payload": {
                "subscription": {
                    "entity": {
                        "id": "sub_1",
                        "plan_id": "plan_pro",
                        "current_end": 1_900_000_000i64,
                        "notes": notes
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    fn payment_event(event: &str, payment_id: &str, error: Option<&str>) -> Vec<u8> {
        json!({
            "event": event,
            "payload": {
                "payment": {
                    "entity": {
                        "id": payment_id,
                        "amount": 49900,
                        "currency": "INR",
                        "subscription_id": "sub_1",
                        "error_description": error,
                        "notes": []
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    async fn deliver(
        processor: &WebhookProcessor,
        body: &[u8],
        event_id: &str,
    ) -> Result<WebhookOutcome, CoreError> {
        let signature = sign(body, SECRET);
        processor
            .process(WebhookRequest {
                body,
                signature: Some(&signature),
                event_id: Some(event_id),
            })
            .await
    }

    #[tokio::test]
    async fn test_activation_updates_rows_and_emails() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;

        let body = subscription_event("subscription.activated", json!({"user_id": "user-1"}));
        let outcome = deliver(&processor, &body, "evt_1").await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Processed {
                event_id: "evt_1".to_string()
            }
        );

        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end.unwrap().timestamp(), 1_900_000_000);
        let user = db.get_user("user-1").await.unwrap().unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert_eq!(user.plan_id.as_deref(), Some("plan_pro"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "founder@example.com");

        let event = db.get_webhook_event("evt_1").await.unwrap().unwrap();
        assert!(event.processed());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_has_side_effects_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        seed_subscription(&db, SubscriptionStatus::Active).await;

        let body = payment_event("payment.captured", "pay_1", None);
        let first = deliver(&processor, &body, "evt_pay").await.unwrap();
        let second = deliver(&processor, &body, "evt_pay").await.unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(mailer.sent().len(), 1);

        let payment = db.get_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(payment.status, "captured");
        assert_eq!(payment.user_id.as_deref(), Some("user-1"));
        assert_eq!(payment.amount, 49900);
    }

    #[tokio::test]
    async fn test_missing_event_id_header_deduplicates_on_body() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        seed_subscription(&db, SubscriptionStatus::Active).await;

        let body = subscription_event("subscription.paused", json!([]));
        let signature = sign(&body, SECRET);
        let request = WebhookRequest {
            body: &body,
            signature: Some(&signature),
            event_id: None,
        };

        let first = processor.process(request).await.unwrap();
        let second = processor.process(request).await.unwrap();
        assert!(first.event_id().starts_with("sha256:"));
        assert_eq!(first.event_id(), second.event_id());
        assert!(second.is_duplicate());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_failure_marks_event_failed_and_allows_retry() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer).await;

        // No stored subscription and no user in the notes.
        let body = subscription_event("subscription.cancelled", json!([]));
        let err = deliver(&processor, &body, "evt_fail").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Billing(BillingError::UnknownSubscription { .. })
        ));

        let event = db.get_webhook_event("evt_fail").await.unwrap().unwrap();
        assert_eq!(event.status, WebhookEventStatus::Failed);
        assert_eq!(event.retry_count, 1);
        assert!(event.last_error.unwrap().contains("sub_1"));

        // The provider retries; it fails again and is counted again.
        deliver(&processor, &body, "evt_fail").await.unwrap_err();
        let event = db.get_webhook_event("evt_fail").await.unwrap().unwrap();
        assert_eq!(event.retry_count, 2);

        // Once the subscription exists the retry succeeds.
        seed_subscription(&db, SubscriptionStatus::Active).await;
        let outcome = deliver(&processor, &body, "evt_fail").await.unwrap();
        assert!(!outcome.is_duplicate());
        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_processed_mark_failure_still_acknowledges() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_processed BEFORE UPDATE ON webhook_events
            WHEN NEW.status = 'processed'
            BEGIN SELECT RAISE(ABORT, 'disk full'); END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let body = subscription_event("subscription.activated", json!({"user_id": "user-1"}));
        let outcome = deliver(&processor, &body, "evt_mark").await.unwrap();
        assert!(!outcome.is_duplicate());

        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(mailer.sent().len(), 1);
        let event = db.get_webhook_event("evt_mark").await.unwrap().unwrap();
        assert_eq!(event.status, WebhookEventStatus::Processing);
        assert_eq!(event.retry_count, 0);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_acknowledged_without_change() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        seed_subscription(&db, SubscriptionStatus::Cancelled).await;

        let body = subscription_event("subscription.paused", json!([]));
        let outcome = deliver(&processor, &body, "evt_pause").await.unwrap();
        assert!(!outcome.is_duplicate());

        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert!(mailer.sent().is_empty());
        assert!(db
            .get_webhook_event("evt_pause")
            .await
            .unwrap()
            .unwrap()
            .processed());
    }

    #[tokio::test]
    async fn test_payment_failure_then_recovery() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        seed_subscription(&db, SubscriptionStatus::Active).await;

        let failed = payment_event("payment.failed", "pay_2", Some("Card declined"));
        deliver(&processor, &failed, "evt_f").await.unwrap();
        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        let payment = db.get_payment("pay_2").await.unwrap().unwrap();
        assert_eq!(payment.status, "failed");
        assert_eq!(payment.error_description.as_deref(), Some("Card declined"));
        assert!(mailer.sent()[0].text.contains("Card declined"));

        let captured = payment_event("payment.captured", "pay_3", None);
        deliver(&processor, &captured, "evt_c").await.unwrap();
        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        let user = db.get_user("user-1").await.unwrap().unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;
        seed_subscription(&db, SubscriptionStatus::Active).await;

        deliver(&processor, &subscription_event("subscription.paused", json!([])), "evt_p")
            .await
            .unwrap();
        assert_eq!(
            db.get_user("user-1").await.unwrap().unwrap().subscription_status,
            SubscriptionStatus::Paused
        );

        deliver(&processor, &subscription_event("subscription.resumed", json!([])), "evt_r")
            .await
            .unwrap();
        assert_eq!(
            db.get_subscription("sub_1").await.unwrap().unwrap().status,
            SubscriptionStatus::Active
        );
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_charge_before_activation_creates_subscription() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer).await;

        let body = subscription_event("subscription.charged", json!({"user_id": "user-1"}));
        deliver(&processor, &body, "evt_charge").await.unwrap();

        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_email_failure_does_not_block_ack() {
        let mailer = Arc::new(RecordingMailer::failing());
        let (db, processor) = setup(mailer.clone()).await;

        let body = subscription_event("subscription.activated", json!({"user_id": "user-1"}));
        let outcome = deliver(&processor, &body, "evt_mail").await.unwrap();
        assert!(!outcome.is_duplicate());
        assert_eq!(mailer.sent().len(), 1);
        assert!(db
            .get_webhook_event("evt_mail")
            .await
            .unwrap()
            .unwrap()
            .processed());
    }

    #[tokio::test]
    async fn test_unknown_event_is_acknowledged() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer).await;

        let body = json!({"event": "refund.created", "payload": {}})
            .to_string()
            .into_bytes();
        let outcome = deliver(&processor, &body, "evt_refund").await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_id: "evt_refund".to_string(),
                event: "refund.created".to_string()
            }
        );
        assert!(db
            .get_webhook_event("evt_refund")
            .await
            .unwrap()
            .unwrap()
            .processed());
    }

    #[tokio::test]
    async fn test_event_claimed_elsewhere_is_in_flight() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer.clone()).await;

        db.claim_webhook_event("evt_busy", "subscription.activated", Utc::now())
            .await
            .unwrap();

        let body = subscription_event("subscription.activated", json!({"user_id": "user-1"}));
        let err = deliver(&processor, &body, "evt_busy").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Billing(BillingError::EventInFlight { .. })
        ));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_signature_checked_before_anything_else() {
        let mailer = Arc::new(RecordingMailer::default());
        let (db, processor) = setup(mailer).await;
        let body = subscription_event("subscription.activated", json!({"user_id": "user-1"}));

        let missing = processor
            .process(WebhookRequest {
                body: &body,
                signature: None,
                event_id: Some("evt_sig"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            CoreError::Billing(BillingError::MissingSignature)
        ));

        let bad = processor
            .process(WebhookRequest {
                body: &body,
                signature: Some("deadbeef"),
                event_id: Some("evt_sig"),
            })
            .await
            .unwrap_err();
        assert!(matches!(bad, CoreError::Billing(BillingError::InvalidSignature)));
        assert!(db.get_webhook_event("evt_sig").await.unwrap().is_none());
    }
}
