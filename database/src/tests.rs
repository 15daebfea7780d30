#[cfg(test)]
mod tests {
    use crate::{ClaimOutcome, Database};
    use chrono::{Duration, TimeZone, Utc};
    use painscout_core::{
        ContentKind, DatabaseConfig, GeneratedContent, IdeaValidation, Message, MessageOutcome,
        PaymentTransaction, RedditContact, RedditPost, SendStatus, StartupIdea, Subscription,
        SubscriptionStatus, TrendDirection, User, WebhookEventStatus,
    };
    use std::env;

    async fn setup_test_db() -> Database {
        Database::connect_in_memory()
            .await
            .expect("Failed to create in-memory database")
    }

    async fn setup_file_db() -> Database {
        let db_path = env::temp_dir().join(format!("test_painscout_{}.db", uuid::Uuid::new_v4()));
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path.display()),
            max_connections: 4,
        };
        let db = Database::connect(&config)
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");
        db
    }

    fn post(id: &str, subreddit: &str, author: &str, age_hours: i64) -> RedditPost {
        RedditPost {
            id: id.to_string(),
            title: format!("Struggling with {}", id),
            content: Some("this is so frustrating".to_string()),
            author: author.to_string(),
            subreddit: subreddit.to_string(),
            url: format!("https://www.reddit.com/r/{}/comments/{}/", subreddit, id),
            score: 25,
            num_comments: 6,
            created_utc: (Utc::now() - Duration::hours(age_hours)).timestamp(),
            viability_score: 31.5,
            is_emerging: age_hours <= 24,
            trend_direction: TrendDirection::Rising,
        }
    }

    fn contact(pain_point_id: &str, username: &str, score: f64, age: Duration) -> RedditContact {
        RedditContact {
            pain_point_id: pain_point_id.to_string(),
            username: username.to_string(),
            karma: 1000,
            account_age_days: 400,
            posting_frequency: 1.75,
            engagement_score: score,
            discovered_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_database_connection_and_migrations() {
        let db = setup_file_db().await;
        db.ping().await.expect("ping");
        // Migrations are idempotent.
        db.run_migrations().await.expect("second migration run");
    }

    #[tokio::test]
    async fn test_post_upsert_and_lookup() {
        let db = setup_test_db().await;
        let mut p = post("abc", "startups", "founder1", 2);
        db.upsert_posts(std::slice::from_ref(&p)).await.unwrap();

        p.score = 99;
        p.trend_direction = TrendDirection::Declining;
        db.upsert_posts(&[p]).await.unwrap();

        let stored = db.get_post("abc").await.unwrap().unwrap();
        assert_eq!(stored.score, 99);
        assert_eq!(stored.trend_direction, TrendDirection::Declining);
        assert_eq!(stored.content.as_deref(), Some("this is so frustrating"));
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_posts_respects_window_and_subreddit() {
        let db = setup_test_db().await;
        db.upsert_posts(&[
            post("a", "startups", "u1", 1),
            post("b", "startups", "u2", 30),
            post("c", "startups", "u3", 60),
            post("d", "SaaS", "u4", 1),
        ])
        .await
        .unwrap();

        let since = Utc::now() - Duration::hours(48);
        let posts = db
            .recent_posts_in_subreddit("startups", since, 20)
            .await
            .unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_contact_cache_freshness() {
        let db = setup_test_db().await;
        db.record_contacts(
            "pp1",
            &[
                contact("pp1", "low", 10.0, Duration::hours(23)),
                contact("pp1", "high", 50.0, Duration::hours(23)),
            ],
            Some("user-1"),
        )
        .await
        .unwrap();

        let window_start = Utc::now() - Duration::hours(24);
        let fresh = db.fresh_contacts("pp1", window_start).await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].username, "high");

        db.record_contacts(
            "pp1",
            &[contact("pp1", "old", 10.0, Duration::hours(25))],
            None,
        )
        .await
        .unwrap();
        assert!(db.fresh_contacts("pp1", window_start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rediscovery_keeps_earlier_users_usage() {
        let db = setup_test_db().await;
        let first_run = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
        let second_run = first_run + Duration::hours(25);
        let found_at = |username: &str, at: chrono::DateTime<Utc>| RedditContact {
            discovered_at: at,
            ..contact("pp1", username, 5.0, Duration::zero())
        };

        db.record_contacts(
            "pp1",
            &[
                found_at("a", first_run),
                found_at("b", first_run),
                found_at("c", first_run),
            ],
            Some("alice"),
        )
        .await
        .unwrap();
        assert_eq!(
            db.reconcile_usage("alice", first_run).await.unwrap().contacts_discovered,
            3
        );

        // Same authors found again once alice's batch has gone stale.
        db.record_contacts(
            "pp1",
            &[found_at("a", second_run), found_at("b", second_run)],
            Some("bob"),
        )
        .await
        .unwrap();

        let alice = db.reconcile_usage("alice", second_run).await.unwrap();
        assert_eq!(alice.contacts_discovered, 3);
        let bob = db.reconcile_usage("bob", second_run).await.unwrap();
        assert_eq!(bob.contacts_discovered, 2);

        let cached = db
            .fresh_contacts("pp1", second_run - Duration::hours(24))
            .await
            .unwrap();
        let names: Vec<_> = cached.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_webhook_claim_lifecycle() {
        let db = setup_test_db().await;
        let now = Utc::now();

        assert_eq!(
            db.claim_webhook_event("evt_1", "payment.captured", now).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            db.claim_webhook_event("evt_1", "payment.captured", now).await.unwrap(),
            ClaimOutcome::InFlight
        );

        db.mark_webhook_failed("evt_1", "boom").await.unwrap();
        let failed = db.get_webhook_event("evt_1").await.unwrap().unwrap();
        assert_eq!(failed.status, WebhookEventStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));

        assert_eq!(
            db.claim_webhook_event("evt_1", "payment.captured", now).await.unwrap(),
            ClaimOutcome::Claimed
        );
        db.mark_webhook_processed("evt_1", now).await.unwrap();

        assert_eq!(
            db.claim_webhook_event("evt_1", "payment.captured", now).await.unwrap(),
            ClaimOutcome::AlreadyProcessed
        );
        let done = db.get_webhook_event("evt_1").await.unwrap().unwrap();
        assert!(done.processed());
        assert!(done.last_error.is_none());
    }

    #[tokio::test]
    async fn test_stale_claim_can_be_taken_over() {
        let db = setup_test_db().await;
        let then = Utc::now() - Duration::minutes(10);
        db.claim_webhook_event("evt_2", "subscription.charged", then)
            .await
            .unwrap();

        assert_eq!(
            db.claim_webhook_event("evt_2", "subscription.charged", Utc::now())
                .await
                .unwrap(),
            ClaimOutcome::Claimed
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let db = setup_file_db().await;
        let now = Utc::now();

        let attempts = (0..6).map(|_| {
            let db = db.clone();
            tokio::spawn(async move {
                db.claim_webhook_event("evt_race", "payment.captured", now)
                    .await
            })
        });

        let mut claimed = 0;
        for handle in attempts.collect::<Vec<_>>() {
            if handle.await.unwrap().unwrap() == ClaimOutcome::Claimed {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_subscription_and_user_rows() {
        let db = setup_test_db().await;
        db.upsert_user(&User {
            id: "user-1".to_string(),
            email: "founder@example.com".to_string(),
            name: Some("Founder".to_string()),
            subscription_status: SubscriptionStatus::None,
            plan_id: None,
        })
        .await
        .unwrap();

        let now = Utc::now();
        db.upsert_subscription(&Subscription {
            id: "sub_1".to_string(),
            user_id: "user-1".to_string(),
            plan_id: Some("plan_pro".to_string()),
            status: SubscriptionStatus::Active,
            current_period_end: Some(now + Duration::days(30)),
            updated_at: now,
        })
        .await
        .unwrap();

        assert!(db
            .update_subscription_status("sub_1", SubscriptionStatus::Paused, None, now)
            .await
            .unwrap());
        let sub = db.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Paused);
        assert_eq!(sub.plan_id.as_deref(), Some("plan_pro"));
        assert!(sub.current_period_end.is_some());

        assert!(db
            .set_user_subscription("user-1", SubscriptionStatus::Paused, None)
            .await
            .unwrap());
        let user = db.get_user("user-1").await.unwrap().unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Paused);
        assert!(!db
            .set_user_subscription("nobody", SubscriptionStatus::Active, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_payment_status_moves_forward() {
        let db = setup_test_db().await;
        let mut payment = PaymentTransaction {
            id: "pay_1".to_string(),
            user_id: Some("user-1".to_string()),
            subscription_id: Some("sub_1".to_string()),
            amount: 49900,
            currency: "INR".to_string(),
            status: "authorized".to_string(),
            error_description: None,
            created_at: Utc::now(),
        };
        db.record_payment(&payment).await.unwrap();

        payment.status = "captured".to_string();
        payment.user_id = None;
        db.record_payment(&payment).await.unwrap();

        let stored = db.get_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(stored.status, "captured");
        assert_eq!(stored.user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_usage_is_recounted_from_source_rows() {
        let db = setup_test_db().await;
        let now = Utc::now();

        for i in 0..2 {
            db.insert_idea(&StartupIdea {
                id: format!("idea-{}", i),
                user_id: "user-1".to_string(),
                pain_point_id: Some("pp1".to_string()),
                title: "Invoice autopilot".to_string(),
                description: "d".to_string(),
                problem: "p".to_string(),
                solution: "s".to_string(),
                target_market: "freelancers".to_string(),
                revenue_model: "subscription".to_string(),
                validation: None,
                created_at: now,
            })
            .await
            .unwrap();
        }
        db.insert_content(&GeneratedContent {
            id: "content-1".to_string(),
            user_id: "user-1".to_string(),
            idea_id: "idea-0".to_string(),
            kind: ContentKind::TweetThread,
            body: "1/ invoices are broken".to_string(),
            created_at: now,
        })
        .await
        .unwrap();
        db.record_contacts(
            "pp1",
            &[contact("pp1", "a", 1.0, Duration::zero())],
            Some("user-1"),
        )
        .await
        .unwrap();

        let usage = db.reconcile_usage("user-1", now).await.unwrap();
        assert_eq!(usage.ideas_generated, 2);
        assert_eq!(usage.content_generated, 1);
        assert_eq!(usage.contacts_discovered, 1);

        // Running it again yields the same totals.
        let again = db.reconcile_usage("user-1", now).await.unwrap();
        assert_eq!(again, usage);
        let stored = db
            .get_usage("user-1", &crate::usage_period(now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.ideas_generated, 2);
    }

    #[tokio::test]
    async fn test_idea_validation_round_trip() {
        let db = setup_test_db().await;
        db.insert_idea(&StartupIdea {
            id: "idea-v".to_string(),
            user_id: "user-1".to_string(),
            pain_point_id: None,
            title: "t".to_string(),
            description: "d".to_string(),
            problem: "p".to_string(),
            solution: "s".to_string(),
            target_market: "m".to_string(),
            revenue_model: "r".to_string(),
            validation: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let validation = IdeaValidation {
            market_score: 70.0,
            competition_score: 40.0,
            feasibility_score: 80.0,
            overall_score: 63.3,
            strengths: vec!["clear pain".to_string()],
            risks: vec!["crowded".to_string()],
            recommendation: "Validate with 10 interviews".to_string(),
            fallback: false,
        };
        assert!(db.save_idea_validation("idea-v", &validation).await.unwrap());
        assert!(!db.save_idea_validation("nope", &validation).await.unwrap());

        let idea = db.get_idea("idea-v").await.unwrap().unwrap();
        assert_eq!(idea.validation, Some(validation));
    }

    #[tokio::test]
    async fn test_variant_stats() {
        let db = setup_test_db().await;
        let now = Utc::now();
        let outcomes = [
            ("A", Some(MessageOutcome::Replied)),
            ("A", Some(MessageOutcome::DeadEnd)),
            ("A", None),
            ("B", Some(MessageOutcome::CustomerAcquired)),
        ];

        for (i, (variant, outcome)) in outcomes.iter().enumerate() {
            let id = format!("msg-{}", i);
            db.insert_message(&Message {
                id: id.clone(),
                user_id: "user-1".to_string(),
                pain_point_id: "pp1".to_string(),
                contact_username: format!("contact{}", i),
                template_variant: variant.to_string(),
                body: "Hi, saw your post".to_string(),
                send_status: SendStatus::Draft,
                outcome: None,
                created_at: now,
                sent_at: None,
            })
            .await
            .unwrap();
            db.set_message_status(&id, SendStatus::Sent, now).await.unwrap();
            if let Some(outcome) = outcome {
                db.record_message_outcome(&id, *outcome).await.unwrap();
            }
        }

        let stats = db.variant_stats("user-1").await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].template_variant, "A");
        assert_eq!(stats[0].sent, 3);
        assert_eq!(stats[0].replies, 1);
        assert!((stats[0].reply_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats[1].replies, 1);

        let msg = db.get_message("msg-0").await.unwrap().unwrap();
        assert_eq!(msg.send_status, SendStatus::Sent);
        assert!(msg.sent_at.is_some());
        assert_eq!(msg.outcome, Some(MessageOutcome::Replied));
    }
}
