use crate::{from_ts, to_ts, Database};
use chrono::{DateTime, Duration, Utc};
use painscout_core::{CoreError, WebhookEvent, WebhookEventStatus};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, warn};

/// A `processing` claim older than this is considered abandoned.
pub const STALE_CLAIM_AFTER_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller owns the event and must run its side effects.
    Claimed,
    AlreadyProcessed,
    /// Another worker holds a live claim.
    InFlight,
}

impl Database {
    /// Records the event if unseen, then tries to move it into `processing`.
    /// Only one concurrent caller can win the conditional update.
    pub async fn claim_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, CoreError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type, status, received_at)
            VALUES (?, ?, 'received', ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(to_ts(now))
        .execute(&self.pool)
        .await?;

        let stale_before = now - Duration::seconds(STALE_CLAIM_AFTER_SECS);
        let claimed = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processing', claimed_at = ?
            WHERE event_id = ?
              AND (status IN ('received', 'failed')
                   OR (status = 'processing' AND claimed_at < ?))
            "#,
        )
        .bind(to_ts(now))
        .bind(event_id)
        .bind(to_ts(stale_before))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if claimed == 1 {
            debug!("Claimed webhook event {}", event_id);
            return Ok(ClaimOutcome::Claimed);
        }

        let status: String = sqlx::query("SELECT status FROM webhook_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("status")?;

        match WebhookEventStatus::from_str(&status)? {
            WebhookEventStatus::Processed => Ok(ClaimOutcome::AlreadyProcessed),
            other => {
                warn!("Webhook event {} is {} elsewhere", event_id, other.as_str());
                Ok(ClaimOutcome::InFlight)
            }
        }
    }

    pub async fn mark_webhook_processed(
        &self,
        event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processed', processed_at = ?, last_error = NULL
            WHERE event_id = ?
            "#,
        )
        .bind(to_ts(now))
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Releases the claim and bumps `retry_count` so the next delivery can
    /// take the event again.
    pub async fn mark_webhook_failed(&self, event_id: &str, error: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'failed', retry_count = retry_count + 1, last_error = ?,
                claimed_at = NULL
            WHERE event_id = ?
            "#,
        )
        .bind(error)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT event_id, event_type, status, retry_count, last_error, received_at,
                   processed_at
            FROM webhook_events
            WHERE event_id = ?
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status: String = row.try_get("status")?;
        let processed_at: Option<i64> = row.try_get("processed_at")?;

        Ok(Some(WebhookEvent {
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            status: WebhookEventStatus::from_str(&status)?,
            retry_count: row.try_get("retry_count")?,
            last_error: row.try_get("last_error")?,
            received_at: from_ts(row.try_get("received_at")?),
            processed_at: processed_at.map(from_ts),
        }))
    }
}
