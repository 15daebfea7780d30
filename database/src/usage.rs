use crate::{to_ts, usage_period, Database};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use painscout_core::{CoreError, UsageLimits};
use sqlx::Row;
use tracing::debug;

/// First instant of the month containing `at`, and of the month after.
fn month_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (at.year(), at.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    (start, end)
}

impl Database {
    /// Recounts the user's ideas, content and discovered contacts for the
    /// month containing `now` and stores the totals.
    pub async fn reconcile_usage(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UsageLimits, CoreError> {
        let (start, end) = month_bounds(now);
        let (start, end) = (to_ts(start), to_ts(end));

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM startup_ideas
                  WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3) AS ideas,
                (SELECT COUNT(*) FROM generated_content
                  WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3) AS content,
                (SELECT COUNT(*) FROM reddit_contacts
                  WHERE discovered_by = ?1 AND discovered_at >= ?2 AND discovered_at < ?3) AS contacts
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let usage = UsageLimits {
            user_id: user_id.to_string(),
            period: usage_period(now),
            ideas_generated: row.try_get("ideas")?,
            content_generated: row.try_get("content")?,
            contacts_discovered: row.try_get("contacts")?,
        };

        sqlx::query(
            r#"
            INSERT INTO usage_limits (
                user_id, period, ideas_generated, content_generated, contacts_discovered,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, period) DO UPDATE SET
                ideas_generated = excluded.ideas_generated,
                content_generated = excluded.content_generated,
                contacts_discovered = excluded.contacts_discovered,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&usage.user_id)
        .bind(&usage.period)
        .bind(usage.ideas_generated)
        .bind(usage.content_generated)
        .bind(usage.contacts_discovered)
        .bind(to_ts(now))
        .execute(&self.pool)
        .await?;

        debug!(
            "Usage for {} in {}: {} ideas, {} content, {} contacts",
            user_id,
            usage.period,
            usage.ideas_generated,
            usage.content_generated,
            usage.contacts_discovered
        );
        Ok(usage)
    }

    pub async fn get_usage(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<Option<UsageLimits>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, period, ideas_generated, content_generated, contacts_discovered
            FROM usage_limits
            WHERE user_id = ? AND period = ?
            "#,
        )
        .bind(user_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<UsageLimits, CoreError> {
            Ok(UsageLimits {
                user_id: row.try_get("user_id")?,
                period: row.try_get("period")?,
                ideas_generated: row.try_get("ideas_generated")?,
                content_generated: row.try_get("content_generated")?,
                contacts_discovered: row.try_get("contacts_discovered")?,
            })
        })
        .transpose()
    }
}
