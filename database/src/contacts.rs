use crate::{from_ts, to_ts, Database};
use chrono::{DateTime, Utc};
use painscout_core::{CoreError, RedditContact};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

impl Database {
    /// Contacts from the pain point's latest discovery batch that were found
    /// after `fresh_since`, best engagement first.
    pub async fn fresh_contacts(
        &self,
        pain_point_id: &str,
        fresh_since: DateTime<Utc>,
    ) -> Result<Vec<RedditContact>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT pain_point_id, username, karma, account_age_days, posting_frequency,
                   engagement_score, discovered_at
            FROM reddit_contacts
            WHERE batch_id = (
                SELECT id FROM contact_batches
                WHERE pain_point_id = ?
                ORDER BY id DESC
                LIMIT 1
            )
              AND discovered_at > ?
            ORDER BY engagement_score DESC, username ASC
            "#,
        )
        .bind(pain_point_id)
        .bind(to_ts(fresh_since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(contact_from_row).collect()
    }

    /// Stores `contacts` as a new discovery batch for the pain point. The
    /// new batch supersedes earlier ones for cache reads; earlier rows stay
    /// so each user's monthly usage keeps counting them.
    pub async fn record_contacts(
        &self,
        pain_point_id: &str,
        contacts: &[RedditContact],
        discovered_by: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(batch_time) = contacts.iter().map(|c| c.discovered_at).max() else {
            debug!("No contacts to store for pain point {}", pain_point_id);
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;

        let batch_id = sqlx::query(
            "INSERT INTO contact_batches (pain_point_id, discovered_at, discovered_by) VALUES (?, ?, ?)",
        )
        .bind(pain_point_id)
        .bind(to_ts(batch_time))
        .bind(discovered_by)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for contact in contacts {
            sqlx::query(
                r#"
                INSERT INTO reddit_contacts (
                    batch_id, pain_point_id, username, karma, account_age_days,
                    posting_frequency, engagement_score, discovered_at, discovered_by
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(batch_id)
            .bind(pain_point_id)
            .bind(&contact.username)
            .bind(contact.karma)
            .bind(contact.account_age_days)
            .bind(contact.posting_frequency)
            .bind(contact.engagement_score)
            .bind(to_ts(contact.discovered_at))
            .bind(discovered_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Stored {} contacts for pain point {} in batch {}",
            contacts.len(),
            pain_point_id,
            batch_id
        );
        Ok(())
    }
}

fn contact_from_row(row: &SqliteRow) -> Result<RedditContact, CoreError> {
    Ok(RedditContact {
        pain_point_id: row.try_get("pain_point_id")?,
        username: row.try_get("username")?,
        karma: row.try_get("karma")?,
        account_age_days: row.try_get("account_age_days")?,
        posting_frequency: row.try_get("posting_frequency")?,
        engagement_score: row.try_get("engagement_score")?,
        discovered_at: from_ts(row.try_get("discovered_at")?),
    })
}
