use crate::{from_ts, to_ts, Database};
use chrono::{DateTime, Utc};
use painscout_core::{CoreError, Message, MessageOutcome, SendStatus, VariantStats};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

impl Database {
    pub async fn insert_message(&self, message: &Message) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, user_id, pain_point_id, contact_username, template_variant, body,
                send_status, outcome, created_at, sent_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(&message.pain_point_id)
        .bind(&message.contact_username)
        .bind(&message.template_variant)
        .bind(&message.body)
        .bind(message.send_status.as_str())
        .bind(message.outcome.map(|o| o.as_str()))
        .bind(to_ts(message.created_at))
        .bind(message.sent_at.map(to_ts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_message(&self, id: &str) -> Result<Option<Message>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, pain_point_id, contact_username, template_variant, body,
                   send_status, outcome, created_at, sent_at
            FROM messages
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| message_from_row(&r)).transpose()
    }

    /// Sets the delivery status; `sent_at` is stamped only on `Sent`.
    pub async fn set_message_status(
        &self,
        id: &str,
        status: SendStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let sent_at = (status == SendStatus::Sent).then(|| to_ts(now));
        let updated = sqlx::query(
            "UPDATE messages SET send_status = ?, sent_at = COALESCE(?, sent_at) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn record_message_outcome(
        &self,
        id: &str,
        outcome: MessageOutcome,
    ) -> Result<bool, CoreError> {
        let updated = sqlx::query("UPDATE messages SET outcome = ? WHERE id = ?")
            .bind(outcome.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    /// Sent and replied counts per template variant for one user. Any outcome
    /// other than `dead_end` counts as a reply.
    pub async fn variant_stats(&self, user_id: &str) -> Result<Vec<VariantStats>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT template_variant,
                   SUM(CASE WHEN send_status = 'sent' THEN 1 ELSE 0 END) AS sent,
                   SUM(CASE WHEN send_status = 'sent' AND outcome IS NOT NULL
                             AND outcome != 'dead_end' THEN 1 ELSE 0 END) AS replies
            FROM messages
            WHERE user_id = ?
            GROUP BY template_variant
            ORDER BY template_variant
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<VariantStats, CoreError> {
                let sent: i64 = row.try_get("sent")?;
                let replies: i64 = row.try_get("replies")?;
                Ok(VariantStats {
                    template_variant: row.try_get("template_variant")?,
                    sent,
                    replies,
                    reply_rate: if sent == 0 {
                        0.0
                    } else {
                        replies as f64 / sent as f64
                    },
                })
            })
            .collect()
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message, CoreError> {
    let status: String = row.try_get("send_status")?;
    let outcome: Option<String> = row.try_get("outcome")?;
    let sent_at: Option<i64> = row.try_get("sent_at")?;

    Ok(Message {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        pain_point_id: row.try_get("pain_point_id")?,
        contact_username: row.try_get("contact_username")?,
        template_variant: row.try_get("template_variant")?,
        body: row.try_get("body")?,
        send_status: SendStatus::from_str(&status)?,
        outcome: outcome.as_deref().map(MessageOutcome::from_str).transpose()?,
        created_at: from_ts(row.try_get("created_at")?),
        sent_at: sent_at.map(from_ts),
    })
}
