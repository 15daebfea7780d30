use crate::{from_ts, to_ts, Database};
use chrono::{DateTime, Utc};
use painscout_core::{CoreError, PaymentTransaction, Subscription, SubscriptionStatus, User};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

impl Database {
    pub async fn upsert_user(&self, user: &User) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, subscription_status, plan_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                subscription_status = excluded.subscription_status,
                plan_id = excluded.plan_id
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.subscription_status.as_str())
        .bind(&user.plan_id)
        .bind(to_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, CoreError> {
        let row = sqlx::query(
            "SELECT id, email, name, subscription_status, plan_id FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<User, CoreError> {
            let status: String = row.try_get("subscription_status")?;
            Ok(User {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                name: row.try_get("name")?,
                subscription_status: SubscriptionStatus::from_str(&status)?,
                plan_id: row.try_get("plan_id")?,
            })
        })
        .transpose()
    }

    /// Mirrors a subscription's state onto its user. `plan_id` is only
    /// overwritten when given.
    pub async fn set_user_subscription(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        plan_id: Option<&str>,
    ) -> Result<bool, CoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET subscription_status = ?, plan_id = COALESCE(?, plan_id)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(plan_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, plan_id, status, current_period_end, updated_at
            FROM subscriptions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| subscription_from_row(&r)).transpose()
    }

    pub async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan_id, status, current_period_end, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                plan_id = COALESCE(excluded.plan_id, subscriptions.plan_id),
                status = excluded.status,
                current_period_end = COALESCE(excluded.current_period_end,
                                              subscriptions.current_period_end),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.user_id)
        .bind(&subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end.map(to_ts))
        .bind(to_ts(subscription.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_subscription_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
        current_period_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = ?, current_period_end = COALESCE(?, current_period_end), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(current_period_end.map(to_ts))
        .bind(to_ts(now))
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Upserts on the payment id; a later event for the same payment moves
    /// its status forward.
    pub async fn record_payment(&self, payment: &PaymentTransaction) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (
                id, user_id, subscription_id, amount, currency, status, error_description,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = COALESCE(excluded.user_id, payment_transactions.user_id),
                subscription_id = COALESCE(excluded.subscription_id,
                                           payment_transactions.subscription_id),
                status = excluded.status,
                error_description = excluded.error_description
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(&payment.subscription_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.status)
        .bind(&payment.error_description)
        .bind(to_ts(payment.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_payment(&self, id: &str) -> Result<Option<PaymentTransaction>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, subscription_id, amount, currency, status, error_description,
                   created_at
            FROM payment_transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<PaymentTransaction, CoreError> {
            Ok(PaymentTransaction {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                subscription_id: row.try_get("subscription_id")?,
                amount: row.try_get("amount")?,
                currency: row.try_get("currency")?,
                status: row.try_get("status")?,
                error_description: row.try_get("error_description")?,
                created_at: from_ts(row.try_get("created_at")?),
            })
        })
        .transpose()
    }
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription, CoreError> {
    let status: String = row.try_get("status")?;
    let period_end: Option<i64> = row.try_get("current_period_end")?;
    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan_id: row.try_get("plan_id")?,
        status: SubscriptionStatus::from_str(&status)?,
        current_period_end: period_end.map(from_ts),
        updated_at: from_ts(row.try_get("updated_at")?),
    })
}
