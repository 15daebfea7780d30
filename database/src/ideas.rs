use crate::{from_ts, to_ts, Database};
use painscout_core::{
    ContentKind, CoreError, DatabaseError, GeneratedContent, IdeaValidation, StartupIdea,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

impl Database {
    pub async fn insert_idea(&self, idea: &StartupIdea) -> Result<(), CoreError> {
        let validation = idea
            .validation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO startup_ideas (
                id, user_id, pain_point_id, title, description, problem, solution,
                target_market, revenue_model, validation, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&idea.id)
        .bind(&idea.user_id)
        .bind(&idea.pain_point_id)
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(&idea.problem)
        .bind(&idea.solution)
        .bind(&idea.target_market)
        .bind(&idea.revenue_model)
        .bind(validation)
        .bind(to_ts(idea.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_idea(&self, id: &str) -> Result<Option<StartupIdea>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, pain_point_id, title, description, problem, solution,
                   target_market, revenue_model, validation, created_at
            FROM startup_ideas
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| idea_from_row(&r)).transpose()
    }

    /// Returns false when no idea has this id.
    pub async fn save_idea_validation(
        &self,
        id: &str,
        validation: &IdeaValidation,
    ) -> Result<bool, CoreError> {
        let updated = sqlx::query("UPDATE startup_ideas SET validation = ? WHERE id = ?")
            .bind(serde_json::to_string(validation)?)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    pub async fn insert_content(&self, content: &GeneratedContent) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO generated_content (id, user_id, idea_id, kind, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&content.id)
        .bind(&content.user_id)
        .bind(&content.idea_id)
        .bind(content.kind.as_str())
        .bind(&content.body)
        .bind(to_ts(content.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn content_for_idea(&self, idea_id: &str) -> Result<Vec<GeneratedContent>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, idea_id, kind, body, created_at
            FROM generated_content
            WHERE idea_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(idea_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<GeneratedContent, CoreError> {
                let kind: String = row.try_get("kind")?;
                Ok(GeneratedContent {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    idea_id: row.try_get("idea_id")?,
                    kind: ContentKind::from_str(&kind)?,
                    body: row.try_get("body")?,
                    created_at: from_ts(row.try_get("created_at")?),
                })
            })
            .collect()
    }
}

fn idea_from_row(row: &SqliteRow) -> Result<StartupIdea, CoreError> {
    let validation: Option<String> = row.try_get("validation")?;
    let validation = validation
        .map(|raw| {
            serde_json::from_str::<IdeaValidation>(&raw).map_err(|e| {
                CoreError::Database(DatabaseError::CorruptRow {
                    table: "startup_ideas".to_string(),
                    details: format!("validation: {}", e),
                })
            })
        })
        .transpose()?;

    Ok(StartupIdea {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        pain_point_id: row.try_get("pain_point_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        problem: row.try_get("problem")?,
        solution: row.try_get("solution")?,
        target_market: row.try_get("target_market")?,
        revenue_model: row.try_get("revenue_model")?,
        validation,
        created_at: from_ts(row.try_get("created_at")?),
    })
}
