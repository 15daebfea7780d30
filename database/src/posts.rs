use crate::{to_ts, Database};
use chrono::{DateTime, Utc};
use painscout_core::{CoreError, RedditPost, TrendDirection};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

const POST_COLUMNS: &str = "id, subreddit, author, title, content, url, score, num_comments, \
     created_utc, viability_score, is_emerging, trend_direction";

impl Database {
    /// Inserts or refreshes posts keyed on their Reddit id.
    pub async fn upsert_posts(&self, posts: &[RedditPost]) -> Result<usize, CoreError> {
        let now = to_ts(Utc::now());
        let mut tx = self.pool.begin().await?;

        for post in posts {
            sqlx::query(
                r#"
                INSERT INTO reddit_posts (
                    id, subreddit, author, title, content, url, score, num_comments,
                    created_utc, viability_score, is_emerging, trend_direction, fetched_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    score = excluded.score,
                    num_comments = excluded.num_comments,
                    viability_score = excluded.viability_score,
                    is_emerging = excluded.is_emerging,
                    trend_direction = excluded.trend_direction,
                    fetched_at = excluded.fetched_at
                "#,
            )
            .bind(&post.id)
            .bind(&post.subreddit)
            .bind(&post.author)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.url)
            .bind(post.score)
            .bind(post.num_comments)
            .bind(post.created_utc)
            .bind(post.viability_score)
            .bind(post.is_emerging)
            .bind(post.trend_direction.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Upserted {} reddit posts", posts.len());
        Ok(posts.len())
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<RedditPost>, CoreError> {
        let sql = format!("SELECT {} FROM reddit_posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| post_from_row(&r)).transpose()
    }

    /// Posts from `subreddit` created at or after `since`, newest first.
    pub async fn recent_posts_in_subreddit(
        &self,
        subreddit: &str,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let sql = format!(
            "SELECT {} FROM reddit_posts \
             WHERE subreddit = ? COLLATE NOCASE AND created_utc >= ? \
             ORDER BY created_utc DESC LIMIT ?",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(subreddit)
            .bind(to_ts(since))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(post_from_row).collect()
    }
}

fn post_from_row(row: &SqliteRow) -> Result<RedditPost, CoreError> {
    let direction: String = row.try_get("trend_direction")?;
    Ok(RedditPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        subreddit: row.try_get("subreddit")?,
        url: row.try_get("url")?,
        score: row.try_get("score")?,
        num_comments: row.try_get("num_comments")?,
        created_utc: row.try_get("created_utc")?,
        viability_score: row.try_get("viability_score")?,
        is_emerging: row.try_get("is_emerging")?,
        trend_direction: TrendDirection::from_str(&direction)?,
    })
}
