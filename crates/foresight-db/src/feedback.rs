//! Database operations for the `chart_feedback` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const FEEDBACK_COLUMNS: &str = "id, user_id, dataset_id, chart_id, chart_title, rating, comment, \
     sentiment, sentiment_score, sentiment_confidence, mismatch_detected, mismatch_severity, \
     created_at";

/// A row from the `chart_feedback` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dataset_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub sentiment_confidence: f64,
    pub mismatch_detected: bool,
    pub mismatch_severity: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to persist one feedback submission. Sentiment and
/// mismatch fields are computed by the caller before insertion and are
/// never recomputed afterwards.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: Uuid,
    pub dataset_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub sentiment_confidence: f64,
    pub mismatch_detected: bool,
    pub mismatch_severity: String,
}

/// Inserts a feedback record and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including check-constraint
/// violations on rating or sentiment ranges).
pub async fn create_feedback(pool: &PgPool, new: &NewFeedback) -> Result<FeedbackRow, DbError> {
    let sql = format!(
        "INSERT INTO chart_feedback \
           (user_id, dataset_id, chart_id, chart_title, rating, comment, sentiment, \
            sentiment_score, sentiment_confidence, mismatch_detected, mismatch_severity) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {FEEDBACK_COLUMNS}"
    );
    let row = sqlx::query_as::<_, FeedbackRow>(&sql)
        .bind(new.user_id)
        .bind(new.dataset_id)
        .bind(&new.chart_id)
        .bind(&new.chart_title)
        .bind(new.rating)
        .bind(&new.comment)
        .bind(&new.sentiment)
        .bind(new.sentiment_score)
        .bind(new.sentiment_confidence)
        .bind(new.mismatch_detected)
        .bind(&new.mismatch_severity)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Most recent feedback records, optionally scoped to chart titles matching
/// any of `title_keywords` (case-insensitive substring). An empty keyword
/// slice disables the filter.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_feedback(
    pool: &PgPool,
    title_keywords: &[&str],
    limit: i64,
) -> Result<Vec<FeedbackRow>, DbError> {
    let rows = if title_keywords.is_empty() {
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM chart_feedback \
             ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await?
    } else {
        let patterns: Vec<String> = title_keywords.iter().map(|k| format!("%{k}%")).collect();
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM chart_feedback \
             WHERE chart_title ILIKE ANY($1) \
             ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(&patterns)
            .bind(limit)
            .fetch_all(pool)
            .await?
    };
    Ok(rows)
}

/// Deletes a feedback record owned by `user_id`. Returns `true` if a row
/// was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_feedback(
    pool: &PgPool,
    feedback_id: Uuid,
    user_id: Uuid,
) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM chart_feedback WHERE id = $1 AND user_id = $2")
        .bind(feedback_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
