//! Database operations for the `forecasts` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

const FORECAST_COLUMNS: &str = "id, user_id, dataset_id, chart_id, chart_title, forecast_type, \
     domain, forecast_date, forecast_period, target_date, predicted_value, predicted_lower, \
     predicted_upper, actual_value, accuracy, mape, absolute_error, percentage_error, \
     within_confidence_bounds, model_parameters, status, reminder_sent, notes, created_at, \
     actual_provided_at";

/// A row from the `forecasts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ForecastRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dataset_id: Option<Uuid>,
    pub chart_id: String,
    pub chart_title: String,
    pub forecast_type: String,
    pub domain: String,
    pub forecast_date: DateTime<Utc>,
    pub forecast_period: i32,
    pub target_date: DateTime<Utc>,
    pub predicted_value: f64,
    pub predicted_lower: Option<f64>,
    pub predicted_upper: Option<f64>,
    pub actual_value: Option<f64>,
    pub accuracy: Option<f64>,
    pub mape: Option<f64>,
    pub absolute_error: Option<f64>,
    pub percentage_error: Option<f64>,
    pub within_confidence_bounds: Option<bool>,
    pub model_parameters: serde_json::Value,
    pub status: String,
    pub reminder_sent: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actual_provided_at: Option<DateTime<Utc>>,
}

/// Fields required to create a pending forecast record.
#[derive(Debug, Clone)]
pub struct NewForecast {
    pub user_id: Uuid,
    pub dataset_id: Option<Uuid>,
    pub chart_id: String,
    pub chart_title: String,
    pub forecast_type: String,
    pub domain: String,
    pub forecast_date: DateTime<Utc>,
    pub forecast_period: i32,
    pub target_date: DateTime<Utc>,
    pub predicted_value: f64,
    pub predicted_lower: Option<f64>,
    pub predicted_upper: Option<f64>,
    pub model_parameters: serde_json::Value,
}

/// Accuracy metrics persisted when an actual value arrives.
#[derive(Debug, Clone, Copy)]
pub struct ForecastCompletion {
    pub actual_value: f64,
    pub absolute_error: f64,
    pub percentage_error: f64,
    pub mape: f64,
    pub accuracy: f64,
    pub within_confidence_bounds: Option<bool>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a pending forecast record and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_forecast(pool: &PgPool, new: &NewForecast) -> Result<ForecastRow, DbError> {
    let sql = format!(
        "INSERT INTO forecasts \
           (user_id, dataset_id, chart_id, chart_title, forecast_type, domain, forecast_date, \
            forecast_period, target_date, predicted_value, predicted_lower, predicted_upper, \
            model_parameters, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'pending') \
         RETURNING {FORECAST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ForecastRow>(&sql)
        .bind(new.user_id)
        .bind(new.dataset_id)
        .bind(&new.chart_id)
        .bind(&new.chart_title)
        .bind(&new.forecast_type)
        .bind(&new.domain)
        .bind(new.forecast_date)
        .bind(new.forecast_period)
        .bind(new.target_date)
        .bind(new.predicted_value)
        .bind(new.predicted_lower)
        .bind(new.predicted_upper)
        .bind(&new.model_parameters)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Returns a forecast owned by `user_id`, or `None` if absent or not owned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_forecast_owned(
    pool: &PgPool,
    forecast_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ForecastRow>, DbError> {
    let sql = format!("SELECT {FORECAST_COLUMNS} FROM forecasts WHERE id = $1 AND user_id = $2");
    let row = sqlx::query_as::<_, ForecastRow>(&sql)
        .bind(forecast_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Records the actual outcome and accuracy metrics for a pending forecast.
///
/// The pending→completed transition is a single conditional UPDATE keyed on
/// `status = 'pending'`, so of two concurrent submissions exactly one wins;
/// the loser observes zero updated rows and gets [`DbError::AlreadyCompleted`].
///
/// # Errors
///
/// Returns [`DbError::AlreadyCompleted`] if the record is already completed,
/// [`DbError::NotFound`] if no owned pending-or-completed record matches
/// (absent, foreign, or expired), or [`DbError::Sqlx`] on query failure.
pub async fn complete_forecast(
    pool: &PgPool,
    forecast_id: Uuid,
    user_id: Uuid,
    completion: ForecastCompletion,
    notes: Option<&str>,
) -> Result<ForecastRow, DbError> {
    let sql = format!(
        "UPDATE forecasts \
         SET actual_value = $3, absolute_error = $4, percentage_error = $5, mape = $6, \
             accuracy = $7, within_confidence_bounds = $8, \
             notes = COALESCE($9, notes), \
             status = 'completed', actual_provided_at = NOW() \
         WHERE id = $1 AND user_id = $2 AND status = 'pending' \
         RETURNING {FORECAST_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, ForecastRow>(&sql)
        .bind(forecast_id)
        .bind(user_id)
        .bind(completion.actual_value)
        .bind(completion.absolute_error)
        .bind(completion.percentage_error)
        .bind(completion.mape)
        .bind(completion.accuracy)
        .bind(completion.within_confidence_bounds)
        .bind(notes)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = updated {
        return Ok(row);
    }

    // The conditional update matched nothing: distinguish a lost race /
    // resubmission from a genuinely missing record.
    match get_forecast_owned(pool, forecast_id, user_id).await? {
        Some(row) if row.status == "completed" => Err(DbError::AlreadyCompleted),
        _ => Err(DbError::NotFound),
    }
}

/// Pending forecasts due for a reminder: not yet reminded, target date at or
/// before `due_before`, soonest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_due(
    pool: &PgPool,
    user_id: Uuid,
    due_before: DateTime<Utc>,
) -> Result<Vec<ForecastRow>, DbError> {
    let sql = format!(
        "SELECT {FORECAST_COLUMNS} FROM forecasts \
         WHERE user_id = $1 AND status = 'pending' AND reminder_sent = false \
           AND target_date <= $2 \
         ORDER BY target_date ASC"
    );
    let rows = sqlx::query_as::<_, ForecastRow>(&sql)
        .bind(user_id)
        .bind(due_before)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Flags a forecast as reminded after the notifier confirms delivery.
///
/// Returns `true` if a row was updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn mark_reminder_sent(
    pool: &PgPool,
    forecast_id: Uuid,
    user_id: Uuid,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE forecasts SET reminder_sent = true \
         WHERE id = $1 AND user_id = $2 AND status = 'pending'",
    )
    .bind(forecast_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Expires pending forecasts whose target date is strictly older than `cutoff`.
///
/// Completed and expired rows are untouched, so the sweep is idempotent.
/// Returns the number of rows transitioned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn expire_overdue_forecasts(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE forecasts SET status = 'expired' \
         WHERE status = 'pending' AND target_date < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Most recent completed forecasts for one user/type/domain combination,
/// newest completion first. Feeds the parameter optimizer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_completed_for_tuning(
    pool: &PgPool,
    user_id: Uuid,
    forecast_type: &str,
    domain: &str,
    limit: i64,
) -> Result<Vec<ForecastRow>, DbError> {
    let sql = format!(
        "SELECT {FORECAST_COLUMNS} FROM forecasts \
         WHERE user_id = $1 AND forecast_type = $2 AND domain = $3 AND status = 'completed' \
         ORDER BY actual_provided_at DESC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, ForecastRow>(&sql)
        .bind(user_id)
        .bind(forecast_type)
        .bind(domain)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Deletes a forecast owned by `user_id`. Returns `true` if a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_forecast(
    pool: &PgPool,
    forecast_id: Uuid,
    user_id: Uuid,
) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM forecasts WHERE id = $1 AND user_id = $2")
        .bind(forecast_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
