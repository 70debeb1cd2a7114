//! Live integration tests for foresight-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/foresight-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::{Duration, Utc};
use foresight_db::feedback::{create_feedback, delete_feedback, list_recent_feedback};
use foresight_db::forecasts::{
    complete_forecast, create_forecast, delete_forecast, expire_overdue_forecasts,
    get_forecast_owned, list_completed_for_tuning, list_pending_due, mark_reminder_sent,
};
use foresight_db::{DbError, ForecastCompletion, NewFeedback, NewForecast};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_new_forecast(user_id: Uuid, target_in_days: i64) -> NewForecast {
    let now = Utc::now();
    NewForecast {
        user_id,
        dataset_id: None,
        chart_id: "chart-1".to_string(),
        chart_title: "Monthly Sales Forecast".to_string(),
        forecast_type: "sales".to_string(),
        domain: "sales".to_string(),
        forecast_date: now,
        forecast_period: 30,
        target_date: now + Duration::days(target_in_days),
        predicted_value: 100.0,
        predicted_lower: Some(80.0),
        predicted_upper: Some(120.0),
        model_parameters: serde_json::json!({"changepoint_prior_scale": 0.05}),
    }
}

fn make_completion(actual: f64) -> ForecastCompletion {
    ForecastCompletion {
        actual_value: actual,
        absolute_error: 20.0,
        percentage_error: 25.0,
        mape: 25.0,
        accuracy: 75.0,
        within_confidence_bounds: Some(true),
    }
}

fn make_new_feedback(user_id: Uuid, chart_title: &str, rating: i16) -> NewFeedback {
    NewFeedback {
        user_id,
        dataset_id: Uuid::new_v4(),
        chart_id: format!("chart-{rating}"),
        chart_title: chart_title.to_string(),
        rating,
        comment: Some("clear and detailed breakdown".to_string()),
        sentiment: "positive".to_string(),
        sentiment_score: 0.5,
        sentiment_confidence: 0.6,
        mismatch_detected: false,
        mismatch_severity: "none".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Forecast lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_forecast_starts_pending_without_metrics(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(user_id, 14))
        .await
        .expect("create_forecast failed");

    assert_eq!(row.status, "pending");
    assert!(row.actual_value.is_none());
    assert!(row.accuracy.is_none());
    assert!(row.mape.is_none());
    assert!(row.actual_provided_at.is_none());
    assert!(!row.reminder_sent);
}

#[sqlx::test(migrations = "../../migrations")]
async fn complete_forecast_persists_metrics_and_flips_status(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(user_id, 14))
        .await
        .expect("create");

    let completed = complete_forecast(&pool, row.id, user_id, make_completion(80.0), Some("Q3"))
        .await
        .expect("complete");

    assert_eq!(completed.status, "completed");
    assert_eq!(completed.actual_value, Some(80.0));
    assert_eq!(completed.accuracy, Some(75.0));
    assert_eq!(completed.within_confidence_bounds, Some(true));
    assert_eq!(completed.notes.as_deref(), Some("Q3"));
    assert!(completed.actual_provided_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn complete_forecast_twice_fails_and_keeps_first_metrics(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(user_id, 14))
        .await
        .expect("create");

    complete_forecast(&pool, row.id, user_id, make_completion(80.0), None)
        .await
        .expect("first completion");

    let second = complete_forecast(&pool, row.id, user_id, make_completion(50.0), None).await;
    assert!(
        matches!(second, Err(DbError::AlreadyCompleted)),
        "resubmission should be rejected, got {second:?}"
    );

    let current = get_forecast_owned(&pool, row.id, user_id)
        .await
        .expect("fetch")
        .expect("row exists");
    assert_eq!(current.actual_value, Some(80.0), "first metrics unchanged");
    assert_eq!(current.accuracy, Some(75.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn complete_forecast_for_foreign_record_is_not_found(pool: sqlx::PgPool) {
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(owner, 14))
        .await
        .expect("create");

    let result = complete_forecast(&pool, row.id, stranger, make_completion(80.0), None).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn complete_expired_forecast_is_not_found(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(user_id, -30))
        .await
        .expect("create");

    expire_overdue_forecasts(&pool, Utc::now() - Duration::days(7))
        .await
        .expect("sweep");

    let result = complete_forecast(&pool, row.id, user_id, make_completion(80.0), None).await;
    assert!(
        matches!(result, Err(DbError::NotFound)),
        "expired records are not pending-or-completed, got {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Pending reminders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_pending_due_orders_soonest_first_and_skips_reminded(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let far = create_forecast(&pool, &make_new_forecast(user_id, 5))
        .await
        .expect("create far");
    let near = create_forecast(&pool, &make_new_forecast(user_id, 1))
        .await
        .expect("create near");
    let reminded = create_forecast(&pool, &make_new_forecast(user_id, 2))
        .await
        .expect("create reminded");
    // Outside the window entirely.
    create_forecast(&pool, &make_new_forecast(user_id, 60))
        .await
        .expect("create distant");

    assert!(mark_reminder_sent(&pool, reminded.id, user_id)
        .await
        .expect("mark reminded"));

    let due = list_pending_due(&pool, user_id, Utc::now() + Duration::days(7))
        .await
        .expect("list");
    let ids: Vec<Uuid> = due.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![near.id, far.id], "soonest first, reminded skipped");
}

#[sqlx::test(migrations = "../../migrations")]
async fn mark_reminder_sent_ignores_foreign_and_completed(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let row = create_forecast(&pool, &make_new_forecast(user_id, 3))
        .await
        .expect("create");

    assert!(!mark_reminder_sent(&pool, row.id, Uuid::new_v4())
        .await
        .expect("foreign mark"));

    complete_forecast(&pool, row.id, user_id, make_completion(90.0), None)
        .await
        .expect("complete");
    assert!(!mark_reminder_sent(&pool, row.id, user_id)
        .await
        .expect("completed mark"));
}

// ---------------------------------------------------------------------------
// Expiry sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn expire_overdue_only_touches_pending_past_cutoff(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let overdue = create_forecast(&pool, &make_new_forecast(user_id, -10))
        .await
        .expect("create overdue");
    let recent = create_forecast(&pool, &make_new_forecast(user_id, -2))
        .await
        .expect("create recent");
    let done = create_forecast(&pool, &make_new_forecast(user_id, -10))
        .await
        .expect("create done");
    complete_forecast(&pool, done.id, user_id, make_completion(95.0), None)
        .await
        .expect("complete");

    let cutoff = Utc::now() - Duration::days(7);
    let expired = expire_overdue_forecasts(&pool, cutoff).await.expect("sweep");
    assert_eq!(expired, 1, "only the overdue pending record expires");

    let overdue_row = get_forecast_owned(&pool, overdue.id, user_id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(overdue_row.status, "expired");

    let recent_row = get_forecast_owned(&pool, recent.id, user_id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(recent_row.status, "pending", "inside the grace window");

    let done_row = get_forecast_owned(&pool, done.id, user_id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(done_row.status, "completed", "terminal states untouched");

    // Idempotent on rerun.
    let rerun = expire_overdue_forecasts(&pool, cutoff).await.expect("rerun");
    assert_eq!(rerun, 0);
}

// ---------------------------------------------------------------------------
// Tuning scan
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_completed_for_tuning_filters_and_limits(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();

    for _ in 0..3 {
        let row = create_forecast(&pool, &make_new_forecast(user_id, 1))
            .await
            .expect("create");
        complete_forecast(&pool, row.id, user_id, make_completion(80.0), None)
            .await
            .expect("complete");
    }
    // Still pending: must not appear.
    create_forecast(&pool, &make_new_forecast(user_id, 1))
        .await
        .expect("create pending");
    // Different domain: must not appear.
    let mut other = make_new_forecast(user_id, 1);
    other.domain = "finance".to_string();
    let other_row = create_forecast(&pool, &other).await.expect("create other");
    complete_forecast(&pool, other_row.id, user_id, make_completion(80.0), None)
        .await
        .expect("complete other");

    let rows = list_completed_for_tuning(&pool, user_id, "sales", "sales", 50)
        .await
        .expect("list");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.status == "completed"));

    let limited = list_completed_for_tuning(&pool, user_id, "sales", "sales", 2)
        .await
        .expect("list limited");
    assert_eq!(limited.len(), 2);
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn feedback_keyword_filter_matches_titles_case_insensitively(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    create_feedback(&pool, &make_new_feedback(user_id, "Regional SALES by Quarter", 4))
        .await
        .expect("create sales feedback");
    create_feedback(&pool, &make_new_feedback(user_id, "Stock Reorder Points", 3))
        .await
        .expect("create inventory feedback");

    let sales = list_recent_feedback(&pool, &["sales", "revenue"], 200)
        .await
        .expect("list sales");
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].chart_title, "Regional SALES by Quarter");

    let all = list_recent_feedback(&pool, &[], 200).await.expect("list all");
    assert_eq!(all.len(), 2, "empty keyword slice disables the filter");
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_scopes_to_owner(pool: sqlx::PgPool) {
    let user_id = Uuid::new_v4();
    let feedback = create_feedback(&pool, &make_new_feedback(user_id, "Profit Margin Trend", 5))
        .await
        .expect("create feedback");
    let forecast = create_forecast(&pool, &make_new_forecast(user_id, 5))
        .await
        .expect("create forecast");

    assert!(!delete_feedback(&pool, feedback.id, Uuid::new_v4())
        .await
        .expect("foreign feedback delete"));
    assert!(!delete_forecast(&pool, forecast.id, Uuid::new_v4())
        .await
        .expect("foreign forecast delete"));

    assert!(delete_feedback(&pool, feedback.id, user_id)
        .await
        .expect("owner feedback delete"));
    assert!(delete_forecast(&pool, forecast.id, user_id)
        .await
        .expect("owner forecast delete"));
}
