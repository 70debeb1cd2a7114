//! Offline unit tests for foresight-db pool configuration and row types.
//! These tests do not require a live database connection.

use foresight_core::{AppConfig, Environment};
use foresight_db::{FeedbackRow, ForecastRow, PoolConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        sentiment_oracle_url: None,
        sentiment_timeout_secs: 5,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`ForecastRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn forecast_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = ForecastRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        dataset_id: None,
        chart_id: "chart-1".to_string(),
        chart_title: "Monthly Sales Forecast".to_string(),
        forecast_type: "sales".to_string(),
        domain: "sales".to_string(),
        forecast_date: Utc::now(),
        forecast_period: 30_i32,
        target_date: Utc::now(),
        predicted_value: 1200.0,
        predicted_lower: Some(1000.0),
        predicted_upper: Some(1400.0),
        actual_value: None,
        accuracy: None,
        mape: None,
        absolute_error: None,
        percentage_error: None,
        within_confidence_bounds: None,
        model_parameters: serde_json::json!({}),
        status: "pending".to_string(),
        reminder_sent: false,
        notes: None,
        created_at: Utc::now(),
        actual_provided_at: None,
    };

    assert_eq!(row.status, "pending");
    assert_eq!(row.forecast_period, 30);
    assert!(row.actual_value.is_none());
    assert!(row.accuracy.is_none(), "pending rows carry no metrics");
}

/// Compile-time smoke test for [`FeedbackRow`].
#[test]
fn feedback_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = FeedbackRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        dataset_id: Uuid::new_v4(),
        chart_id: "chart-9".to_string(),
        chart_title: "Inventory Turnover".to_string(),
        rating: 4_i16,
        comment: Some("clear and actionable".to_string()),
        sentiment: "positive".to_string(),
        sentiment_score: 0.6,
        sentiment_confidence: 0.6,
        mismatch_detected: false,
        mismatch_severity: "none".to_string(),
        created_at: Utc::now(),
    };

    assert_eq!(row.rating, 4);
    assert_eq!(row.sentiment, "positive");
    assert_eq!(row.mismatch_severity, "none");
}
