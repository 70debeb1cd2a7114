mod feedback;
mod forecasts;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use foresight_learning::SentimentClassifier;

use crate::middleware::{
    request_id, require_api_key, throttle_by_key, ApiKeys, RateLimit, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub classifier: SentimentClassifier,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "already_completed" | "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &foresight_db::DbError) -> ApiError {
    match error {
        foresight_db::DbError::NotFound => ApiError::new(
            request_id,
            "not_found",
            "no matching record owned by this user",
        ),
        foresight_db::DbError::AlreadyCompleted => ApiError::new(
            request_id,
            "already_completed",
            "an actual value has already been recorded for this forecast",
        ),
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(keys: ApiKeys, rate_limit: RateLimit) -> Router<AppState> {
    Router::new()
        .route("/api/v1/forecasts", post(forecasts::create_forecast))
        .route(
            "/api/v1/forecasts/pending",
            get(forecasts::list_pending_forecasts),
        )
        .route(
            "/api/v1/forecasts/parameters",
            get(forecasts::get_optimized_parameters),
        )
        .route(
            "/api/v1/forecasts/{forecast_id}/actual",
            post(forecasts::submit_actual_value),
        )
        .route(
            "/api/v1/forecasts/{forecast_id}/reminder-sent",
            post(forecasts::mark_reminder_sent),
        )
        .route(
            "/api/v1/forecasts/{forecast_id}",
            delete(forecasts::delete_forecast),
        )
        .route("/api/v1/feedback", post(feedback::submit_feedback))
        .route(
            "/api/v1/feedback/patterns",
            get(feedback::get_feedback_patterns),
        )
        .route(
            "/api/v1/feedback/enhancements",
            get(feedback::get_prompt_enhancements),
        )
        .route(
            "/api/v1/feedback/{feedback_id}",
            delete(feedback::delete_feedback),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    throttle_by_key,
                ))
                .layer(axum::middleware::from_fn_with_state(keys, require_api_key)),
        )
}

pub fn build_app(state: AppState, keys: ApiKeys, rate_limit: RateLimit) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(keys, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match foresight_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit() -> RateLimit {
    RateLimit::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_app(pool: sqlx::PgPool) -> Router {
        let keys = ApiKeys::from_env(true).expect("keys");
        let classifier = SentimentClassifier::new(None, Duration::from_secs(1));
        build_app(AppState { pool, classifier }, keys, default_rate_limit())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_already_completed_maps_to_conflict() {
        let response = ApiError::new("req-1", "already_completed", "done").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn map_db_error_distinguishes_client_errors() {
        let not_found = map_db_error("req".into(), &foresight_db::DbError::NotFound);
        assert_eq!(not_found.error.code, "not_found");

        let completed = map_db_error("req".into(), &foresight_db::DbError::AlreadyCompleted);
        assert_eq!(completed.error.code, "already_completed");

        let missing = map_db_error("req".into(), &foresight_db::DbError::MissingDatabaseUrl);
        assert_eq!(missing.error.code, "internal_error");
    }

    // -------------------------------------------------------------------------
    // Route integration tests (with DB)
    // -------------------------------------------------------------------------

    fn create_forecast_body(user_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "user_id": user_id,
            "chart_id": "chart-1",
            "chart_title": "Monthly Sales Forecast",
            "forecast_type": "sales",
            "domain": "sales",
            "forecast_date": Utc::now(),
            "forecast_period": 30,
            "target_date": Utc::now() + chrono::Duration::days(30),
            "predicted_value": 100.0,
            "predicted_lower": 80.0,
            "predicted_upper": 120.0,
            "model_parameters": {"changepoint_prior_scale": 0.05}
        })
    }

    async fn post_json(app: &Router, uri: &str, body: &serde_json::Value) -> axum::response::Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_then_submit_actual_returns_metrics(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let user_id = Uuid::new_v4();

        let response = post_json(&app, "/api/v1/forecasts", &create_forecast_body(user_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let forecast_id = json["data"]["forecast_id"].as_str().expect("id").to_string();

        let body = serde_json::json!({"user_id": user_id, "actual_value": 80.0});
        let response = post_json(
            &app,
            &format!("/api/v1/forecasts/{forecast_id}/actual"),
            &body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["accuracy"].as_f64(), Some(75.0));
        assert_eq!(json["data"]["mape"].as_f64(), Some(25.0));
        assert_eq!(json["data"]["absolute_error"].as_f64(), Some(20.0));
        assert_eq!(json["data"]["percentage_error"].as_f64(), Some(25.0));
        assert!(
            json["data"].get("within_confidence_bounds").is_none(),
            "bounds flag is persisted but not part of the completion response"
        );

        // Resubmission conflicts.
        let response = post_json(
            &app,
            &format!("/api/v1/forecasts/{forecast_id}/actual"),
            &body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("already_completed"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn submit_actual_for_unknown_forecast_is_404(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let body = serde_json::json!({"user_id": Uuid::new_v4(), "actual_value": 80.0});
        let response = post_json(
            &app,
            &format!("/api/v1/forecasts/{}/actual", Uuid::new_v4()),
            &body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_forecast_rejects_bad_period(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let mut body = create_forecast_body(Uuid::new_v4());
        body["forecast_period"] = serde_json::json!(0);
        let response = post_json(&app, "/api/v1/forecasts", &body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn pending_forecasts_include_derived_day_counts(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let user_id = Uuid::new_v4();
        let response = post_json(&app, "/api/v1/forecasts", &create_forecast_body(user_id)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/v1/forecasts/pending?user_id={user_id}&days_threshold=60"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let items = json["data"].as_array().expect("data array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["days_until_target"].as_i64(), Some(29));
        assert_eq!(items[0]["days_since_forecast"].as_i64(), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn optimizer_without_history_returns_defaults(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/api/v1/forecasts/parameters?user_id={}&forecast_type=sales&domain=sales",
                        Uuid::new_v4()
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["optimized"].as_bool(), Some(false));
        assert_eq!(json["data"]["sample_count"].as_u64(), Some(0));
        assert_eq!(
            json["data"]["parameters"]["changepoint_prior_scale"].as_f64(),
            Some(0.05)
        );
        assert_eq!(
            json["data"]["parameters"]["seasonality_mode"].as_str(),
            Some("multiplicative")
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn feedback_submission_classifies_and_flags_mismatch(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let body = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "dataset_id": Uuid::new_v4(),
            "chart_id": "chart-1",
            "chart_title": "Sales by Region",
            "rating": 5,
            "comment": "terrible and useless, completely wrong"
        });
        let response = post_json(&app, "/api/v1/feedback", &body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["sentiment"].as_str(), Some("negative"));
        assert_eq!(json["data"]["mismatch_detected"].as_bool(), Some(true));
        assert_eq!(json["data"]["mismatch_severity"].as_str(), Some("major"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn feedback_validation_rejects_bad_rating_and_short_comment(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let mut body = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "dataset_id": Uuid::new_v4(),
            "chart_id": "chart-1",
            "chart_title": "Sales by Region",
            "rating": 6
        });
        let response = post_json(&app, "/api/v1/feedback", &body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        body["rating"] = serde_json::json!(4);
        body["comment"] = serde_json::json!("  ok  ");
        let response = post_json(&app, "/api/v1/feedback", &body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn feedback_patterns_honor_caller_minimum(pool: sqlx::PgPool) {
        for rating in [5_i16, 4, 2] {
            let new = foresight_db::NewFeedback {
                user_id: Uuid::new_v4(),
                dataset_id: Uuid::new_v4(),
                chart_id: format!("chart-{rating}"),
                chart_title: "Regional Sales Overview".to_string(),
                rating,
                comment: Some("clear and detailed breakdown".to_string()),
                sentiment: "positive".to_string(),
                sentiment_score: 0.5,
                sentiment_confidence: 0.6,
                mismatch_detected: false,
                mismatch_severity: "none".to_string(),
            };
            foresight_db::feedback::create_feedback(&pool, &new)
                .await
                .expect("seed feedback");
        }
        let app = test_app(pool);

        // Default minimum of 10 leaves three records below the bar.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/feedback/patterns")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(response).await;
        assert_eq!(json["data"]["has_enough_data"].as_bool(), Some(false));

        // A caller-supplied minimum lowers the bar and the analysis runs.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/feedback/patterns?min_feedback_count=3")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["has_enough_data"].as_bool(), Some(true));
        assert_eq!(json["data"]["min_required"].as_u64(), Some(3));
        assert_eq!(json["data"]["feedback_count"].as_u64(), Some(3));

        // The enhancements route reads the same parameter.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/feedback/enhancements?min_feedback_count=3")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(response).await;
        assert!(!json["data"]["enhancements"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn feedback_patterns_report_insufficient_data(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/feedback/patterns?domain=sales")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["has_enough_data"].as_bool(), Some(false));
        assert_eq!(json["data"]["feedback_count"].as_u64(), Some(0));
        assert_eq!(json["data"]["min_required"].as_u64(), Some(10));

        // Enhancements degrade to null rather than failing.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/feedback/enhancements")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["data"]["enhancements"].is_null());
    }
}
