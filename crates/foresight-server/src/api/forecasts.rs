//! Forecast lifecycle endpoints: registration, actual-value submission,
//! reminder tracking, and parameter optimization.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foresight_core::{ForecastDomain, ForecastType, ModelParameters};
use foresight_db::forecasts::{ForecastCompletion, ForecastRow, NewForecast};
use foresight_learning::{
    compute_accuracy, optimize_parameters, CompletedSample, Optimization, DEFAULT_MIN_SAMPLES,
    TUNING_SCAN_LIMIT,
};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// Default horizon, in days, for the pending-forecast reminder query.
const DEFAULT_DAYS_THRESHOLD: i64 = 7;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateForecastRequest {
    pub user_id: Uuid,
    pub dataset_id: Option<Uuid>,
    pub chart_id: String,
    pub chart_title: String,
    pub forecast_type: ForecastType,
    pub domain: ForecastDomain,
    pub forecast_date: DateTime<Utc>,
    pub forecast_period: i32,
    pub target_date: DateTime<Utc>,
    pub predicted_value: f64,
    pub predicted_lower: Option<f64>,
    pub predicted_upper: Option<f64>,
    #[serde(default)]
    pub model_parameters: ModelParameters,
}

#[derive(Debug, Serialize)]
pub struct ForecastView {
    pub forecast_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub forecast_type: String,
    pub domain: String,
    pub status: String,
    pub forecast_date: DateTime<Utc>,
    pub forecast_period: i32,
    pub target_date: DateTime<Utc>,
    pub predicted_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_upper: Option<f64>,
    pub model_parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ForecastRow> for ForecastView {
    fn from(row: ForecastRow) -> Self {
        Self {
            forecast_id: row.id,
            chart_id: row.chart_id,
            chart_title: row.chart_title,
            forecast_type: row.forecast_type,
            domain: row.domain,
            status: row.status,
            forecast_date: row.forecast_date,
            forecast_period: row.forecast_period,
            target_date: row.target_date,
            predicted_value: row.predicted_value,
            predicted_lower: row.predicted_lower,
            predicted_upper: row.predicted_upper,
            model_parameters: row.model_parameters,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitActualRequest {
    pub user_id: Uuid,
    pub actual_value: f64,
    pub notes: Option<String>,
}

/// Completion summary returned to the caller. The confidence-bounds flag is
/// persisted for later analysis but not part of this response.
#[derive(Debug, Serialize)]
pub struct CompletionView {
    pub forecast_id: Uuid,
    pub predicted_value: f64,
    pub actual_value: f64,
    pub accuracy: f64,
    pub mape: f64,
    pub absolute_error: f64,
    pub percentage_error: f64,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub user_id: Uuid,
    pub days_threshold: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PendingForecastView {
    pub forecast_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub forecast_type: String,
    pub domain: String,
    pub forecast_date: DateTime<Utc>,
    pub target_date: DateTime<Utc>,
    pub forecast_period: i32,
    pub predicted_value: f64,
    pub days_until_target: i64,
    pub days_since_forecast: i64,
}

#[derive(Debug, Deserialize)]
pub struct OwnerBody {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReminderView {
    pub forecast_id: Uuid,
    pub reminder_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedView {
    pub forecast_id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ParametersQuery {
    pub user_id: Uuid,
    pub forecast_type: String,
    pub domain: String,
    pub min_samples: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ParametersView {
    pub forecast_type: String,
    pub domain: String,
    #[serde(flatten)]
    pub optimization: Optimization,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/v1/forecasts` — register a prediction for later verification.
pub async fn create_forecast(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(req): Json<CreateForecastRequest>,
) -> Result<Json<ApiResponse<ForecastView>>, ApiError> {
    if req.forecast_period < 1 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "forecast_period must be at least 1 day",
        ));
    }
    if let (Some(lo), Some(hi)) = (req.predicted_lower, req.predicted_upper) {
        if lo > hi {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "predicted_lower must not exceed predicted_upper",
            ));
        }
    }

    let model_parameters = serde_json::to_value(&req.model_parameters)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to serialize model parameters");
            ApiError::new(req_id.0.clone(), "internal_error", "serialization failed")
        })?;

    let new = NewForecast {
        user_id: req.user_id,
        dataset_id: req.dataset_id,
        chart_id: req.chart_id,
        chart_title: req.chart_title,
        forecast_type: req.forecast_type.as_str().to_owned(),
        domain: req.domain.as_str().to_owned(),
        forecast_date: req.forecast_date,
        forecast_period: req.forecast_period,
        target_date: req.target_date,
        predicted_value: req.predicted_value,
        predicted_lower: req.predicted_lower,
        predicted_upper: req.predicted_upper,
        model_parameters,
    };

    let row = foresight_db::forecasts::create_forecast(&state.pool, &new)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ForecastView::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `POST /api/v1/forecasts/{forecast_id}/actual` — record the observed
/// outcome, compute accuracy metrics, and complete the forecast.
pub async fn submit_actual_value(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(forecast_id): Path<Uuid>,
    Json(req): Json<SubmitActualRequest>,
) -> Result<Json<ApiResponse<CompletionView>>, ApiError> {
    let row = foresight_db::forecasts::get_forecast_owned(&state.pool, forecast_id, req.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| map_db_error(req_id.0.clone(), &foresight_db::DbError::NotFound))?;

    match row.status.as_str() {
        "pending" => {}
        "completed" => {
            return Err(map_db_error(req_id.0, &foresight_db::DbError::AlreadyCompleted))
        }
        // Expired records no longer accept actuals.
        _ => return Err(map_db_error(req_id.0, &foresight_db::DbError::NotFound)),
    }

    let metrics = compute_accuracy(
        row.predicted_value,
        req.actual_value,
        row.predicted_lower,
        row.predicted_upper,
    );
    let completion = ForecastCompletion {
        actual_value: req.actual_value,
        absolute_error: metrics.absolute_error,
        percentage_error: metrics.percentage_error,
        mape: metrics.mape,
        accuracy: metrics.accuracy,
        within_confidence_bounds: metrics.within_confidence_bounds,
    };

    let completed = foresight_db::forecasts::complete_forecast(
        &state.pool,
        forecast_id,
        req.user_id,
        completion,
        req.notes.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        forecast_id = %forecast_id,
        accuracy = metrics.accuracy,
        mape = metrics.mape,
        "forecast completed"
    );

    Ok(Json(ApiResponse {
        data: CompletionView {
            forecast_id: completed.id,
            predicted_value: completed.predicted_value,
            actual_value: req.actual_value,
            accuracy: metrics.accuracy,
            mape: metrics.mape,
            absolute_error: metrics.absolute_error,
            percentage_error: metrics.percentage_error,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/forecasts/pending` — pending forecasts whose target date
/// falls within the reminder horizon, soonest first.
pub async fn list_pending_forecasts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<ApiResponse<Vec<PendingForecastView>>>, ApiError> {
    let threshold = query.days_threshold.unwrap_or(DEFAULT_DAYS_THRESHOLD);
    if threshold < 0 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "days_threshold must not be negative",
        ));
    }

    let now = Utc::now();
    let due_before = now + Duration::days(threshold);
    let rows = foresight_db::forecasts::list_pending_due(&state.pool, query.user_id, due_before)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PendingForecastView {
            forecast_id: row.id,
            chart_id: row.chart_id,
            chart_title: row.chart_title,
            forecast_type: row.forecast_type,
            domain: row.domain,
            forecast_date: row.forecast_date,
            target_date: row.target_date,
            forecast_period: row.forecast_period,
            predicted_value: row.predicted_value,
            days_until_target: (row.target_date - now).num_days(),
            days_since_forecast: (now - row.forecast_date).num_days(),
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `POST /api/v1/forecasts/{forecast_id}/reminder-sent` — flag a pending
/// forecast as reminded so the next sweep skips it.
pub async fn mark_reminder_sent(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(forecast_id): Path<Uuid>,
    Json(req): Json<OwnerBody>,
) -> Result<Json<ApiResponse<ReminderView>>, ApiError> {
    let updated =
        foresight_db::forecasts::mark_reminder_sent(&state.pool, forecast_id, req.user_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !updated {
        return Err(map_db_error(req_id.0, &foresight_db::DbError::NotFound));
    }

    Ok(Json(ApiResponse {
        data: ReminderView {
            forecast_id,
            reminder_sent: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `DELETE /api/v1/forecasts/{forecast_id}`
pub async fn delete_forecast(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(forecast_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ApiResponse<DeletedView>>, ApiError> {
    let deleted = foresight_db::forecasts::delete_forecast(&state.pool, forecast_id, query.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !deleted {
        return Err(map_db_error(req_id.0, &foresight_db::DbError::NotFound));
    }

    Ok(Json(ApiResponse {
        data: DeletedView {
            forecast_id,
            deleted: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/forecasts/parameters` — recommend model parameters from the
/// user's completed-forecast history for one type/domain combination.
pub async fn get_optimized_parameters(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ParametersQuery>,
) -> Result<Json<ApiResponse<ParametersView>>, ApiError> {
    let min_samples = query.min_samples.unwrap_or(DEFAULT_MIN_SAMPLES);

    // The history filter matches the stored strings verbatim; only the
    // fallback defaults need a parsed type.
    let rows = foresight_db::forecasts::list_completed_for_tuning(
        &state.pool,
        query.user_id,
        &query.forecast_type,
        &query.domain,
        TUNING_SCAN_LIMIT,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let samples: Vec<CompletedSample> = rows
        .into_iter()
        .filter_map(|row| {
            let (accuracy, mape) = (row.accuracy?, row.mape?);
            let parameters: ModelParameters =
                serde_json::from_value(row.model_parameters).unwrap_or_default();
            Some(CompletedSample {
                accuracy,
                mape,
                parameters,
            })
        })
        .collect();

    let forecast_type = ForecastType::parse_lenient(&query.forecast_type);
    let optimization = optimize_parameters(&samples, forecast_type, min_samples);

    Ok(Json(ApiResponse {
        data: ParametersView {
            forecast_type: query.forecast_type,
            domain: query.domain,
            optimization,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
