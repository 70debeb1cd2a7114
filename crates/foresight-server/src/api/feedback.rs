//! Chart feedback endpoints: submission with sentiment classification,
//! pattern mining, and prompt-enhancement generation.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foresight_core::{domain_keywords, FeedbackDomain, MismatchSeverity, Sentiment};
use foresight_db::feedback::{FeedbackRow, NewFeedback};
use foresight_learning::{
    analyze_patterns, detect_mismatch, generate_prompt_enhancements, FeedbackSample,
    PatternAnalysis, PromptEnhancements, DEFAULT_MIN_FEEDBACK, FEEDBACK_SCAN_LIMIT,
};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// Accepted comment length after trimming.
const MIN_COMMENT_CHARS: usize = 5;
const MAX_COMMENT_CHARS: usize = 1000;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub user_id: Uuid,
    pub dataset_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackView {
    pub feedback_id: Uuid,
    pub chart_id: String,
    pub chart_title: String,
    pub rating: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub sentiment_confidence: f64,
    pub sentiment_reasoning: String,
    pub mismatch_detected: bool,
    pub mismatch_severity: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PatternsQuery {
    #[serde(default)]
    pub domain: FeedbackDomain,
    pub min_feedback_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EnhancementsView {
    pub domain: FeedbackDomain,
    pub feedback_count: usize,
    /// `null` when there is not enough feedback to mine.
    pub enhancements: Option<PromptEnhancements>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DeletedView {
    pub feedback_id: Uuid,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/v1/feedback` — persist a rating, classify any comment text,
/// and flag rating/sentiment disagreement.
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(req): Json<SubmitFeedbackRequest>,
) -> Result<Json<ApiResponse<FeedbackView>>, ApiError> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "rating must be between 1 and 5",
        ));
    }

    let comment = match req.comment.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) if text.chars().count() < MIN_COMMENT_CHARS => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "comment must be at least 5 characters",
            ));
        }
        Some(text) if text.chars().count() > MAX_COMMENT_CHARS => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "comment must not exceed 1000 characters",
            ));
        }
        Some(text) => Some(text.to_owned()),
    };

    let verdict = state
        .classifier
        .classify(comment.as_deref().unwrap_or(""))
        .await;
    let mismatch = detect_mismatch(req.rating, verdict.sentiment, verdict.score);

    let new = NewFeedback {
        user_id: req.user_id,
        dataset_id: req.dataset_id,
        chart_id: req.chart_id,
        chart_title: req.chart_title,
        rating: req.rating,
        comment,
        sentiment: verdict.sentiment.as_str().to_owned(),
        sentiment_score: verdict.score,
        sentiment_confidence: verdict.confidence,
        mismatch_detected: mismatch.detected,
        mismatch_severity: mismatch.severity.as_str().to_owned(),
    };

    let row = foresight_db::feedback::create_feedback(&state.pool, &new)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if mismatch.detected {
        tracing::info!(
            feedback_id = %row.id,
            rating = row.rating,
            sentiment = %row.sentiment,
            severity = %row.mismatch_severity,
            "rating/sentiment mismatch recorded"
        );
    }

    Ok(Json(ApiResponse {
        data: FeedbackView {
            feedback_id: row.id,
            chart_id: row.chart_id,
            chart_title: row.chart_title,
            rating: row.rating,
            comment: row.comment,
            sentiment: row.sentiment,
            sentiment_score: row.sentiment_score,
            sentiment_confidence: row.sentiment_confidence,
            sentiment_reasoning: verdict.reasoning,
            mismatch_detected: row.mismatch_detected,
            mismatch_severity: row.mismatch_severity,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/feedback/patterns` — mine recent feedback for one domain.
pub async fn get_feedback_patterns(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<ApiResponse<PatternAnalysis>>, ApiError> {
    let min_required = query.min_feedback_count.unwrap_or(DEFAULT_MIN_FEEDBACK);
    let analysis = mine_patterns(&state, query.domain, min_required)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: analysis,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/feedback/enhancements` — derive prompt directives from the
/// mined patterns. Thin history yields `enhancements: null`, not an error.
pub async fn get_prompt_enhancements(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<ApiResponse<EnhancementsView>>, ApiError> {
    let min_required = query.min_feedback_count.unwrap_or(DEFAULT_MIN_FEEDBACK);
    let analysis = mine_patterns(&state, query.domain, min_required)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: EnhancementsView {
            domain: query.domain,
            feedback_count: analysis.feedback_count,
            enhancements: generate_prompt_enhancements(&analysis),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `DELETE /api/v1/feedback/{feedback_id}`
pub async fn delete_feedback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(feedback_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ApiResponse<DeletedView>>, ApiError> {
    let deleted = foresight_db::feedback::delete_feedback(&state.pool, feedback_id, query.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !deleted {
        return Err(map_db_error(req_id.0, &foresight_db::DbError::NotFound));
    }

    Ok(Json(ApiResponse {
        data: DeletedView {
            feedback_id,
            deleted: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn mine_patterns(
    state: &AppState,
    domain: FeedbackDomain,
    min_required: usize,
) -> Result<PatternAnalysis, foresight_db::DbError> {
    let rows = foresight_db::feedback::list_recent_feedback(
        &state.pool,
        domain_keywords(domain),
        FEEDBACK_SCAN_LIMIT,
    )
    .await?;

    let samples: Vec<FeedbackSample> = rows.into_iter().map(sample_from_row).collect();
    Ok(analyze_patterns(&samples, domain, min_required))
}

fn sample_from_row(row: FeedbackRow) -> FeedbackSample {
    FeedbackSample {
        chart_title: row.chart_title,
        rating: row.rating,
        comment: row.comment,
        sentiment: Sentiment::parse_lenient(&row.sentiment),
        sentiment_score: row.sentiment_score,
        mismatch_detected: row.mismatch_detected,
        mismatch_severity: MismatchSeverity::parse_lenient(&row.mismatch_severity),
    }
}
