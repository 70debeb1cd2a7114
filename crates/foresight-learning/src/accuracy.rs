//! Accuracy metrics for a single forecast once its actual outcome arrives.

use serde::Serialize;

/// Grace period before a pending forecast whose target date has passed is
/// swept to `expired`. Fixed policy, not user-configurable.
pub const EXPIRY_GRACE_DAYS: i64 = 7;

/// Error and accuracy metrics derived from one (predicted, actual) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    pub absolute_error: f64,
    pub percentage_error: f64,
    pub mape: f64,
    pub accuracy: f64,
    /// `Some` only when both confidence bounds were recorded on the forecast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_confidence_bounds: Option<bool>,
}

/// Compute accuracy metrics for a forecast.
///
/// For a non-zero actual, percentage error is the signed deviation relative
/// to the actual, MAPE its magnitude, and accuracy `max(0, 100 − MAPE)`.
/// A zero actual cannot anchor a percentage, so the metrics collapse to the
/// two exact cases: a zero prediction is fully right, anything else fully
/// wrong.
#[must_use]
pub fn compute_accuracy(
    predicted: f64,
    actual: f64,
    lower: Option<f64>,
    upper: Option<f64>,
) -> AccuracyMetrics {
    let absolute_error = (predicted - actual).abs();

    let (percentage_error, mape, accuracy) = if actual == 0.0 {
        let pe = if predicted == 0.0 { 0.0 } else { 100.0 };
        let acc = if predicted == 0.0 { 100.0 } else { 0.0 };
        (pe, pe, acc)
    } else {
        let pe = (predicted - actual) / actual * 100.0;
        let mape = pe.abs();
        (pe, mape, (100.0 - mape).max(0.0))
    };

    let within_confidence_bounds = match (lower, upper) {
        (Some(lo), Some(hi)) => Some(lo <= actual && actual <= hi),
        _ => None,
    };

    AccuracyMetrics {
        absolute_error,
        percentage_error,
        mape,
        accuracy,
        within_confidence_bounds,
    }
}
