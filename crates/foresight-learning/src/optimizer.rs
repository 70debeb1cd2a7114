//! Parameter recommendations mined from historical forecast accuracy.
//!
//! Operates on the most recent completed forecasts for one user/type/domain
//! combination. Prefers parameters proven by a well-populated signature
//! group; otherwise falls back to defaults nudged by coarse accuracy and
//! variance heuristics.

use std::collections::HashMap;

use foresight_core::{default_parameters, ForecastType, ModelParameters, ParameterSignature};
use serde::Serialize;

use crate::Priority;

/// How many completed forecasts the tuning scan fetches, newest first.
pub const TUNING_SCAN_LIMIT: i64 = 50;

/// Minimum history before an optimized recommendation is attempted.
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Signature groups smaller than this are not trusted as evidence.
const MIN_GROUP_SIZE: usize = 3;

/// One completed forecast, reduced to what the optimizer needs.
#[derive(Debug, Clone)]
pub struct CompletedSample {
    pub accuracy: f64,
    pub mape: f64,
    pub parameters: ModelParameters,
}

/// Aggregate accuracy statistics over the sample set.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccuracyAnalysis {
    pub avg_accuracy: f64,
    pub avg_mape: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    /// Population variance of the accuracy values; a consistency measure.
    pub variance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub code: &'static str,
    pub priority: Priority,
    pub message: &'static str,
}

/// Optimizer result. `optimized: false` with defaults and zero confidence is
/// the normal outcome for thin history, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct Optimization {
    pub optimized: bool,
    pub parameters: ModelParameters,
    /// Rounded to a whole number in `[0, 100]`.
    pub confidence: f64,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AccuracyAnalysis>,
    pub recommendations: Vec<Recommendation>,
}

/// Recommend forecasting parameters from completed history.
///
/// `samples` must be ordered newest first, as fetched by the tuning scan.
/// Below `min_samples` the defaults for `forecast_type` are returned as-is.
/// Otherwise the best parameter-signature group with at least
/// [`MIN_GROUP_SIZE`] members wins; with no trustworthy group, defaults are
/// adjusted by the accuracy rule then the variance rule, in that fixed order
/// (the variance rule overwrites the shared field when both fire).
#[must_use]
pub fn optimize_parameters(
    samples: &[CompletedSample],
    forecast_type: ForecastType,
    min_samples: usize,
) -> Optimization {
    if samples.len() < min_samples {
        return Optimization {
            optimized: false,
            parameters: default_parameters(forecast_type),
            confidence: 0.0,
            sample_count: samples.len(),
            analysis: None,
            recommendations: Vec::new(),
        };
    }

    let analysis = analyze(samples);
    let parameters = match best_signature_group(samples) {
        Some(representative) => representative.with_defaults(forecast_type),
        None => adjusted_defaults(forecast_type, &analysis),
    };

    Optimization {
        optimized: true,
        parameters,
        confidence: confidence(samples.len(), analysis.variance),
        sample_count: samples.len(),
        recommendations: recommendations(&analysis),
        analysis: Some(analysis),
    }
}

#[allow(clippy::cast_precision_loss)] // sample counts are at most TUNING_SCAN_LIMIT
fn analyze(samples: &[CompletedSample]) -> AccuracyAnalysis {
    let n = samples.len() as f64;
    let avg_accuracy = samples.iter().map(|s| s.accuracy).sum::<f64>() / n;
    let avg_mape = samples.iter().map(|s| s.mape).sum::<f64>() / n;
    let best_accuracy = samples.iter().map(|s| s.accuracy).fold(f64::MIN, f64::max);
    let worst_accuracy = samples.iter().map(|s| s.accuracy).fold(f64::MAX, f64::min);
    let variance = samples
        .iter()
        .map(|s| (s.accuracy - avg_accuracy).powi(2))
        .sum::<f64>()
        / n;

    AccuracyAnalysis {
        avg_accuracy,
        avg_mape,
        best_accuracy,
        worst_accuracy,
        variance,
    }
}

/// Parameters of the highest-average-accuracy signature group with at least
/// [`MIN_GROUP_SIZE`] members, represented by the group's newest sample.
fn best_signature_group(samples: &[CompletedSample]) -> Option<&ModelParameters> {
    let mut groups: HashMap<ParameterSignature, Vec<&CompletedSample>> = HashMap::new();
    for sample in samples {
        groups
            .entry(ParameterSignature::of(&sample.parameters))
            .or_default()
            .push(sample);
    }

    groups
        .values()
        .filter(|members| members.len() >= MIN_GROUP_SIZE)
        .map(|members| {
            #[allow(clippy::cast_precision_loss)]
            let avg =
                members.iter().map(|s| s.accuracy).sum::<f64>() / members.len() as f64;
            (avg, members)
        })
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, members)| &members[0].parameters)
}

/// Defaults nudged by the heuristic rules. The accuracy rule loosens the
/// changepoint prior for trend flexibility; the variance rule tightens it
/// for stability and, when both fire, keeps the last word on that field.
fn adjusted_defaults(forecast_type: ForecastType, analysis: &AccuracyAnalysis) -> ModelParameters {
    let mut params = default_parameters(forecast_type);
    let default_cps = params.changepoint_prior_scale.unwrap_or(0.05);

    if analysis.avg_accuracy < 70.0 {
        params.changepoint_prior_scale = Some((default_cps * 1.5).min(0.5));
    }
    if analysis.variance > 100.0 {
        params.changepoint_prior_scale = Some((default_cps * 0.5).max(0.001));
    }
    params
}

#[allow(clippy::cast_precision_loss)]
fn confidence(sample_count: usize, variance: f64) -> f64 {
    let base = (sample_count as f64 / 30.0 * 70.0).min(70.0);
    let variance_penalty = (variance / 10.0).min(30.0);
    (base - variance_penalty).max(0.0).round()
}

fn recommendations(analysis: &AccuracyAnalysis) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if analysis.avg_accuracy < 70.0 {
        out.push(Recommendation {
            code: "low_accuracy",
            priority: Priority::High,
            message: "average accuracy is below 70%; consider a longer history or different parameters",
        });
    }
    if analysis.variance > 100.0 {
        out.push(Recommendation {
            code: "high_variance",
            priority: Priority::Medium,
            message: "accuracy varies widely between forecasts; results are inconsistent",
        });
    }
    if analysis.best_accuracy > 90.0 {
        out.push(Recommendation {
            code: "excellent_accuracy",
            priority: Priority::Low,
            message: "best forecasts exceed 90% accuracy; current parameters can perform well",
        });
    }
    if out.is_empty() {
        out.push(Recommendation {
            code: "normal",
            priority: Priority::Low,
            message: "accuracy is within the expected range",
        });
    }
    out
}
