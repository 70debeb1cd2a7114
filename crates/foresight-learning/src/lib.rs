//! Adaptive learning core for the Foresight backend.
//!
//! Tracks forecast predictions against user-supplied actual outcomes, mines
//! historical accuracy to recommend better model parameters, and mines chart
//! feedback (star rating + free text) for preference signals and prompt
//! directives. Everything here is a stateless computation over records the
//! caller fetched; the one network boundary is the sentiment oracle, which
//! always degrades to a deterministic lexicon fallback.

pub mod accuracy;
pub mod error;
pub mod mismatch;
pub mod optimizer;
pub mod patterns;
pub mod sentiment;

use serde::Serialize;

pub use accuracy::{compute_accuracy, AccuracyMetrics, EXPIRY_GRACE_DAYS};
pub use error::LearningError;
pub use mismatch::{detect_mismatch, MismatchVerdict};
pub use optimizer::{
    optimize_parameters, AccuracyAnalysis, CompletedSample, Optimization, Recommendation,
    DEFAULT_MIN_SAMPLES, TUNING_SCAN_LIMIT,
};
pub use patterns::{
    analyze_patterns, generate_prompt_enhancements, FeedbackSample, PatternAnalysis,
    PromptEnhancements, DEFAULT_MIN_FEEDBACK, FEEDBACK_SCAN_LIMIT,
};
pub use sentiment::{SentimentClassifier, SentimentVerdict};

/// Priority attached to optimizer recommendations and prompt enhancements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}
