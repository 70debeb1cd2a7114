use thiserror::Error;

/// Failures from the external sentiment oracle call.
///
/// These never reach API callers: `SentimentClassifier::classify` absorbs
/// them into the deterministic lexicon fallback.
#[derive(Debug, Error)]
pub enum LearningError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sentiment oracle error: {0}")]
    Oracle(String),
}
