//! Sentiment classifier boundary.
//!
//! Wraps an external text-classification service behind a timeout, with a
//! deterministic keyword fallback that takes over whenever the oracle is
//! unconfigured, unreachable, slow, or returns something malformed. Oracle
//! failures are logged and absorbed; callers always get a verdict.

use std::time::Duration;

use foresight_core::Sentiment;
use serde::{Deserialize, Serialize};

use crate::error::LearningError;

/// Confidence reported by the keyword fallback.
const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Score thresholds separating positive / neutral / negative.
const SENTIMENT_THRESHOLD: f64 = 0.1;

const POSITIVE_KEYWORDS: &[&str] = &[
    "good", "great", "excellent", "helpful", "useful", "clear", "insightful", "accurate",
    "love", "like", "perfect", "amazing", "detailed", "actionable", "easy",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "bad", "poor", "wrong", "useless", "confusing", "unclear", "vague", "inaccurate",
    "hate", "terrible", "awful", "misleading", "broken", "slow", "hard",
];

/// Classification result for one comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentVerdict {
    pub sentiment: Sentiment,
    /// Score in `[-1.0, 1.0]`.
    pub score: f64,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    pub reasoning: String,
}

impl SentimentVerdict {
    fn neutral(reasoning: &str) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            score: 0.0,
            confidence: 0.0,
            reasoning: reasoning.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OracleRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    sentiment: String,
    score: f64,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Classifier handle; cheap to clone, safe to share across requests.
#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    client: reqwest::Client,
    classify_url: Option<String>,
}

impl SentimentClassifier {
    /// Create a classifier. `oracle_url` is the base URL of the external
    /// service (`None` disables it); `timeout` bounds every oracle call.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialised, which is a
    /// misconfigured build rather than a runtime condition.
    #[must_use]
    pub fn new(oracle_url: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            classify_url: oracle_url.map(|base| format!("{}/classify", base.trim_end_matches('/'))),
        }
    }

    /// Classify a comment. Never fails: empty input short-circuits to
    /// neutral, and any oracle problem resolves via [`keyword_score`].
    pub async fn classify(&self, comment: &str) -> SentimentVerdict {
        let text = comment.trim();
        if text.is_empty() {
            return SentimentVerdict::neutral("empty comment");
        }

        let Some(url) = &self.classify_url else {
            return keyword_score(text);
        };

        match self.call_oracle(url, text).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "sentiment oracle unavailable; using keyword fallback");
                keyword_score(text)
            }
        }
    }

    async fn call_oracle(&self, url: &str, text: &str) -> Result<SentimentVerdict, LearningError> {
        let response = self
            .client
            .post(url)
            .json(&OracleRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LearningError::Oracle(format!(
                "oracle returned status {}",
                response.status()
            )));
        }

        let body: OracleResponse = response
            .json()
            .await
            .map_err(|e| LearningError::Oracle(format!("response parse error: {e}")))?;

        if !(-1.0..=1.0).contains(&body.score) || !(0.0..=1.0).contains(&body.confidence) {
            return Err(LearningError::Oracle(format!(
                "out-of-range score {} or confidence {}",
                body.score, body.confidence
            )));
        }

        let sentiment = match body.sentiment.as_str() {
            "positive" => Sentiment::Positive,
            "neutral" => Sentiment::Neutral,
            "negative" => Sentiment::Negative,
            other => {
                return Err(LearningError::Oracle(format!(
                    "unknown sentiment label: {other}"
                )))
            }
        };

        Ok(SentimentVerdict {
            sentiment,
            score: body.score,
            confidence: body.confidence,
            reasoning: body
                .reasoning
                .unwrap_or_else(|| "external classifier".to_string()),
        })
    }
}

/// Deterministic keyword scorer used when the oracle cannot answer.
///
/// Counts case-insensitive substring occurrences of the fixed keyword lists
/// and normalizes the balance by comment length:
/// `clamp((pos − neg) / max(word_count, 1) × 5, −1, 1)`.
#[must_use]
pub fn keyword_score(text: &str) -> SentimentVerdict {
    let lowered = text.to_lowercase();
    let word_count = lowered.split_whitespace().count().max(1);

    let pos: usize = POSITIVE_KEYWORDS
        .iter()
        .map(|k| count_occurrences(&lowered, k))
        .sum();
    let neg: usize = NEGATIVE_KEYWORDS
        .iter()
        .map(|k| count_occurrences(&lowered, k))
        .sum();

    #[allow(clippy::cast_precision_loss)] // counts are tiny relative to f64 precision
    let balance = (pos as f64 - neg as f64) / word_count as f64;
    let score = (balance * 5.0).clamp(-1.0, 1.0);

    let sentiment = if score > SENTIMENT_THRESHOLD {
        Sentiment::Positive
    } else if score < -SENTIMENT_THRESHOLD {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    SentimentVerdict {
        sentiment,
        score,
        confidence: FALLBACK_CONFIDENCE,
        reasoning: format!("keyword fallback: {pos} positive, {neg} negative matches"),
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
