//! Rating vs. text-sentiment disagreement classification.

use foresight_core::{MismatchSeverity, Sentiment};
use serde::Serialize;

/// Outcome of comparing a numeric rating against detected text sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MismatchVerdict {
    pub detected: bool,
    pub severity: MismatchSeverity,
}

/// Sentiment a rating implies: 4–5 positive, 1–2 negative, 3 neutral.
fn expected_sentiment(rating: i16) -> Sentiment {
    if rating >= 4 {
        Sentiment::Positive
    } else if rating <= 2 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Classify how strongly `rating` disagrees with the detected `sentiment`.
///
/// Agreement is no mismatch. A disagreement is major when the rating sits at
/// an extreme against an opposite sentiment, or when the sentiment score is
/// strongly opposed to the rating's direction; every other disagreement is
/// minor.
#[must_use]
pub fn detect_mismatch(rating: i16, sentiment: Sentiment, sentiment_score: f64) -> MismatchVerdict {
    if sentiment == expected_sentiment(rating) {
        return MismatchVerdict {
            detected: false,
            severity: MismatchSeverity::None,
        };
    }

    let major = (rating == 5 && sentiment == Sentiment::Negative)
        || (rating == 1 && sentiment == Sentiment::Positive)
        || (rating >= 4 && sentiment_score < -0.5)
        || (rating <= 2 && sentiment_score > 0.5);

    MismatchVerdict {
        detected: true,
        severity: if major {
            MismatchSeverity::Major
        } else {
            MismatchSeverity::Minor
        },
    }
}
