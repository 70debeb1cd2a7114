//! Chart-feedback vocabulary: sentiment and mismatch enums, plus the
//! domain → chart-title keyword table used to scope pattern mining.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentiment assigned to a feedback comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Parse a stored sentiment value. Unrecognized values map to neutral.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a numeric rating disagrees with the detected text sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchSeverity {
    None,
    Minor,
    Major,
}

impl MismatchSeverity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchSeverity::None => "none",
            MismatchSeverity::Minor => "minor",
            MismatchSeverity::Major => "major",
        }
    }

    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "minor" => MismatchSeverity::Minor,
            "major" => MismatchSeverity::Major,
            _ => MismatchSeverity::None,
        }
    }
}

impl fmt::Display for MismatchSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope for feedback pattern mining. `All` disables the chart-title filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDomain {
    All,
    Sales,
    Inventory,
    Finance,
    Customer,
    Product,
}

impl Default for FeedbackDomain {
    fn default() -> Self {
        FeedbackDomain::All
    }
}

impl FeedbackDomain {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackDomain::All => "all",
            FeedbackDomain::Sales => "sales",
            FeedbackDomain::Inventory => "inventory",
            FeedbackDomain::Finance => "finance",
            FeedbackDomain::Customer => "customer",
            FeedbackDomain::Product => "product",
        }
    }
}

impl fmt::Display for FeedbackDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart-title keywords identifying each domain.
///
/// A feedback record belongs to a domain when its chart title contains any
/// keyword case-insensitively. `All` returns the empty slice (no filter).
#[must_use]
pub fn domain_keywords(domain: FeedbackDomain) -> &'static [&'static str] {
    match domain {
        FeedbackDomain::All => &[],
        FeedbackDomain::Sales => &["sales", "revenue", "product comparison", "regional sales"],
        FeedbackDomain::Inventory => &["stock", "inventory", "reorder", "turnover"],
        FeedbackDomain::Finance => &["profit", "expense", "cash flow", "margin"],
        FeedbackDomain::Customer => &["customer", "segment", "retention", "lifetime"],
        FeedbackDomain::Product => &["product performance", "quantity", "demand"],
    }
}
