//! Feedback pattern mining: aggregate preference signals from chart
//! feedback and turn them into directives for the prompt generator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use foresight_core::{FeedbackDomain, MismatchSeverity, Sentiment};
use serde::Serialize;

use crate::Priority;

/// How many recent feedback records the mining scan fetches.
pub const FEEDBACK_SCAN_LIMIT: i64 = 200;

/// Minimum records before pattern analysis is attempted.
pub const DEFAULT_MIN_FEEDBACK: usize = 10;

/// Ratings at or above this count as positive feedback.
const POSITIVE_RATING: i16 = 4;

/// Ratings at or below this count as negative feedback.
const NEGATIVE_RATING: i16 = 2;

/// Comments shorter than this (after trimming) are skipped by keyword
/// tokenization.
const MIN_COMMENT_CHARS: usize = 5;

/// Tokens must be longer than this to count as keywords.
const MIN_KEYWORD_CHARS: usize = 3;

const TOP_KEYWORDS: usize = 10;
const TOP_CHARTS: usize = 5;
const MAX_EXAMPLES: usize = 3;

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "have", "from", "they", "will", "been", "were", "their", "there",
    "would", "could", "should", "about", "which", "these", "those", "some", "just", "very",
    "really", "than", "then", "them", "also", "into", "your", "chart", "charts", "shows",
    "showing", "looks", "think", "because", "being", "over", "more", "most",
];

/// Theme markers scanned in high-rated comments: any substring hit on the
/// left assigns the theme on the right.
const HIGH_RATED_MARKERS: &[(&[&str], &str)] = &[
    (&["specific", "detailed"], "specific"),
    (&["actionable", "useful"], "actionable"),
    (&["clear", "understand"], "clear"),
    (&["number", "data"], "data-driven"),
    (&["timeline", "when"], "timeline-oriented"),
];

const LOW_RATED_MARKERS: &[(&[&str], &str)] = &[
    (&["vague", "unclear"], "too vague"),
    (&["generic", "general"], "too generic"),
    (&["wrong", "inaccurate"], "inaccurate"),
    (&["confusing", "confused"], "confusing"),
    (&["not helpful", "useless"], "not actionable"),
];

/// One feedback record, reduced to what the miner needs.
#[derive(Debug, Clone)]
pub struct FeedbackSample {
    pub chart_title: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub mismatch_detected: bool,
    pub mismatch_severity: MismatchSeverity,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    /// Fractions in `[0, 1]`.
    pub positive_percentage: f64,
    pub neutral_percentage: f64,
    pub negative_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPreference {
    pub chart_title: String,
    pub average_rating: f64,
    pub feedback_count: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartTypePreferences {
    /// Highest average rating first.
    pub top: Vec<ChartPreference>,
    /// Lowest average rating first.
    pub bottom: Vec<ChartPreference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonKeywords {
    /// From comments on ratings ≥ 4.
    pub positive: Vec<KeywordCount>,
    /// From every other comment.
    pub other: Vec<KeywordCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeCount {
    pub theme: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatedPatterns {
    /// Most frequent theme first.
    pub themes: Vec<ThemeCount>,
    pub examples: Vec<String>,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MismatchExample {
    pub chart_title: String,
    pub rating: i16,
    pub sentiment: Sentiment,
    pub severity: MismatchSeverity,
}

#[derive(Debug, Clone, Serialize)]
pub struct MismatchInsights {
    pub count: usize,
    /// Percentage of all analyzed records, one decimal.
    pub percentage: f64,
    pub major: usize,
    pub minor: usize,
    pub examples: Vec<MismatchExample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_feedback: usize,
    /// Two decimals.
    pub average_rating: f64,
    /// Percentage of records rated ≥ 4, one decimal.
    pub positive_feedback_percentage: f64,
    pub domain: FeedbackDomain,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternDetail {
    pub rating_distribution: BTreeMap<u8, usize>,
    pub sentiment_analysis: SentimentBreakdown,
    pub chart_type_preferences: ChartTypePreferences,
    pub common_keywords: CommonKeywords,
    pub high_rated_patterns: RatedPatterns,
    pub low_rated_patterns: RatedPatterns,
    pub mismatch_insights: MismatchInsights,
    pub statistics: Statistics,
}

/// Miner result. `has_enough_data: false` is the normal thin-history
/// outcome; `detail` is present iff there was enough data.
#[derive(Debug, Clone, Serialize)]
pub struct PatternAnalysis {
    pub has_enough_data: bool,
    pub feedback_count: usize,
    pub min_required: usize,
    pub domain: FeedbackDomain,
    #[serde(flatten)]
    pub detail: Option<PatternDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enhancement {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub instruction: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnhancementSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptEnhancements {
    pub enhancements: Vec<Enhancement>,
    pub summary: EnhancementSummary,
    /// Keyed to how much feedback backed the analysis, in `[0, 1]`.
    pub confidence: f64,
}

/// Analyze a set of recent feedback records for one domain.
///
/// `samples` is the (already domain-filtered) scan result, newest first.
#[must_use]
pub fn analyze_patterns(
    samples: &[FeedbackSample],
    domain: FeedbackDomain,
    min_feedback_count: usize,
) -> PatternAnalysis {
    if samples.len() < min_feedback_count {
        return PatternAnalysis {
            has_enough_data: false,
            feedback_count: samples.len(),
            min_required: min_feedback_count,
            domain,
            detail: None,
        };
    }

    let high_rated: Vec<&FeedbackSample> = samples
        .iter()
        .filter(|s| s.rating >= POSITIVE_RATING)
        .collect();
    let low_rated: Vec<&FeedbackSample> = samples
        .iter()
        .filter(|s| s.rating <= NEGATIVE_RATING)
        .collect();

    let detail = PatternDetail {
        rating_distribution: rating_distribution(samples),
        sentiment_analysis: sentiment_breakdown(samples),
        chart_type_preferences: chart_preferences(samples),
        common_keywords: common_keywords(samples),
        high_rated_patterns: rated_patterns(&high_rated, HIGH_RATED_MARKERS),
        low_rated_patterns: rated_patterns(&low_rated, LOW_RATED_MARKERS),
        mismatch_insights: mismatch_insights(samples),
        statistics: statistics(samples, domain),
    };

    PatternAnalysis {
        has_enough_data: true,
        feedback_count: samples.len(),
        min_required: min_feedback_count,
        domain,
        detail: Some(detail),
    }
}

/// Turn a pattern analysis into prompt directives.
///
/// Returns `None` when the analysis lacked enough data.
#[must_use]
pub fn generate_prompt_enhancements(analysis: &PatternAnalysis) -> Option<PromptEnhancements> {
    let detail = analysis.detail.as_ref()?;

    let mut enhancements = Vec::new();

    if !detail.high_rated_patterns.themes.is_empty() {
        let themes: Vec<&str> = detail
            .high_rated_patterns
            .themes
            .iter()
            .map(|t| t.theme)
            .collect();
        enhancements.push(Enhancement {
            kind: "emphasis",
            instruction: format!(
                "Users respond well to {} recommendations; emphasize these qualities",
                themes.join(", ")
            ),
            priority: Priority::High,
        });
    }

    if !detail.low_rated_patterns.themes.is_empty() {
        let themes: Vec<&str> = detail
            .low_rated_patterns
            .themes
            .iter()
            .map(|t| t.theme)
            .collect();
        enhancements.push(Enhancement {
            kind: "avoidance",
            instruction: format!(
                "Avoid recommendations users found {}",
                themes.join(", ")
            ),
            priority: Priority::High,
        });
    }

    if !detail.common_keywords.positive.is_empty() {
        let words: Vec<&str> = detail
            .common_keywords
            .positive
            .iter()
            .take(5)
            .map(|k| k.word.as_str())
            .collect();
        enhancements.push(Enhancement {
            kind: "keyword_emphasis",
            instruction: format!(
                "Favor vocabulary from well-rated feedback: {}",
                words.join(", ")
            ),
            priority: Priority::Medium,
        });
    }

    let top_charts: Vec<&str> = detail
        .chart_type_preferences
        .top
        .iter()
        .take(3)
        .map(|c| c.chart_title.as_str())
        .collect();
    if !top_charts.is_empty() {
        enhancements.push(Enhancement {
            kind: "chart_focus",
            instruction: format!("Prefer the highest-rated chart types: {}", top_charts.join(", ")),
            priority: Priority::Low,
        });
    }

    if detail.sentiment_analysis.positive_percentage < 0.5 {
        enhancements.push(Enhancement {
            kind: "tone_adjustment",
            instruction: "Overall sentiment skews negative; favor actionable and specific \
                          recommendations over general observations"
                .to_string(),
            priority: Priority::High,
        });
    }

    let summary = EnhancementSummary {
        total: enhancements.len(),
        high: count_priority(&enhancements, Priority::High),
        medium: count_priority(&enhancements, Priority::Medium),
        low: count_priority(&enhancements, Priority::Low),
    };

    Some(PromptEnhancements {
        enhancements,
        summary,
        confidence: confidence_for(analysis.feedback_count),
    })
}

fn count_priority(enhancements: &[Enhancement], priority: Priority) -> usize {
    enhancements.iter().filter(|e| e.priority == priority).count()
}

/// Confidence in the directives, keyed to how much feedback backed them.
fn confidence_for(feedback_count: usize) -> f64 {
    if feedback_count < 10 {
        0.3
    } else if feedback_count < 30 {
        0.5
    } else if feedback_count < 50 {
        0.7
    } else if feedback_count < 100 {
        0.85
    } else {
        0.95
    }
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

fn rating_distribution(samples: &[FeedbackSample]) -> BTreeMap<u8, usize> {
    let mut distribution: BTreeMap<u8, usize> = (1..=5).map(|r| (r, 0)).collect();
    for sample in samples {
        if let Ok(rating) = u8::try_from(sample.rating) {
            *distribution.entry(rating).or_insert(0) += 1;
        }
    }
    distribution
}

#[allow(clippy::cast_precision_loss)]
fn sentiment_breakdown(samples: &[FeedbackSample]) -> SentimentBreakdown {
    let total = samples.len().max(1) as f64;
    let positive = samples
        .iter()
        .filter(|s| s.sentiment == Sentiment::Positive)
        .count();
    let neutral = samples
        .iter()
        .filter(|s| s.sentiment == Sentiment::Neutral)
        .count();
    let negative = samples
        .iter()
        .filter(|s| s.sentiment == Sentiment::Negative)
        .count();

    SentimentBreakdown {
        positive,
        neutral,
        negative,
        positive_percentage: positive as f64 / total,
        neutral_percentage: neutral as f64 / total,
        negative_percentage: negative as f64 / total,
    }
}

#[allow(clippy::cast_precision_loss)]
fn chart_preferences(samples: &[FeedbackSample]) -> ChartTypePreferences {
    let mut groups: HashMap<&str, Vec<&FeedbackSample>> = HashMap::new();
    for sample in samples {
        groups.entry(&sample.chart_title).or_default().push(sample);
    }

    let mut prefs: Vec<ChartPreference> = groups
        .into_iter()
        .map(|(title, members)| {
            let count = members.len();
            let avg = members.iter().map(|s| f64::from(s.rating)).sum::<f64>() / count as f64;
            ChartPreference {
                chart_title: title.to_string(),
                average_rating: round2(avg),
                feedback_count: count,
                positive: members
                    .iter()
                    .filter(|s| s.sentiment == Sentiment::Positive)
                    .count(),
                neutral: members
                    .iter()
                    .filter(|s| s.sentiment == Sentiment::Neutral)
                    .count(),
                negative: members
                    .iter()
                    .filter(|s| s.sentiment == Sentiment::Negative)
                    .count(),
            }
        })
        .collect();

    // Ties broken by title so the output is stable.
    prefs.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then_with(|| a.chart_title.cmp(&b.chart_title))
    });

    let top = prefs.iter().take(TOP_CHARTS).cloned().collect();
    let bottom = prefs.iter().rev().take(TOP_CHARTS).cloned().collect();
    ChartTypePreferences { top, bottom }
}

fn common_keywords(samples: &[FeedbackSample]) -> CommonKeywords {
    let mut positive: HashMap<String, usize> = HashMap::new();
    let mut other: HashMap<String, usize> = HashMap::new();

    for sample in samples {
        let Some(comment) = &sample.comment else {
            continue;
        };
        if comment.trim().len() < MIN_COMMENT_CHARS {
            continue;
        }
        let bucket = if sample.rating >= POSITIVE_RATING {
            &mut positive
        } else {
            &mut other
        };
        for token in tokenize(comment) {
            *bucket.entry(token).or_insert(0) += 1;
        }
    }

    CommonKeywords {
        positive: top_keywords(positive),
        other: top_keywords(other),
    }
}

fn tokenize(comment: &str) -> impl Iterator<Item = String> + '_ {
    comment.split_whitespace().filter_map(|raw| {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.len() > MIN_KEYWORD_CHARS && !STOP_WORDS.contains(&word.as_str()) {
            Some(word)
        } else {
            None
        }
    })
}

fn top_keywords(counts: HashMap<String, usize>) -> Vec<KeywordCount> {
    let mut keywords: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();
    keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    keywords.truncate(TOP_KEYWORDS);
    keywords
}

#[allow(clippy::cast_precision_loss)]
fn rated_patterns(
    subset: &[&FeedbackSample],
    markers: &[(&[&str], &'static str)],
) -> RatedPatterns {
    let mut theme_counts: HashMap<&'static str, usize> = HashMap::new();
    for sample in subset {
        let Some(comment) = &sample.comment else {
            continue;
        };
        let lowered = comment.to_lowercase();
        for (needles, theme) in markers {
            if needles.iter().any(|n| lowered.contains(n)) {
                *theme_counts.entry(*theme).or_insert(0) += 1;
            }
        }
    }

    let mut themes: Vec<ThemeCount> = theme_counts
        .into_iter()
        .map(|(theme, count)| ThemeCount { theme, count })
        .collect();
    themes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.theme.cmp(b.theme)));

    let examples: Vec<String> = subset
        .iter()
        .filter_map(|s| s.comment.clone())
        .take(MAX_EXAMPLES)
        .collect();

    let average_rating = if subset.is_empty() {
        0.0
    } else {
        round2(subset.iter().map(|s| f64::from(s.rating)).sum::<f64>() / subset.len() as f64)
    };

    RatedPatterns {
        themes,
        examples,
        average_rating,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mismatch_insights(samples: &[FeedbackSample]) -> MismatchInsights {
    let mismatched: Vec<&FeedbackSample> =
        samples.iter().filter(|s| s.mismatch_detected).collect();
    let major = mismatched
        .iter()
        .filter(|s| s.mismatch_severity == MismatchSeverity::Major)
        .count();
    let minor = mismatched
        .iter()
        .filter(|s| s.mismatch_severity == MismatchSeverity::Minor)
        .count();

    let examples = mismatched
        .iter()
        .take(MAX_EXAMPLES)
        .map(|s| MismatchExample {
            chart_title: s.chart_title.clone(),
            rating: s.rating,
            sentiment: s.sentiment,
            severity: s.mismatch_severity,
        })
        .collect();

    MismatchInsights {
        count: mismatched.len(),
        percentage: round1(mismatched.len() as f64 / samples.len().max(1) as f64 * 100.0),
        major,
        minor,
        examples,
    }
}

#[allow(clippy::cast_precision_loss)]
fn statistics(samples: &[FeedbackSample], domain: FeedbackDomain) -> Statistics {
    let total = samples.len();
    let average_rating =
        round2(samples.iter().map(|s| f64::from(s.rating)).sum::<f64>() / total.max(1) as f64);
    let positive = samples.iter().filter(|s| s.rating >= POSITIVE_RATING).count();

    Statistics {
        total_feedback: total,
        average_rating,
        positive_feedback_percentage: round1(positive as f64 / total.max(1) as f64 * 100.0),
        domain,
        generated_at: Utc::now(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
