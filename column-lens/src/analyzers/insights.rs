//! Rule-based observations derived from scored column profiles.
//!
//! Each [`InsightRule`] inspects a profile and emits zero or more tagged
//! [`Insight`]s. Insights are plain data: rendering them as prose is left to
//! the presentation layer.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::profile_types::ColumnProfile;

/// What an insight reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    PerfectCompleteness,
    MinorNulls,
    ModerateNulls,
    HighNulls,
    PotentialPrimaryKey,
    LowCardinality,
    NegativeValues,
    ManyZeros,
    OutliersDetected,
    ExcellentQuality,
    QualityConcerns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Positive,
    Informational,
    Warning,
    Critical,
}

/// A single observation about a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub column: String,
    pub kind: InsightKind,
    pub severity: InsightSeverity,
    /// The measurement that triggered the insight (a percentage, count or score)
    pub metric: f64,
}

/// Trait for implementing insight rules
pub trait InsightRule: Send + Sync {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Insight>;

    fn name(&self) -> &str;
}

fn insight(profile: &ColumnProfile, kind: InsightKind, severity: InsightSeverity, metric: f64) -> Insight {
    Insight {
        column: profile.descriptor.qualified_name(),
        kind,
        severity,
        metric,
    }
}

/// Null-percentage bands at 5% and 20%.
pub struct CompletenessInsightRule;

impl InsightRule for CompletenessInsightRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Insight> {
        if profile.total_rows == 0 {
            return vec![];
        }
        let pct = profile.null_percentage;
        let (kind, severity) = if pct == 0.0 {
            (InsightKind::PerfectCompleteness, InsightSeverity::Positive)
        } else if pct < 5.0 {
            (InsightKind::MinorNulls, InsightSeverity::Informational)
        } else if pct < 20.0 {
            (InsightKind::ModerateNulls, InsightSeverity::Warning)
        } else {
            (InsightKind::HighNulls, InsightSeverity::Critical)
        };
        vec![insight(profile, kind, severity, pct)]
    }

    fn name(&self) -> &str {
        "completeness"
    }
}

/// Near-unique and very-low-cardinality columns.
pub struct CardinalityInsightRule;

impl InsightRule for CardinalityInsightRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Insight> {
        if profile.non_null_count == 0 {
            return vec![];
        }
        if profile.distinct_percentage > 99.0 {
            vec![insight(
                profile,
                InsightKind::PotentialPrimaryKey,
                InsightSeverity::Informational,
                profile.distinct_percentage,
            )]
        } else if profile.distinct_percentage < 1.0 && profile.distinct_count < 10 {
            vec![insight(
                profile,
                InsightKind::LowCardinality,
                InsightSeverity::Informational,
                profile.distinct_count as f64,
            )]
        } else {
            vec![]
        }
    }

    fn name(&self) -> &str {
        "cardinality"
    }
}

/// Negative values, zero-heavy columns and 3-sigma outliers.
pub struct NumericInsightRule;

impl InsightRule for NumericInsightRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Insight> {
        let Some(stats) = profile.numeric() else {
            return vec![];
        };
        let mut insights = Vec::new();

        if stats.negative_count > 0 {
            insights.push(insight(
                profile,
                InsightKind::NegativeValues,
                InsightSeverity::Informational,
                stats.negative_count as f64,
            ));
        }
        if profile.total_rows > 0 && stats.zero_count as f64 > profile.total_rows as f64 * 0.1 {
            insights.push(insight(
                profile,
                InsightKind::ManyZeros,
                InsightSeverity::Warning,
                stats.zero_count as f64 / profile.total_rows as f64 * 100.0,
            ));
        }
        if stats.stddev > 0.0 && stats.max > stats.mean + 3.0 * stats.stddev {
            insights.push(insight(
                profile,
                InsightKind::OutliersDetected,
                InsightSeverity::Warning,
                (stats.max - stats.mean) / stats.stddev,
            ));
        }
        insights
    }

    fn name(&self) -> &str {
        "numeric"
    }
}

/// Score bands: 95 and above is excellent, below 70 needs attention.
pub struct QualityInsightRule;

impl InsightRule for QualityInsightRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Insight> {
        match profile.quality_score() {
            Some(score) if score >= 95 => vec![insight(
                profile,
                InsightKind::ExcellentQuality,
                InsightSeverity::Positive,
                f64::from(score),
            )],
            Some(score) if score < 70 => vec![insight(
                profile,
                InsightKind::QualityConcerns,
                InsightSeverity::Critical,
                f64::from(score),
            )],
            _ => vec![],
        }
    }

    fn name(&self) -> &str {
        "quality"
    }
}

/// Engine that orchestrates multiple insight rules
pub struct InsightEngine {
    rules: Vec<Box<dyn InsightRule>>,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
            .add_rule(Box::new(CompletenessInsightRule))
            .add_rule(Box::new(CardinalityInsightRule))
            .add_rule(Box::new(NumericInsightRule))
            .add_rule(Box::new(QualityInsightRule))
    }
}

impl InsightEngine {
    /// Create an engine with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(mut self, rule: Box<dyn InsightRule>) -> Self {
        self.rules.push(rule);
        self
    }

    #[instrument(skip(self, profile), fields(column = %profile.descriptor.qualified_name()))]
    pub fn insights(&self, profile: &ColumnProfile) -> Vec<Insight> {
        let insights: Vec<Insight> = self
            .rules
            .iter()
            .flat_map(|rule| rule.apply(profile))
            .collect();
        debug!(count = insights.len(), "Generated insights");
        insights
    }

    pub fn insights_for_all(&self, profiles: &[ColumnProfile]) -> Vec<Insight> {
        profiles.iter().flat_map(|p| self.insights(p)).collect()
    }
}
