//! Profile data structures produced by the result interpreter.

use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::ProfilingStrategy;
use crate::analyzers::inference::InferredType;
use crate::analyzers::quality::QualityAssessment;
use crate::core::ColumnDescriptor;

/// Weekday names in histogram bucket order (bucket 0 is Sunday).
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// One entry of the pattern signature histogram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFrequency {
    pub signature: String,
    pub count: u64,
    pub example: String,
}

/// One entry of the top-N value frequency list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: u64,
    /// Share of non-null values, in [0, 100]
    pub percentage: f64,
}

/// Smallest and largest distinct values, rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extremes {
    pub smallest: Vec<String>,
    pub largest: Vec<String>,
}

/// Nearest-rank percentiles over the finite values of a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Numeric extension. Every statistic is 0 when there are no finite values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub percentiles: Percentiles,
    pub zero_count: u64,
    pub negative_count: u64,
    pub non_finite_count: u64,
}

/// Textual extension
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextualStats {
    pub min_length: u64,
    pub max_length: u64,
    pub avg_length: f64,
    pub median_length: f64,
    pub is_categorical: bool,
}

/// Temporal extension
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalStats {
    /// Sunday-first day-of-week counts
    pub day_of_week: [u64; 7],
    pub hour_of_day: [u64; 24],
    pub min_timestamp: Option<String>,
    pub max_timestamp: Option<String>,
}

impl TemporalStats {
    /// Day-of-week counts labelled with weekday names.
    pub fn weekday_histogram(&self) -> Vec<(&'static str, u64)> {
        WEEKDAY_NAMES
            .iter()
            .copied()
            .zip(self.day_of_week.iter().copied())
            .collect()
    }

    /// The weekday with the most values, if any value was seen.
    pub fn busiest_weekday(&self) -> Option<&'static str> {
        let (index, count) = self
            .day_of_week
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        (*count > 0).then(|| WEEKDAY_NAMES[index])
    }
}

/// Strategy-specific statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDetails {
    Numeric(NumericStats),
    Textual(TextualStats),
    Temporal(TemporalStats),
    /// Boolean and unclassified columns carry no extension.
    Basic,
}

/// Complete profile of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub descriptor: ColumnDescriptor,
    pub total_rows: u64,
    pub non_null_count: u64,
    pub null_count: u64,
    pub null_percentage: f64,
    pub distinct_count: u64,
    /// Distinct values as a share of non-null values
    pub distinct_percentage: f64,
    pub inferred_type: InferredType,
    pub type_confidence: f64,
    pub patterns: Vec<PatternFrequency>,
    pub top_values: Vec<ValueFrequency>,
    pub extremes: Extremes,
    pub sample_values: Vec<String>,
    pub details: StrategyDetails,
    pub quality: Option<QualityAssessment>,
}

impl ColumnProfile {
    /// The strategy, recomputed from the declared type.
    pub fn strategy(&self) -> ProfilingStrategy {
        self.descriptor.strategy()
    }

    pub fn column_name(&self) -> &str {
        &self.descriptor.column
    }

    pub fn numeric(&self) -> Option<&NumericStats> {
        match &self.details {
            StrategyDetails::Numeric(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn textual(&self) -> Option<&TextualStats> {
        match &self.details {
            StrategyDetails::Textual(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn temporal(&self) -> Option<&TemporalStats> {
        match &self.details {
            StrategyDetails::Temporal(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn quality_score(&self) -> Option<u32> {
        self.quality.as_ref().map(|q| q.score)
    }

    /// Checks the count and percentage invariants every profile must hold.
    pub fn is_consistent(&self) -> bool {
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        let frequency_total: u64 = self.top_values.iter().map(|v| v.count).sum();

        self.non_null_count + self.null_count == self.total_rows
            && self.distinct_count <= self.non_null_count
            && in_range(self.null_percentage)
            && in_range(self.distinct_percentage)
            && self.top_values.iter().all(|v| in_range(v.percentage))
            && frequency_total <= self.non_null_count
    }
}
