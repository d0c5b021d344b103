//! Query plans: the set of aggregate computations that characterize a column.
//!
//! A [`QueryPlan`] is an ordered list of [`QueryFragment`]s. Every fragment is
//! a self-contained SQL statement over the column's table; fragments that
//! return exactly one row can additionally be merged into one statement with
//! [`QueryPlan::combined_scalar_fragment`]. The plan only says *what* must be
//! computed; how the statements are run is up to the executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::ProfilingStrategy;
use crate::core::ColumnDescriptor;
use crate::error::Result;

mod builder;

pub use builder::{PlanBuilder, RowFilter};

/// Output field names shared by the plan builder and the result interpreter.
pub mod fields {
    pub const TOTAL_ROWS: &str = "total_rows";
    pub const NON_NULL_COUNT: &str = "non_null_count";
    pub const DISTINCT_COUNT: &str = "distinct_count";

    pub const VALUE: &str = "val";
    pub const FREQUENCY: &str = "frequency";

    pub const SIGNATURE: &str = "signature";
    pub const OCCURRENCES: &str = "occurrences";
    pub const EXAMPLE: &str = "example";

    pub const MIN_VALUE: &str = "min_value";
    pub const MAX_VALUE: &str = "max_value";
    pub const MEAN_VALUE: &str = "mean_value";
    pub const STDDEV_VALUE: &str = "stddev_value";
    pub const ZERO_COUNT: &str = "zero_count";
    pub const NEGATIVE_COUNT: &str = "negative_count";
    pub const NON_FINITE_COUNT: &str = "non_finite_count";

    pub const P25: &str = "p25";
    pub const P50: &str = "p50";
    pub const P75: &str = "p75";
    pub const P95: &str = "p95";
    pub const P99: &str = "p99";

    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const AVG_LENGTH: &str = "avg_length";
    pub const MEDIAN_LENGTH: &str = "median_length";

    pub const MIN_TIMESTAMP: &str = "min_timestamp";
    pub const MAX_TIMESTAMP: &str = "max_timestamp";

    pub const BUCKET: &str = "bucket";
}

/// Recognized plan parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    /// Number of most frequent values to report
    pub top_frequency_count: usize,
    /// Number of sample values to collect
    pub sample_size: usize,
    /// Number of smallest and largest values to report
    pub extreme_count: usize,
    /// Number of non-null values scanned for pattern signatures
    pub pattern_sample_limit: usize,
    /// Number of pattern signatures to report
    pub pattern_count: usize,
    /// When set, samples are taken in a seeded hash order instead of scan order
    pub sample_seed: Option<u64>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            top_frequency_count: 10,
            sample_size: 20,
            extreme_count: 5,
            pattern_sample_limit: 1000,
            pattern_count: 10,
            sample_seed: None,
        }
    }
}

impl PlanOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn top_frequency_count(mut self, count: usize) -> Self {
        self.top_frequency_count = count;
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    pub fn extreme_count(mut self, count: usize) -> Self {
        self.extreme_count = count;
        self
    }

    pub fn pattern_sample_limit(mut self, limit: usize) -> Self {
        self.pattern_sample_limit = limit;
        self
    }

    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }
}

/// The computations a plan can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    BaseStats,
    TopValues,
    Patterns,
    SmallestValues,
    LargestValues,
    Samples,
    NumericMoments,
    Percentiles,
    LengthStats,
    TemporalRange,
    DayOfWeek,
    HourOfDay,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::BaseStats => "base_stats",
            FragmentKind::TopValues => "top_values",
            FragmentKind::Patterns => "patterns",
            FragmentKind::SmallestValues => "smallest_values",
            FragmentKind::LargestValues => "largest_values",
            FragmentKind::Samples => "samples",
            FragmentKind::NumericMoments => "numeric_moments",
            FragmentKind::Percentiles => "percentiles",
            FragmentKind::LengthStats => "length_stats",
            FragmentKind::TemporalRange => "temporal_range",
            FragmentKind::DayOfWeek => "day_of_week",
            FragmentKind::HourOfDay => "hour_of_day",
        }
    }

    /// Whether the fragment always yields exactly one row.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FragmentKind::BaseStats
                | FragmentKind::NumericMoments
                | FragmentKind::Percentiles
                | FragmentKind::LengthStats
                | FragmentKind::TemporalRange
        )
    }

    /// The fragments needed to characterize a column under `strategy`, in
    /// execution order.
    pub fn required_for(strategy: ProfilingStrategy) -> Vec<FragmentKind> {
        let mut kinds = vec![
            FragmentKind::BaseStats,
            FragmentKind::TopValues,
            FragmentKind::Patterns,
        ];
        if strategy.is_orderable() {
            kinds.push(FragmentKind::SmallestValues);
            kinds.push(FragmentKind::LargestValues);
        }
        kinds.push(FragmentKind::Samples);

        match strategy {
            ProfilingStrategy::Numeric => {
                kinds.push(FragmentKind::NumericMoments);
                kinds.push(FragmentKind::Percentiles);
            }
            ProfilingStrategy::Textual => kinds.push(FragmentKind::LengthStats),
            ProfilingStrategy::Temporal => {
                kinds.push(FragmentKind::TemporalRange);
                kinds.push(FragmentKind::DayOfWeek);
                kinds.push(FragmentKind::HourOfDay);
            }
            ProfilingStrategy::Boolean | ProfilingStrategy::Other => {}
        }
        kinds
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One self-contained aggregate computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFragment {
    pub kind: FragmentKind,
    pub sql: String,
    /// Field names in output order, used to read positional rows
    pub output_fields: Vec<String>,
}

impl QueryFragment {
    pub(crate) fn new(kind: FragmentKind, sql: String, output_fields: &[&str]) -> Self {
        Self {
            kind,
            sql,
            output_fields: output_fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// Several single-row fragments merged into one statement with cross joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedFragment {
    pub members: Vec<FragmentKind>,
    pub sql: String,
    pub output_fields: Vec<String>,
}

/// The ordered fragments for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub descriptor: ColumnDescriptor,
    pub strategy: ProfilingStrategy,
    pub options: PlanOptions,
    pub fragments: Vec<QueryFragment>,
}

impl QueryPlan {
    pub fn fragment(&self, kind: FragmentKind) -> Option<&QueryFragment> {
        self.fragments.iter().find(|f| f.kind == kind)
    }

    pub fn kinds(&self) -> Vec<FragmentKind> {
        self.fragments.iter().map(|f| f.kind).collect()
    }

    /// Merges every single-row fragment into one `CROSS JOIN` statement.
    ///
    /// Returns `None` when the plan has no single-row fragments.
    pub fn combined_scalar_fragment(&self) -> Option<CombinedFragment> {
        let scalars: Vec<&QueryFragment> =
            self.fragments.iter().filter(|f| f.kind.is_scalar()).collect();
        if scalars.is_empty() {
            return None;
        }

        let joined = scalars
            .iter()
            .enumerate()
            .map(|(i, f)| format!("({}) AS part_{i}", f.sql))
            .collect::<Vec<_>>()
            .join(" CROSS JOIN ");

        Some(CombinedFragment {
            members: scalars.iter().map(|f| f.kind).collect(),
            sql: format!("SELECT * FROM {joined}"),
            output_fields: scalars
                .iter()
                .flat_map(|f| f.output_fields.iter().cloned())
                .collect(),
        })
    }

    /// Fragments that the combined statement does not cover.
    pub fn multi_row_fragments(&self) -> impl Iterator<Item = &QueryFragment> {
        self.fragments.iter().filter(|f| !f.kind.is_scalar())
    }
}
