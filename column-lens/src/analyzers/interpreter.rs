//! Reduction of raw fragment results into a [`ColumnProfile`].
//!
//! The interpreter is pure: it never talks to the executor, never fails and
//! always produces a profile that satisfies the count and percentage
//! invariants. Absent fragments, absent fields and explicit nulls all read as
//! "no data", so a zero-row table or an all-null column yields zeroed
//! statistics instead of an error.

use std::collections::BTreeMap;

use tracing::debug;

use crate::analyzers::classifier::ProfilingStrategy;
use crate::analyzers::inference::infer_type;
use crate::analyzers::patterns::pattern_signature;
use crate::analyzers::profile_types::{
    ColumnProfile, Extremes, NumericStats, PatternFrequency, Percentiles, StrategyDetails,
    TemporalStats, TextualStats, ValueFrequency,
};
use crate::core::{RawRow, Record};
use crate::plan::fields::*;
use crate::plan::{FragmentKind, QueryPlan};

/// Default distinct-count bound under which a textual column is categorical.
pub const DEFAULT_CATEGORICAL_THRESHOLD: u64 = 100;

/// Raw executor rows, keyed by the fragment that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentResults {
    rows: BTreeMap<FragmentKind, Vec<RawRow>>,
}

impl FragmentResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: FragmentKind, rows: Vec<RawRow>) {
        self.rows.insert(kind, rows);
    }

    pub fn with(mut self, kind: FragmentKind, rows: Vec<RawRow>) -> Self {
        self.insert(kind, rows);
        self
    }

    pub fn rows(&self, kind: FragmentKind) -> &[RawRow] {
        self.rows.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Turns fragment results into column profiles.
#[derive(Debug, Clone)]
pub struct ResultInterpreter {
    categorical_threshold: u64,
}

impl Default for ResultInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORICAL_THRESHOLD)
    }
}

struct Normalized<'a> {
    plan: &'a QueryPlan,
    results: &'a FragmentResults,
}

impl Normalized<'_> {
    fn records(&self, kind: FragmentKind) -> Vec<Record> {
        let fields = self
            .plan
            .fragment(kind)
            .map(|f| f.output_fields.as_slice())
            .unwrap_or(&[]);
        self.results
            .rows(kind)
            .iter()
            .map(|row| row.normalize(fields))
            .collect()
    }

    fn first(&self, kind: FragmentKind) -> Record {
        self.records(kind).into_iter().next().unwrap_or_default()
    }

    fn texts(&self, kind: FragmentKind, field: &str) -> Vec<String> {
        self.records(kind)
            .iter()
            .filter_map(|r| r.text(field))
            .collect()
    }
}

impl ResultInterpreter {
    pub fn new(categorical_threshold: u64) -> Self {
        Self {
            categorical_threshold,
        }
    }

    /// Reduces `results` into a profile of `plan`'s column.
    ///
    /// The returned profile carries no quality assessment; see
    /// [`QualityScorer::annotate`](crate::analyzers::quality::QualityScorer::annotate).
    pub fn interpret(&self, plan: &QueryPlan, results: &FragmentResults) -> ColumnProfile {
        let data = Normalized { plan, results };
        let options = &plan.options;

        let base = data.first(FragmentKind::BaseStats);
        let total_rows = base.count(TOTAL_ROWS);
        let non_null_count = base.count(NON_NULL_COUNT).min(total_rows);
        let null_count = total_rows - non_null_count;
        let distinct_count = base.count(DISTINCT_COUNT).min(non_null_count);

        let top_values = self.top_values(&data, non_null_count, options.top_frequency_count);
        let patterns = Self::patterns(&data, options.pattern_count);

        let mut sample_values = data.texts(FragmentKind::Samples, VALUE);
        sample_values.truncate(options.sample_size);

        let inference = if sample_values.is_empty() {
            let fallback: Vec<&str> = top_values.iter().map(|v| v.value.as_str()).collect();
            infer_type(&fallback)
        } else {
            infer_type(&sample_values)
        };

        let mut extremes = Extremes {
            smallest: data.texts(FragmentKind::SmallestValues, VALUE),
            largest: data.texts(FragmentKind::LargestValues, VALUE),
        };
        extremes.smallest.truncate(options.extreme_count);
        extremes.largest.truncate(options.extreme_count);

        let details = match plan.strategy {
            ProfilingStrategy::Numeric => {
                StrategyDetails::Numeric(Self::numeric(&data, non_null_count))
            }
            ProfilingStrategy::Textual => {
                StrategyDetails::Textual(self.textual(&data, distinct_count))
            }
            ProfilingStrategy::Temporal => StrategyDetails::Temporal(Self::temporal(&data)),
            ProfilingStrategy::Boolean | ProfilingStrategy::Other => StrategyDetails::Basic,
        };

        debug!(
            column = %plan.descriptor.qualified_name(),
            total_rows,
            non_null_count,
            distinct_count,
            inferred_type = %inference.inferred_type,
            "Interpreted fragment results"
        );

        ColumnProfile {
            descriptor: plan.descriptor.clone(),
            total_rows,
            non_null_count,
            null_count,
            null_percentage: percentage(null_count, total_rows),
            distinct_count,
            distinct_percentage: percentage(distinct_count, non_null_count),
            inferred_type: inference.inferred_type,
            type_confidence: inference.confidence,
            patterns,
            top_values,
            extremes,
            sample_values,
            details,
            quality: None,
        }
    }

    fn top_values(&self, data: &Normalized<'_>, non_null_count: u64, limit: usize) -> Vec<ValueFrequency> {
        let mut entries: Vec<(String, u64)> = data
            .records(FragmentKind::TopValues)
            .iter()
            .filter_map(|r| Some((r.text(VALUE)?, r.count(FREQUENCY))))
            .filter(|(_, count)| *count > 0)
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut remaining = non_null_count;
        entries
            .into_iter()
            .take(limit)
            .map_while(|(value, count)| {
                // The list never claims more values than exist.
                remaining = remaining.checked_sub(count)?;
                Some(ValueFrequency {
                    value,
                    count,
                    percentage: percentage(count, non_null_count),
                })
            })
            .collect()
    }

    fn patterns(data: &Normalized<'_>, limit: usize) -> Vec<PatternFrequency> {
        let mut patterns: Vec<PatternFrequency> = data
            .records(FragmentKind::Patterns)
            .iter()
            .filter_map(|r| {
                let example = r.text(EXAMPLE);
                let signature = r
                    .text(SIGNATURE)
                    .or_else(|| example.as_deref().map(pattern_signature))?;
                Some(PatternFrequency {
                    signature,
                    count: r.count(OCCURRENCES),
                    example: example.unwrap_or_default(),
                })
            })
            .filter(|p| p.count > 0)
            .collect();
        patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.signature.cmp(&b.signature)));
        patterns.truncate(limit);
        patterns
    }

    fn numeric(data: &Normalized<'_>, non_null_count: u64) -> NumericStats {
        let moments = data.first(FragmentKind::NumericMoments);
        let ranks = data.first(FragmentKind::Percentiles);

        NumericStats {
            min: finite_or_zero(moments.float(MIN_VALUE)),
            max: finite_or_zero(moments.float(MAX_VALUE)),
            mean: finite_or_zero(moments.float(MEAN_VALUE)),
            stddev: finite_or_zero(moments.float(STDDEV_VALUE)),
            percentiles: Percentiles {
                p25: finite_or_zero(ranks.float(P25)),
                p50: finite_or_zero(ranks.float(P50)),
                p75: finite_or_zero(ranks.float(P75)),
                p95: finite_or_zero(ranks.float(P95)),
                p99: finite_or_zero(ranks.float(P99)),
            },
            zero_count: moments.count(ZERO_COUNT).min(non_null_count),
            negative_count: moments.count(NEGATIVE_COUNT).min(non_null_count),
            non_finite_count: moments.count(NON_FINITE_COUNT).min(non_null_count),
        }
    }

    fn textual(&self, data: &Normalized<'_>, distinct_count: u64) -> TextualStats {
        let lengths = data.first(FragmentKind::LengthStats);
        TextualStats {
            min_length: lengths.count(MIN_LENGTH),
            max_length: lengths.count(MAX_LENGTH),
            avg_length: finite_or_zero(lengths.float(AVG_LENGTH)),
            median_length: finite_or_zero(lengths.float(MEDIAN_LENGTH)),
            is_categorical: distinct_count > 0 && distinct_count < self.categorical_threshold,
        }
    }

    fn temporal(data: &Normalized<'_>) -> TemporalStats {
        let range = data.first(FragmentKind::TemporalRange);
        let mut stats = TemporalStats {
            min_timestamp: range.text(MIN_TIMESTAMP),
            max_timestamp: range.text(MAX_TIMESTAMP),
            ..Default::default()
        };
        fill_buckets(&mut stats.day_of_week, &data.records(FragmentKind::DayOfWeek));
        fill_buckets(&mut stats.hour_of_day, &data.records(FragmentKind::HourOfDay));
        stats
    }
}

fn fill_buckets(buckets: &mut [u64], records: &[Record]) {
    for record in records {
        let Some(index) = record.get(BUCKET).as_count() else {
            continue;
        };
        if let Some(slot) = usize::try_from(index).ok().and_then(|i| buckets.get_mut(i)) {
            *slot += record.count(FREQUENCY);
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::inference::InferredType;
    use crate::core::{ColumnDescriptor, TableRef, Value};
    use crate::plan::{PlanBuilder, PlanOptions};

    fn plan(declared: &str) -> QueryPlan {
        let descriptor = ColumnDescriptor::new(TableRef::new("t"), "c", declared);
        PlanBuilder::new(PlanOptions::default())
            .build(&descriptor, descriptor.strategy())
            .unwrap()
    }

    fn values(kind_field: &str, items: &[&str]) -> Vec<RawRow> {
        items
            .iter()
            .map(|v| RawRow::named([(kind_field, Value::from(*v))]))
            .collect()
    }

    #[test]
    fn test_textual_scenario() {
        // 10 rows, 2 nulls: A1, A1, B2, "", "", C3, A1, B2
        let results = FragmentResults::new()
            .with(
                FragmentKind::BaseStats,
                vec![RawRow::named([
                    ("total_rows", Value::Int(10)),
                    ("non_null_count", Value::Int(8)),
                    ("distinct_count", Value::Int(4)),
                ])],
            )
            .with(
                FragmentKind::TopValues,
                vec![
                    RawRow::Positional(vec!["A1".into(), Value::Int(3)]),
                    RawRow::Positional(vec!["".into(), Value::Int(2)]),
                    RawRow::Positional(vec!["B2".into(), Value::Int(2)]),
                    RawRow::Positional(vec!["C3".into(), Value::Int(1)]),
                ],
            )
            .with(
                FragmentKind::Patterns,
                vec![
                    RawRow::named([
                        ("signature", Value::from("A#")),
                        ("occurrences", Value::Int(6)),
                        ("example", Value::from("A1")),
                    ]),
                    RawRow::named([
                        ("signature", Value::from("")),
                        ("occurrences", Value::Int(2)),
                        ("example", Value::from("")),
                    ]),
                ],
            )
            .with(
                FragmentKind::Samples,
                values("val", &["A1", "A1", "B2", "", "", "C3", "A1", "B2"]),
            );

        let profile = ResultInterpreter::default().interpret(&plan("STRING"), &results);
        assert_eq!(profile.total_rows, 10);
        assert_eq!(profile.null_count, 2);
        assert_eq!(profile.non_null_count, 8);
        assert_eq!(profile.distinct_count, 4);
        assert_eq!(profile.distinct_percentage, 50.0);
        assert_eq!(profile.null_percentage, 20.0);
        assert_eq!(profile.patterns[0].signature, "A#");
        assert_eq!(profile.top_values[0].value, "A1");
        assert_eq!(profile.top_values[0].percentage, 37.5);
        assert_eq!(profile.inferred_type, InferredType::Text);
        assert!(profile.textual().unwrap().is_categorical);
        assert!(profile.is_consistent());
    }

    #[test]
    fn test_all_null_numeric_column() {
        let results = FragmentResults::new()
            .with(
                FragmentKind::BaseStats,
                vec![RawRow::Positional(vec![Value::Int(5), Value::Int(0), Value::Int(0)])],
            )
            .with(
                FragmentKind::NumericMoments,
                vec![RawRow::Positional(vec![
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Int(0),
                    Value::Int(0),
                    Value::Int(0),
                ])],
            )
            .with(FragmentKind::Percentiles, vec![RawRow::Positional(vec![Value::Null; 5])]);

        let profile = ResultInterpreter::default().interpret(&plan("DOUBLE"), &results);
        let numeric = profile.numeric().unwrap();
        assert_eq!(profile.null_count, 5);
        assert_eq!(profile.null_percentage, 100.0);
        assert_eq!(numeric.mean, 0.0);
        assert_eq!(numeric.stddev, 0.0);
        assert_eq!(numeric.percentiles, Percentiles::default());
        assert_eq!(profile.inferred_type, InferredType::Unknown);
        assert!(profile.is_consistent());
    }

    #[test]
    fn test_missing_fragments_yield_zeroed_profile() {
        let profile = ResultInterpreter::default().interpret(&plan("TIMESTAMP"), &FragmentResults::new());
        assert_eq!(profile.total_rows, 0);
        assert!(profile.patterns.is_empty());
        assert!(profile.top_values.is_empty());
        let temporal = profile.temporal().unwrap();
        assert_eq!(temporal.day_of_week, [0; 7]);
        assert_eq!(temporal.min_timestamp, None);
        assert!(profile.is_consistent());
    }

    #[test]
    fn test_inconsistent_counts_are_clamped() {
        let results = FragmentResults::new()
            .with(
                FragmentKind::BaseStats,
                vec![RawRow::named([
                    ("total_rows", Value::from("4")),
                    ("non_null_count", Value::from("9")),
                    ("distinct_count", Value::from("12")),
                ])],
            )
            .with(
                FragmentKind::TopValues,
                vec![
                    RawRow::named([("val", Value::from("x")), ("frequency", Value::Int(3))]),
                    RawRow::named([("val", Value::from("y")), ("frequency", Value::Int(3))]),
                ],
            );
        let profile = ResultInterpreter::default().interpret(&plan("STRING"), &results);
        assert_eq!(profile.non_null_count, 4);
        assert_eq!(profile.distinct_count, 4);
        assert_eq!(profile.top_values.len(), 1);
        assert!(profile.is_consistent());
    }

    #[test]
    fn test_temporal_buckets() {
        let results = FragmentResults::new()
            .with(
                FragmentKind::DayOfWeek,
                vec![
                    RawRow::Positional(vec![Value::Int(0), Value::Int(2)]),
                    RawRow::Positional(vec![Value::from("6"), Value::Int(1)]),
                    RawRow::Positional(vec![Value::Int(9), Value::Int(100)]),
                ],
            )
            .with(
                FragmentKind::HourOfDay,
                vec![RawRow::Positional(vec![Value::Int(23), Value::Int(4)])],
            );
        let profile = ResultInterpreter::default().interpret(&plan("TIMESTAMP"), &results);
        let temporal = profile.temporal().unwrap();
        assert_eq!(temporal.day_of_week, [2, 0, 0, 0, 0, 0, 1]);
        assert_eq!(temporal.hour_of_day[23], 4);
    }

    #[test]
    fn test_interpret_is_idempotent() {
        let results = FragmentResults::new().with(
            FragmentKind::Samples,
            values("val", &["1", "2", "x"]),
        );
        let interpreter = ResultInterpreter::default();
        let plan = plan("INT");
        assert_eq!(
            interpreter.interpret(&plan, &results),
            interpreter.interpret(&plan, &results)
        );
    }

    #[test]
    fn test_signature_falls_back_to_example() {
        let results = FragmentResults::new().with(
            FragmentKind::Patterns,
            vec![RawRow::named([
                ("occurrences", Value::Int(2)),
                ("example", Value::from("AB-12")),
            ])],
        );
        let profile = ResultInterpreter::default().interpret(&plan("STRING"), &results);
        assert_eq!(profile.patterns[0].signature, "A-#");
    }
}
