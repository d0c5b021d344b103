//! SQL rendering for single-column plans.

use tracing::{debug, instrument};

use super::fields::*;
use super::{FragmentKind, PlanOptions, QueryFragment, QueryPlan};
use crate::analyzers::classifier::{is_time_of_day, ProfilingStrategy};
use crate::analyzers::patterns::{DIGIT_RUN, LETTER_RUN};
use crate::core::ColumnDescriptor;
use crate::error::Result;
use crate::security::SqlSecurity;

/// Largest finite double; `abs(x) <= MAX_FINITE` rejects both infinities.
const MAX_FINITE: &str = "1.7976931348623157e308";

const PERCENTILES: [(&str, u32); 5] = [(P25, 25), (P50, 50), (P75, 75), (P95, 95), (P99, 99)];

/// Restricts a plan to the rows where `column` renders as `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Builds query plans from column descriptors.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    options: PlanOptions,
}

struct ColumnSql {
    column: String,
    source: String,
}

impl PlanBuilder {
    pub fn new(options: PlanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    /// Builds the plan for `descriptor` under `strategy`.
    ///
    /// The descriptor is validated first; a malformed reference never
    /// produces SQL.
    ///
    /// ```rust
    /// use column_lens::analyzers::classifier::classify;
    /// use column_lens::core::{ColumnDescriptor, TableRef};
    /// use column_lens::plan::{FragmentKind, PlanBuilder};
    ///
    /// let column = ColumnDescriptor::new(TableRef::new("orders"), "amount", "DOUBLE");
    /// let plan = PlanBuilder::default().build(&column, classify("DOUBLE")).unwrap();
    /// assert!(plan.fragment(FragmentKind::Percentiles).is_some());
    /// ```
    pub fn build(&self, descriptor: &ColumnDescriptor, strategy: ProfilingStrategy) -> Result<QueryPlan> {
        self.build_inner(descriptor, strategy, None)
    }

    /// Builds a plan restricted to the rows matched by `filter`.
    pub fn build_filtered(
        &self,
        descriptor: &ColumnDescriptor,
        strategy: ProfilingStrategy,
        filter: &RowFilter,
    ) -> Result<QueryPlan> {
        self.build_inner(descriptor, strategy, Some(filter))
    }

    #[instrument(skip(self, descriptor, filter), fields(column = %descriptor.qualified_name()))]
    fn build_inner(
        &self,
        descriptor: &ColumnDescriptor,
        strategy: ProfilingStrategy,
        filter: Option<&RowFilter>,
    ) -> Result<QueryPlan> {
        descriptor.validate()?;

        let table = descriptor.table.to_sql()?;
        let source = match filter {
            None => table,
            Some(filter) => {
                let segment = SqlSecurity::escape_identifier(&filter.column)?;
                format!(
                    "(SELECT * FROM {table} WHERE CAST({segment} AS VARCHAR) = {}) AS segment_rows",
                    SqlSecurity::escape_literal(&filter.value)
                )
            }
        };
        let sql = ColumnSql {
            column: descriptor.column_sql()?,
            source,
        };

        // A bare time of day has an hour but no weekday.
        let time_of_day = is_time_of_day(&descriptor.declared_type);
        let fragments: Vec<QueryFragment> = FragmentKind::required_for(strategy)
            .into_iter()
            .filter(|kind| !(time_of_day && *kind == FragmentKind::DayOfWeek))
            .map(|kind| self.render(kind, &sql))
            .collect();

        debug!(
            strategy = %strategy,
            fragments = fragments.len(),
            filtered = filter.is_some(),
            "Built query plan"
        );

        Ok(QueryPlan {
            descriptor: descriptor.clone(),
            strategy,
            options: self.options.clone(),
            fragments,
        })
    }

    fn render(&self, kind: FragmentKind, sql: &ColumnSql) -> QueryFragment {
        let ColumnSql { column: c, source: src } = sql;
        let o = &self.options;

        match kind {
            FragmentKind::BaseStats => QueryFragment::new(
                kind,
                format!(
                    "SELECT COUNT(*) AS {TOTAL_ROWS}, COUNT({c}) AS {NON_NULL_COUNT}, \
                     COUNT(DISTINCT {c}) AS {DISTINCT_COUNT} FROM {src}"
                ),
                &[TOTAL_ROWS, NON_NULL_COUNT, DISTINCT_COUNT],
            ),
            FragmentKind::TopValues => QueryFragment::new(
                kind,
                format!(
                    "SELECT CAST({c} AS VARCHAR) AS {VALUE}, COUNT(*) AS {FREQUENCY} FROM {src} \
                     WHERE {c} IS NOT NULL GROUP BY {c} \
                     ORDER BY {FREQUENCY} DESC, {VALUE} ASC LIMIT {}",
                    o.top_frequency_count
                ),
                &[VALUE, FREQUENCY],
            ),
            FragmentKind::Patterns => QueryFragment::new(
                kind,
                format!(
                    "SELECT {SIGNATURE}, COUNT(*) AS {OCCURRENCES}, MIN({VALUE}) AS {EXAMPLE} FROM (\
                     SELECT {VALUE}, regexp_replace(regexp_replace({VALUE}, '{DIGIT_RUN}', '#', 'g'), \
                     '{LETTER_RUN}', 'A', 'g') AS {SIGNATURE} FROM (\
                     SELECT CAST({c} AS VARCHAR) AS {VALUE} FROM {src} WHERE {c} IS NOT NULL LIMIT {}\
                     ) AS pattern_sample) AS signatures \
                     GROUP BY {SIGNATURE} ORDER BY {OCCURRENCES} DESC, {SIGNATURE} ASC LIMIT {}",
                    o.pattern_sample_limit, o.pattern_count
                ),
                &[SIGNATURE, OCCURRENCES, EXAMPLE],
            ),
            FragmentKind::SmallestValues | FragmentKind::LargestValues => {
                let direction = if kind == FragmentKind::SmallestValues {
                    "ASC"
                } else {
                    "DESC"
                };
                QueryFragment::new(
                    kind,
                    format!(
                        "SELECT CAST(raw AS VARCHAR) AS {VALUE} FROM (\
                         SELECT DISTINCT {c} AS raw FROM {src} WHERE {c} IS NOT NULL) AS distinct_values \
                         ORDER BY raw {direction} LIMIT {}",
                        o.extreme_count
                    ),
                    &[VALUE],
                )
            }
            FragmentKind::Samples => {
                let sql = match o.sample_seed {
                    None => format!(
                        "SELECT CAST({c} AS VARCHAR) AS {VALUE} FROM {src} WHERE {c} IS NOT NULL LIMIT {}",
                        o.sample_size
                    ),
                    Some(seed) => format!(
                        "SELECT {VALUE} FROM (SELECT CAST({c} AS VARCHAR) AS {VALUE} FROM {src} \
                         WHERE {c} IS NOT NULL) AS sample_pool \
                         ORDER BY md5(concat({VALUE}, '{seed}')), {VALUE} LIMIT {}",
                        o.sample_size
                    ),
                };
                QueryFragment::new(kind, sql, &[VALUE])
            }
            FragmentKind::NumericMoments => {
                let fin = finite("x");
                QueryFragment::new(
                    kind,
                    format!(
                        "SELECT \
                         MIN(CASE WHEN {fin} THEN x END) AS {MIN_VALUE}, \
                         MAX(CASE WHEN {fin} THEN x END) AS {MAX_VALUE}, \
                         AVG(CASE WHEN {fin} THEN x END) AS {MEAN_VALUE}, \
                         STDDEV(CASE WHEN {fin} THEN x END) AS {STDDEV_VALUE}, \
                         COUNT(CASE WHEN {fin} AND x = 0 THEN 1 END) AS {ZERO_COUNT}, \
                         COUNT(CASE WHEN {fin} AND x < 0 THEN 1 END) AS {NEGATIVE_COUNT}, \
                         COUNT(CASE WHEN NOT {fin} THEN 1 END) AS {NON_FINITE_COUNT} \
                         FROM (SELECT CAST({c} AS DOUBLE) AS x FROM {src} WHERE {c} IS NOT NULL) AS numeric_values"
                    ),
                    &[
                        MIN_VALUE,
                        MAX_VALUE,
                        MEAN_VALUE,
                        STDDEV_VALUE,
                        ZERO_COUNT,
                        NEGATIVE_COUNT,
                        NON_FINITE_COUNT,
                    ],
                )
            }
            FragmentKind::Percentiles => {
                // Nearest rank: the value at 1-based position ceil(n * q / 100).
                let columns = PERCENTILES
                    .iter()
                    .map(|(name, q)| {
                        format!("MAX(CASE WHEN rn = (cnt * {q} + 99) / 100 THEN x END) AS {name}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                QueryFragment::new(
                    kind,
                    format!(
                        "SELECT {columns} FROM (\
                         SELECT x, ROW_NUMBER() OVER (ORDER BY x) AS rn, COUNT(*) OVER () AS cnt FROM (\
                         SELECT CAST({c} AS DOUBLE) AS x FROM {src} WHERE {c} IS NOT NULL) AS numeric_values \
                         WHERE {}) AS ranked",
                        finite("x")
                    ),
                    &[P25, P50, P75, P95, P99],
                )
            }
            FragmentKind::LengthStats => QueryFragment::new(
                kind,
                format!(
                    "SELECT MIN(len) AS {MIN_LENGTH}, MAX(len) AS {MAX_LENGTH}, \
                     AVG(len) AS {AVG_LENGTH}, MEDIAN(len) AS {MEDIAN_LENGTH} FROM (\
                     SELECT CAST(character_length(CAST({c} AS VARCHAR)) AS DOUBLE) AS len \
                     FROM {src} WHERE {c} IS NOT NULL) AS lengths"
                ),
                &[MIN_LENGTH, MAX_LENGTH, AVG_LENGTH, MEDIAN_LENGTH],
            ),
            FragmentKind::TemporalRange => QueryFragment::new(
                kind,
                format!(
                    "SELECT CAST(MIN({c}) AS VARCHAR) AS {MIN_TIMESTAMP}, \
                     CAST(MAX({c}) AS VARCHAR) AS {MAX_TIMESTAMP} FROM {src}"
                ),
                &[MIN_TIMESTAMP, MAX_TIMESTAMP],
            ),
            FragmentKind::DayOfWeek | FragmentKind::HourOfDay => {
                let part = if kind == FragmentKind::DayOfWeek {
                    "dow"
                } else {
                    "hour"
                };
                QueryFragment::new(
                    kind,
                    format!(
                        "SELECT {BUCKET}, COUNT(*) AS {FREQUENCY} FROM (\
                         SELECT CAST(date_part('{part}', {c}) AS BIGINT) AS {BUCKET} \
                         FROM {src} WHERE {c} IS NOT NULL) AS buckets \
                         GROUP BY {BUCKET} ORDER BY {BUCKET}"
                    ),
                    &[BUCKET, FREQUENCY],
                )
            }
        }
    }
}

fn finite(expr: &str) -> String {
    format!("(NOT isnan({expr}) AND abs({expr}) <= {MAX_FINITE})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::classifier::classify;
    use crate::core::TableRef;
    use crate::error::ProfileError;

    fn descriptor(column: &str, declared: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(TableRef::qualified("main", "sales", "orders"), column, declared)
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let plan = PlanBuilder::default()
            .build(&descriptor("Order Total", "DOUBLE"), ProfilingStrategy::Numeric)
            .unwrap();
        let base = plan.fragment(FragmentKind::BaseStats).unwrap();
        assert_eq!(
            base.sql,
            "SELECT COUNT(*) AS total_rows, COUNT(\"Order Total\") AS non_null_count, \
             COUNT(DISTINCT \"Order Total\") AS distinct_count FROM \"main\".\"sales\".\"orders\""
        );
        assert_eq!(base.output_fields, vec!["total_rows", "non_null_count", "distinct_count"]);
    }

    #[test]
    fn test_time_of_day_plans_skip_weekday_buckets() {
        for declared in ["TIME", "Time64(Nanosecond)"] {
            let column = descriptor("opened_at", declared);
            let plan = PlanBuilder::default()
                .build(&column, classify(declared))
                .unwrap();
            assert_eq!(plan.strategy, ProfilingStrategy::Temporal);
            assert!(plan.fragment(FragmentKind::DayOfWeek).is_none(), "{declared}");
            assert!(plan.fragment(FragmentKind::HourOfDay).is_some(), "{declared}");
            assert!(plan.fragment(FragmentKind::TemporalRange).is_some(), "{declared}");
            assert!(plan.fragment(FragmentKind::LargestValues).is_some(), "{declared}");
        }

        let stamped = PlanBuilder::default()
            .build(&descriptor("created_at", "TIMESTAMP"), ProfilingStrategy::Temporal)
            .unwrap();
        assert!(stamped.fragment(FragmentKind::DayOfWeek).is_some());
    }

    #[test]
    fn test_invalid_descriptor_builds_nothing() {
        let err = PlanBuilder::default()
            .build(&descriptor("x; DROP TABLE orders", "INT"), ProfilingStrategy::Numeric)
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_options_flow_into_sql() {
        let options = PlanOptions::default()
            .top_frequency_count(3)
            .sample_size(7)
            .extreme_count(2)
            .pattern_sample_limit(50);
        let plan = PlanBuilder::new(options)
            .build(&descriptor("amount", "INT"), classify("INT"))
            .unwrap();

        assert!(plan.fragment(FragmentKind::TopValues).unwrap().sql.ends_with("LIMIT 3"));
        assert!(plan.fragment(FragmentKind::Samples).unwrap().sql.ends_with("LIMIT 7"));
        assert!(plan.fragment(FragmentKind::SmallestValues).unwrap().sql.ends_with("ASC LIMIT 2"));
        assert!(plan.fragment(FragmentKind::LargestValues).unwrap().sql.ends_with("DESC LIMIT 2"));
        assert!(plan.fragment(FragmentKind::Patterns).unwrap().sql.contains("LIMIT 50"));
    }

    #[test]
    fn test_seeded_samples_are_hash_ordered() {
        let plan = PlanBuilder::new(PlanOptions::default().sample_seed(42))
            .build(&descriptor("name", "STRING"), ProfilingStrategy::Textual)
            .unwrap();
        let samples = plan.fragment(FragmentKind::Samples).unwrap();
        assert!(samples.sql.contains("md5(concat(val, '42'))"));
    }

    #[test]
    fn test_percentiles_use_nearest_rank() {
        let plan = PlanBuilder::default()
            .build(&descriptor("amount", "INT"), ProfilingStrategy::Numeric)
            .unwrap();
        let sql = &plan.fragment(FragmentKind::Percentiles).unwrap().sql;
        assert!(sql.contains("rn = (cnt * 95 + 99) / 100"));
        assert!(sql.contains("isnan(x)"));
    }

    #[test]
    fn test_filtered_plan_wraps_source() {
        let plan = PlanBuilder::default()
            .build_filtered(
                &descriptor("amount", "INT"),
                ProfilingStrategy::Numeric,
                &RowFilter::new("region", "O'Hare"),
            )
            .unwrap();
        let base = &plan.fragment(FragmentKind::BaseStats).unwrap().sql;
        assert!(base.contains(
            "FROM (SELECT * FROM \"main\".\"sales\".\"orders\" WHERE CAST(\"region\" AS VARCHAR) = 'O''Hare') AS segment_rows"
        ));
    }

    #[test]
    fn test_combined_scalar_fragment() {
        let plan = PlanBuilder::default()
            .build(&descriptor("amount", "INT"), ProfilingStrategy::Numeric)
            .unwrap();
        let combined = plan.combined_scalar_fragment().unwrap();
        assert_eq!(
            combined.members,
            vec![
                FragmentKind::BaseStats,
                FragmentKind::NumericMoments,
                FragmentKind::Percentiles
            ]
        );
        assert!(combined.sql.contains(" CROSS JOIN "));
        assert_eq!(combined.output_fields.len(), 3 + 7 + 5);
        assert_eq!(plan.multi_row_fragments().count(), plan.fragments.len() - 3);
    }
}
