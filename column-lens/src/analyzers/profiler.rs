//! The profiling runner.
//!
//! [`ColumnProfiler`] drives one column through the whole pipeline:
//!
//! 1. classify the declared type into a
//!    [`ProfilingStrategy`](crate::analyzers::classifier::ProfilingStrategy)
//! 2. build the [`QueryPlan`] for that strategy
//! 3. run every fragment through a [`QueryExecutor`]
//! 4. reduce the rows with the [`ResultInterpreter`]
//! 5. attach a [`QualityAssessment`](crate::analyzers::quality::QualityAssessment)
//!
//! Nothing is interpreted until every fragment has returned, so a failed or
//! cancelled execution leaves no partial profile behind.
//!
//! # Example
//!
//! ```rust
//! use column_lens::analyzers::profiler::ColumnProfiler;
//! use column_lens::core::{ColumnDescriptor, TableRef};
//! use column_lens::executor::DataFusionExecutor;
//! use column_lens::test_fixtures::create_people_context;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let executor = DataFusionExecutor::new(create_people_context().await.unwrap());
//! let profiler = ColumnProfiler::builder()
//!     .top_frequency_count(5)
//!     .progress_callback(|p| println!("{}: {}/{}", p.column_name, p.completed, p.total))
//!     .build();
//!
//! let column = ColumnDescriptor::new(TableRef::new("people"), "code", "VARCHAR");
//! let profile = profiler.profile_column(&executor, &column).await.unwrap();
//! assert_eq!(profile.null_count, 2);
//! # })
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::interpreter::{FragmentResults, ResultInterpreter, DEFAULT_CATEGORICAL_THRESHOLD};
use crate::analyzers::profile_types::ColumnProfile;
use crate::analyzers::quality::{QualityScorer, ScoringWeights};
use crate::core::{ColumnDescriptor, RawRow, TableRef};
use crate::cross_column::composite_key::{
    candidate_subsets, distinct_rows_query, rank_candidates, read_count, row_count_query,
    DISTINCT_ROWS_FIELD, TOTAL_ROWS_FIELD,
};
use crate::cross_column::conditional::{read_segments, segment_query};
use crate::cross_column::correlation::{
    correlation_matrix, numeric_columns, paired_values_query, read_paired_rows,
};
use crate::cross_column::{
    CompositeKeyCandidate, ConditionalProfile, CorrelationEntry, CrossColumnConfig,
    SegmentProfile, SubsetMeasurement,
};
use crate::error::{ProfileError, Result};
use crate::executor::QueryExecutor;
use crate::{log_debug, log_info, log_query};
use crate::logging::LogConfig;
use crate::plan::{FragmentKind, PlanBuilder, PlanOptions, QueryPlan, RowFilter};
use crate::security::SqlSecurity;

/// Label reported for the merged single-row statement.
pub const COMBINED_FRAGMENT: &str = "combined_scalars";

/// Configuration for a profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub plan: PlanOptions,
    pub scoring: ScoringWeights,
    /// Textual columns with fewer distinct values are flagged categorical
    pub categorical_threshold: u64,
    /// Run independent statements concurrently
    pub enable_parallel: bool,
    /// Merge single-row fragments into one `CROSS JOIN` statement
    pub combine_scalar_fragments: bool,
    pub cross_column: CrossColumnConfig,
    pub log: LogConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            plan: PlanOptions::default(),
            scoring: ScoringWeights::default(),
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            enable_parallel: true,
            combine_scalar_fragments: false,
            cross_column: CrossColumnConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ProfilerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.scoring.validate()?;
        config.cross_column.validate()?;
        Ok(config)
    }
}

/// Progress callback for profiling operations
pub type ProgressCallback = Arc<dyn Fn(ProfilerProgress) + Send + Sync>;

/// Emitted each time a statement for a column completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerProgress {
    pub column_name: String,
    /// Fragment kind, or [`COMBINED_FRAGMENT`]
    pub fragment: String,
    pub completed: usize,
    pub total: usize,
}

/// Builder for ColumnProfiler
pub struct ColumnProfilerBuilder {
    config: ProfilerConfig,
    progress_callback: Option<ProgressCallback>,
}

impl ColumnProfilerBuilder {
    pub fn config(mut self, config: ProfilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn plan_options(mut self, options: PlanOptions) -> Self {
        self.config.plan = options;
        self
    }

    pub fn top_frequency_count(mut self, count: usize) -> Self {
        self.config.plan.top_frequency_count = count;
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.plan.sample_size = size;
        self
    }

    /// Makes sampling deterministic for a given seed
    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.config.plan.sample_seed = Some(seed);
        self
    }

    pub fn scoring_weights(mut self, weights: ScoringWeights) -> Self {
        self.config.scoring = weights;
        self
    }

    pub fn categorical_threshold(mut self, threshold: u64) -> Self {
        self.config.categorical_threshold = threshold;
        self
    }

    /// Enable or disable concurrent statement execution
    pub fn enable_parallel(mut self, enable: bool) -> Self {
        self.config.enable_parallel = enable;
        self
    }

    pub fn combine_scalar_fragments(mut self, combine: bool) -> Self {
        self.config.combine_scalar_fragments = combine;
        self
    }

    pub fn cross_column(mut self, config: CrossColumnConfig) -> Self {
        self.config.cross_column = config;
        self
    }

    pub fn log_config(mut self, log: LogConfig) -> Self {
        self.config.log = log;
        self
    }

    /// Set progress callback
    pub fn progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProfilerProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> ColumnProfiler {
        ColumnProfiler {
            planner: PlanBuilder::new(self.config.plan.clone()),
            interpreter: ResultInterpreter::new(self.config.categorical_threshold),
            scorer: QualityScorer::new(self.config.scoring.clone()),
            config: self.config,
            progress_callback: self.progress_callback,
        }
    }
}

/// Profiles columns against a [`QueryExecutor`].
///
/// The profiler holds no per-run state; one instance can serve concurrent
/// runs.
#[derive(Clone)]
pub struct ColumnProfiler {
    config: ProfilerConfig,
    planner: PlanBuilder,
    interpreter: ResultInterpreter,
    scorer: QualityScorer,
    progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ColumnProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnProfiler")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for ColumnProfiler {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One statement to run and the fragment kinds its rows answer.
struct ExecutionUnit {
    label: String,
    sql: String,
    output_fields: Vec<String>,
    members: Vec<FragmentKind>,
}

impl ExecutionUnit {
    fn single(fragment: &crate::plan::QueryFragment) -> Self {
        Self {
            label: fragment.kind.as_str().to_string(),
            sql: fragment.sql.clone(),
            output_fields: fragment.output_fields.clone(),
            members: vec![fragment.kind],
        }
    }
}

struct ProgressTracker<'a> {
    column_name: &'a str,
    completed: AtomicUsize,
    total: usize,
}

impl ColumnProfiler {
    pub fn builder() -> ColumnProfilerBuilder {
        ColumnProfilerBuilder {
            config: ProfilerConfig::default(),
            progress_callback: None,
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// The plan `profile_column` would run for `descriptor`.
    pub fn plan(&self, descriptor: &ColumnDescriptor) -> Result<QueryPlan> {
        self.planner.build(descriptor, descriptor.strategy())
    }

    /// Profiles and scores one column.
    ///
    /// An invalid descriptor is rejected before any SQL is generated. An
    /// executor failure aborts the run and is returned tagged with the
    /// fragment that failed.
    #[instrument(skip(self, executor, descriptor), fields(column = %descriptor.qualified_name()))]
    pub async fn profile_column<E>(&self, executor: &E, descriptor: &ColumnDescriptor) -> Result<ColumnProfile>
    where
        E: QueryExecutor + ?Sized,
    {
        let start = Instant::now();
        let strategy = descriptor.strategy();
        let plan = self.planner.build(descriptor, strategy)?;

        log_info!(
            self.config.log,
            strategy = %strategy,
            fragments = plan.fragments.len(),
            "Starting column profiling"
        );

        let profile = self.run_plan(executor, &plan).await?;

        log_info!(
            self.config.log,
            rows = profile.total_rows,
            score = ?profile.quality_score(),
            time_ms = start.elapsed().as_millis() as u64,
            "Completed column profiling"
        );
        Ok(profile)
    }

    /// Profiles an explicit list of columns, in order.
    #[instrument(skip(self, executor, descriptors), fields(columns = descriptors.len()))]
    pub async fn profile_columns<E>(&self, executor: &E, descriptors: &[ColumnDescriptor]) -> Result<Vec<ColumnProfile>>
    where
        E: QueryExecutor + ?Sized,
    {
        if self.config.enable_parallel && descriptors.len() > 1 {
            try_join_all(descriptors.iter().map(|d| self.profile_column(executor, d))).await
        } else {
            let mut profiles = Vec::with_capacity(descriptors.len());
            for descriptor in descriptors {
                profiles.push(self.profile_column(executor, descriptor).await?);
            }
            Ok(profiles)
        }
    }

    /// Profiles `target` once per value of `segment_column`.
    ///
    /// Null segment values are skipped and only the largest
    /// `max_segments` segments are kept. Segments smaller than
    /// `min_segment_rows` are still profiled but flagged low-confidence.
    #[instrument(skip(self, executor, target), fields(column = %target.qualified_name()))]
    pub async fn profile_segments<E>(
        &self,
        executor: &E,
        target: &ColumnDescriptor,
        segment_column: &str,
    ) -> Result<ConditionalProfile>
    where
        E: QueryExecutor + ?Sized,
    {
        target.validate()?;
        SqlSecurity::validate_identifier(segment_column)?;
        let settings = &self.config.cross_column;

        let sql = segment_query(target, segment_column, settings.max_segments)?;
        let segments = read_segments(&self.execute_labeled(executor, "segments", &sql).await?);
        log_info!(self.config.log, segments = segments.len(), "Discovered segments");

        let strategy = target.strategy();
        let plans = segments
            .iter()
            .map(|(value, _)| {
                self.planner
                    .build_filtered(target, strategy, &RowFilter::new(segment_column, value.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let profiles = if self.config.enable_parallel && plans.len() > 1 {
            try_join_all(plans.iter().map(|plan| self.run_plan(executor, plan))).await?
        } else {
            let mut profiles = Vec::with_capacity(plans.len());
            for plan in &plans {
                profiles.push(self.run_plan(executor, plan).await?);
            }
            profiles
        };

        let segments = segments
            .into_iter()
            .zip(profiles)
            .map(|((segment, discovered_rows), profile)| {
                log_debug!(
                    self.config.log,
                    segment = %segment,
                    discovered_rows,
                    profiled_rows = profile.total_rows,
                    "Profiled segment"
                );
                let sample_size = profile.total_rows;
                let entry = SegmentProfile {
                    segment: segment.clone(),
                    sample_size,
                    low_confidence: sample_size < settings.min_segment_rows,
                    profile,
                };
                (segment, entry)
            })
            .collect();

        Ok(ConditionalProfile {
            segment_column: segment_column.to_string(),
            target: target.clone(),
            segments,
        })
    }

    /// Ranks column subsets of one table by how well they identify rows.
    ///
    /// Single columns are tested first; larger subsets only while no tested
    /// subset is fully unique, up to `max_subset_size`. When nothing is
    /// unique the best partial candidates are returned.
    #[instrument(skip(self, executor, columns), fields(columns = columns.len()))]
    pub async fn detect_composite_keys<E>(
        &self,
        executor: &E,
        columns: &[ColumnDescriptor],
    ) -> Result<Vec<CompositeKeyCandidate>>
    where
        E: QueryExecutor + ?Sized,
    {
        let Some(table) = common_table(columns.iter())? else {
            return Ok(Vec::new());
        };
        let settings = &self.config.cross_column;
        let names: Vec<String> = columns.iter().map(|c| c.column.clone()).collect();

        let rows = self
            .execute_labeled(executor, "row_count", &row_count_query(table)?)
            .await?;
        let total_rows = read_count(&rows, TOTAL_ROWS_FIELD);
        if total_rows == 0 {
            log_info!(self.config.log, table = %table, "Table is empty; no key candidates");
            return Ok(Vec::new());
        }

        let mut measurements = Vec::new();
        for size in 1..=settings.max_subset_size.min(names.len()) {
            let subsets = candidate_subsets(names.len(), size, settings.max_subsets_per_level);
            let queries = subsets
                .iter()
                .map(|subset| {
                    let subset_names: Vec<&str> = subset.iter().map(|&p| names[p].as_str()).collect();
                    distinct_rows_query(table, &subset_names)
                })
                .collect::<Result<Vec<_>>>()?;

            let results = self.execute_all(executor, "composite_key", &queries).await?;
            let mut found_unique = false;
            for (positions, rows) in subsets.into_iter().zip(results) {
                let distinct_rows = read_count(&rows, DISTINCT_ROWS_FIELD);
                found_unique |= distinct_rows >= total_rows;
                measurements.push(SubsetMeasurement {
                    positions,
                    distinct_rows,
                });
            }

            log_debug!(self.config.log, size, found_unique, "Tested key subsets");
            if found_unique {
                break;
            }
        }

        let candidates = rank_candidates(&names, total_rows, measurements, settings.max_candidates);
        log_info!(
            self.config.log,
            candidates = candidates.len(),
            unique = candidates.iter().filter(|c| c.is_unique).count(),
            "Ranked composite key candidates"
        );
        Ok(candidates)
    }

    /// Pearson coefficients for every pair of numeric columns among
    /// `profiles`.
    ///
    /// Pairs with fewer than `min_joint_samples` joint observations are
    /// left out.
    #[instrument(skip(self, executor, profiles), fields(columns = profiles.len()))]
    pub async fn correlations<E>(&self, executor: &E, profiles: &[ColumnProfile]) -> Result<Vec<CorrelationEntry>>
    where
        E: QueryExecutor + ?Sized,
    {
        let numeric = numeric_columns(profiles);
        if numeric.len() < 2 {
            log_debug!(
                self.config.log,
                numeric = numeric.len(),
                "Not enough numeric columns to correlate"
            );
            return Ok(Vec::new());
        }
        let Some(table) = common_table(numeric.iter().copied())? else {
            return Ok(Vec::new());
        };
        let settings = &self.config.cross_column;

        let sql = paired_values_query(table, &numeric, settings.max_paired_rows)?;
        let rows = self.execute_labeled(executor, "paired_values", &sql).await?;
        let values = read_paired_rows(&rows, numeric.len());

        let names: Vec<String> = numeric.iter().map(|d| d.column.clone()).collect();
        let entries = correlation_matrix(&names, &values, settings.min_joint_samples);
        log_info!(
            self.config.log,
            rows = values.len(),
            pairs = entries.len(),
            "Computed correlations"
        );
        Ok(entries)
    }

    async fn run_plan<E>(&self, executor: &E, plan: &QueryPlan) -> Result<ColumnProfile>
    where
        E: QueryExecutor + ?Sized,
    {
        let results = self.execute_plan(executor, plan).await?;
        let profile = self.interpreter.interpret(plan, &results);
        Ok(self.scorer.annotate(profile))
    }

    async fn execute_plan<E>(&self, executor: &E, plan: &QueryPlan) -> Result<FragmentResults>
    where
        E: QueryExecutor + ?Sized,
    {
        let units = self.execution_units(plan);
        let column_name = plan.descriptor.qualified_name();
        let tracker = ProgressTracker {
            column_name: &column_name,
            completed: AtomicUsize::new(0),
            total: units.len(),
        };

        let outputs = if self.config.enable_parallel && units.len() > 1 {
            try_join_all(units.iter().map(|unit| self.run_unit(executor, unit, &tracker))).await?
        } else {
            let mut outputs = Vec::with_capacity(units.len());
            for unit in &units {
                outputs.push(self.run_unit(executor, unit, &tracker).await?);
            }
            outputs
        };

        let mut results = FragmentResults::new();
        for (unit, rows) in units.iter().zip(outputs) {
            if let [kind] = unit.members.as_slice() {
                results.insert(*kind, rows);
                continue;
            }
            // Merged rows are re-keyed by name so each member reads its own fields.
            let named: Vec<RawRow> = rows
                .iter()
                .map(|row| row.normalize(&unit.output_fields).into_row())
                .collect();
            for kind in &unit.members {
                results.insert(*kind, named.clone());
            }
        }
        Ok(results)
    }

    fn execution_units(&self, plan: &QueryPlan) -> Vec<ExecutionUnit> {
        if self.config.combine_scalar_fragments {
            if let Some(combined) = plan.combined_scalar_fragment() {
                let mut units = vec![ExecutionUnit {
                    label: COMBINED_FRAGMENT.to_string(),
                    sql: combined.sql,
                    output_fields: combined.output_fields,
                    members: combined.members,
                }];
                units.extend(plan.multi_row_fragments().map(ExecutionUnit::single));
                return units;
            }
        }
        plan.fragments.iter().map(ExecutionUnit::single).collect()
    }

    async fn run_unit<E>(&self, executor: &E, unit: &ExecutionUnit, tracker: &ProgressTracker<'_>) -> Result<Vec<RawRow>>
    where
        E: QueryExecutor + ?Sized,
    {
        let rows = self.execute_labeled(executor, &unit.label, &unit.sql).await?;
        let completed = tracker.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.report_progress(ProfilerProgress {
            column_name: tracker.column_name.to_string(),
            fragment: unit.label.clone(),
            completed,
            total: tracker.total,
        });
        Ok(rows)
    }

    async fn execute_labeled<E>(&self, executor: &E, label: &str, sql: &str) -> Result<Vec<RawRow>>
    where
        E: QueryExecutor + ?Sized,
    {
        log_query!(self.config.log, label, sql);
        let rows = executor
            .execute(sql)
            .await
            .map_err(|e| e.for_fragment(label))?;
        if self.config.log.log_fragment_rows {
            debug!(fragment = %label, rows = rows.len(), "Fragment completed");
        }
        Ok(rows)
    }

    async fn execute_all<E>(&self, executor: &E, label: &str, queries: &[String]) -> Result<Vec<Vec<RawRow>>>
    where
        E: QueryExecutor + ?Sized,
    {
        if self.config.enable_parallel && queries.len() > 1 {
            try_join_all(queries.iter().map(|sql| self.execute_labeled(executor, label, sql))).await
        } else {
            let mut results = Vec::with_capacity(queries.len());
            for sql in queries {
                results.push(self.execute_labeled(executor, label, sql).await?);
            }
            Ok(results)
        }
    }

    /// Report progress to callback if configured
    fn report_progress(&self, progress: ProfilerProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// The one table every column belongs to; `None` for no columns.
fn common_table<'a, I>(mut columns: I) -> Result<Option<&'a TableRef>>
where
    I: Iterator<Item = &'a ColumnDescriptor>,
{
    let Some(first) = columns.next() else {
        return Ok(None);
    };
    first.validate()?;
    for column in columns {
        column.validate()?;
        if column.table != first.table {
            return Err(ProfileError::invalid_descriptor(format!(
                "columns span tables '{}' and '{}'",
                first.table, column.table
            )));
        }
    }
    Ok(Some(&first.table))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::analyzers::classifier::ProfilingStrategy;
    use crate::core::Value;

    /// Answers every statement with no rows and records what it was asked.
    #[derive(Default)]
    struct RecordingExecutor {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn execute(&self, sql: &str) -> Result<Vec<RawRow>> {
            self.queries.lock().unwrap().push(sql.to_string());
            Ok(Vec::new())
        }
    }

    /// Fails any statement containing `needle`.
    struct FailingExecutor {
        needle: &'static str,
    }

    #[async_trait]
    impl QueryExecutor for FailingExecutor {
        async fn execute(&self, sql: &str) -> Result<Vec<RawRow>> {
            if sql.contains(self.needle) {
                Err(ProfileError::execution("query", "engine went away"))
            } else {
                Ok(vec![RawRow::named([("total_rows", Value::Int(3))])])
            }
        }
    }

    fn amount() -> ColumnDescriptor {
        ColumnDescriptor::new(TableRef::new("payments"), "amount", "DECIMAL(10,2)")
    }

    #[test]
    fn test_builder_sets_config() {
        let profiler = ColumnProfiler::builder()
            .top_frequency_count(3)
            .sample_seed(7)
            .categorical_threshold(12)
            .enable_parallel(false)
            .combine_scalar_fragments(true)
            .build();
        let config = profiler.config();
        assert_eq!(config.plan.top_frequency_count, 3);
        assert_eq!(config.plan.sample_seed, Some(7));
        assert_eq!(config.categorical_threshold, 12);
        assert!(!config.enable_parallel);
        assert!(config.combine_scalar_fragments);
    }

    #[test]
    fn test_config_from_json() {
        let config = ProfilerConfig::from_json_str(
            r#"{"scoring": {"completeness_cap": 30.0}, "log": {"base_level": "debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.scoring.completeness_cap, 30.0);
        assert_eq!(config.scoring.completeness_weight, 0.4);
        assert_eq!(config.log.base_level, tracing::Level::DEBUG);

        let err = ProfilerConfig::from_json_str(r#"{"scoring": {"uniqueness_cap": -1.0}}"#).unwrap_err();
        assert!(matches!(err, ProfileError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_progress_reports_every_fragment() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let profiler = ColumnProfiler::builder()
            .enable_parallel(false)
            .progress_callback(move |p| sink.lock().unwrap().push(p))
            .build();
        let executor = RecordingExecutor::default();

        let profile = profiler.profile_column(&executor, &amount()).await.unwrap();
        assert_eq!(profile.total_rows, 0);

        let events = events.lock().unwrap();
        let expected = FragmentKind::required_for(ProfilingStrategy::Numeric).len();
        assert_eq!(events.len(), expected);
        assert_eq!(executor.queries.lock().unwrap().len(), expected);
        assert_eq!(events[0].fragment, "base_stats");
        assert_eq!(events.last().unwrap().completed, expected);
        assert!(events.iter().all(|e| e.total == expected && e.column_name == "payments.amount"));
    }

    #[tokio::test]
    async fn test_combined_mode_issues_fewer_statements() {
        let profiler = ColumnProfiler::builder().combine_scalar_fragments(true).build();
        let executor = RecordingExecutor::default();
        profiler.profile_column(&executor, &amount()).await.unwrap();

        let plan = profiler.plan(&amount()).unwrap();
        let multi_row = plan.multi_row_fragments().count();
        let queries = executor.queries.lock().unwrap();
        assert_eq!(queries.len(), multi_row + 1);
        assert!(queries.iter().any(|q| q.contains(" CROSS JOIN ")));
    }

    #[tokio::test]
    async fn test_executor_failure_names_the_fragment() {
        let profiler = ColumnProfiler::new();
        let executor = FailingExecutor { needle: "ROW_NUMBER" };
        let err = profiler.profile_column(&executor, &amount()).await.unwrap_err();
        match err {
            ProfileError::ExecutionFailure { fragment, message } => {
                assert_eq!(fragment, "percentiles");
                assert_eq!(message, "engine went away");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_descriptor_runs_nothing() {
        let executor = RecordingExecutor::default();
        let bad = ColumnDescriptor::new(TableRef::new("t; DROP TABLE t"), "x", "INT");
        let err = ColumnProfiler::new().profile_column(&executor, &bad).await.unwrap_err();
        assert!(matches!(err, ProfileError::InvalidDescriptor { .. }));
        assert!(executor.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cross_column_rejects_mixed_tables() {
        let executor = RecordingExecutor::default();
        let columns = vec![
            amount(),
            ColumnDescriptor::new(TableRef::new("refunds"), "amount", "DECIMAL(10,2)"),
        ];
        let err = ColumnProfiler::new()
            .detect_composite_keys(&executor, &columns)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidDescriptor { .. }));
    }

    #[tokio::test]
    async fn test_empty_table_has_no_key_candidates() {
        let executor = RecordingExecutor::default();
        let candidates = ColumnProfiler::new()
            .detect_composite_keys(&executor, &[amount()])
            .await
            .unwrap();
        assert!(candidates.is_empty());
        assert_eq!(executor.queries.lock().unwrap().len(), 1);
    }

    /// Collects the message of every event emitted while installed.
    #[derive(Clone, Default)]
    struct MessageLog(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for MessageLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            struct Message(String);
            impl tracing::field::Visit for Message {
                fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                    if field.name() == "message" {
                        self.0 = format!("{value:?}");
                    }
                }
            }
            let mut message = Message(String::new());
            event.record(&mut message);
            self.0.lock().unwrap().push(message.0);
        }
    }

    async fn lifecycle_messages(log: LogConfig) -> Vec<String> {
        use tracing_subscriber::layer::SubscriberExt;

        let messages = MessageLog::default();
        let subscriber = tracing_subscriber::registry().with(messages.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        ColumnProfiler::builder()
            .log_config(log)
            .build()
            .profile_column(&RecordingExecutor::default(), &amount())
            .await
            .unwrap();
        let seen = messages.0.lock().unwrap().clone();
        seen
    }

    #[tokio::test]
    async fn test_base_level_gates_lifecycle_events() {
        let chatty = lifecycle_messages(LogConfig::default()).await;
        assert!(chatty.iter().any(|m| m == "Starting column profiling"));
        assert!(chatty.iter().any(|m| m == "Completed column profiling"));

        let quiet = lifecycle_messages(LogConfig::production()).await;
        assert!(!quiet.iter().any(|m| m.contains("column profiling")));
    }
}
