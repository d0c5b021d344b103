//! Profiling analyzers: from declared type to scored column profile.
//!
//! ## Pipeline
//!
//! - **Type Classifier** (`classifier`): declared type string to
//!   [`ProfilingStrategy`]
//! - **Pattern signatures** (`patterns`): digit runs to `#`, letter runs to `A`
//! - **Type Inference** (`inference`): majority vote over sampled value shapes
//! - **Result Interpreter** (`interpreter`): fragment rows to [`ColumnProfile`]
//! - **Quality Scorer** (`quality`): weighted penalties from 100 down to 0
//! - **Insights** (`insights`): rule-based, machine-tagged observations
//! - **Column Profiler** (`profiler`): runs the whole pipeline against a
//!   [`QueryExecutor`](crate::executor::QueryExecutor)
//!
//! ## Example Usage
//!
//! ```rust
//! use column_lens::analyzers::{ColumnProfiler, InsightEngine};
//! use column_lens::core::{ColumnDescriptor, TableRef};
//! use column_lens::executor::DataFusionExecutor;
//! use column_lens::test_fixtures::create_people_context;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let executor = DataFusionExecutor::new(create_people_context().await.unwrap());
//! let column = ColumnDescriptor::new(TableRef::new("people"), "age", "BIGINT");
//!
//! let profile = ColumnProfiler::new().profile_column(&executor, &column).await.unwrap();
//! println!("score: {:?}", profile.quality_score());
//!
//! for insight in InsightEngine::default().insights(&profile) {
//!     println!("{:?} ({:?})", insight.kind, insight.severity);
//! }
//! # })
//! ```

pub mod classifier;
pub mod inference;
pub mod insights;
pub mod interpreter;
pub mod patterns;
pub mod profile_types;
pub mod profiler;
pub mod quality;

pub use classifier::{classify, ProfilingStrategy};
pub use inference::{infer_type, InferredType, TypeInference};
pub use insights::{
    CardinalityInsightRule, CompletenessInsightRule, Insight, InsightEngine, InsightKind,
    InsightRule, InsightSeverity, NumericInsightRule, QualityInsightRule,
};
pub use interpreter::{FragmentResults, ResultInterpreter};
pub use patterns::pattern_signature;
pub use profile_types::{
    ColumnProfile, Extremes, NumericStats, PatternFrequency, Percentiles, StrategyDetails,
    TemporalStats, TextualStats, ValueFrequency,
};
pub use profiler::{ColumnProfiler, ColumnProfilerBuilder, ProfilerConfig, ProfilerProgress};
pub use quality::{
    QualityAssessment, QualityFactor, QualityScorer, Penalty, RationaleTag, ScoringWeights,
};
