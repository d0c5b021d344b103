//! Prelude for commonly used types and traits in column-lens.

pub use crate::analyzers::{
    ColumnProfile, ColumnProfiler, InsightEngine, ProfilerConfig, ProfilingStrategy,
    QualityAssessment, ScoringWeights,
};
pub use crate::core::{ColumnDescriptor, RawRow, TableRef, Value};
pub use crate::cross_column::{
    CompositeKeyCandidate, ConditionalProfile, CorrelationEntry, CrossColumnConfig,
};
pub use crate::error::{ErrorContext, ProfileError, Result};
pub use crate::executor::{DataFusionExecutor, QueryExecutor};
pub use crate::logging::LogConfig;
pub use crate::plan::{PlanBuilder, PlanOptions, QueryPlan};
pub use crate::repository::{
    FileSnapshotStore, InMemorySnapshotStore, Snapshot, SnapshotDiff, SnapshotId, SnapshotStore,
};
