//! # column-lens - Column Profiling for Rust
//!
//! column-lens profiles the columns of a tabular data warehouse. For each
//! selected column it computes completeness, uniqueness, value
//! distributions, pattern signatures and a composite 0-100 quality score.
//! On top of that it finds relationships between columns (correlations,
//! composite-key candidates, segmented profiles) and keeps immutable
//! snapshots of profiling runs that can be compared later.
//!
//! ## Overview
//!
//! The engine never touches data directly. It generates SQL for
//! [Apache DataFusion](https://datafusion.apache.org), hands each statement
//! to a [`QueryExecutor`](executor::QueryExecutor), and turns the rows that
//! come back into structured records:
//!
//! ```text
//! ColumnDescriptor -> classify -> QueryPlan -> executor -> ResultInterpreter
//!                  -> QualityScorer -> ColumnProfile -> SnapshotStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use column_lens::prelude::*;
//! use column_lens::test_fixtures::create_people_context;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let executor = DataFusionExecutor::new(create_people_context().await?);
//! let profiler = ColumnProfiler::builder().top_frequency_count(5).build();
//!
//! let columns = executor.describe_table(&TableRef::new("people")).await?;
//! let profiles = profiler.profile_columns(&executor, &columns).await?;
//! for profile in &profiles {
//!     println!(
//!         "{}: {:.1}% null, score {:?}",
//!         profile.column_name(),
//!         profile.null_percentage,
//!         profile.quality_score()
//!     );
//! }
//!
//! let store = InMemorySnapshotStore::new();
//! let id = store.save("baseline", profiles).await?;
//! println!("saved snapshot {id}");
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`core`**: column and table references, executor values and rows
//! - **`analyzers`**: type classification, inference, interpretation,
//!   quality scoring, insights and the [`ColumnProfiler`](analyzers::ColumnProfiler)
//! - **`plan`**: query plans and the SQL they are rendered to
//! - **`executor`**: the execution seam and its DataFusion implementation
//! - **`cross_column`**: correlation, composite keys, conditional profiles
//! - **`repository`**: snapshot stores and the snapshot differ
//! - **`security`**: identifier validation and quoting
//! - **`logging`**: `tracing` configuration helpers

pub mod analyzers;
pub mod core;
pub mod cross_column;
pub mod error;
pub mod executor;
pub mod logging;
pub mod plan;
pub mod prelude;
pub mod repository;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
