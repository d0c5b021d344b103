//! The query-execution seam.
//!
//! The engine only generates SQL; something else runs it. [`QueryExecutor`]
//! is that boundary. [`DataFusionExecutor`] runs queries in-process against
//! a DataFusion `SessionContext`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::RawRow;
use crate::error::Result;

mod datafusion_executor;

pub use datafusion_executor::DataFusionExecutor;

/// Runs one generated query and returns its rows.
///
/// Failures should be reported as
/// [`ProfileError::ExecutionFailure`](crate::error::ProfileError::ExecutionFailure)
/// carrying the engine's diagnostic verbatim. The profiler never retries;
/// timeouts and cancellation are the caller's concern.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<RawRow>>;
}

#[async_trait]
impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    async fn execute(&self, sql: &str) -> Result<Vec<RawRow>> {
        (**self).execute(sql).await
    }
}
