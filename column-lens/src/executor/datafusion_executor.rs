//! In-process execution with DataFusion.

use std::collections::BTreeMap;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, LargeStringArray, StringArray, StringViewArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use async_trait::async_trait;
use datafusion::common::TableReference;
use datafusion::prelude::{SessionConfig, SessionContext};
use tracing::{debug, instrument};

use super::QueryExecutor;
use crate::core::{ColumnDescriptor, RawRow, TableRef, Value};
use crate::error::{ProfileError, Result};

/// Executes generated SQL against a DataFusion session.
#[derive(Clone)]
pub struct DataFusionExecutor {
    ctx: SessionContext,
}

impl DataFusionExecutor {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// A fresh session sized for analytical scans: one partition per CPU.
    ///
    /// Register tables through [`context`](Self::context) before profiling.
    pub fn optimized() -> Self {
        let config = SessionConfig::new()
            .with_information_schema(true)
            .with_target_partitions(num_cpus::get())
            .with_batch_size(8192);
        Self::new(SessionContext::new_with_config(config))
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Lists a registered table's columns with their Arrow types as declared types.
    ///
    /// # Errors
    ///
    /// [`ProfileError::NotFound`] when the session has no such table.
    #[instrument(skip(self), fields(table = %table))]
    pub async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        table.validate()?;
        let reference = match (&table.catalog, &table.schema) {
            (Some(catalog), Some(schema)) => {
                TableReference::full(catalog.as_str(), schema.as_str(), table.table.as_str())
            }
            (None, Some(schema)) => TableReference::partial(schema.as_str(), table.table.as_str()),
            _ => TableReference::bare(table.table.as_str()),
        };
        let provider = self
            .ctx
            .table_provider(reference)
            .await
            .map_err(|_| ProfileError::not_found(table.to_string()))?;

        let columns: Vec<ColumnDescriptor> = provider
            .schema()
            .fields()
            .iter()
            .map(|field| {
                ColumnDescriptor::new(table.clone(), field.name(), field.data_type().to_string())
            })
            .collect();
        debug!(columns = columns.len(), "Described table");
        Ok(columns)
    }
}

impl std::fmt::Debug for DataFusionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionExecutor")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

#[async_trait]
impl QueryExecutor for DataFusionExecutor {
    #[instrument(skip(self, sql))]
    async fn execute(&self, sql: &str) -> Result<Vec<RawRow>> {
        let df = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| ProfileError::execution("query", e.to_string()))?;
        let batches = df
            .collect()
            .await
            .map_err(|e| ProfileError::execution("query", e.to_string()))?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(batch_to_rows(batch)?);
        }
        debug!(rows = rows.len(), "Collected query result");
        Ok(rows)
    }
}

fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<RawRow>> {
    let schema = batch.schema();
    let mut rows: Vec<BTreeMap<String, Value>> = vec![BTreeMap::new(); batch.num_rows()];

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        for (row_idx, row) in rows.iter_mut().enumerate() {
            row.insert(field.name().clone(), cell_value(column, row_idx)?);
        }
    }

    Ok(rows.into_iter().map(RawRow::Named).collect())
}

macro_rules! downcast_int {
    ($column:expr, $idx:expr, $($array:ty),+) => {
        $(
            if let Some(arr) = $column.as_any().downcast_ref::<$array>() {
                return Ok(Value::Int(i64::from(arr.value($idx))));
            }
        )+
    };
}

fn cell_value(column: &ArrayRef, idx: usize) -> Result<Value> {
    if column.is_null(idx) || matches!(column.data_type(), DataType::Null) {
        return Ok(Value::Null);
    }

    downcast_int!(column, idx, Int8Array, Int16Array, Int32Array, Int64Array, UInt8Array, UInt16Array, UInt32Array);

    let any = column.as_any();
    if let Some(arr) = any.downcast_ref::<UInt64Array>() {
        let v = arr.value(idx);
        return Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int));
    }
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        return Ok(Value::Float(arr.value(idx)));
    }
    if let Some(arr) = any.downcast_ref::<Float32Array>() {
        return Ok(Value::Float(f64::from(arr.value(idx))));
    }
    if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        return Ok(Value::Bool(arr.value(idx)));
    }
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        return Ok(Value::Text(arr.value(idx).to_string()));
    }
    if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        return Ok(Value::Text(arr.value(idx).to_string()));
    }
    if let Some(arr) = any.downcast_ref::<StringViewArray>() {
        return Ok(Value::Text(arr.value(idx).to_string()));
    }

    // Decimals, dates and anything else go through Arrow's display formatting.
    array_value_to_string(column.as_ref(), idx)
        .map(Value::Text)
        .map_err(|e| ProfileError::execution("query", e.to_string()))
}
