//! In-memory DataFusion tables for profiling scenarios.
//!
//! - `people`: mixed column types, nulls, a duplicated code column and a
//!   column whose declared type disagrees with its values
//! - `orders`: correlated numeric columns, a composite key
//!   (`order_id`, `line_no`), a segmentation column and timestamps
//! - `sparse`: five rows with an entirely null numeric column
//! - `shifts`: shift opening times stored as a bare time of day
//! - `empty_orders`: the `orders` schema with no rows

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    Time64NanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use crate::error::Result;

fn register(ctx: &SessionContext, name: &str, schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table(name, Arc::new(table))?;
    Ok(())
}

fn people_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("code", DataType::Utf8, true),
        Field::new("age", DataType::Int64, true),
        Field::new("score", DataType::Float64, true),
        Field::new("active", DataType::Boolean, true),
        Field::new("joined", DataType::Date32, true),
        Field::new("zip", DataType::Utf8, true),
    ]))
}

/// Registers `people` (10 rows).
pub async fn create_people_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_people(&ctx)?;
    Ok(ctx)
}

fn register_people(ctx: &SessionContext) -> Result<()> {
    // 2024-01-01 is day 19723 since the epoch.
    let jan_1 = 19723;
    register(
        ctx,
        "people",
        people_schema(),
        vec![
            Arc::new(Int64Array::from((1..=10).collect::<Vec<i64>>())),
            Arc::new(StringArray::from(vec![
                Some("Alice"),
                None,
                Some("Charlie"),
                Some("David"),
                None,
                Some("Frank"),
                Some("Grace"),
                None,
                Some("Ivan"),
                Some("Jane"),
            ])),
            Arc::new(StringArray::from(vec![
                Some("A1"),
                Some("A1"),
                Some("B2"),
                Some(""),
                Some(""),
                None,
                None,
                Some("C3"),
                Some("A1"),
                Some("B2"),
            ])),
            Arc::new(Int64Array::from(vec![
                Some(25),
                Some(30),
                Some(35),
                Some(40),
                None,
                Some(28),
                None,
                Some(33),
                Some(29),
                Some(31),
            ])),
            Arc::new(Float64Array::from(vec![
                Some(85.5),
                Some(92.0),
                None,
                Some(-3.5),
                Some(0.0),
                Some(91.5),
                Some(76.0),
                None,
                Some(f64::NAN),
                Some(83.5),
            ])),
            Arc::new(BooleanArray::from(vec![
                Some(true),
                Some(false),
                Some(true),
                Some(true),
                None,
                Some(false),
                Some(true),
                Some(true),
                Some(false),
                Some(true),
            ])),
            Arc::new(Date32Array::from(vec![
                Some(jan_1),
                Some(jan_1 + 1),
                Some(jan_1 + 1),
                Some(jan_1 + 6),
                None,
                Some(jan_1 + 7),
                Some(jan_1 + 7),
                Some(jan_1 + 14),
                Some(jan_1 + 20),
                Some(jan_1 + 30),
            ])),
            Arc::new(StringArray::from(vec![
                Some("10001"),
                Some("10002"),
                Some("94105"),
                Some("94105"),
                Some("60601"),
                Some("N/A"),
                Some("02134"),
                Some("10001"),
                Some("73301"),
                Some("98101"),
            ])),
        ],
    )
}

fn orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("line_no", DataType::Int64, false),
        Field::new("customer_id", DataType::Int64, false),
        Field::new("quantity", DataType::Int64, true),
        Field::new("price", DataType::Float64, true),
        Field::new("total", DataType::Float64, true),
        Field::new("discount", DataType::Float64, true),
        Field::new("region", DataType::Utf8, true),
        Field::new(
            "created_at",
            DataType::Timestamp(TimeUnit::Second, None),
            true,
        ),
    ]))
}

/// Registers `orders` (12 rows) and `empty_orders` (0 rows).
pub async fn create_orders_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_orders(&ctx)?;
    Ok(ctx)
}

fn register_orders(ctx: &SessionContext) -> Result<()> {
    let quantity = vec![1, 2, 3, 1, 2, 1, 2, 3, 4, 1, 1, 2];
    let total: Vec<f64> = quantity.iter().map(|q| *q as f64 * 2.5).collect();

    register(
        ctx,
        "orders",
        orders_schema(),
        vec![
            Arc::new(Int64Array::from(vec![1, 1, 1, 2, 2, 3, 3, 3, 3, 4, 5, 5])),
            Arc::new(Int64Array::from(vec![1, 2, 3, 1, 2, 1, 2, 3, 4, 1, 1, 2])),
            Arc::new(Int64Array::from(vec![10, 10, 10, 20, 20, 10, 10, 10, 10, 30, 20, 20])),
            Arc::new(Int64Array::from(quantity)),
            Arc::new(Float64Array::from(vec![
                9.99, 5.0, 3.5, 12.0, 7.25, 1.0, 2.0, 3.0, 4.0, 5.5, 6.5, 8.0,
            ])),
            Arc::new(Float64Array::from(total)),
            Arc::new(Float64Array::from(vec![
                Some(0.1),
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
            ])),
            Arc::new(StringArray::from(vec![
                Some("north"),
                Some("north"),
                Some("south"),
                Some("south"),
                Some("east"),
                Some("north"),
                Some("north"),
                Some("south"),
                Some("west"),
                Some("east"),
                None,
                Some("north"),
            ])),
            Arc::new(TimestampSecondArray::from(vec![
                Some(1_704_099_600), // Monday 09:00
                Some(1_704_099_600),
                Some(1_704_103_200), // Monday 10:00
                Some(1_704_204_000), // Tuesday 14:00
                Some(1_704_204_000),
                Some(1_704_272_400), // Wednesday 09:00
                Some(1_704_272_400),
                Some(1_704_668_400), // Sunday 23:00
                Some(1_704_499_200), // Saturday 00:00
                Some(1_704_542_400), // Saturday 12:00
                None,
                Some(1_704_103_200),
            ])),
        ],
    )?;

    let schema = orders_schema();
    let empty = RecordBatch::new_empty(schema.clone());
    let table = MemTable::try_new(schema, vec![vec![empty]])?;
    ctx.register_table("empty_orders", Arc::new(table))?;
    Ok(())
}

/// Registers `sparse` (5 rows, `amount` entirely null).
pub async fn create_sparse_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_sparse(&ctx)?;
    Ok(ctx)
}

fn register_sparse(ctx: &SessionContext) -> Result<()> {
    register(
        ctx,
        "sparse",
        Arc::new(Schema::new(vec![
            Field::new("row_id", DataType::Int64, false),
            Field::new("amount", DataType::Float64, true),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
            Arc::new(Float64Array::from(vec![None, None, None, None, None] as Vec<Option<f64>>)),
        ],
    )
}

/// Registers `shifts` (6 rows, `opens_at` is `Time64(Nanosecond)`).
pub async fn create_shifts_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_shifts(&ctx)?;
    Ok(ctx)
}

fn register_shifts(ctx: &SessionContext) -> Result<()> {
    let at = |hour: i64, minute: i64| (hour * 3_600 + minute * 60) * 1_000_000_000;
    register(
        ctx,
        "shifts",
        Arc::new(Schema::new(vec![
            Field::new("shift_id", DataType::Int64, false),
            Field::new("opens_at", DataType::Time64(TimeUnit::Nanosecond), true),
        ])),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])),
            Arc::new(Time64NanosecondArray::from(vec![
                Some(at(9, 0)),
                Some(at(9, 30)),
                Some(at(17, 15)),
                None,
                Some(at(9, 0)),
                Some(at(22, 45)),
            ])),
        ],
    )
}

/// Registers every fixture table in one context.
pub async fn create_profiling_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_people(&ctx)?;
    register_orders(&ctx)?;
    register_sparse(&ctx)?;
    register_shifts(&ctx)?;
    Ok(ctx)
}
