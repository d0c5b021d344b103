//! Core data model: what gets profiled and what the executor hands back.

pub mod descriptor;
pub mod value;

pub use descriptor::{ColumnDescriptor, TableRef};
pub use value::{RawRow, Record, Value};
