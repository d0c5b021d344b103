//! Segmented profiles: one profile of a target column per value of a
//! segmentation column.
//!
//! Segments are discovered with one grouping query (null segment values are
//! skipped, largest segments first). Each segment is then profiled with a
//! plan whose source is filtered to that segment's rows, so the ordinary
//! interpreter applies unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzers::profile_types::ColumnProfile;
use crate::core::{ColumnDescriptor, RawRow};
use crate::error::Result;
use crate::security::SqlSecurity;

pub const SEGMENT_FIELD: &str = "segment";
pub const ROW_COUNT_FIELD: &str = "row_count";

/// The profile of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub segment: String,
    /// Rows in the segment
    pub sample_size: u64,
    /// Set when the segment is smaller than the configured minimum
    pub low_confidence: bool,
    pub profile: ColumnProfile,
}

/// A target column profiled once per segment value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalProfile {
    pub segment_column: String,
    pub target: ColumnDescriptor,
    pub segments: BTreeMap<String, SegmentProfile>,
}

impl ConditionalProfile {
    pub fn segment(&self, value: &str) -> Option<&SegmentProfile> {
        self.segments.get(value)
    }

    pub fn low_confidence_segments(&self) -> impl Iterator<Item = &SegmentProfile> {
        self.segments.values().filter(|s| s.low_confidence)
    }
}

/// Lists the `max_segments` largest non-null segments of `segment_column`
/// in the target's table.
pub fn segment_query(
    target: &ColumnDescriptor,
    segment_column: &str,
    max_segments: usize,
) -> Result<String> {
    let segment = SqlSecurity::escape_identifier(segment_column)?;
    Ok(format!(
        "SELECT CAST({segment} AS VARCHAR) AS {SEGMENT_FIELD}, COUNT(*) AS {ROW_COUNT_FIELD} \
         FROM {} WHERE {segment} IS NOT NULL \
         GROUP BY CAST({segment} AS VARCHAR) \
         ORDER BY {ROW_COUNT_FIELD} DESC, {SEGMENT_FIELD} ASC LIMIT {max_segments}",
        target.table.to_sql()?
    ))
}

/// Reads `(segment, row_count)` pairs, skipping rows without a segment.
pub fn read_segments(rows: &[RawRow]) -> Vec<(String, u64)> {
    let fields = [SEGMENT_FIELD.to_string(), ROW_COUNT_FIELD.to_string()];
    rows.iter()
        .filter_map(|row| {
            let record = row.normalize(&fields);
            let segment = record.text(SEGMENT_FIELD)?;
            Some((segment, record.count(ROW_COUNT_FIELD)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TableRef, Value};

    #[test]
    fn test_segment_query_shape() {
        let target = ColumnDescriptor::new(TableRef::new("orders"), "quantity", "BIGINT");
        let sql = segment_query(&target, "region", 5).unwrap();
        assert!(sql.starts_with(r#"SELECT CAST("region" AS VARCHAR) AS segment"#));
        assert!(sql.contains(r#"FROM "orders" WHERE "region" IS NOT NULL"#));
        assert!(sql.ends_with("ORDER BY row_count DESC, segment ASC LIMIT 5"));

        assert!(segment_query(&target, "region; --", 5).is_err());
    }

    #[test]
    fn test_read_segments_accepts_both_row_shapes() {
        let rows = vec![
            RawRow::named([("segment", Value::from("north")), ("row_count", Value::Int(5))]),
            RawRow::Positional(vec![Value::from("south"), Value::from("3")]),
            RawRow::Positional(vec![Value::Null, Value::Int(2)]),
        ];
        assert_eq!(
            read_segments(&rows),
            vec![("north".to_string(), 5), ("south".to_string(), 3)]
        );
    }
}
