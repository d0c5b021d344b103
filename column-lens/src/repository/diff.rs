//! Structural comparison of two snapshots.
//!
//! Only drift is reported: columns with no changed field are left out of
//! `changed_columns`, and within a column only the fields that changed
//! appear.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Snapshot, SnapshotId};
use crate::analyzers::profile_types::ColumnProfile;

/// Change in one numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarDelta {
    pub before: f64,
    pub after: f64,
    /// `after - before`
    pub delta: f64,
}

/// Change in one textual field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Members gained and lost between two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SetDelta {
    fn between<'a>(before: impl Iterator<Item = &'a str>, after: impl Iterator<Item = &'a str>) -> Self {
        let before: BTreeSet<&str> = before.collect();
        let after: BTreeSet<&str> = after.collect();
        Self {
            added: after.difference(&before).map(|s| s.to_string()).collect(),
            removed: before.difference(&after).map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Field-level changes for a column present in both snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDelta {
    pub scalars: BTreeMap<String, ScalarDelta>,
    pub text_changes: BTreeMap<String, TextChange>,
    /// Pattern signatures
    pub patterns: SetDelta,
    /// Most frequent values
    pub top_values: SetDelta,
}

impl ColumnDelta {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.text_changes.is_empty()
            && self.patterns.is_empty()
            && self.top_values.is_empty()
    }

    fn scalar(&mut self, field: &str, before: f64, after: f64) {
        if before != after {
            self.scalars.insert(
                field.to_string(),
                ScalarDelta {
                    before,
                    after,
                    delta: after - before,
                },
            );
        }
    }

    fn optional_scalar(&mut self, field: &str, before: Option<f64>, after: Option<f64>) {
        if let (Some(before), Some(after)) = (before, after) {
            self.scalar(field, before, after);
        }
    }

    fn text(&mut self, field: &str, before: Option<String>, after: Option<String>) {
        if before != after {
            self.text_changes
                .insert(field.to_string(), TextChange { before, after });
        }
    }
}

/// Differences between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub from: SnapshotId,
    pub to: SnapshotId,
    /// Columns only in `to`
    pub added_columns: Vec<String>,
    /// Columns only in `from`
    pub removed_columns: Vec<String>,
    pub changed_columns: BTreeMap<String, ColumnDelta>,
}

impl SnapshotDiff {
    pub fn between(from: &Snapshot, to: &Snapshot) -> Self {
        let added_columns = to
            .profiles
            .keys()
            .filter(|k| !from.profiles.contains_key(*k))
            .cloned()
            .collect();
        let removed_columns = from
            .profiles
            .keys()
            .filter(|k| !to.profiles.contains_key(*k))
            .cloned()
            .collect();

        let changed_columns = from
            .profiles
            .iter()
            .filter_map(|(column, before)| {
                let after = to.profiles.get(column)?;
                let delta = diff_profiles(before, after);
                (!delta.is_empty()).then(|| (column.clone(), delta))
            })
            .collect();

        Self {
            from: from.id.clone(),
            to: to.id.clone(),
            added_columns,
            removed_columns,
            changed_columns,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.added_columns.is_empty()
            || !self.removed_columns.is_empty()
            || !self.changed_columns.is_empty()
    }
}

/// Compares two profiles of the same column.
pub fn diff_profiles(before: &ColumnProfile, after: &ColumnProfile) -> ColumnDelta {
    let mut delta = ColumnDelta::default();

    delta.scalar("total_rows", before.total_rows as f64, after.total_rows as f64);
    delta.scalar("non_null_count", before.non_null_count as f64, after.non_null_count as f64);
    delta.scalar("null_count", before.null_count as f64, after.null_count as f64);
    delta.scalar("distinct_count", before.distinct_count as f64, after.distinct_count as f64);
    delta.scalar("null_percentage", before.null_percentage, after.null_percentage);
    delta.scalar("distinct_percentage", before.distinct_percentage, after.distinct_percentage);
    delta.scalar("type_confidence", before.type_confidence, after.type_confidence);
    delta.optional_scalar(
        "quality_score",
        before.quality_score().map(f64::from),
        after.quality_score().map(f64::from),
    );

    if let (Some(b), Some(a)) = (before.numeric(), after.numeric()) {
        delta.scalar("numeric.min", b.min, a.min);
        delta.scalar("numeric.max", b.max, a.max);
        delta.scalar("numeric.mean", b.mean, a.mean);
        delta.scalar("numeric.stddev", b.stddev, a.stddev);
        delta.scalar("numeric.p25", b.percentiles.p25, a.percentiles.p25);
        delta.scalar("numeric.p50", b.percentiles.p50, a.percentiles.p50);
        delta.scalar("numeric.p75", b.percentiles.p75, a.percentiles.p75);
        delta.scalar("numeric.p95", b.percentiles.p95, a.percentiles.p95);
        delta.scalar("numeric.p99", b.percentiles.p99, a.percentiles.p99);
        delta.scalar("numeric.zero_count", b.zero_count as f64, a.zero_count as f64);
        delta.scalar("numeric.negative_count", b.negative_count as f64, a.negative_count as f64);
        delta.scalar(
            "numeric.non_finite_count",
            b.non_finite_count as f64,
            a.non_finite_count as f64,
        );
    }

    if let (Some(b), Some(a)) = (before.textual(), after.textual()) {
        delta.scalar("length.min", b.min_length as f64, a.min_length as f64);
        delta.scalar("length.max", b.max_length as f64, a.max_length as f64);
        delta.scalar("length.avg", b.avg_length, a.avg_length);
        delta.scalar("length.median", b.median_length, a.median_length);
    }

    delta.text(
        "declared_type",
        Some(before.descriptor.declared_type.clone()),
        Some(after.descriptor.declared_type.clone()),
    );
    delta.text(
        "inferred_type",
        Some(before.inferred_type.type_name().to_string()),
        Some(after.inferred_type.type_name().to_string()),
    );
    if let (Some(b), Some(a)) = (before.temporal(), after.temporal()) {
        delta.text("temporal.min_timestamp", b.min_timestamp.clone(), a.min_timestamp.clone());
        delta.text("temporal.max_timestamp", b.max_timestamp.clone(), a.max_timestamp.clone());
    }

    delta.patterns = SetDelta::between(
        before.patterns.iter().map(|p| p.signature.as_str()),
        after.patterns.iter().map(|p| p.signature.as_str()),
    );
    delta.top_values = SetDelta::between(
        before.top_values.iter().map(|v| v.value.as_str()),
        after.top_values.iter().map(|v| v.value.as_str()),
    );

    delta
}
