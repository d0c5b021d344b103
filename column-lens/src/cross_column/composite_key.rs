//! Composite-key candidacy.
//!
//! A subset of columns is a key candidate in proportion to how many rows it
//! tells apart: `ratio = distinct combinations / total rows`. Subsets are
//! tested smallest first and the search escalates to larger subsets only
//! while no tested subset reaches ratio 1.0.

use serde::{Deserialize, Serialize};

use crate::core::{RawRow, TableRef};
use crate::error::{ProfileError, Result};
use crate::security::SqlSecurity;

/// Ratio at which a candidate is flagged as a likely key despite a few
/// duplicate rows.
pub const POTENTIAL_KEY_RATIO: f64 = 0.999;

pub const TOTAL_ROWS_FIELD: &str = "total_rows";
pub const DISTINCT_ROWS_FIELD: &str = "distinct_rows";

/// A ranked column subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeKeyCandidate {
    /// Column names in declared order
    pub columns: Vec<String>,
    /// Distinct combinations over total rows, in (0, 1]
    pub ratio: f64,
    pub distinct_rows: u64,
    pub total_rows: u64,
    /// 1-based position after ranking
    pub rank: usize,
    pub is_unique: bool,
    pub is_potential_key: bool,
}

/// Distinct-row count measured for one subset of column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetMeasurement {
    /// Ascending positions into the declared column list
    pub positions: Vec<usize>,
    pub distinct_rows: u64,
}

pub fn row_count_query(table: &TableRef) -> Result<String> {
    Ok(format!(
        "SELECT COUNT(*) AS {TOTAL_ROWS_FIELD} FROM {}",
        table.to_sql()?
    ))
}

/// Counts distinct combinations of `columns`; null is a value of its own.
pub fn distinct_rows_query(table: &TableRef, columns: &[&str]) -> Result<String> {
    if columns.is_empty() {
        return Err(ProfileError::invalid_descriptor(
            "composite key subset must name at least one column",
        ));
    }
    let quoted = columns
        .iter()
        .map(|c| SqlSecurity::escape_identifier(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "SELECT COUNT(*) AS {DISTINCT_ROWS_FIELD} FROM (SELECT DISTINCT {} FROM {}) AS combos",
        quoted.join(", "),
        table.to_sql()?
    ))
}

/// Reads a single-row count result.
pub fn read_count(rows: &[RawRow], field: &str) -> u64 {
    let fields = [field.to_string()];
    rows.first()
        .map(|row| row.normalize(&fields).count(field))
        .unwrap_or(0)
}

/// The first `limit` subsets of `size` positions out of `width`, in
/// lexicographic order.
pub fn candidate_subsets(width: usize, size: usize, limit: usize) -> Vec<Vec<usize>> {
    let mut subsets = Vec::new();
    if size == 0 || size > width {
        return subsets;
    }

    let mut current: Vec<usize> = (0..size).collect();
    while subsets.len() < limit {
        subsets.push(current.clone());

        // Advance to the next combination.
        let Some(pivot) = (0..size).rev().find(|&i| current[i] < width - size + i) else {
            break;
        };
        current[pivot] += 1;
        for i in (pivot + 1)..size {
            current[i] = current[i - 1] + 1;
        }
    }
    subsets
}

/// Ranks measured subsets.
///
/// Fully unique subsets come first, then higher ratios, then fewer columns,
/// then declared column order. Subsets with no rows to tell apart are
/// dropped; an empty table yields no candidates.
pub fn rank_candidates(
    columns: &[String],
    total_rows: u64,
    measurements: Vec<SubsetMeasurement>,
    max_candidates: usize,
) -> Vec<CompositeKeyCandidate> {
    if total_rows == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(SubsetMeasurement, f64, bool)> = measurements
        .into_iter()
        .filter(|m| m.distinct_rows > 0 && m.positions.iter().all(|&p| p < columns.len()))
        .map(|m| {
            let distinct = m.distinct_rows.min(total_rows);
            let is_unique = distinct == total_rows;
            let ratio = distinct as f64 / total_rows as f64;
            (m, ratio, is_unique)
        })
        .collect();

    scored.sort_by(|(a, ratio_a, unique_a), (b, ratio_b, unique_b)| {
        unique_b
            .cmp(unique_a)
            .then(ratio_b.total_cmp(ratio_a))
            .then(a.positions.len().cmp(&b.positions.len()))
            .then(a.positions.cmp(&b.positions))
    });
    scored.dedup_by(|(a, ..), (b, ..)| a.positions == b.positions);

    scored
        .into_iter()
        .take(max_candidates)
        .enumerate()
        .map(|(i, (m, ratio, is_unique))| CompositeKeyCandidate {
            columns: m.positions.iter().map(|&p| columns[p].clone()).collect(),
            ratio,
            distinct_rows: m.distinct_rows.min(total_rows),
            total_rows,
            rank: i + 1,
            is_unique,
            is_potential_key: ratio >= POTENTIAL_KEY_RATIO,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn measured(positions: &[usize], distinct_rows: u64) -> SubsetMeasurement {
        SubsetMeasurement {
            positions: positions.to_vec(),
            distinct_rows,
        }
    }

    #[test]
    fn test_candidate_subsets_are_lexicographic_and_bounded() {
        assert_eq!(
            candidate_subsets(4, 2, 100),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(candidate_subsets(4, 2, 2), vec![vec![0, 1], vec![0, 2]]);
        assert_eq!(candidate_subsets(3, 3, 10), vec![vec![0, 1, 2]]);
        assert!(candidate_subsets(2, 3, 10).is_empty());
    }

    #[test]
    fn test_unique_subset_outranks_larger_ratio_partials() {
        let ranked = rank_candidates(
            &cols(&["a", "b", "c"]),
            100,
            vec![measured(&[0], 99), measured(&[1, 2], 100), measured(&[0, 1], 100)],
            10,
        );
        assert_eq!(ranked[0].columns, cols(&["a", "b"]));
        assert_eq!(ranked[0].rank, 1);
        assert!(ranked[0].is_unique);
        assert_eq!(ranked[1].columns, cols(&["b", "c"]));
        assert_eq!(ranked[2].columns, cols(&["a"]));
        assert!(!ranked[2].is_unique);
        assert!(!ranked[2].is_potential_key);
    }

    #[test]
    fn test_ties_prefer_fewer_columns() {
        let ranked = rank_candidates(
            &cols(&["a", "b", "c"]),
            10,
            vec![measured(&[0, 1], 8), measured(&[2], 8)],
            10,
        );
        assert_eq!(ranked[0].columns, cols(&["c"]));
        assert!((ranked[0].ratio - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_truncates_and_handles_empty_tables() {
        let measurements: Vec<_> = (0..5).map(|i| measured(&[i], 3)).collect();
        let ranked = rank_candidates(&cols(&["a", "b", "c", "d", "e"]), 10, measurements.clone(), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].rank, 2);

        assert!(rank_candidates(&cols(&["a", "b", "c", "d", "e"]), 0, measurements, 10).is_empty());
    }

    #[test]
    fn test_distinct_rows_query() {
        let sql = distinct_rows_query(&TableRef::new("orders"), &["order_id", "line_no"]).unwrap();
        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS distinct_rows FROM (SELECT DISTINCT "order_id", "line_no" FROM "orders") AS combos"#
        );
        assert!(distinct_rows_query(&TableRef::new("orders"), &[]).is_err());
        assert!(distinct_rows_query(&TableRef::new("orders"), &["a; DROP TABLE x"]).is_err());
    }
}
