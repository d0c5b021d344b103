//! Pearson correlation between numeric columns.
//!
//! The executor fetches one paired-values row set (every numeric column cast
//! to `DOUBLE`, one row per table row). Each unordered pair of columns is then
//! reduced over the rows where both values are present and finite. Self-pairs
//! are never computed and each pair is reported once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::ProfilingStrategy;
use crate::analyzers::profile_types::ColumnProfile;
use crate::core::{ColumnDescriptor, RawRow, TableRef};
use crate::error::{ProfileError, Result};
use crate::security::SqlSecurity;

/// Qualitative reading of |r|.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    pub fn from_coefficient(coefficient: f64) -> Self {
        match coefficient.abs() {
            r if r >= 0.8 => Self::VeryStrong,
            r if r >= 0.6 => Self::Strong,
            r if r >= 0.4 => Self::Moderate,
            r if r >= 0.2 => Self::Weak,
            _ => Self::VeryWeak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryWeak => "very_weak",
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very_strong",
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One off-diagonal cell of the correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub column_a: String,
    pub column_b: String,
    /// Pearson coefficient in [-1, 1]
    pub coefficient: f64,
    /// Joint observations the coefficient was computed from
    pub sample_size: u64,
    pub strength: CorrelationStrength,
}

/// Field name of the `index`-th column in the paired-values query.
pub fn paired_field(index: usize) -> String {
    format!("v{index}")
}

/// The profiled columns eligible for correlation, in input order.
pub fn numeric_columns(profiles: &[ColumnProfile]) -> Vec<&ColumnDescriptor> {
    profiles
        .iter()
        .filter(|p| p.strategy() == ProfilingStrategy::Numeric)
        .map(|p| &p.descriptor)
        .collect()
}

/// `SELECT CAST(a AS DOUBLE) AS v0, ... FROM table [LIMIT n]`.
pub fn paired_values_query(
    table: &TableRef,
    columns: &[&ColumnDescriptor],
    max_rows: Option<u64>,
) -> Result<String> {
    if columns.is_empty() {
        return Err(ProfileError::invalid_descriptor(
            "paired-values query needs at least one column",
        ));
    }

    let mut projections = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        if &column.table != table {
            return Err(ProfileError::invalid_descriptor(format!(
                "column '{}' is not in table '{table}'",
                column.qualified_name()
            )));
        }
        projections.push(format!(
            "CAST({} AS DOUBLE) AS {}",
            SqlSecurity::escape_identifier(&column.column)?,
            paired_field(i)
        ));
    }

    let mut sql = format!("SELECT {} FROM {}", projections.join(", "), table.to_sql()?);
    if let Some(limit) = max_rows {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(sql)
}

/// Reads paired-values rows into per-row vectors of finite values.
///
/// NaN and infinities read as missing.
pub fn read_paired_rows(rows: &[RawRow], width: usize) -> Vec<Vec<Option<f64>>> {
    let fields: Vec<String> = (0..width).map(paired_field).collect();
    rows.iter()
        .map(|row| {
            let record = row.normalize(&fields);
            fields
                .iter()
                .map(|f| record.float(f).filter(|v| v.is_finite()))
                .collect()
        })
        .collect()
}

/// Computes every unordered pair `(i, j)`, `i < j`, with at least
/// `min_joint_samples` joint observations.
pub fn correlation_matrix(
    columns: &[String],
    rows: &[Vec<Option<f64>>],
    min_joint_samples: usize,
) -> Vec<CorrelationEntry> {
    let mut entries = Vec::new();
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let pairs: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|row| match (row.get(i).copied().flatten(), row.get(j).copied().flatten()) {
                    (Some(x), Some(y)) => Some((x, y)),
                    _ => None,
                })
                .collect();
            if pairs.len() < min_joint_samples.max(2) {
                continue;
            }

            let coefficient = pearson(&pairs);
            entries.push(CorrelationEntry {
                column_a: columns[i].clone(),
                column_b: columns[j].clone(),
                coefficient,
                sample_size: pairs.len() as u64,
                strength: CorrelationStrength::from_coefficient(coefficient),
            });
        }
    }
    entries
}

/// Mean-centred Pearson coefficient.
///
/// A constant series has no defined correlation; it reads as 0.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (sxy / denominator).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_perfect_positive_and_negative() {
        let rows: Vec<Vec<Option<f64>>> = (1..=5)
            .map(|i| vec![Some(i as f64), Some(i as f64 * 2.0), Some(-(i as f64))])
            .collect();
        let entries = correlation_matrix(&names(&["a", "b", "c"]), &rows, 2);
        assert_eq!(entries.len(), 3);

        let ab = &entries[0];
        assert_eq!((ab.column_a.as_str(), ab.column_b.as_str()), ("a", "b"));
        assert!((ab.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(ab.strength, CorrelationStrength::VeryStrong);
        assert_eq!(ab.sample_size, 5);

        let ac = &entries[1];
        assert!((ac.coefficient + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pair_with_one_joint_row_is_excluded() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(2.0), None],
            vec![None, Some(30.0)],
        ];
        assert!(correlation_matrix(&names(&["a", "b"]), &rows, 2).is_empty());
    }

    #[test]
    fn test_constant_series_reads_zero() {
        let rows: Vec<Vec<Option<f64>>> = (0..4).map(|i| vec![Some(7.0), Some(i as f64)]).collect();
        let entries = correlation_matrix(&names(&["flat", "x"]), &rows, 2);
        assert_eq!(entries[0].coefficient, 0.0);
        assert_eq!(entries[0].strength, CorrelationStrength::VeryWeak);
    }

    #[test]
    fn test_strength_boundaries() {
        assert_eq!(CorrelationStrength::from_coefficient(-0.8), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::from_coefficient(0.79), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::from_coefficient(0.4), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::from_coefficient(0.2), CorrelationStrength::Weak);
        assert_eq!(CorrelationStrength::from_coefficient(0.19), CorrelationStrength::VeryWeak);
    }

    #[test]
    fn test_non_finite_values_read_as_missing() {
        let rows = vec![
            RawRow::Positional(vec![Value::Float(f64::NAN), Value::Float(1.0)]),
            RawRow::named([("v0", Value::Text("2.5".into())), ("v1", Value::Null)]),
        ];
        let read = read_paired_rows(&rows, 2);
        assert_eq!(read[0], vec![None, Some(1.0)]);
        assert_eq!(read[1], vec![Some(2.5), None]);
    }

    #[test]
    fn test_paired_values_query() {
        let table = TableRef::new("orders");
        let a = ColumnDescriptor::new(table.clone(), "price", "DOUBLE");
        let b = ColumnDescriptor::new(table.clone(), "qty", "BIGINT");
        let sql = paired_values_query(&table, &[&a, &b], Some(500)).unwrap();
        assert_eq!(
            sql,
            r#"SELECT CAST("price" AS DOUBLE) AS v0, CAST("qty" AS DOUBLE) AS v1 FROM "orders" LIMIT 500"#
        );

        let other = ColumnDescriptor::new(TableRef::new("customers"), "age", "INT");
        assert!(matches!(
            paired_values_query(&table, &[&a, &other], None),
            Err(ProfileError::InvalidDescriptor { .. })
        ));
    }
}
