//! Relationships between columns of one table.
//!
//! Three independent analyses run over already-profiled columns:
//!
//! - [`correlation`]: Pearson coefficients for every pair of numeric columns,
//!   computed from a paired-values row set fetched by the executor.
//! - [`composite_key`]: which column subsets identify rows, testing single
//!   columns first and escalating to larger subsets only while nothing is
//!   fully unique.
//! - [`conditional`]: one profile of a target column per value of a
//!   segmentation column.
//!
//! The SQL for each analysis and the pure reductions live here; the
//! end-to-end drivers are on
//! [`ColumnProfiler`](crate::analyzers::profiler::ColumnProfiler).

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

pub mod composite_key;
pub mod conditional;
pub mod correlation;

pub use composite_key::{CompositeKeyCandidate, SubsetMeasurement};
pub use conditional::{ConditionalProfile, SegmentProfile};
pub use correlation::{CorrelationEntry, CorrelationStrength};

/// Tuning for the cross-column analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossColumnConfig {
    /// Pairs with fewer joint non-null observations are left out
    pub min_joint_samples: usize,
    /// Row cap for the paired-values query; `None` reads the whole table
    pub max_paired_rows: Option<u64>,
    /// Largest column subset tested for key candidacy
    pub max_subset_size: usize,
    /// Subsets tested per subset size
    pub max_subsets_per_level: usize,
    /// Candidates kept after ranking
    pub max_candidates: usize,
    /// Segments smaller than this are flagged low-confidence
    pub min_segment_rows: u64,
    /// Largest segments kept, by row count
    pub max_segments: usize,
}

impl Default for CrossColumnConfig {
    fn default() -> Self {
        Self {
            min_joint_samples: 2,
            max_paired_rows: None,
            max_subset_size: 3,
            max_subsets_per_level: 64,
            max_candidates: 10,
            min_segment_rows: 30,
            max_segments: 20,
        }
    }
}

impl CrossColumnConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_joint_samples < 2 {
            return Err(ProfileError::Configuration(
                "min_joint_samples must be at least 2".to_string(),
            ));
        }
        if self.max_subset_size == 0 {
            return Err(ProfileError::Configuration(
                "max_subset_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_joint_samples(mut self, samples: usize) -> Self {
        self.min_joint_samples = samples;
        self
    }

    pub fn max_paired_rows(mut self, rows: u64) -> Self {
        self.max_paired_rows = Some(rows);
        self
    }

    pub fn max_subset_size(mut self, size: usize) -> Self {
        self.max_subset_size = size;
        self
    }

    pub fn max_candidates(mut self, count: usize) -> Self {
        self.max_candidates = count;
        self
    }

    pub fn min_segment_rows(mut self, rows: u64) -> Self {
        self.min_segment_rows = rows;
        self
    }

    pub fn max_segments(mut self, count: usize) -> Self {
        self.max_segments = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CrossColumnConfig::from_json_str(r#"{"max_candidates": 3}"#).unwrap();
        assert_eq!(config.max_candidates, 3);
        assert_eq!(config.min_joint_samples, 2);
        assert_eq!(config.max_segments, 20);
    }

    #[test]
    fn test_rejects_single_sample_correlation() {
        let err = CrossColumnConfig::from_json_str(r#"{"min_joint_samples": 1}"#).unwrap_err();
        assert!(matches!(err, ProfileError::Configuration(_)));
    }
}
