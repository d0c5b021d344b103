//! Value-shape type inference.
//!
//! The declared type of a column is not trusted: each sampled value is
//! matched against a fixed set of shapes and the column is assigned the
//! majority shape. Confidence is the fraction of samples that agree with the
//! majority.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::ProfilingStrategy;

/// The shape observed in sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredType {
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Text,
    /// No samples were available.
    Unknown,
}

impl InferredType {
    pub fn type_name(&self) -> &'static str {
        match self {
            InferredType::Integer => "integer",
            InferredType::Decimal => "decimal",
            InferredType::Boolean => "boolean",
            InferredType::Date => "date",
            InferredType::Timestamp => "timestamp",
            InferredType::Text => "text",
            InferredType::Unknown => "unknown",
        }
    }

    /// The strategy a column of this shape would be profiled with.
    ///
    /// `None` for [`InferredType::Unknown`], which carries no evidence.
    pub fn strategy(&self) -> Option<ProfilingStrategy> {
        match self {
            InferredType::Integer | InferredType::Decimal => Some(ProfilingStrategy::Numeric),
            InferredType::Boolean => Some(ProfilingStrategy::Boolean),
            InferredType::Date | InferredType::Timestamp => Some(ProfilingStrategy::Temporal),
            InferredType::Text => Some(ProfilingStrategy::Textual),
            InferredType::Unknown => None,
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Outcome of the majority vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeInference {
    pub inferred_type: InferredType,
    /// Fraction of samples matching the majority shape, in [0, 1].
    pub confidence: f64,
}

struct ShapePatterns {
    integer: Regex,
    decimal: Regex,
    boolean: Regex,
    date: Regex,
    timestamp: Regex,
}

// Patterns are compile-time constants known to be valid.
#[allow(clippy::expect_used)]
static PATTERNS: Lazy<ShapePatterns> = Lazy::new(|| ShapePatterns {
    integer: Regex::new(r"^[+-]?\d+$").expect("valid integer pattern"),
    decimal: Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+(\.\d*)?[eE][+-]?\d+)$")
        .expect("valid decimal pattern"),
    boolean: Regex::new(r"(?i)^(true|false)$").expect("valid boolean pattern"),
    date: Regex::new(r"^\d{4}-\d{2}-\d{2}$|^\d{1,2}/\d{1,2}/\d{4}$").expect("valid date pattern"),
    timestamp: Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$")
        .expect("valid timestamp pattern"),
});

/// Classifies the shape of one non-null value.
pub fn detect_shape(value: &str) -> InferredType {
    let value = value.trim();
    let patterns = &*PATTERNS;

    if patterns.integer.is_match(value) {
        InferredType::Integer
    } else if patterns.decimal.is_match(value) {
        InferredType::Decimal
    } else if patterns.boolean.is_match(value) {
        InferredType::Boolean
    } else if patterns.timestamp.is_match(value) {
        InferredType::Timestamp
    } else if patterns.date.is_match(value) {
        InferredType::Date
    } else {
        InferredType::Text
    }
}

/// Runs the majority vote over sampled non-null values.
///
/// Ties go to the shape that sorts first in [`InferredType`] order, so the
/// outcome never depends on sample order. An empty sample is
/// [`InferredType::Unknown`] with confidence 1.0: no evidence means no
/// inconsistency.
pub fn infer_type<S: AsRef<str>>(samples: &[S]) -> TypeInference {
    if samples.is_empty() {
        return TypeInference {
            inferred_type: InferredType::Unknown,
            confidence: 1.0,
        };
    }

    let mut votes: BTreeMap<InferredType, usize> = BTreeMap::new();
    for sample in samples {
        *votes.entry(detect_shape(sample.as_ref())).or_insert(0) += 1;
    }

    let (inferred_type, count) = votes
        .into_iter()
        .fold((InferredType::Unknown, 0), |best, (shape, count)| {
            if count > best.1 {
                (shape, count)
            } else {
                best
            }
        });

    TypeInference {
        inferred_type,
        confidence: count as f64 / samples.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_shape() {
        assert_eq!(detect_shape("42"), InferredType::Integer);
        assert_eq!(detect_shape("-7"), InferredType::Integer);
        assert_eq!(detect_shape("3.14"), InferredType::Decimal);
        assert_eq!(detect_shape("1e5"), InferredType::Decimal);
        assert_eq!(detect_shape("TRUE"), InferredType::Boolean);
        assert_eq!(detect_shape("2024-01-15"), InferredType::Date);
        assert_eq!(detect_shape("1/5/2024"), InferredType::Date);
        assert_eq!(detect_shape("2024-01-15 10:30:00"), InferredType::Timestamp);
        assert_eq!(detect_shape("2024-01-15T10:30:00.123Z"), InferredType::Timestamp);
        assert_eq!(detect_shape("hello"), InferredType::Text);
        assert_eq!(detect_shape(""), InferredType::Text);
        assert_eq!(detect_shape("12abc"), InferredType::Text);
    }

    #[test]
    fn test_majority_vote() {
        let result = infer_type(&["1", "2", "3", "x"]);
        assert_eq!(result.inferred_type, InferredType::Integer);
        assert!((result.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_tie_breaks_on_shape_order() {
        let a = infer_type(&["1", "x"]);
        let b = infer_type(&["x", "1"]);
        assert_eq!(a, b);
        assert_eq!(a.inferred_type, InferredType::Integer);
        assert!((a.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sample() {
        let empty: [&str; 0] = [];
        let result = infer_type(&empty);
        assert_eq!(result.inferred_type, InferredType::Unknown);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.inferred_type.strategy(), None);
    }

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(InferredType::Decimal.strategy(), Some(ProfilingStrategy::Numeric));
        assert_eq!(InferredType::Date.strategy(), Some(ProfilingStrategy::Temporal));
        assert_eq!(InferredType::Text.strategy(), Some(ProfilingStrategy::Textual));
    }
}
