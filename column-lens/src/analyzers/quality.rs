//! Weighted-penalty quality scoring.
//!
//! A profile starts at 100 points. Each applicable factor deducts points and
//! is recorded with its exact deduction and a machine-usable rationale tag,
//! so consumers can explain a score without recomputing it.

use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::ProfilingStrategy;
use crate::analyzers::profile_types::ColumnProfile;
use crate::error::{ProfileError, Result};

const IDENTIFIER_TOKENS: &[&str] = &["id", "key", "uuid", "guid"];

/// Tunable penalty weights and caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Points per percentage point of nulls
    pub completeness_weight: f64,
    pub completeness_cap: f64,
    /// Points per percentage point of distinct shortfall
    pub uniqueness_weight: f64,
    pub uniqueness_cap: f64,
    /// Shortfall (in percentage points) below which uniqueness is not penalized
    pub uniqueness_tolerance: f64,
    /// Baseline distinct percentage from which uniqueness becomes expected
    pub expected_unique_baseline: f64,
    /// Points deducted when no sampled value agrees with the majority shape
    pub type_consistency_weight: f64,
    pub schema_alignment_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            completeness_weight: 0.4,
            completeness_cap: 40.0,
            uniqueness_weight: 0.5,
            uniqueness_cap: 20.0,
            uniqueness_tolerance: 1.0,
            expected_unique_baseline: 99.0,
            type_consistency_weight: 20.0,
            schema_alignment_penalty: 10.0,
        }
    }
}

impl ScoringWeights {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let weights: Self = serde_json::from_str(json)?;
        weights.validate()?;
        Ok(weights)
    }

    /// Rejects negative or non-finite weights.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("completeness_weight", self.completeness_weight),
            ("completeness_cap", self.completeness_cap),
            ("uniqueness_weight", self.uniqueness_weight),
            ("uniqueness_cap", self.uniqueness_cap),
            ("uniqueness_tolerance", self.uniqueness_tolerance),
            ("expected_unique_baseline", self.expected_unique_baseline),
            ("type_consistency_weight", self.type_consistency_weight),
            ("schema_alignment_penalty", self.schema_alignment_penalty),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ProfileError::Configuration(format!(
                    "scoring weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// The scoring factors, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFactor {
    Completeness,
    Uniqueness,
    TypeConsistency,
    SchemaAlignment,
}

/// Why a factor deducted points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RationaleTag {
    NullsPresent,
    /// The completeness deduction hit its cap.
    NullsSaturated,
    IdentifierNotUnique,
    MixedValueShapes,
    DeclaredTypeMismatch,
}

/// One applied deduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub factor: QualityFactor,
    pub points: f64,
    pub rationale: RationaleTag,
}

/// Overall score plus the deductions that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0 to 100
    pub score: u32,
    pub penalties: Vec<Penalty>,
}

impl QualityAssessment {
    pub fn total_penalty(&self) -> f64 {
        self.penalties.iter().map(|p| p.points).sum()
    }

    pub fn penalty_for(&self, factor: QualityFactor) -> Option<&Penalty> {
        self.penalties.iter().find(|p| p.factor == factor)
    }
}

/// Deterministic scorer for column profiles.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: ScoringWeights,
}

impl QualityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores a profile on its own.
    pub fn score(&self, profile: &ColumnProfile) -> QualityAssessment {
        self.score_with_baseline(profile, None)
    }

    /// Scores a profile, using an earlier profile of the same column (for
    /// example from a snapshot) to decide whether uniqueness is expected.
    pub fn score_with_baseline(
        &self,
        profile: &ColumnProfile,
        baseline: Option<&ColumnProfile>,
    ) -> QualityAssessment {
        let penalties: Vec<Penalty> = [
            self.completeness(profile),
            self.uniqueness(profile, baseline),
            self.type_consistency(profile),
            self.schema_alignment(profile),
        ]
        .into_iter()
        .flatten()
        .collect();

        let total: f64 = penalties.iter().map(|p| p.points).sum();
        let score = (100.0 - total).max(0.0).round() as u32;

        QualityAssessment { score, penalties }
    }

    /// Returns the profile with its assessment embedded.
    pub fn annotate(&self, mut profile: ColumnProfile) -> ColumnProfile {
        profile.quality = Some(self.score(&profile));
        profile
    }

    fn completeness(&self, profile: &ColumnProfile) -> Option<Penalty> {
        let raw = profile.null_percentage * self.weights.completeness_weight;
        if raw <= 0.0 {
            return None;
        }
        let (points, rationale) = if raw >= self.weights.completeness_cap {
            (self.weights.completeness_cap, RationaleTag::NullsSaturated)
        } else {
            (raw, RationaleTag::NullsPresent)
        };
        positive(QualityFactor::Completeness, points, rationale)
    }

    fn uniqueness(&self, profile: &ColumnProfile, baseline: Option<&ColumnProfile>) -> Option<Penalty> {
        // With no values there is no evidence either way.
        if profile.non_null_count == 0 {
            return None;
        }
        let expected = is_identifier_name(profile.column_name())
            || baseline.is_some_and(|b| {
                b.non_null_count > 0
                    && b.distinct_percentage >= self.weights.expected_unique_baseline
            });
        if !expected {
            return None;
        }

        let shortfall = 100.0 - profile.distinct_percentage;
        if shortfall <= self.weights.uniqueness_tolerance {
            return None;
        }
        let points = (shortfall * self.weights.uniqueness_weight).min(self.weights.uniqueness_cap);
        positive(QualityFactor::Uniqueness, points, RationaleTag::IdentifierNotUnique)
    }

    fn type_consistency(&self, profile: &ColumnProfile) -> Option<Penalty> {
        let confidence = profile.type_confidence.clamp(0.0, 1.0);
        let points = (1.0 - confidence) * self.weights.type_consistency_weight;
        positive(QualityFactor::TypeConsistency, points, RationaleTag::MixedValueShapes)
    }

    fn schema_alignment(&self, profile: &ColumnProfile) -> Option<Penalty> {
        let declared = profile.strategy();
        let inferred = profile.inferred_type.strategy()?;
        if declared == ProfilingStrategy::Other || declared == inferred {
            return None;
        }
        positive(
            QualityFactor::SchemaAlignment,
            self.weights.schema_alignment_penalty,
            RationaleTag::DeclaredTypeMismatch,
        )
    }
}

fn positive(factor: QualityFactor, points: f64, rationale: RationaleTag) -> Option<Penalty> {
    (points > 0.0).then_some(Penalty {
        factor,
        points,
        rationale,
    })
}

/// Whether a column name reads like an identifier (`id`, `order_key`,
/// `customerId`, `row_uuid`, ...).
pub fn is_identifier_name(name: &str) -> bool {
    name_tokens(name)
        .iter()
        .any(|token| IDENTIFIER_TOKENS.contains(&token.as_str()))
}

// Splits on non-alphanumerics and on lower-to-upper camelCase boundaries.
fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
