//! Declared-type classification into profiling strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The profiling algorithm family selected for a column.
///
/// Always recomputed from the declared type; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilingStrategy {
    Numeric,
    Textual,
    Temporal,
    Boolean,
    Other,
}

impl ProfilingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfilingStrategy::Numeric => "numeric",
            ProfilingStrategy::Textual => "textual",
            ProfilingStrategy::Temporal => "temporal",
            ProfilingStrategy::Boolean => "boolean",
            ProfilingStrategy::Other => "other",
        }
    }

    /// Whether smallest/largest values are meaningful for this strategy.
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            ProfilingStrategy::Numeric | ProfilingStrategy::Temporal
        )
    }
}

impl fmt::Display for ProfilingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean"];

const TEMPORAL_PREFIXES: &[&str] = &["date", "timestamp", "datetime", "smalldatetime", "time"];

const NUMERIC_PREFIXES: &[&str] = &["int", "uint", "float", "decimal"];

const NUMERIC_TYPES: &[&str] = &[
    "tinyint", "smallint", "mediumint", "bigint", "long", "short", "byte", "numeric", "number",
    "double", "real", "money", "smallmoney", "serial", "bigserial",
];

const TEXTUAL_TOKENS: &[&str] = &["char", "text", "string", "utf8", "clob"];

/// Maps a declared type string to its profiling strategy.
///
/// Total and case-insensitive: parameters such as `(10,2)` and modifiers
/// such as `WITH TIME ZONE` are ignored, and anything unrecognized is
/// [`ProfilingStrategy::Other`].
///
/// ```rust
/// use column_lens::analyzers::classifier::{classify, ProfilingStrategy};
///
/// assert_eq!(classify("DECIMAL(10,2)"), ProfilingStrategy::Numeric);
/// assert_eq!(classify("varchar(255)"), ProfilingStrategy::Textual);
/// assert_eq!(classify("TIMESTAMP WITH TIME ZONE"), ProfilingStrategy::Temporal);
/// assert_eq!(classify("geometry"), ProfilingStrategy::Other);
/// ```
pub fn classify(declared_type: &str) -> ProfilingStrategy {
    let base = base_type(declared_type);

    if base.is_empty() {
        return ProfilingStrategy::Other;
    }
    // Container and interval types mention scalar names in their parameters
    // (array<int>, interval day to second) but are not scalars themselves.
    if base.starts_with("interval") {
        return ProfilingStrategy::Other;
    }
    if BOOLEAN_TYPES.contains(&base.as_str()) {
        return ProfilingStrategy::Boolean;
    }
    if TEMPORAL_PREFIXES.iter().any(|p| base.starts_with(p)) {
        return ProfilingStrategy::Temporal;
    }
    if NUMERIC_TYPES.contains(&base.as_str()) || NUMERIC_PREFIXES.iter().any(|p| base.starts_with(p))
    {
        return ProfilingStrategy::Numeric;
    }
    if TEXTUAL_TOKENS.iter().any(|t| base.contains(t)) {
        return ProfilingStrategy::Textual;
    }
    ProfilingStrategy::Other
}

/// Whether a temporal declared type carries only a time of day (`TIME`,
/// `Time64(Nanosecond)`), with no calendar date to bucket by weekday.
///
/// ```rust
/// use column_lens::analyzers::classifier::is_time_of_day;
///
/// assert!(is_time_of_day("TIME WITH TIME ZONE"));
/// assert!(is_time_of_day("Time64(Nanosecond)"));
/// assert!(!is_time_of_day("TIMESTAMP"));
/// assert!(!is_time_of_day("date"));
/// ```
pub fn is_time_of_day(declared_type: &str) -> bool {
    let base = base_type(declared_type);
    base.starts_with("time") && !base.starts_with("timestamp")
}

fn base_type(declared_type: &str) -> String {
    declared_type
        .trim()
        .to_ascii_lowercase()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
