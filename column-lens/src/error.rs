//! Error types for the column-lens profiling engine.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`ProfileError`] enum. Numeric degeneracies (zero-row tables, all-null
//! columns, insufficient correlation samples) are defined outcomes and never
//! surface here.

use thiserror::Error;

/// The main error type for column-lens.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A column or table reference was rejected before any query was planned.
    #[error("Invalid column descriptor: {message}")]
    InvalidDescriptor {
        /// Human-readable reason for the rejection
        message: String,
    },

    /// The query executor failed while running a generated fragment.
    ///
    /// The executor's diagnostic is carried verbatim; the engine does not retry.
    #[error("Execution of fragment '{fragment}' failed: {message}")]
    ExecutionFailure {
        /// Kind of the fragment that was being executed
        fragment: String,
        /// Diagnostic reported by the executor
        message: String,
    },

    /// A snapshot identifier does not exist in the store.
    #[error("Snapshot '{id}' not found")]
    NotFound { id: String },

    /// The store could not obtain an unused snapshot identifier.
    #[error("Could not allocate a unique snapshot identifier after {attempts} attempts (last tried '{id}')")]
    IdentifierCollision { id: String, attempts: u32 },

    /// A persisted snapshot failed validation when read back.
    #[error("Snapshot '{id}' is corrupt: {message}")]
    Integrity { id: String, message: String },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ProfileError>`.
///
/// # Examples
///
/// ```rust
/// use column_lens::error::Result;
///
/// fn plan_something() -> Result<()> {
///     Ok(())
/// }
/// # plan_something().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    /// Creates a new invalid descriptor error.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Creates a new execution failure for the given fragment.
    pub fn execution(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// Creates a new not-found error for a snapshot identifier.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new integrity error for a persisted snapshot.
    pub fn integrity(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Attributes an executor failure to the fragment being run.
    ///
    /// The diagnostic message is kept as is; other variants pass through.
    pub fn for_fragment(self, fragment: &str) -> Self {
        match self {
            Self::ExecutionFailure { message, .. } => Self::ExecutionFailure {
                fragment: fragment.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns true when the error reports a missing snapshot.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<datafusion::error::DataFusionError> for ProfileError {
    fn from(err: datafusion::error::DataFusionError) -> Self {
        Self::execution("datafusion", err.to_string())
    }
}

impl From<arrow::error::ArrowError> for ProfileError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::execution("arrow", err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProfileError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ProfileError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| attach_context(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| attach_context(&f(), e.into()))
    }
}

// Typed variants callers match on are passed through untouched.
fn attach_context(msg: &str, err: ProfileError) -> ProfileError {
    match err {
        ProfileError::Internal(inner) => ProfileError::Internal(format!("{msg}: {inner}")),
        ProfileError::Io(io) => ProfileError::Io(std::io::Error::new(io.kind(), format!("{msg}: {io}"))),
        ProfileError::Serialization(inner) => {
            ProfileError::Serialization(format!("{msg}: {inner}"))
        }
        other => other,
    }
}
