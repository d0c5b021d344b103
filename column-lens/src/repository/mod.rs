//! Snapshot persistence and comparison.
//!
//! A [`Snapshot`] is an immutable, named, timestamped capture of one
//! profiling run. Stores implement [`SnapshotStore`]; two implementations
//! ship with the crate:
//!
//! - [`InMemorySnapshotStore`] for tests and single-process hosts
//! - [`FileSnapshotStore`], one checksummed file per snapshot, safe for
//!   concurrent writers in separate processes
//!
//! Identifiers are generated at save time and never reissued, even after
//! the snapshot they named is deleted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzers::profile_types::ColumnProfile;
use crate::error::{ProfileError, Result};

pub mod diff;
pub mod file;
pub mod in_memory;

pub use diff::{ColumnDelta, ScalarDelta, SetDelta, SnapshotDiff, TextChange};
pub use file::FileSnapshotStore;
pub use in_memory::InMemorySnapshotStore;

/// How many fresh identifiers a save tries before reporting a collision.
pub const MAX_ID_ATTEMPTS: u32 = 3;

/// Opaque snapshot identifier (a UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parses a caller-supplied identifier.
    ///
    /// Anything that is not a well-formed identifier cannot name a snapshot
    /// and is reported as [`ProfileError::NotFound`].
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(|uuid| Self(uuid.to_string()))
            .map_err(|_| ProfileError::not_found(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok_and(|uuid| uuid.to_string() == self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces candidate identifiers for new snapshots.
pub type IdGenerator = Arc<dyn Fn() -> SnapshotId + Send + Sync>;

pub(crate) fn default_id_generator() -> IdGenerator {
    Arc::new(SnapshotId::generate)
}

/// One saved profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Profiles keyed by qualified column name (`table.column`)
    pub profiles: BTreeMap<String, ColumnProfile>,
}

impl Snapshot {
    /// Assembles a snapshot, rejecting two profiles of the same column.
    pub fn new(
        id: SnapshotId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        profiles: Vec<ColumnProfile>,
    ) -> Result<Self> {
        Ok(Self {
            id,
            name: name.into(),
            created_at,
            profiles: keyed_profiles(profiles)?,
        })
    }

    pub fn profile(&self, column: &str) -> Option<&ColumnProfile> {
        self.profiles.get(column)
    }

    pub fn metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            column_count: self.profiles.len(),
        }
    }
}

/// Keys profiles by qualified column name.
pub fn keyed_profiles(profiles: Vec<ColumnProfile>) -> Result<BTreeMap<String, ColumnProfile>> {
    let mut keyed = BTreeMap::new();
    for profile in profiles {
        let key = profile.descriptor.qualified_name();
        if keyed.contains_key(&key) {
            return Err(ProfileError::invalid_descriptor(format!(
                "column '{key}' appears more than once in one snapshot"
            )));
        }
        keyed.insert(key, profile);
    }
    Ok(keyed)
}

/// Listing entry for a saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub id: SnapshotId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub column_count: usize,
}

/// Orders a listing newest first; equal timestamps fall back to id order.
pub fn sort_listing(listing: &mut [SnapshotMetadata]) {
    listing.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Durable storage for snapshots.
///
/// `save` must be an atomic create: readers observe a snapshot completely
/// or not at all, and an identifier already in use (or retired by a delete)
/// is never overwritten.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves `profiles` under a freshly generated identifier.
    ///
    /// # Errors
    ///
    /// [`ProfileError::InvalidDescriptor`] when a column appears twice,
    /// [`ProfileError::IdentifierCollision`] when no fresh identifier could
    /// be obtained.
    async fn save(&self, name: &str, profiles: Vec<ColumnProfile>) -> Result<SnapshotId>;

    /// All snapshots, newest first.
    async fn list(&self) -> Result<Vec<SnapshotMetadata>>;

    /// # Errors
    ///
    /// [`ProfileError::NotFound`] when `id` was never saved or was deleted.
    async fn get(&self, id: &SnapshotId) -> Result<Snapshot>;

    /// Deletes a snapshot and retires its identifier.
    async fn delete(&self, id: &SnapshotId) -> Result<()>;

    async fn metadata(&self, id: &SnapshotId) -> Result<SnapshotMetadata> {
        Ok(self.get(id).await?.metadata())
    }

    /// Compares two saved snapshots.
    ///
    /// Both must exist; no partial diff is produced otherwise.
    async fn diff(&self, from: &SnapshotId, to: &SnapshotId) -> Result<SnapshotDiff> {
        let before = self.get(from).await?;
        let after = self.get(to).await?;
        Ok(SnapshotDiff::between(&before, &after))
    }
}
