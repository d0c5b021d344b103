//! In-memory snapshot store for tests and single-process hosts.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::{
    default_id_generator, keyed_profiles, sort_listing, IdGenerator, Snapshot, SnapshotId,
    SnapshotMetadata, SnapshotStore, MAX_ID_ATTEMPTS,
};
use crate::analyzers::profile_types::ColumnProfile;
use crate::error::{ProfileError, Result};

#[derive(Default)]
struct State {
    snapshots: HashMap<SnapshotId, Snapshot>,
    /// Identifiers of deleted snapshots; never handed out again.
    retired: HashSet<SnapshotId>,
}

impl State {
    fn is_taken(&self, id: &SnapshotId) -> bool {
        self.snapshots.contains_key(id) || self.retired.contains(id)
    }
}

/// Snapshot store backed by a map behind an async `RwLock`.
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct InMemorySnapshotStore {
    state: Arc<RwLock<State>>,
    id_generator: IdGenerator,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            id_generator: default_id_generator(),
        }
    }

    /// Replaces the identifier source.
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> SnapshotId + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.snapshots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.snapshots.is_empty()
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemorySnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySnapshotStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    #[instrument(skip(self, profiles), fields(columns = profiles.len()))]
    async fn save(&self, name: &str, profiles: Vec<ColumnProfile>) -> Result<SnapshotId> {
        let profiles = keyed_profiles(profiles)?;
        let created_at = Utc::now();

        // Checking and inserting under one write guard makes the create atomic.
        let mut state = self.state.write().await;
        let mut last = None;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = (self.id_generator)();
            if state.is_taken(&id) {
                debug!(id = %id, attempt, "Snapshot id already taken");
                last = Some(id);
                continue;
            }

            state.snapshots.insert(
                id.clone(),
                Snapshot {
                    id: id.clone(),
                    name: name.to_string(),
                    created_at,
                    profiles,
                },
            );
            info!(id = %id, "Saved snapshot");
            return Ok(id);
        }

        Err(ProfileError::IdentifierCollision {
            id: last.map(|id| id.to_string()).unwrap_or_default(),
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    async fn list(&self) -> Result<Vec<SnapshotMetadata>> {
        let state = self.state.read().await;
        let mut listing: Vec<SnapshotMetadata> =
            state.snapshots.values().map(Snapshot::metadata).collect();
        sort_listing(&mut listing);
        Ok(listing)
    }

    async fn get(&self, id: &SnapshotId) -> Result<Snapshot> {
        self.state
            .read()
            .await
            .snapshots
            .get(id)
            .cloned()
            .ok_or_else(|| ProfileError::not_found(id.as_str()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &SnapshotId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.snapshots.remove(id).is_none() {
            return Err(ProfileError::not_found(id.as_str()));
        }
        state.retired.insert(id.clone());
        info!(id = %id, "Deleted snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::interpreter::{FragmentResults, ResultInterpreter};
    use crate::core::{ColumnDescriptor, TableRef};
    use crate::plan::PlanBuilder;

    fn profile(column: &str) -> ColumnProfile {
        let descriptor = ColumnDescriptor::new(TableRef::new("t"), column, "INT");
        let plan = PlanBuilder::default()
            .build(&descriptor, descriptor.strategy())
            .unwrap();
        ResultInterpreter::default().interpret(&plan, &FragmentResults::new())
    }

    #[tokio::test]
    async fn test_save_get_round_trip() {
        let store = InMemorySnapshotStore::new();
        let id = store.save("nightly", vec![profile("a"), profile("b")]).await.unwrap();

        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.name, "nightly");
        assert_eq!(snapshot.profiles.len(), 2);
        assert_eq!(snapshot.profile("t.a"), Some(&profile("a")));
        assert_eq!(store.metadata(&id).await.unwrap().column_count, 2);
    }

    #[tokio::test]
    async fn test_deleted_ids_are_not_reissued() {
        let fixed = SnapshotId::generate();
        let reused = fixed.clone();
        let store = InMemorySnapshotStore::new().with_id_generator(move || reused.clone());

        let id = store.save("first", vec![]).await.unwrap();
        assert_eq!(id, fixed);
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());

        let err = store.save("second", vec![]).await.unwrap_err();
        match err {
            ProfileError::IdentifierCollision { id, attempts } => {
                assert_eq!(id, fixed.to_string());
                assert_eq!(attempts, MAX_ID_ATTEMPTS);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let store = InMemorySnapshotStore::new();
        let known = store.save("only", vec![]).await.unwrap();
        let unknown = SnapshotId::generate();

        assert!(store.delete(&unknown).await.unwrap_err().is_not_found());
        assert!(store.diff(&known, &unknown).await.unwrap_err().is_not_found());
        assert!(store.diff(&unknown, &known).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_distinct_ids() {
        let store = InMemorySnapshotStore::new();
        let saves = (0..16).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.save(&format!("run-{i}"), vec![]).await })
        });
        let mut ids = HashSet::new();
        for handle in saves {
            ids.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(store.list().await.unwrap().len(), 16);
    }
}
