//! Filesystem snapshot store.
//!
//! Layout under the store root:
//!
//! ```text
//! <id>.snapshot.json    sha256:<hex digest of the payload>\n<JSON payload>
//! <id>.retired          tombstone left by delete
//! .<id>.<nonce>.tmp     in-flight save
//! ```
//!
//! A save writes and syncs a temporary file, then publishes it with a hard
//! link. Linking fails if the target exists, so publication is an atomic
//! create that never overwrites; a reader sees either the complete file or
//! nothing. This holds across processes sharing the directory.
//!
//! Delete writes the tombstone before removing the snapshot file, and a save
//! checks for a tombstone again after linking. A save racing a delete of the
//! same id therefore either fails to link or sees the tombstone and unlinks
//! its own file, so a retired id never comes back.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    default_id_generator, keyed_profiles, sort_listing, IdGenerator, Snapshot, SnapshotId,
    SnapshotMetadata, SnapshotStore, MAX_ID_ATTEMPTS,
};
use crate::analyzers::profile_types::ColumnProfile;
use crate::error::{ErrorContext, ProfileError, Result};

pub const SNAPSHOT_SUFFIX: &str = ".snapshot.json";
pub const TOMBSTONE_SUFFIX: &str = ".retired";
const CHECKSUM_PREFIX: &str = "sha256:";

/// Snapshot store keeping one checksummed JSON file per snapshot.
#[derive(Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
    id_generator: IdGenerator,
}

impl std::fmt::Debug for FileSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSnapshotStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileSnapshotStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating snapshot directory {}", root.display()))?;
        Ok(Self {
            root,
            id_generator: default_id_generator(),
        })
    }

    /// Replaces the identifier source.
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> SnapshotId + Send + Sync + 'static,
    {
        self.id_generator = std::sync::Arc::new(generator);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file for `id`.
    ///
    /// Malformed identifiers never reach the filesystem.
    pub fn snapshot_path(&self, id: &SnapshotId) -> Result<PathBuf> {
        if !id.is_well_formed() {
            return Err(ProfileError::not_found(id.as_str()));
        }
        Ok(self.root.join(format!("{id}{SNAPSHOT_SUFFIX}")))
    }

    fn tombstone_path(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(format!("{id}{TOMBSTONE_SUFFIX}"))
    }

    fn save_blocking(&self, name: &str, profiles: Vec<ColumnProfile>) -> Result<SnapshotId> {
        let profiles = keyed_profiles(profiles)?;
        let mut snapshot = Snapshot {
            id: (self.id_generator)(),
            name: name.to_string(),
            created_at: Utc::now(),
            profiles,
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            if attempt > 1 {
                snapshot.id = (self.id_generator)();
            }
            let target = self.snapshot_path(&snapshot.id)?;
            if self.tombstone_path(&snapshot.id).exists() {
                debug!(id = %snapshot.id, attempt, "Snapshot id was retired");
                continue;
            }

            let payload = encode(&snapshot)?;
            match self.publish_unretired(&target, &snapshot.id, payload.as_bytes())? {
                Published::Saved => {
                    info!(id = %snapshot.id, path = %target.display(), "Saved snapshot");
                    return Ok(snapshot.id);
                }
                Published::Taken => debug!(id = %snapshot.id, attempt, "Snapshot id already taken"),
                Published::Retired => {
                    debug!(id = %snapshot.id, attempt, "Snapshot id was retired while saving")
                }
            }
        }

        Err(ProfileError::IdentifierCollision {
            id: snapshot.id.to_string(),
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Publishes `bytes` at `target` unless the id is taken or retired.
    ///
    /// A tombstone that appears while linking wins: the freshly linked file
    /// is removed again.
    fn publish_unretired(&self, target: &Path, id: &SnapshotId, bytes: &[u8]) -> Result<Published> {
        if !self.publish(target, id, bytes)? {
            return Ok(Published::Taken);
        }
        if !self.tombstone_path(id).exists() {
            return Ok(Published::Saved);
        }
        match fs::remove_file(target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("withdrawing {}", target.display())),
        }
        Ok(Published::Retired)
    }

    /// Writes `bytes` to a synced temp file and links it to `target`.
    ///
    /// Returns `false` when `target` already exists.
    fn publish(&self, target: &Path, id: &SnapshotId, bytes: &[u8]) -> Result<bool> {
        let temp = self.root.join(format!(".{id}.{}.tmp", Uuid::new_v4().simple()));
        let written = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()
        })();

        let outcome = match written {
            Ok(()) => match fs::hard_link(&temp, target) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e).with_context(|| format!("publishing {}", target.display())),
            },
            Err(e) => Err(e).with_context(|| format!("writing {}", temp.display())),
        };

        if let Err(e) = fs::remove_file(&temp) {
            warn!(path = %temp.display(), error = %e, "Could not remove temporary snapshot file");
        }
        outcome
    }

    fn read_blocking(&self, id: &SnapshotId) -> Result<Snapshot> {
        let path = self.snapshot_path(id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ProfileError::not_found(id.as_str())),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let snapshot = decode(id.as_str(), &raw)?;
        if &snapshot.id != id {
            return Err(ProfileError::integrity(
                id.as_str(),
                format!("file holds snapshot '{}'", snapshot.id),
            ));
        }
        Ok(snapshot)
    }

    fn delete_blocking(&self, id: &SnapshotId) -> Result<()> {
        let path = self.snapshot_path(id)?;
        if !path.exists() {
            return Err(ProfileError::not_found(id.as_str()));
        }

        // Retire first: no save may claim the id once the file is gone.
        let tombstone = self.tombstone_path(id);
        match OpenOptions::new().write(true).create_new(true).open(&tombstone) {
            Ok(file) => file
                .sync_all()
                .with_context(|| format!("retiring {}", tombstone.display()))?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e).with_context(|| format!("retiring {}", tombstone.display())),
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ProfileError::not_found(id.as_str())),
            Err(e) => return Err(e).with_context(|| format!("deleting {}", path.display())),
        }
        info!(id = %id, "Deleted snapshot");
        Ok(())
    }

    fn list_blocking(&self) -> Result<Vec<SnapshotMetadata>> {
        let pattern = format!(
            "{}/*{SNAPSHOT_SUFFIX}",
            glob::Pattern::escape(&self.root.to_string_lossy())
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| ProfileError::Internal(format!("invalid listing pattern: {e}")))?;

        let mut listing = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable snapshot entry");
                    continue;
                }
            };
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(SNAPSHOT_SUFFIX))
                .unwrap_or_default()
                .to_string();

            let snapshot = fs::read_to_string(&path)
                .map_err(ProfileError::from)
                .and_then(|raw| decode(&id, &raw));
            match snapshot {
                Ok(snapshot) => listing.push(snapshot.metadata()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot"),
            }
        }

        sort_listing(&mut listing);
        Ok(listing)
    }
}

/// Outcome of publishing a snapshot under one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Saved,
    Taken,
    Retired,
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

fn encode(snapshot: &Snapshot) -> Result<String> {
    let payload = serde_json::to_string(snapshot)?;
    Ok(format!("{CHECKSUM_PREFIX}{}\n{payload}", checksum(&payload)))
}

fn decode(id: &str, raw: &str) -> Result<Snapshot> {
    let (header, payload) = raw
        .split_once('\n')
        .ok_or_else(|| ProfileError::integrity(id, "missing checksum header"))?;
    let expected = header
        .strip_prefix(CHECKSUM_PREFIX)
        .ok_or_else(|| ProfileError::integrity(id, "malformed checksum header"))?;
    if checksum(payload) != expected {
        return Err(ProfileError::integrity(id, "checksum mismatch"));
    }
    serde_json::from_str(payload).map_err(|e| ProfileError::integrity(id, e.to_string()))
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    #[instrument(skip(self, profiles), fields(root = %self.root.display(), columns = profiles.len()))]
    async fn save(&self, name: &str, profiles: Vec<ColumnProfile>) -> Result<SnapshotId> {
        let store = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.save_blocking(&name, profiles)).await?
    }

    async fn list(&self) -> Result<Vec<SnapshotMetadata>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_blocking()).await?
    }

    async fn get(&self, id: &SnapshotId) -> Result<Snapshot> {
        let store = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || store.read_blocking(&id)).await?
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn delete(&self, id: &SnapshotId) -> Result<()> {
        let store = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || store.delete_blocking(&id)).await?
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::analyzers::interpreter::{FragmentResults, ResultInterpreter};
    use crate::core::{ColumnDescriptor, TableRef};
    use crate::plan::PlanBuilder;

    fn profile(column: &str) -> ColumnProfile {
        let descriptor = ColumnDescriptor::new(TableRef::new("t"), column, "VARCHAR");
        let plan = PlanBuilder::default()
            .build(&descriptor, descriptor.strategy())
            .unwrap();
        ResultInterpreter::default().interpret(&plan, &FragmentResults::new())
    }

    #[tokio::test]
    async fn test_round_trip_and_no_temp_files_left() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let id = store.save("daily", vec![profile("a")]).await.unwrap();

        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.profiles["t.a"], profile("a"));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{id}{SNAPSHOT_SUFFIX}")]);
    }

    #[tokio::test]
    async fn test_tampered_file_fails_integrity() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let id = store.save("daily", vec![profile("a")]).await.unwrap();

        let path = store.snapshot_path(&id).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        fs::write(&path, raw.replace("daily", "weekly")).unwrap();

        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, ProfileError::Integrity { .. }), "{err}");
        // Listing skips the damaged file instead of failing.
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let fixed = SnapshotId::generate();
        let reused = fixed.clone();
        let store = FileSnapshotStore::open(dir.path())
            .unwrap()
            .with_id_generator(move || reused.clone());

        store.save("first", vec![profile("a")]).await.unwrap();
        let err = store.save("second", vec![]).await.unwrap_err();
        assert!(matches!(err, ProfileError::IdentifierCollision { attempts: 3, .. }));
        assert_eq!(store.get(&fixed).await.unwrap().name, "first");
    }

    #[tokio::test]
    async fn test_delete_retires_the_id() {
        let dir = tempdir().unwrap();
        let fixed = SnapshotId::generate();
        let reused = fixed.clone();
        let store = FileSnapshotStore::open(dir.path())
            .unwrap()
            .with_id_generator(move || reused.clone());

        let id = store.save("first", vec![]).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
        assert!(store.delete(&id).await.unwrap_err().is_not_found());
        assert!(matches!(
            store.save("again", vec![]).await.unwrap_err(),
            ProfileError::IdentifierCollision { .. }
        ));
    }

    #[tokio::test]
    async fn test_interrupted_delete_keeps_the_id_retired() {
        let dir = tempdir().unwrap();
        let fixed = SnapshotId::generate();
        let reused = fixed.clone();
        let store = FileSnapshotStore::open(dir.path())
            .unwrap()
            .with_id_generator(move || reused.clone());
        let id = store.save("first", vec![profile("a")]).await.unwrap();

        // A delete that stopped after retiring the id but before removing the file.
        fs::write(store.tombstone_path(&id), b"").unwrap();
        assert!(matches!(
            store.save("again", vec![]).await.unwrap_err(),
            ProfileError::IdentifierCollision { .. }
        ));
        assert_eq!(store.get(&id).await.unwrap().name, "first");

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
        assert!(store.tombstone_path(&id).exists());
    }

    #[test]
    fn test_save_racing_a_delete_withdraws_its_file() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let id = SnapshotId::generate();
        let target = store.snapshot_path(&id).unwrap();

        // The id was retired between the save's tombstone check and its link.
        fs::write(store.tombstone_path(&id), b"").unwrap();
        let outcome = store.publish_unretired(&target, &id, b"payload").unwrap();
        assert_eq!(outcome, Published::Retired);
        assert!(!target.exists());

        let fresh = SnapshotId::generate();
        let fresh_target = store.snapshot_path(&fresh).unwrap();
        assert_eq!(
            store.publish_unretired(&fresh_target, &fresh, b"payload").unwrap(),
            Published::Saved
        );
        assert_eq!(
            store.publish_unretired(&fresh_target, &fresh, b"other").unwrap(),
            Published::Taken
        );
        assert_eq!(fs::read(&fresh_target).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_deleting_unknown_id_retires_nothing() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let id = SnapshotId::generate();
        assert!(store.delete(&id).await.unwrap_err().is_not_found());
        assert!(!store.tombstone_path(&id).exists());
    }

    #[tokio::test]
    async fn test_malformed_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let bogus: SnapshotId = serde_json::from_str("\"../escape\"").unwrap();
        assert!(store.get(&bogus).await.unwrap_err().is_not_found());
    }
}
