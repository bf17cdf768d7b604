//! Snapshot persistence for the in-memory engine.
//!
//! The whole engine state is written as a single BSON document. Writes go to a sibling
//! temporary file first and are then renamed over the target, so a crash mid-write leaves
//! the previous snapshot intact.

use std::{
    path::{Path, PathBuf},
    sync::{Weak, atomic::Ordering},
    time::Duration,
};
use bson::{Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, task::JoinHandle};
use tracing::{debug, info, warn};

use doclink_core::error::{EngineError, EngineResult};

use crate::store::EngineState;


/// Persisted form of one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CollectionSnapshot {
    pub name: String,
    #[serde(default)]
    pub unique: Vec<String>,
    pub next_key: i64,
    pub records: Vec<Document>,
}

/// Persisted form of the whole engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub collections: Vec<CollectionSnapshot>,
}

impl Snapshot {
    pub async fn write(&self, path: &Path) -> EngineResult<()> {
        let document = serialize_to_bson(self)?
            .as_document()
            .cloned()
            .ok_or_else(|| EngineError::Serialization("snapshot is not a document".to_string()))?;

        let mut bytes = Vec::new();
        document.to_writer(&mut bytes)?;

        let staging = staging_path(path);
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, path).await?;

        debug!(
            target: "doclink::persistence",
            path = %path.display(),
            collections = self.collections.len(),
            bytes = bytes.len(),
            "Snapshot written"
        );

        Ok(())
    }

    /// Reads a snapshot, returning `None` when the file does not exist yet.
    pub async fn read(path: &Path) -> EngineResult<Option<Self>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let document = Document::from_reader(&mut bytes.as_slice())?;
        let snapshot: Snapshot = deserialize_from_bson(document.into())?;

        info!(
            target: "doclink::persistence",
            path = %path.display(),
            collections = snapshot.collections.len(),
            "Snapshot loaded"
        );

        Ok(Some(snapshot))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

/// Spawns the periodic autosave task.
///
/// The task only holds a weak reference to the engine state and stops once the engine has
/// been dropped. Ticks that find no pending mutation do not touch the disk.
pub(crate) fn spawn_autosave(state: Weak<EngineState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(state) = state.upgrade() else {
                break;
            };

            if !state.dirty.swap(false, Ordering::AcqRel) {
                continue;
            }

            if let Err(err) = state.save().await {
                state.dirty.store(true, Ordering::Release);
                warn!(target: "doclink::persistence", error = %err, "Autosave failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn snapshot_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let snapshot = Snapshot {
            collections: vec![CollectionSnapshot {
                name: "users".into(),
                unique: vec!["code".into()],
                next_key: 3,
                records: vec![doc! { "$key": 1_i64, "name": "a" }, doc! { "$key": 2_i64, "name": "b" }],
            }],
        };

        snapshot.write(&path).await.unwrap();
        let loaded = Snapshot::read(&path).await.unwrap().unwrap();

        assert_eq!(loaded.collections.len(), 1);
        assert_eq!(loaded.collections[0].name, "users");
        assert_eq!(loaded.collections[0].unique, vec!["code".to_string()]);
        assert_eq!(loaded.collections[0].next_key, 3);
        assert_eq!(loaded.collections[0].records, snapshot.collections[0].records);
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn writes_replace_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let first = Snapshot {
            collections: vec![CollectionSnapshot {
                name: "a".into(),
                unique: Vec::new(),
                next_key: 1,
                records: Vec::new(),
            }],
        };

        first.write(&path).await.unwrap();
        std::fs::write(staging_path(&path), b"partial").unwrap();
        Snapshot::default().write(&path).await.unwrap();

        let loaded = Snapshot::read(&path).await.unwrap().unwrap();
        assert!(loaded.collections.is_empty());
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Snapshot::read(&dir.path().join("absent.db")).await.unwrap().is_none());
    }
}
