//! Snapshot persistence: the whole keyspace to and from one JSON document.
//!
//! Saving writes to a temporary sibling file, fsyncs, and renames over the
//! destination, so an I/O failure leaves any previously saved snapshot
//! untouched. Loading parses the full document first and only then swaps the
//! candidate keyspace into the live store.

use std::io;
use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::store::{Keyspace, Store};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Serializes every entry (key, type tag, value, expiration or absence) to
/// `path` as one atomic write.
pub async fn save(store: &Store, path: &Path) -> Result<(), SnapshotError> {
    let keyspace = store.export().await;
    let document = serde_json::to_vec_pretty(&keyspace)?;

    let tmp = path.with_extension("tmp");
    if let Err(e) = write_document(&tmp, &document).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    Ok(())
}

async fn write_document(path: &Path, document: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(document).await?;
    file.sync_all().await?;
    Ok(())
}

/// Parses the full snapshot at `path` into a candidate keyspace and, only on
/// full success, atomically replaces the live keyspace. Any I/O or parse
/// failure leaves the live keyspace unmodified.
pub async fn load(store: &Store, path: &Path) -> Result<(), SnapshotError> {
    let document = fs::read(path).await?;
    let keyspace: Keyspace = serde_json::from_slice(&document)?;
    store.replace(keyspace).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::store::Value;

    #[tokio::test]
    async fn save_and_load_round_trip_all_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");

        let store = Store::new();
        store.set("s", Value::Str("text".to_string()), None).await;
        store
            .set(
                "l",
                Value::List(vec!["a".to_string(), "b".to_string()]),
                None,
            )
            .await;
        store
            .set("set", Value::Set(HashSet::from(["m".to_string()])), None)
            .await;
        store
            .set(
                "h",
                Value::Hash(HashMap::from([("f".to_string(), "v".to_string())])),
                None,
            )
            .await;
        store
            .set("expiring", Value::Str("soon".to_string()), Some(3600))
            .await;

        save(&store, &path).await.unwrap();

        let restored = Store::new();
        load(&restored, &path).await.unwrap();

        assert_eq!(restored.export().await, store.export().await);
    }

    #[tokio::test]
    async fn expiration_survives_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");

        let store = Store::new();
        store
            .set("k", Value::Str("v".to_string()), Some(3600))
            .await;
        save(&store, &path).await.unwrap();

        let restored = Store::new();
        load(&restored, &path).await.unwrap();

        let entry = restored.export().await.remove("k").unwrap();
        let deadline = entry.expires_at.unwrap();
        assert!(deadline > SystemTime::now());
        assert!(deadline <= SystemTime::now() + Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn load_failure_leaves_live_keyspace_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let store = Store::new();
        store.set("k", Value::Str("v".to_string()), None).await;

        assert!(matches!(
            load(&store, &path).await,
            Err(SnapshotError::Format(_))
        ));
        assert_eq!(store.get("k").await, Some(Value::Str("v".to_string())));
    }

    #[tokio::test]
    async fn load_of_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new();
        assert!(matches!(
            load(&store, &dir.path().join("nope.json")).await,
            Err(SnapshotError::Io(_))
        ));
    }

    #[tokio::test]
    async fn failed_save_does_not_leave_a_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        // The destination is a directory, so the final rename must fail.
        let path = dir.path().join("dump.json");
        fs::create_dir(&path).await.unwrap();

        let store = Store::new();
        store.set("k", Value::Str("v".to_string()), None).await;

        assert!(save(&store, &path).await.is_err());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");

        let store = Store::new();
        store.set("k", Value::Str("one".to_string()), None).await;
        save(&store, &path).await.unwrap();

        store.set("k", Value::Str("two".to_string()), None).await;
        save(&store, &path).await.unwrap();

        let restored = Store::new();
        load(&restored, &path).await.unwrap();
        assert_eq!(restored.get("k").await, Some(Value::Str("two".to_string())));
        assert!(!path.with_extension("tmp").exists());
    }
}
