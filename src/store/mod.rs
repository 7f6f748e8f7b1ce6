//! The keyspace and its typed operations.
//!
//! `Store` owns the single shared `Keyspace` behind one mutex. Every read and
//! write path purges the targeted key first if it is past its expiration, so
//! no caller can observe a logically absent entry. Transaction batches commit
//! through [`Store::run_batch`], which holds the lock for the whole batch.

pub mod ops;
pub mod value;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::Mutex;

pub use ops::{OpReply, StoreOp};
pub use value::{Entry, Keyspace, Value};

/// Typed failures signalled by store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,
    #[error("key holds a {actual} value, not a {expected}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

/// The value store: the one shared, mutable structure of the process.
///
/// Created once at startup and shared by reference across all connection
/// handlers; it knows nothing about sessions or sockets.
#[derive(Debug, Default)]
pub struct Store {
    keyspace: Mutex<Keyspace>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(HashMap::new()),
        }
    }

    /// Overwrites or creates the entry at `key`. Always succeeds; any
    /// previous entry, whatever its tag, is replaced.
    pub async fn set(&self, key: &str, value: Value, ttl_secs: Option<u64>) {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        set_entry(&mut keyspace, key, value, ttl_secs, now);
    }

    /// Returns the value at `key`, or `None` if it is missing or expired.
    /// An expired entry is purged as a side effect of this call.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        purge_if_expired(&mut keyspace, key, now);
        keyspace.get(key).map(|entry| entry.value.clone())
    }

    /// Removes the entry at `key`. Succeeds whether or not the key existed.
    pub async fn delete(&self, key: &str) {
        let mut keyspace = self.keyspace.lock().await;
        keyspace.remove(key);
    }

    /// Appends `item` to the list at `key`. There is no implicit creation:
    /// a missing key is `KeyNotFound`, a non-list key is `TypeMismatch`.
    pub async fn list_append(&self, key: &str, item: &str) -> Result<(), StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        list_mut(&mut keyspace, key, now)?.push(item.to_string());
        Ok(())
    }

    /// Returns the ordered items of the list at `key`.
    pub async fn list_items(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        Ok(list_mut(&mut keyspace, key, now)?.clone())
    }

    /// Adds `member` to the set at `key`.
    pub async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        set_mut(&mut keyspace, key, now)?.insert(member.to_string());
        Ok(())
    }

    /// Removes `member` from the set at `key`. Removing an absent member is
    /// a no-op, not an error.
    pub async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        set_mut(&mut keyspace, key, now)?.remove(member);
        Ok(())
    }

    /// Returns the current membership of the set at `key`.
    pub async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        Ok(set_mut(&mut keyspace, key, now)?.clone())
    }

    /// Sets `field` in the hash at `key`. A missing key creates a new hash
    /// holding only that field; a key with a different tag is `TypeMismatch`.
    pub async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        hash_set_field(&mut keyspace, key, field, value, now)
    }

    /// Returns the value of `field` in the hash at `key`, or `None` if the
    /// key or the field is missing.
    pub async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        hash_get_field(&mut keyspace, key, field, now)
    }

    /// Executes one structured operation descriptor.
    pub async fn apply(&self, op: &StoreOp) -> Result<OpReply, StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        apply_op(&mut keyspace, op, now)
    }

    /// Commits a transaction batch as a single atomic unit.
    ///
    /// All operations are applied in order to a scratch clone of the keyspace
    /// under one lock acquisition. If any operation fails, the live keyspace
    /// is left exactly as it was before the batch started; on success the
    /// scratch is swapped in, so all effects become visible together and no
    /// other session's operation can interleave.
    pub async fn run_batch(&self, ops: &[StoreOp]) -> Result<Vec<OpReply>, StoreError> {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;

        let mut scratch = keyspace.clone();
        let mut replies = Vec::with_capacity(ops.len());

        for op in ops {
            match apply_op(&mut scratch, op, now) {
                Ok(reply) => replies.push(reply),
                Err(e) => return Err(StoreError::TransactionAborted(e.to_string())),
            }
        }

        *keyspace = scratch;
        Ok(replies)
    }

    /// Purges every expired entry. Returns the number of entries removed.
    ///
    /// Driven by a background interval task; it takes the same keyspace mutex
    /// as foreground access, so it can never race a concurrent write.
    pub async fn sweep_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        let before = keyspace.len();
        keyspace.retain(|_, entry| !entry.is_expired(now));
        before - keyspace.len()
    }

    /// Clones the full keyspace out, for snapshot serialization.
    pub async fn export(&self) -> Keyspace {
        self.keyspace.lock().await.clone()
    }

    /// Atomically replaces the live keyspace, for snapshot restore. The swap
    /// is a single assignment under the lock, visible instantaneously to all
    /// other operations.
    pub async fn replace(&self, keyspace: Keyspace) {
        *self.keyspace.lock().await = keyspace;
    }

    /// Number of live entries. Expired entries are purged first, so counts
    /// never include logically absent keys.
    pub async fn len(&self) -> usize {
        let now = SystemTime::now();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.retain(|_, entry| !entry.is_expired(now));
        keyspace.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Removes `key` if its entry is past expiration. Called at the start of
/// every access path so expired entries are never observed.
fn purge_if_expired(keyspace: &mut Keyspace, key: &str, now: SystemTime) {
    if keyspace
        .get(key)
        .is_some_and(|entry| entry.is_expired(now))
    {
        keyspace.remove(key);
    }
}

fn set_entry(keyspace: &mut Keyspace, key: &str, value: Value, ttl_secs: Option<u64>, now: SystemTime) {
    // Command parsing caps TTLs well below this point, so an overflowing
    // deadline can only come from a direct caller; treat it as no expiration
    // rather than panic inside the lock.
    let expires_at = ttl_secs.and_then(|secs| now.checked_add(Duration::from_secs(secs)));
    keyspace.insert(key.to_string(), Entry::new(value, expires_at));
}

fn list_mut<'a>(
    keyspace: &'a mut Keyspace,
    key: &str,
    now: SystemTime,
) -> Result<&'a mut Vec<String>, StoreError> {
    purge_if_expired(keyspace, key, now);
    match keyspace.get_mut(key) {
        Some(entry) => match &mut entry.value {
            Value::List(items) => Ok(items),
            other => Err(StoreError::TypeMismatch {
                expected: "list",
                actual: other.tag(),
            }),
        },
        None => Err(StoreError::KeyNotFound),
    }
}

fn set_mut<'a>(
    keyspace: &'a mut Keyspace,
    key: &str,
    now: SystemTime,
) -> Result<&'a mut HashSet<String>, StoreError> {
    purge_if_expired(keyspace, key, now);
    match keyspace.get_mut(key) {
        Some(entry) => match &mut entry.value {
            Value::Set(members) => Ok(members),
            other => Err(StoreError::TypeMismatch {
                expected: "set",
                actual: other.tag(),
            }),
        },
        None => Err(StoreError::KeyNotFound),
    }
}

fn hash_set_field(
    keyspace: &mut Keyspace,
    key: &str,
    field: &str,
    value: &str,
    now: SystemTime,
) -> Result<(), StoreError> {
    purge_if_expired(keyspace, key, now);
    match keyspace.get_mut(key) {
        Some(entry) => match &mut entry.value {
            Value::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            other => Err(StoreError::TypeMismatch {
                expected: "hash",
                actual: other.tag(),
            }),
        },
        None => {
            let fields = HashMap::from([(field.to_string(), value.to_string())]);
            keyspace.insert(key.to_string(), Entry::new(Value::Hash(fields), None));
            Ok(())
        }
    }
}

fn hash_get_field(
    keyspace: &mut Keyspace,
    key: &str,
    field: &str,
    now: SystemTime,
) -> Result<Option<String>, StoreError> {
    purge_if_expired(keyspace, key, now);
    match keyspace.get(key) {
        Some(entry) => match &entry.value {
            Value::Hash(fields) => Ok(fields.get(field).cloned()),
            other => Err(StoreError::TypeMismatch {
                expected: "hash",
                actual: other.tag(),
            }),
        },
        None => Ok(None),
    }
}

/// Applies one operation descriptor to a keyspace. Shared by single-command
/// execution and transaction commit, which runs it against a scratch clone.
fn apply_op(keyspace: &mut Keyspace, op: &StoreOp, now: SystemTime) -> Result<OpReply, StoreError> {
    match op {
        StoreOp::Set {
            key,
            value,
            ttl_secs,
        } => {
            set_entry(keyspace, key, Value::Str(value.clone()), *ttl_secs, now);
            Ok(OpReply::Done)
        }
        StoreOp::Get { key } => {
            purge_if_expired(keyspace, key, now);
            match keyspace.get(key) {
                Some(entry) => Ok(OpReply::Text(entry.value.render())),
                None => Ok(OpReply::Missing),
            }
        }
        StoreOp::Delete { key } => {
            keyspace.remove(key);
            Ok(OpReply::Done)
        }
        StoreOp::ListAppend { key, item } => {
            list_mut(keyspace, key, now)?.push(item.clone());
            Ok(OpReply::Done)
        }
        StoreOp::ListItems { key } => Ok(OpReply::Items(list_mut(keyspace, key, now)?.clone())),
        StoreOp::SetAdd { key, member } => {
            set_mut(keyspace, key, now)?.insert(member.clone());
            Ok(OpReply::Done)
        }
        StoreOp::SetRemove { key, member } => {
            set_mut(keyspace, key, now)?.remove(member);
            Ok(OpReply::Done)
        }
        StoreOp::SetMembers { key } => {
            let mut members: Vec<String> = set_mut(keyspace, key, now)?.iter().cloned().collect();
            members.sort_unstable();
            Ok(OpReply::Items(members))
        }
        StoreOp::HashSet { key, field, value } => {
            hash_set_field(keyspace, key, field, value, now)?;
            Ok(OpReply::Done)
        }
        StoreOp::HashGet { key, field } => match hash_get_field(keyspace, key, field, now)? {
            Some(value) => Ok(OpReply::Text(value)),
            None => Ok(OpReply::Missing),
        },
    }
}
