use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A stored value carrying exactly one of the four fixed type tags.
///
/// Operations that target a specific tag (`RPUSH`, `SADD`, `HSET`, ...) match
/// on this enum and fail with `StoreError::TypeMismatch` for the wrong case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    List(Vec<String>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    /// Renders the value as a single reply line.
    ///
    /// Sets and hashes have no inherent order, so their items are sorted to
    /// keep replies deterministic.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::List(items) => items.join(" "),
            Value::Set(members) => {
                let mut members: Vec<&str> = members.iter().map(String::as_str).collect();
                members.sort_unstable();
                members.join(" ")
            }
            Value::Hash(fields) => {
                let mut fields: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                fields.sort_unstable();
                fields
                    .iter()
                    .map(|(k, v)| format!("{} {}", k, v))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }

    /// The name of the type tag, used in error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
        }
    }
}

/// A value together with its optional expiration instant.
///
/// Expirations are wall-clock (`SystemTime`) rather than monotonic instants so
/// they survive a snapshot save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<SystemTime>,
}

impl Entry {
    pub fn new(value: Value, expires_at: Option<SystemTime>) -> Self {
        Self { value, expires_at }
    }

    /// An entry whose expiration is at or before `now` is logically absent.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }
}

/// The complete mapping of keys to entries held by the store.
pub type Keyspace = HashMap<String, Entry>;
