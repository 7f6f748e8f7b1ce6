//! rockpool: an in-memory multi-type keyed store served over a line protocol.
//!
//! The crate provides a single-process store that supports:
//!
//! - Four value types under unique keys (string, list, set, hash)
//! - Per-key expiration (TTL), purged lazily on access plus a background sweep
//! - Atomic transactions (MULTI/EXEC/DISCARD) with all-or-nothing commit
//! - Publish/subscribe fan-out independent of the keyspace
//! - Whole-keyspace snapshot persistence with atomic save and load
//!
//! Concurrent sessions share one [`store::Store`] instance; all keyspace
//! access is serialized behind its mutex. The server speaks a plain text
//! protocol through async/await with Tokio: one command per line, one reply
//! per line.

pub mod commands;
pub mod connection;
pub mod pubsub;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transactions;
