//! Key-value persistence collaborators.
//!
//! The cache layer treats storage as a plain KV store with optional
//! per-key expiry. Expiry is a read-time check: an expired key reads as
//! absent but is never actively evicted.

#[cfg(test)]
mod memory;
mod sqlite;

#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use color_eyre::Result;
use serde_json::Value;

/// Storage backend for cached values.
///
/// All operations are single-key; no cross-key transaction is ever
/// required by the cache layer.
pub trait Store: Send + Sync {
  /// Read a value. Expired keys read as `None`.
  fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Write a value, optionally expiring after `ttl_seconds`.
  /// A ttl of 0 means the key is already expired on the next read.
  fn set(&self, key: &str, value: &Value, ttl_seconds: Option<u64>) -> Result<()>;

  /// Remove a key. Removing an absent key is not an error.
  fn delete(&self, key: &str) -> Result<()>;
}
