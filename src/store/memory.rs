//! In-memory store used in tests; reference implementation of the
//! read-time expiry semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

use super::Store;

#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, (Value, Option<i64>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Store for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Value>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      entries
        .get(key)
        .and_then(|(value, expires_at)| match expires_at {
          Some(exp) if Utc::now().timestamp() >= *exp => None,
          _ => Some(value.clone()),
        }),
    )
  }

  fn set(&self, key: &str, value: &Value, ttl_seconds: Option<u64>) -> Result<()> {
    let expires_at = ttl_seconds.map(|ttl| Utc::now().timestamp() + ttl as i64);

    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(key.to_string(), (value.clone(), expires_at));

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(key);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_set_get_roundtrip() {
    let store = MemoryStore::new();
    store.set("k", &json!({"a": 1}), None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));
  }

  #[test]
  fn test_missing_key_reads_as_none() {
    let store = MemoryStore::new();
    assert_eq!(store.get("nope").unwrap(), None);
  }

  #[test]
  fn test_zero_ttl_expires_on_next_read() {
    let store = MemoryStore::new();
    store.set("k", &json!(1), Some(0)).unwrap();
    assert_eq!(store.get("k").unwrap(), None);
  }

  #[test]
  fn test_no_ttl_never_expires() {
    let store = MemoryStore::new();
    store.set("k", &json!(1), None).unwrap();
    assert_eq!(store.get("k").unwrap(), Some(json!(1)));
  }

  #[test]
  fn test_delete_is_idempotent() {
    let store = MemoryStore::new();
    store.set("k", &json!(1), None).unwrap();
    store.delete("k").unwrap();
    store.delete("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
  }
}
