//! Cache-and-refresh layer over the remote catalog.
//!
//! Per collection the layer keeps a live entry with a TTL plus a fallback
//! snapshot without one. Reads serve the live entry when fresh, otherwise
//! try the remote API, otherwise fall back to the last known-good data.
//! This is the error boundary: fetch failures are swallowed here so
//! consumers always get a (possibly stale or empty) list, never an error.
//! Only persistence failures propagate, and the host treats those as fatal.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::normalize::{normalize_category, normalize_service, normalize_subcategory};
use crate::api::{Category, FetchError, RefreshSummary, RemoteClient, Service, Subcategory};
use crate::store::Store;

const META_KEY: &str = "pocketprice_meta";

/// A collection served by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
  Services,
  Categories,
  Subcategories,
}

impl Collection {
  /// Collection name on the remote API.
  pub fn name(self) -> &'static str {
    match self {
      Collection::Services => "services",
      Collection::Categories => "categories",
      Collection::Subcategories => "subcategories",
    }
  }

  fn live_key(self) -> &'static str {
    match self {
      Collection::Services => "pocketprice_services",
      Collection::Categories => "pocketprice_categories",
      Collection::Subcategories => "pocketprice_subcategories",
    }
  }

  fn fallback_key(self) -> &'static str {
    match self {
      Collection::Services => "pocketprice_services_fallback",
      Collection::Categories => "pocketprice_categories_fallback",
      Collection::Subcategories => "pocketprice_subcategories_fallback",
    }
  }

  fn index(self) -> usize {
    match self {
      Collection::Services => 0,
      Collection::Categories => 1,
      Collection::Subcategories => 2,
    }
  }
}

/// Source of raw collection records. Implemented by `RemoteClient`; tests
/// substitute a stub so cache behavior is verifiable without a network.
pub trait CatalogSource: Send + Sync {
  fn is_configured(&self) -> bool;

  async fn fetch_collection(&self, collection: &str) -> Result<Vec<Value>, FetchError>;
}

impl CatalogSource for RemoteClient {
  fn is_configured(&self) -> bool {
    RemoteClient::is_configured(self)
  }

  async fn fetch_collection(&self, collection: &str) -> Result<Vec<Value>, FetchError> {
    self.fetch_all(collection, &[]).await
  }
}

/// A live cached snapshot. Liveness is a read-time check against
/// `captured_at + ttl_seconds`; a ttl of 0 is already expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
  items: Vec<T>,
  captured_at: DateTime<Utc>,
  ttl_seconds: u64,
}

impl<T> CacheEntry<T> {
  fn is_live(&self, now: DateTime<Utc>) -> bool {
    now < self.captured_at + Duration::seconds(self.ttl_seconds as i64)
  }
}

/// Seed document for first-run fallback population.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
  #[serde(default)]
  pub services: Vec<Service>,
  #[serde(default)]
  pub categories: Vec<Category>,
  #[serde(default)]
  pub subcategories: Vec<Subcategory>,
  #[serde(default)]
  pub meta: Value,
}

/// The cache orchestrator. Exclusively owns the live and fallback keys
/// for all three collections; nothing else writes them.
pub struct CatalogCache<S, C> {
  store: Arc<S>,
  source: C,
  ttl_seconds: u64,
  // One guard per collection so at most one fetch-and-write runs at a
  // time for a given key. Concurrent readers of a live entry never block.
  flights: [Mutex<()>; 3],
}

impl<S: Store, C: CatalogSource> CatalogCache<S, C> {
  pub fn new(store: Arc<S>, source: C, ttl_seconds: u64) -> Self {
    Self {
      store,
      source,
      ttl_seconds,
      flights: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
    }
  }

  /// Get services, refreshing from the remote when the live entry is
  /// absent or expired.
  pub async fn get_services(&self, force_refresh: bool) -> Result<Vec<Service>> {
    self
      .get_collection(Collection::Services, force_refresh, normalize_service)
      .await
  }

  pub async fn get_categories(&self, force_refresh: bool) -> Result<Vec<Category>> {
    self
      .get_collection(Collection::Categories, force_refresh, normalize_category)
      .await
  }

  pub async fn get_subcategories(&self, force_refresh: bool) -> Result<Vec<Subcategory>> {
    self
      .get_collection(Collection::Subcategories, force_refresh, normalize_subcategory)
      .await
  }

  /// Look up a single service in the cached list. Linear scan, first
  /// match wins; fine at catalog scale but not O(1).
  pub async fn get_service(&self, id: &str) -> Result<Option<Service>> {
    let services = self.get_services(false).await?;
    Ok(services.into_iter().find(|s| s.id == id))
  }

  /// Services in a category, preserving catalog order.
  pub async fn get_services_by_category(&self, category_id: &str) -> Result<Vec<Service>> {
    let services = self.get_services(false).await?;
    Ok(
      services
        .into_iter()
        .filter(|s| s.category_id == category_id)
        .collect(),
    )
  }

  /// Services in a subcategory, preserving catalog order.
  pub async fn get_services_by_subcategory(&self, subcategory_id: &str) -> Result<Vec<Service>> {
    let services = self.get_services(false).await?;
    Ok(
      services
        .into_iter()
        .filter(|s| s.subcategory == subcategory_id)
        .collect(),
    )
  }

  /// Externally-maintained catalog metadata, read fresh on every call.
  pub async fn get_meta(&self) -> Result<Value> {
    Ok(
      self
        .store
        .get(META_KEY)?
        .unwrap_or_else(|| Value::Object(Default::default())),
    )
  }

  /// Drop all three live entries. Fallback snapshots are untouched.
  /// Idempotent.
  pub fn flush(&self) -> Result<()> {
    for collection in [
      Collection::Services,
      Collection::Categories,
      Collection::Subcategories,
    ] {
      self.store.delete(collection.live_key())?;
    }
    Ok(())
  }

  /// Full resync: flush, then force-refresh every collection in order.
  ///
  /// Never fails outright on fetch problems — each collection
  /// independently falls back to its snapshot, so the cache always ends
  /// up in a defined state.
  pub async fn refresh(&self) -> Result<RefreshSummary> {
    self.flush()?;

    let services = self.get_services(true).await?;
    let categories = self.get_categories(true).await?;
    self.get_subcategories(true).await?;

    Ok(RefreshSummary {
      services_count: services.len(),
      categories_count: categories.len(),
    })
  }

  /// Populate fallback snapshots, live entries and metadata from a seed
  /// document. Skipped (returns false) when a services fallback already
  /// exists, so real data is never clobbered by seeds.
  pub async fn seed(&self, data: SeedData) -> Result<bool> {
    if self.store.get(Collection::Services.fallback_key())?.is_some() {
      debug!("seed skipped, fallback data already present");
      return Ok(false);
    }

    self.write_snapshot(Collection::Services, &data.services)?;
    self.write_snapshot(Collection::Categories, &data.categories)?;
    self.write_snapshot(Collection::Subcategories, &data.subcategories)?;

    if !data.meta.is_null() {
      self.store.set(META_KEY, &data.meta, None)?;
    }

    Ok(true)
  }

  /// Uninstall-equivalent: remove live entries, fallback snapshots and
  /// metadata.
  pub fn reset(&self) -> Result<()> {
    self.flush()?;
    for collection in [
      Collection::Services,
      Collection::Categories,
      Collection::Subcategories,
    ] {
      self.store.delete(collection.fallback_key())?;
    }
    self.store.delete(META_KEY)
  }

  /// Cache-first read of one collection.
  ///
  /// 1. Live entry, when fresh, is returned as-is (infallible path).
  /// 2. Otherwise, when the remote is configured, fetch + normalize and
  ///    overwrite both the live entry and the fallback snapshot.
  /// 3. On fetch failure or when unconfigured, serve the fallback.
  async fn get_collection<T, N>(
    &self,
    collection: Collection,
    force_refresh: bool,
    normalize: N,
  ) -> Result<Vec<T>>
  where
    T: Serialize + DeserializeOwned + Clone,
    N: Fn(&Value) -> T,
  {
    if !force_refresh {
      if let Some(items) = self.read_live(collection)? {
        return Ok(items);
      }
    }

    if self.source.is_configured() {
      let _flight = self.flights[collection.index()].lock().await;

      // Another task may have refreshed this collection while we waited
      // for the guard; reuse its write instead of fetching again.
      if !force_refresh {
        if let Some(items) = self.read_live(collection)? {
          return Ok(items);
        }
      }

      match self.source.fetch_collection(collection.name()).await {
        Ok(raw) => {
          let items: Vec<T> = raw.iter().map(&normalize).collect();
          self.write_snapshot(collection, &items)?;
          return Ok(items);
        }
        Err(err) => {
          // Swallowed on purpose: stale data beats an error for every
          // consumer of this layer.
          warn!(
            collection = collection.name(),
            error = %err,
            "fetch failed, serving fallback data"
          );
        }
      }
    }

    self.read_fallback(collection)
  }

  fn read_live<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<Vec<T>>> {
    let entry = self
      .store
      .get(collection.live_key())?
      .and_then(|value| serde_json::from_value::<CacheEntry<T>>(value).ok());

    Ok(entry.filter(|e| e.is_live(Utc::now())).map(|e| e.items))
  }

  fn read_fallback<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
    Ok(
      self
        .store
        .get(collection.fallback_key())?
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default(),
    )
  }

  /// Write a live entry and overwrite the fallback snapshot with the
  /// same data. Only a successful fetch (or a seed import) lands here.
  fn write_snapshot<T: Serialize + Clone>(
    &self,
    collection: Collection,
    items: &[T],
  ) -> Result<()> {
    let entry = CacheEntry {
      items: items.to_vec(),
      captured_at: Utc::now(),
      ttl_seconds: self.ttl_seconds,
    };

    self.store.set(
      collection.live_key(),
      &serde_json::to_value(&entry)?,
      Some(self.ttl_seconds),
    )?;
    self
      .store
      .set(collection.fallback_key(), &serde_json::to_value(items)?, None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde_json::json;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  struct StubSource {
    configured: bool,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    records: Vec<Value>,
  }

  impl CatalogSource for StubSource {
    fn is_configured(&self) -> bool {
      self.configured
    }

    async fn fetch_collection(&self, _collection: &str) -> Result<Vec<Value>, FetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail.load(Ordering::SeqCst) {
        Err(FetchError::Transport("connection refused".to_string()))
      } else {
        Ok(self.records.clone())
      }
    }
  }

  struct Fixture {
    cache: CatalogCache<MemoryStore, StubSource>,
    store: Arc<MemoryStore>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
  }

  fn fixture(configured: bool, ttl: u64, records: Vec<Value>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let fail = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let source = StubSource {
      configured,
      fail: Arc::clone(&fail),
      calls: Arc::clone(&calls),
      records,
    };

    Fixture {
      cache: CatalogCache::new(Arc::clone(&store), source, ttl),
      store,
      fail,
      calls,
    }
  }

  fn raw_services() -> Vec<Value> {
    vec![
      json!({
        "id": "svc1",
        "title": "Towing",
        "status": "published",
        "price": 1500,
        "category": "cat1",
        "subcategory": "sub1"
      }),
      json!({
        "id": "svc2",
        "title": "Winching",
        "status": "published",
        "price": 2500,
        "category": "cat1",
        "subcategory": "sub2"
      }),
      json!({
        "id": "svc3",
        "title": "Storage",
        "status": "draft",
        "price": 500,
        "category": "cat2",
        "subcategory": "sub1"
      }),
    ]
  }

  #[tokio::test]
  async fn test_cache_hit_after_refresh_makes_no_network_call() {
    let fx = fixture(true, 3600, raw_services());

    let summary = fx.cache.refresh().await.unwrap();
    assert_eq!(summary.services_count, 3);
    assert_eq!(summary.categories_count, 3);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 3);

    let services = fx.cache.get_services(false).await.unwrap();
    assert_eq!(services.len(), 3);
    assert_eq!(services[0].name, "Towing");
    // Served from the live entry; no further fetch happened.
    assert_eq!(fx.calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_zero_ttl_refetches_on_every_read() {
    let fx = fixture(true, 0, raw_services());

    fx.cache.get_services(false).await.unwrap();
    fx.cache.get_services(false).await.unwrap();

    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_failure_serves_fallback() {
    let fx = fixture(true, 0, raw_services());

    // Populate fallback via one successful fetch, then break the remote.
    let fresh = fx.cache.get_services(false).await.unwrap();
    assert_eq!(fresh.len(), 3);
    fx.fail.store(true, Ordering::SeqCst);

    let stale = fx.cache.get_services(false).await.unwrap();
    assert_eq!(stale.len(), 3);
    assert_eq!(stale[1].name, "Winching");
  }

  #[tokio::test]
  async fn test_unconfigured_without_fallback_returns_empty() {
    let fx = fixture(false, 3600, raw_services());

    let services = fx.cache.get_services(false).await.unwrap();
    assert!(services.is_empty());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_refresh_unconfigured_reports_fallback_counts() {
    let fx = fixture(false, 3600, vec![]);

    fx.store
      .set(
        "pocketprice_services_fallback",
        &json!([{"id": "s1"}, {"id": "s2"}]),
        None,
      )
      .unwrap();
    fx.store
      .set("pocketprice_categories_fallback", &json!([{"id": "c1"}]), None)
      .unwrap();

    let summary = fx.cache.refresh().await.unwrap();
    assert_eq!(summary.services_count, 2);
    assert_eq!(summary.categories_count, 1);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);

    // Fallback snapshots are untouched by the failed refresh.
    assert!(fx
      .store
      .get("pocketprice_services_fallback")
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_flush_is_idempotent_and_keeps_fallback() {
    let fx = fixture(true, 3600, raw_services());
    fx.cache.refresh().await.unwrap();

    fx.cache.flush().unwrap();
    fx.cache.flush().unwrap();

    assert!(fx.store.get("pocketprice_services").unwrap().is_none());
    assert!(fx
      .store
      .get("pocketprice_services_fallback")
      .unwrap()
      .is_some());

    // With the live entry gone and the remote down, reads still work.
    fx.fail.store(true, Ordering::SeqCst);
    let services = fx.cache.get_services(false).await.unwrap();
    assert_eq!(services.len(), 3);
  }

  #[tokio::test]
  async fn test_get_service_by_id() {
    let fx = fixture(true, 3600, raw_services());

    let svc = fx.cache.get_service("svc2").await.unwrap().unwrap();
    assert_eq!(svc.name, "Winching");

    assert!(fx.cache.get_service("nonexistent-id").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_filters_preserve_order() {
    let fx = fixture(true, 3600, raw_services());

    let in_cat1 = fx.cache.get_services_by_category("cat1").await.unwrap();
    let ids: Vec<_> = in_cat1.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["svc1", "svc2"]);

    let in_sub1 = fx.cache.get_services_by_subcategory("sub1").await.unwrap();
    let ids: Vec<_> = in_sub1.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["svc1", "svc3"]);
  }

  #[tokio::test]
  async fn test_get_meta_reads_store_verbatim() {
    let fx = fixture(false, 3600, vec![]);

    assert_eq!(fx.cache.get_meta().await.unwrap(), json!({}));

    fx.store
      .set("pocketprice_meta", &json!({"phone": "+7 900 000-00-00"}), None)
      .unwrap();
    assert_eq!(
      fx.cache.get_meta().await.unwrap(),
      json!({"phone": "+7 900 000-00-00"})
    );
  }

  #[tokio::test]
  async fn test_seed_populates_and_is_skipped_when_data_exists() {
    let fx = fixture(false, 3600, vec![]);

    let seed: SeedData = serde_json::from_value(json!({
      "services": [{"id": "s1", "name": "Towing", "price": 1000}],
      "categories": [{"id": "c1", "name": "Evacuation"}],
      "meta": {"phone": "+7 900 000-00-00"}
    }))
    .unwrap();

    assert!(fx.cache.seed(seed).await.unwrap());
    assert_eq!(fx.cache.get_services(false).await.unwrap().len(), 1);
    assert_eq!(
      fx.cache.get_meta().await.unwrap()["phone"],
      json!("+7 900 000-00-00")
    );

    // Second import must not clobber existing data.
    let again: SeedData = serde_json::from_value(json!({
      "services": [{"id": "other"}]
    }))
    .unwrap();
    assert!(!fx.cache.seed(again).await.unwrap());
    assert_eq!(fx.cache.get_services(false).await.unwrap()[0].id, "s1");
  }

  #[tokio::test]
  async fn test_reset_removes_everything() {
    let fx = fixture(true, 3600, raw_services());
    fx.cache.refresh().await.unwrap();
    fx.store
      .set("pocketprice_meta", &json!({"v": 1}), None)
      .unwrap();

    fx.cache.reset().unwrap();

    assert!(fx.store.get("pocketprice_services").unwrap().is_none());
    assert!(fx
      .store
      .get("pocketprice_services_fallback")
      .unwrap()
      .is_none());
    assert!(fx.store.get("pocketprice_meta").unwrap().is_none());
  }

  #[tokio::test]
  async fn test_dangling_subcategory_reference_survives_ingest() {
    let fx = fixture(
      true,
      3600,
      vec![json!({"id": "sub1", "name_ru": "Легковые", "category": "missing-cat"})],
    );

    let subs = fx.cache.get_subcategories(false).await.unwrap();
    assert_eq!(subs[0].category_id, "missing-cat");
  }
}
