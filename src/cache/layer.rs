//! Query cache that coordinates cached values with remote loaders.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::error::QueryError;
use super::key::QueryKey;
use super::stats::{CacheStats, StatsSnapshot};
use super::traits::{CacheSource, Pending, Read, Snapshot};
use crate::api::ServiceError;

pub(super) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(super) type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, QueryError>>>;

/// How long a fetched value is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

struct InFlight {
  id: u64,
  fetch: SharedFetch,
}

struct Entry {
  value: Option<AnyValue>,
  fetched_at: Option<Instant>,
  invalidated: bool,
  in_flight: Option<InFlight>,
  /// Bumped whenever pending loads must no longer write into this entry
  generation: u64,
}

impl Entry {
  fn new(generation: u64) -> Self {
    Self {
      value: None,
      fetched_at: None,
      invalidated: false,
      in_flight: None,
      generation,
    }
  }

  fn is_fresh(&self, stale_time: Duration) -> bool {
    !self.invalidated
      && self.value.is_some()
      && self
        .fetched_at
        .map(|t| t.elapsed() < stale_time)
        .unwrap_or(false)
  }

  /// Detach any in-flight load. Its waiters still get the result, but the
  /// result is not stored.
  fn detach(&mut self, generation: u64) {
    self.generation = generation;
    self.in_flight = None;
  }
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
  stale_time: Duration,
  stats: CacheStats,
  next_id: AtomicU64,
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn next_id(&self) -> u64 {
    self.next_id.fetch_add(1, Ordering::Relaxed)
  }

  /// Store the outcome of a load, unless the entry moved on meanwhile.
  fn settle(&self, key: &QueryKey, id: u64, generation: u64, result: &Result<AnyValue, QueryError>) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(key) else {
      debug!(key = %key, "dropping result for removed entry");
      return;
    };

    if entry.in_flight.as_ref().is_some_and(|f| f.id == id) {
      entry.in_flight = None;
    }

    if entry.generation != generation {
      debug!(key = %key, "discarding result of detached fetch");
      return;
    }

    match result {
      Ok(value) => {
        entry.value = Some(Arc::clone(value));
        entry.fetched_at = Some(Instant::now());
        entry.invalidated = false;
        trace!(key = %key, "stored fetched value");
      }
      Err(e) => {
        self.stats.record_error();
        warn!(key = %key, error = %e, "query failed, keeping last good value");
      }
    }
  }

  fn clear_in_flight(&self, key: &QueryKey, id: u64) {
    let mut entries = self.lock();
    if let Some(entry) = entries.get_mut(key) {
      if entry.in_flight.as_ref().is_some_and(|f| f.id == id) {
        entry.in_flight = None;
      }
    }
  }
}

enum Lookup {
  Fresh(AnyValue),
  Fetching {
    previous: Option<AnyValue>,
    fetch: SharedFetch,
  },
}

/// Process-wide query cache.
///
/// Created once at startup and handed to every reader and writer by
/// cloning the handle. Values are stored per [`QueryKey`] together with the
/// time they were fetched:
/// - fresh values (younger than the stale time) are served without a load
/// - concurrent callers for the same key share one in-flight load
/// - a failed load reaches every waiter; the last good value is kept
/// - [`QueryCache::invalidate`] marks a whole key subtree stale
///
/// The internal lock is never held across an await point. Loader closures
/// are invoked with the lock held and must only build their future, not
/// call back into the cache.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new(DEFAULT_STALE_TIME)
  }
}

impl QueryCache {
  /// Create an empty cache with the given stale time.
  pub fn new(stale_time: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        stale_time,
        stats: CacheStats::default(),
        next_id: AtomicU64::new(1),
      }),
    }
  }

  /// Fetch a value, waiting for a load if the cached one is not fresh.
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, loader: F) -> Result<Arc<T>, QueryError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    self.fetch_within(key, self.inner.stale_time, loader).await
  }

  /// Like [`QueryCache::fetch`] with an explicit stale window.
  pub async fn fetch_within<T, F, Fut>(
    &self,
    key: &QueryKey,
    stale_time: Duration,
    loader: F,
  ) -> Result<Arc<T>, QueryError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    match self.lookup(key, stale_time, loader) {
      Lookup::Fresh(value) => downcast(key, value),
      Lookup::Fetching { fetch, .. } => downcast(key, fetch.await?),
    }
  }

  /// Stale-while-revalidate read. Never waits.
  ///
  /// Returns the cached value right away. If it is stale, missing or
  /// invalidated a background load is started (or joined) and returned as
  /// [`Read::pending`].
  pub fn read<T, F, Fut>(&self, key: &QueryKey, loader: F) -> Read<T>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    self.read_within(key, self.inner.stale_time, loader)
  }

  /// Like [`QueryCache::read`] with an explicit stale window.
  pub fn read_within<T, F, Fut>(&self, key: &QueryKey, stale_time: Duration, loader: F) -> Read<T>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    match self.lookup(key, stale_time, loader) {
      Lookup::Fresh(value) => Read {
        data: downcast(key, value).ok(),
        source: CacheSource::Fresh,
        pending: None,
      },
      Lookup::Fetching { previous, fetch } => {
        let source = if previous.is_some() {
          CacheSource::Stale
        } else {
          CacheSource::Empty
        };
        Read {
          data: previous.and_then(|value| downcast(key, value).ok()),
          source,
          pending: Some(Pending::new(key.clone(), fetch)),
        }
      }
    }
  }

  /// Inspect an entry without triggering a load.
  pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Snapshot<T>> {
    let entries = self.inner.lock();
    let entry = entries.get(key)?;
    Some(Snapshot {
      data: entry.value.clone().and_then(|v| downcast(key, v).ok()),
      is_invalidated: entry.invalidated,
      is_fetching: entry.in_flight.is_some(),
    })
  }

  /// Write a value directly, e.g. the response of a mutation.
  ///
  /// An in-flight load for the key is detached so it cannot overwrite
  /// this value when it lands.
  pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) -> Arc<T> {
    let value = Arc::new(value);
    let generation = self.inner.next_id();
    let mut entries = self.inner.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(generation));
    entry.detach(generation);
    entry.value = Some(Arc::clone(&value) as AnyValue);
    entry.fetched_at = Some(Instant::now());
    entry.invalidated = false;
    debug!(key = %key, "set cached value");
    value
  }

  /// Mark every entry under `prefix` as invalid.
  ///
  /// Cached values stay readable (stale-while-revalidate), but the next
  /// fetch or read of each key starts a fresh load. Returns the number of
  /// entries affected.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.inner.lock();
    let mut count = 0;
    for (key, entry) in entries.iter_mut() {
      if key.starts_with(prefix) {
        entry.invalidated = true;
        entry.detach(self.inner.next_id());
        count += 1;
      }
    }
    self.inner.stats.record_invalidations(count as u64);
    debug!(prefix = %prefix, count, "invalidated queries");
    count
  }

  /// Drop every entry under `prefix`.
  pub fn remove(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.inner.lock();
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(prefix));
    before - entries.len()
  }

  /// Drop everything. Called when the application shuts down.
  pub fn clear(&self) {
    let count = self.len();
    self.inner.lock().clear();
    let stats = self.stats();
    info!(
      entries = count,
      hits = stats.hits,
      misses = stats.misses,
      loads = stats.loads,
      coalesced = stats.coalesced,
      errors = stats.errors,
      invalidations = stats.invalidations,
      "query cache cleared"
    );
  }

  pub fn len(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.inner.stats.snapshot()
  }

  fn lookup<T, F, Fut>(&self, key: &QueryKey, stale_time: Duration, loader: F) -> Lookup
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    let generation = self.inner.next_id();
    let mut entries = self.inner.lock();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(generation));

    if entry.is_fresh(stale_time) {
      if let Some(value) = &entry.value {
        self.inner.stats.record_hit();
        trace!(key = %key, "cache hit");
        return Lookup::Fresh(Arc::clone(value));
      }
    }

    let previous = entry.value.clone();

    if let Some(in_flight) = &entry.in_flight {
      self.inner.stats.record_coalesced();
      trace!(key = %key, "joining in-flight fetch");
      return Lookup::Fetching {
        previous,
        fetch: in_flight.fetch.clone(),
      };
    }

    self.inner.stats.record_miss();
    self.inner.stats.record_load();
    debug!(key = %key, stale = previous.is_some(), "starting fetch");

    let id = self.inner.next_id();
    let fetch = spawn_load(
      Arc::downgrade(&self.inner),
      key.clone(),
      id,
      entry.generation,
      loader(),
    );
    entry.in_flight = Some(InFlight {
      id,
      fetch: fetch.clone(),
    });

    Lookup::Fetching { previous, fetch }
  }
}

/// Run a load on its own task so it completes even when every caller has
/// gone away, and wrap its join handle in a shareable future.
fn spawn_load<T, Fut>(
  inner: Weak<Inner>,
  key: QueryKey,
  id: u64,
  generation: u64,
  load: Fut,
) -> SharedFetch
where
  T: Send + Sync + 'static,
  Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
{
  let task_inner = inner.clone();
  let task_key = key.clone();
  let handle = tokio::spawn(async move {
    let result = load
      .await
      .map(|value| Arc::new(value) as AnyValue)
      .map_err(QueryError::from);
    if let Some(inner) = task_inner.upgrade() {
      inner.settle(&task_key, id, generation, &result);
    }
    result
  });

  async move {
    match handle.await {
      Ok(result) => result,
      Err(e) => {
        warn!(key = %key, error = %e, "fetch task ended abnormally");
        if let Some(inner) = inner.upgrade() {
          inner.clear_in_flight(&key, id);
        }
        Err(QueryError::Abandoned(key.to_string()))
      }
    }
  }
  .boxed()
  .shared()
}

pub(super) fn downcast<T: Send + Sync + 'static>(
  key: &QueryKey,
  value: AnyValue,
) -> Result<Arc<T>, QueryError> {
  value
    .downcast::<T>()
    .map_err(|_| QueryError::TypeMismatch(key.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use tokio::sync::oneshot;

  fn key(segments: &[&str]) -> QueryKey {
    segments[1..]
      .iter()
      .fold(QueryKey::new(segments[0]), |key, s| key.push(*s))
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_load() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key(&["dashboard", "stats"]);

    let fetches = (0..5).map(|_| {
      let calls = calls.clone();
      cache.fetch(&k, move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, ServiceError>(42u32)
      })
    });
    let results = futures::future::join_all(fetches).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
      assert_eq!(*result.unwrap(), 42);
    }
    let stats = cache.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.coalesced, 4);
  }

  #[tokio::test]
  async fn test_fresh_value_skips_loader() {
    let cache = QueryCache::default();
    let k = key(&["clients"]);

    let first = cache
      .fetch(&k, || async { Ok::<_, ServiceError>(vec![1, 2]) })
      .await
      .unwrap();
    let second = cache
      .fetch(&k, || async {
        Err::<Vec<i32>, _>(ServiceError::Transport("must not be called".into()))
      })
      .await
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.stats().hits, 1);
  }

  #[tokio::test]
  async fn test_zero_stale_time_always_reloads() {
    let cache = QueryCache::new(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key(&["deals"]);

    for _ in 0..3 {
      let calls = calls.clone();
      cache
        .fetch(&k, move || async move {
          Ok::<_, ServiceError>(calls.fetch_add(1, Ordering::SeqCst))
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_failure_reaches_all_waiters_and_keeps_last_value() {
    let cache = QueryCache::default();
    let k = key(&["clients", "detail", "1"]);

    cache
      .fetch(&k, || async { Ok::<_, ServiceError>("acme".to_string()) })
      .await
      .unwrap();
    cache.invalidate(&k);

    let failing = || async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Err::<String, _>(ServiceError::Api {
        status: 500,
        message: "boom".into(),
      })
    };
    let (a, b) = tokio::join!(cache.fetch(&k, failing), cache.fetch(&k, failing));

    let expected = QueryError::Service(ServiceError::Api {
      status: 500,
      message: "boom".into(),
    });
    assert_eq!(a.unwrap_err(), expected);
    assert_eq!(b.unwrap_err(), expected);

    let snapshot = cache.peek::<String>(&k).unwrap();
    assert_eq!(snapshot.data.as_deref().map(String::as_str), Some("acme"));
    assert!(snapshot.is_invalidated);
    assert_eq!(cache.stats().loads, 2);
    assert_eq!(cache.stats().errors, 1);
  }

  #[tokio::test]
  async fn test_invalidate_only_touches_prefix() {
    let cache = QueryCache::default();
    for k in [
      key(&["clients"]),
      key(&["clients", "detail", "1"]),
      key(&["contacts"]),
    ] {
      cache
        .fetch(&k, || async { Ok::<_, ServiceError>(0u8) })
        .await
        .unwrap();
    }

    assert_eq!(cache.invalidate(&key(&["clients"])), 2);

    assert!(cache.peek::<u8>(&key(&["clients"])).unwrap().is_invalidated);
    assert!(
      cache
        .peek::<u8>(&key(&["clients", "detail", "1"]))
        .unwrap()
        .is_invalidated
    );
    assert!(!cache.peek::<u8>(&key(&["contacts"])).unwrap().is_invalidated);
  }

  #[tokio::test]
  async fn test_invalidation_detaches_in_flight_read() {
    let cache = QueryCache::default();
    let k = key(&["clients", "detail", "7"]);
    let (release_old, old_gate) = oneshot::channel::<()>();

    // A slow read started before the mutation returns the old name
    let old_read = cache.read(&k, move || async move {
      let _ = old_gate.await;
      Ok::<_, ServiceError>("old".to_string())
    });

    // The mutation resolves, then its keys are invalidated
    cache.invalidate(&key(&["clients"]));

    let fresh = cache
      .fetch(&k, || async { Ok::<_, ServiceError>("new".to_string()) })
      .await
      .unwrap();
    assert_eq!(fresh.as_str(), "new");

    // The old read still resolves for its own waiter but never lands
    release_old.send(()).unwrap();
    let old = old_read.pending.unwrap().wait().await.unwrap();
    assert_eq!(old.as_str(), "old");

    let snapshot = cache.peek::<String>(&k).unwrap();
    assert_eq!(snapshot.data.as_deref().map(String::as_str), Some("new"));
  }

  #[tokio::test]
  async fn test_read_serves_stale_while_revalidating() {
    let cache = QueryCache::default();
    let k = key(&["pipeline", "stats"]);

    let first = cache.read(&k, || async { Ok::<_, ServiceError>(1u32) });
    assert!(first.data.is_none());
    assert_eq!(first.source, CacheSource::Empty);
    assert_eq!(*first.pending.unwrap().wait().await.unwrap(), 1);

    let fresh = cache.read(&k, || async { Ok::<_, ServiceError>(99u32) });
    assert_eq!(fresh.source, CacheSource::Fresh);
    assert!(fresh.pending.is_none());

    cache.invalidate(&k);
    let stale = cache.read(&k, || async { Ok::<_, ServiceError>(2u32) });
    assert_eq!(stale.source, CacheSource::Stale);
    assert_eq!(stale.data.as_deref(), Some(&1));
    assert_eq!(*stale.pending.unwrap().wait().await.unwrap(), 2);

    assert_eq!(
      cache.peek::<u32>(&k).unwrap().data.as_deref(),
      Some(&2)
    );
  }

  #[tokio::test]
  async fn test_type_mismatch_is_an_error() {
    let cache = QueryCache::default();
    let k = key(&["clients"]);
    cache.set_data(&k, 5u32);

    let result = cache
      .fetch(&k, || async { Ok::<_, ServiceError>("x".to_string()) })
      .await;
    assert_eq!(result.unwrap_err(), QueryError::TypeMismatch("clients".into()));
  }

  #[tokio::test]
  async fn test_set_data_wins_over_in_flight_load() {
    let cache = QueryCache::default();
    let k = key(&["deals"]);
    let (release, gate) = oneshot::channel::<()>();

    let read = cache.read(&k, move || async move {
      let _ = gate.await;
      Ok::<_, ServiceError>(vec!["server"])
    });
    cache.set_data(&k, vec!["local"]);

    release.send(()).unwrap();
    read.pending.unwrap().wait().await.unwrap();

    let snapshot = cache.peek::<Vec<&str>>(&k).unwrap();
    assert_eq!(snapshot.data.as_deref(), Some(&vec!["local"]));
    assert!(!snapshot.is_fetching);
  }

  #[tokio::test]
  async fn test_remove_and_clear() {
    let cache = QueryCache::default();
    cache.set_data(&key(&["clients"]), 1u8);
    cache.set_data(&key(&["clients", "detail", "1"]), 2u8);
    cache.set_data(&key(&["projects"]), 3u8);

    assert_eq!(cache.remove(&key(&["clients"])), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.peek::<u8>(&key(&["clients"])).is_none());

    cache.clear();
    assert_eq!(cache.len(), 0);
  }
}
