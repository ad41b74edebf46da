//! Result types returned by cache lookups.

use std::marker::PhantomData;
use std::sync::Arc;

use super::error::QueryError;
use super::key::QueryKey;
use super::layer::{downcast, SharedFetch};

/// Indicates where the data of a read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Cached and younger than the stale window
  Fresh,
  /// Cached but stale or invalidated; a refetch is running
  Stale,
  /// Nothing cached yet; a fetch is running
  Empty,
}

/// Outcome of a stale-while-revalidate read.
///
/// `data` is whatever the cache held at the time of the call. When
/// `pending` is set a fetch is in flight and resolves with the new value.
pub struct Read<T> {
  pub data: Option<Arc<T>>,
  pub source: CacheSource,
  pub pending: Option<Pending<T>>,
}

/// Handle on an in-flight fetch shared with every other caller of the key.
pub struct Pending<T> {
  key: QueryKey,
  fetch: SharedFetch,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Pending<T> {
  pub(super) fn new(key: QueryKey, fetch: SharedFetch) -> Self {
    Self {
      key,
      fetch,
      _marker: PhantomData,
    }
  }

  /// Wait for the shared fetch to resolve.
  pub async fn wait(self) -> Result<Arc<T>, QueryError> {
    let value = self.fetch.await?;
    downcast(&self.key, value)
  }
}

/// Side-effect free view of a cache entry.
#[derive(Debug)]
pub struct Snapshot<T> {
  pub data: Option<Arc<T>>,
  /// Marked by an invalidation and not reloaded since
  pub is_invalidated: bool,
  pub is_fetching: bool,
}
