//! View-level query handles over the shared [`QueryCache`].
//!
//! Inspired by TanStack Query, a `Query<T>` ties one cache key and loader to
//! a view and tracks what that view should render: loading, data (possibly
//! stale while a refetch runs) or an error.
//!
//! # Example
//!
//! ```ignore
//! let mut query = crm.query(crm.clients());
//!
//! // Start fetching (served from cache when fresh)
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::ServiceError;
use crate::cache::{QueryCache, QueryError, QueryKey, Read, ToQueryKey};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching and there is no data to show yet
  Loading,
  /// Data is available (a background refetch may be running)
  Success(T),
  /// The last fetch failed
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }
}

type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ServiceError>> + Send + Sync>;

/// A named, re-runnable read: cache key plus the remote call that fills it.
pub struct QueryDef<T> {
  key: QueryKey,
  description: String,
  loader: Loader<T>,
}

impl<T> Clone for QueryDef<T> {
  fn clone(&self) -> Self {
    Self {
      key: self.key.clone(),
      description: self.description.clone(),
      loader: Arc::clone(&self.loader),
    }
  }
}

impl<T: Send + Sync + 'static> QueryDef<T> {
  pub fn new<K, F, Fut>(key: &K, loader: F) -> Self
  where
    K: ToQueryKey,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    Self {
      key: key.query_key(),
      description: key.description(),
      loader: Arc::new(move || loader().boxed()),
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Fetch through the cache and wait for the value.
  pub async fn fetch(&self, cache: &QueryCache) -> Result<Arc<T>, QueryError> {
    let loader = Arc::clone(&self.loader);
    cache.fetch(&self.key, move || loader()).await
  }

  /// Stale-while-revalidate read through the cache.
  pub fn read(&self, cache: &QueryCache) -> Read<T> {
    let loader = Arc::clone(&self.loader);
    cache.read(&self.key, move || loader())
  }
}

/// Async query bound to a view.
///
/// Query<T> encapsulates:
/// - The cache key and loader (via a [`QueryDef`])
/// - Loading/success/error states, keeping previous data while refetching
/// - Async result handling via channels, polled from the UI tick
pub struct Query<T> {
  cache: QueryCache,
  def: QueryDef<T>,
  state: QueryState<Arc<T>>,
  previous: Option<Arc<T>>,
  receiver: Option<mpsc::UnboundedReceiver<Result<Arc<T>, QueryError>>>,
}

impl<T: Send + Sync + 'static> Query<T> {
  pub fn new(cache: QueryCache, def: QueryDef<T>) -> Self {
    Self {
      cache,
      def,
      state: QueryState::Idle,
      previous: None,
      receiver: None,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<Arc<T>> {
    &self.state
  }

  /// The data to render: current data, or the last good data after a
  /// failed refetch.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data.as_ref()),
      _ => self.previous.as_deref(),
    }
  }

  /// Loading with nothing to show yet.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// A fetch is running, whether or not data is shown meanwhile.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Start fetching data if not already fetching.
  ///
  /// Fresh cached data is applied immediately without a request.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    self.start_fetch();
  }

  /// Invalidate the key and fetch again, keeping current data on screen.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.cache.invalidate(self.def.key());
    self.start_fetch();
  }

  /// Poll for results from a pending fetch, and refetch if the cache entry
  /// was invalidated by a mutation elsewhere.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    if self.receiver.is_none() {
      if self.needs_refresh() {
        self.start_fetch();
        return true;
      }
      return false;
    }

    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        // A value written while this load ran takes precedence
        let data = match self.cache.peek::<T>(self.def.key()) {
          Some(snapshot) if !snapshot.is_invalidated => snapshot.data.unwrap_or(data),
          _ => data,
        };
        self.previous = Some(Arc::clone(&data));
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        debug!(query = %self.def.description, %error, "query failed");
        self.state = QueryState::Error(error.to_string());
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Successful data whose cache entry was invalidated since.
  fn needs_refresh(&self) -> bool {
    self.state.is_success()
      && self
        .cache
        .peek::<T>(self.def.key())
        .map(|s| s.is_invalidated && !s.is_fetching)
        .unwrap_or(true)
  }

  /// Internal: read through the cache, waiting in the background if needed
  fn start_fetch(&mut self) {
    let Read {
      data,
      source,
      pending,
    } = self.def.read(&self.cache);
    debug!(query = %self.def.description, ?source, "query read");

    if let Some(data) = &data {
      self.previous = Some(Arc::clone(data));
    }

    match pending {
      None => {
        self.receiver = None;
        self.state = match data {
          Some(data) => QueryState::Success(data),
          None => QueryState::Error(
            QueryError::TypeMismatch(self.def.key().to_string()).to_string(),
          ),
        };
      }
      Some(pending) => {
        let (tx, rx) = mpsc::unbounded_channel();
        self.receiver = Some(rx);
        self.state = match data {
          Some(data) => QueryState::Success(data),
          None => QueryState::Loading,
        };
        tokio::spawn(async move {
          // Ignore send errors - the view may have been closed
          let _ = tx.send(pending.wait().await);
        });
      }
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.def.key)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryKey;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn counting_def(counter: Arc<AtomicU32>) -> QueryDef<u32> {
    QueryDef::new(&QueryKey::new("counter"), move || {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst))
      }
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let def = QueryDef::new(&QueryKey::new("numbers"), || async {
      Ok::<_, ServiceError>(vec![1, 2, 3])
    });
    let mut query = Query::new(QueryCache::default(), def);

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.state().is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let def: QueryDef<i32> = QueryDef::new(&QueryKey::new("broken"), || async {
      Err(ServiceError::Transport("connection refused".to_string()))
    });
    let mut query = Query::new(QueryCache::default(), def);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert!(matches!(
      query.state(),
      QueryState::Error(e) if e == "request failed: connection refused"
    ));
  }

  #[tokio::test]
  async fn test_fresh_cache_resolves_without_fetching() {
    let cache = QueryCache::default();
    cache.set_data(&QueryKey::new("counter"), 7u32);

    let counter = Arc::new(AtomicU32::new(100));
    let mut query = Query::new(cache, counting_def(counter.clone()));
    query.fetch();

    assert!(query.state().is_success());
    assert!(!query.is_fetching());
    assert_eq!(query.data(), Some(&7));
    assert_eq!(counter.load(Ordering::SeqCst), 100);
  }

  #[tokio::test]
  async fn test_two_views_share_one_load() {
    let cache = QueryCache::default();
    let counter = Arc::new(AtomicU32::new(0));

    let mut a = Query::new(cache.clone(), counting_def(counter.clone()));
    let mut b = Query::new(cache.clone(), counting_def(counter.clone()));
    a.fetch();
    b.fetch();

    tokio::time::sleep(Duration::from_millis(20)).await;
    a.poll();
    b.poll();

    assert_eq!(a.data(), Some(&0));
    assert_eq!(b.data(), Some(&0));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_keeps_previous_data_visible() {
    let counter = Arc::new(AtomicU32::new(0));
    let mut query = Query::new(QueryCache::default(), counting_def(counter));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.poll();
    assert_eq!(query.data(), Some(&0));

    query.refetch();
    assert!(query.is_fetching());
    assert!(!query.is_loading());
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_invalidation_elsewhere_triggers_refetch_on_poll() {
    let cache = QueryCache::default();
    let counter = Arc::new(AtomicU32::new(0));
    let mut query = Query::new(cache.clone(), counting_def(counter.clone()));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.poll();
    assert!(!query.poll());

    cache.invalidate(&QueryKey::new("counter"));
    assert!(query.poll());
    assert!(query.is_fetching());

    tokio::time::sleep(Duration::from_millis(20)).await;
    query.poll();
    assert_eq!(query.data(), Some(&1));
    assert!(!cache.peek::<u32>(&QueryKey::new("counter")).unwrap().is_invalidated);
  }

  #[tokio::test]
  async fn test_fetch_while_fetching_is_noop() {
    let counter = Arc::new(AtomicU32::new(0));
    let mut query = Query::new(QueryCache::default(), counting_def(counter.clone()));

    query.fetch();
    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.poll();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }
}
