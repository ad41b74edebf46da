//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache operations.
///
/// All counters are atomic; reads may be slightly out of date relative to
/// each other.
#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
  loads: AtomicU64,
  coalesced: AtomicU64,
  errors: AtomicU64,
  invalidations: AtomicU64,
}

/// A point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub hits: u64,
  pub misses: u64,
  /// Loader invocations
  pub loads: u64,
  /// Callers that joined an in-flight request
  pub coalesced: u64,
  pub errors: u64,
  /// Entries marked invalid
  pub invalidations: u64,
}

impl CacheStats {
  #[inline]
  pub fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_load(&self) {
    self.loads.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_coalesced(&self) {
    self.coalesced.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_error(&self) {
    self.errors.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_invalidations(&self, count: u64) {
    self.invalidations.fetch_add(count, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      loads: self.loads.load(Ordering::Relaxed),
      coalesced: self.coalesced.load(Ordering::Relaxed),
      errors: self.errors.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
    }
  }
}
