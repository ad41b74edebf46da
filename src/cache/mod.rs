//! In-memory query cache shared by every view.
//!
//! This module provides a CRM-agnostic caching mechanism that:
//! - Stores typed values under hierarchical keys (`clients/detail/7`)
//! - Serves fresh values immediately and revalidates stale ones in the background
//! - Coalesces concurrent loads of the same key into a single request
//! - Invalidates whole key subtrees after a mutation

mod error;
mod key;
mod layer;
mod stats;
mod traits;

pub use error::QueryError;
pub use key::{QueryKey, ToQueryKey};
pub use layer::QueryCache;
pub use traits::Read;
