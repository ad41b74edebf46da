use crate::api::ServiceError;

/// Error delivered to every waiter of a failed query.
///
/// Cloneable so a single loader failure can fan out to all coalesced callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
  /// The loader (a remote call) failed
  #[error(transparent)]
  Service(#[from] ServiceError),
  /// The key holds a value of a different type than requested
  #[error("cached value for '{0}' has an unexpected type")]
  TypeMismatch(String),
  /// The loader task ended without producing a result
  #[error("query for '{0}' was abandoned")]
  Abandoned(String),
}
