//! Hierarchical query keys.

use std::fmt;

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
  Str(String),
  Int(i64),
}

impl fmt::Display for KeySegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeySegment::Str(s) => f.write_str(s),
      KeySegment::Int(n) => write!(f, "{}", n),
    }
  }
}

impl From<&str> for KeySegment {
  fn from(s: &str) -> Self {
    KeySegment::Str(s.to_string())
  }
}

impl From<String> for KeySegment {
  fn from(s: String) -> Self {
    KeySegment::Str(s)
  }
}

impl From<i64> for KeySegment {
  fn from(n: i64) -> Self {
    KeySegment::Int(n)
  }
}

impl From<u64> for KeySegment {
  fn from(n: u64) -> Self {
    KeySegment::Int(n as i64)
  }
}

impl From<u32> for KeySegment {
  fn from(n: u32) -> Self {
    KeySegment::Int(n as i64)
  }
}

impl From<usize> for KeySegment {
  fn from(n: usize) -> Self {
    KeySegment::Int(n as i64)
  }
}

/// A cache key made of ordered segments, e.g. `clients/detail/7`.
///
/// Keys form a tree: invalidating `clients` also invalidates
/// `clients/detail/7` and `clients/detail/7/contacts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
  /// Create a key with a single root segment.
  pub fn new(root: impl Into<KeySegment>) -> Self {
    Self(vec![root.into()])
  }

  /// Append a segment, returning the extended key.
  pub fn push(mut self, segment: impl Into<KeySegment>) -> Self {
    self.0.push(segment.into());
    self
  }

  /// Segment-wise prefix test. A key is a prefix of itself, and the empty
  /// key is a prefix of every key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("/")?;
      }
      write!(f, "{}", segment)?;
    }
    Ok(())
  }
}

/// Types that name a cached query.
pub trait ToQueryKey {
  /// The hierarchical key the result is stored under.
  fn query_key(&self) -> QueryKey;

  /// Human-readable description for logs.
  fn description(&self) -> String {
    self.query_key().to_string()
  }
}

impl ToQueryKey for QueryKey {
  fn query_key(&self) -> QueryKey {
    self.clone()
  }
}
