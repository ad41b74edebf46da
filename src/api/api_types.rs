//! Serde types matching CRM API request and response envelopes.
//!
//! These are separate from domain types so the domain types stay focused on
//! what the application needs.

use serde::{Deserialize, Serialize};

use super::types::DealStage;

/// List endpoints answer either with a bare array or with `{ "data": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiList<T> {
  Bare(Vec<T>),
  Wrapped { data: Vec<T> },
}

impl<T> ApiList<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      ApiList::Bare(items) => items,
      ApiList::Wrapped { data } => data,
    }
  }
}

/// Error body returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiStageUpdate {
  pub stage: DealStage,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_list_accepts_both_shapes() {
    let bare: ApiList<u32> = serde_json::from_str("[1, 2, 3]").unwrap();
    assert_eq!(bare.into_vec(), vec![1, 2, 3]);

    let wrapped: ApiList<u32> = serde_json::from_str(r#"{"data": [4, 5]}"#).unwrap();
    assert_eq!(wrapped.into_vec(), vec![4, 5]);
  }
}
