/// Failure of a remote call.
///
/// Cloneable and comparable so one failure can be handed to every caller
/// waiting on the same query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
  /// Connection, timeout or TLS failure
  #[error("request failed: {0}")]
  Transport(String),
  /// The API answered with a non-success status
  #[error("{message} (HTTP {status})")]
  Api { status: u16, message: String },
  /// The response body did not match the expected shape
  #[error("failed to decode response: {0}")]
  Decode(String),
  /// The request could not be built (bad URL, unserializable body)
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

impl ServiceError {
  /// Message suitable for a notification body.
  pub fn message(&self) -> String {
    match self {
      ServiceError::Api { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }
}

impl From<reqwest::Error> for ServiceError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ServiceError::Decode(e.to_string())
    } else if e.is_builder() {
      ServiceError::InvalidRequest(e.to_string())
    } else {
      ServiceError::Transport(e.to_string())
    }
  }
}
