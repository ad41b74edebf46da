mod api_types;
mod cached;
mod client;
mod error;
#[cfg(test)]
pub mod fake;
mod keys;
mod service;
mod types;

pub use cached::CachedCrm;
pub use client::CrmClient;
pub use error::ServiceError;
pub use service::CrmService;
pub use types::*;
