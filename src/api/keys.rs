//! Cache keys for CRM queries.
//!
//! Every read is stored under a key rooted at its domain (`clients`,
//! `contacts`, `projects`, `deals`, `dashboard`, `pipeline`) so a mutation
//! can invalidate exactly the subtrees it affects.

use crate::cache::{QueryKey, ToQueryKey};

use super::types::Id;

/// Query key types for CRM API reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrmQueryKey {
  DashboardStats,
  PipelineStats,
  RecentDeals { limit: usize },
  DealsNearClosing { limit: usize },
  Deals,
  Clients,
  Client { id: Id },
  ClientContacts { client_id: Id },
  ClientProjects { client_id: Id },
  Contacts,
  Contact { id: Id },
  Projects,
  Project { id: Id },
}

impl ToQueryKey for CrmQueryKey {
  fn query_key(&self) -> QueryKey {
    match self {
      Self::DashboardStats => Scope::Dashboard.query_key().push("stats"),
      Self::PipelineStats => Scope::Pipeline.query_key().push("stats"),
      Self::RecentDeals { limit } => Scope::Deals.query_key().push("recent").push(*limit),
      Self::DealsNearClosing { limit } => Scope::Deals.query_key().push("closing").push(*limit),
      Self::Deals => Scope::Deals.query_key().push("list"),
      Self::Clients => Scope::Clients.query_key().push("list"),
      Self::Client { id } => Scope::Client(*id).query_key(),
      Self::ClientContacts { client_id } => Scope::Client(*client_id).query_key().push("contacts"),
      Self::ClientProjects { client_id } => Scope::Client(*client_id).query_key().push("projects"),
      Self::Contacts => Scope::Contacts.query_key().push("list"),
      Self::Contact { id } => Scope::Contacts.query_key().push("detail").push(*id),
      Self::Projects => Scope::Projects.query_key().push("list"),
      Self::Project { id } => Scope::Projects.query_key().push("detail").push(*id),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::DashboardStats => "dashboard stats".to_string(),
      Self::PipelineStats => "pipeline stats".to_string(),
      Self::RecentDeals { limit } => format!("{} recent deals", limit),
      Self::DealsNearClosing { limit } => format!("{} deals closing soon", limit),
      Self::Deals => "all deals".to_string(),
      Self::Clients => "all clients".to_string(),
      Self::Client { id } => format!("client {}", id),
      Self::ClientContacts { client_id } => format!("contacts of client {}", client_id),
      Self::ClientProjects { client_id } => format!("projects of client {}", client_id),
      Self::Contacts => "all contacts".to_string(),
      Self::Contact { id } => format!("contact {}", id),
      Self::Projects => "all projects".to_string(),
      Self::Project { id } => format!("project {}", id),
    }
  }
}

/// Invalidation scopes: key prefixes a mutation can mark stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
  Dashboard,
  Pipeline,
  Deals,
  Clients,
  /// One client and everything nested under it
  Client(Id),
  Contacts,
  Projects,
}

impl ToQueryKey for Scope {
  fn query_key(&self) -> QueryKey {
    match self {
      Scope::Dashboard => QueryKey::new("dashboard"),
      Scope::Pipeline => QueryKey::new("pipeline"),
      Scope::Deals => QueryKey::new("deals"),
      Scope::Clients => QueryKey::new("clients"),
      Scope::Client(id) => QueryKey::new("clients").push("detail").push(*id),
      Scope::Contacts => QueryKey::new("contacts"),
      Scope::Projects => QueryKey::new("projects"),
    }
  }
}
