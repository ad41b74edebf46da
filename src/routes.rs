//! Fixed route table.

use std::fmt;

use crate::api::Id;

/// A navigable location in the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Dashboard,
  Clients,
  ClientDetail(Id),
  Projects,
  ProjectDetail(Id),
  Contacts,
  Pipeline,
}

impl Route {
  pub fn path(&self) -> String {
    match self {
      Route::Dashboard => "/".to_string(),
      Route::Clients => "/clients".to_string(),
      Route::ClientDetail(id) => format!("/clients/{}", id),
      Route::Projects => "/projects".to_string(),
      Route::ProjectDetail(id) => format!("/projects/{}", id),
      Route::Contacts => "/contacts".to_string(),
      Route::Pipeline => "/pipeline".to_string(),
    }
  }

  /// Parse a path such as `/clients/42`. The leading slash and a trailing
  /// slash are optional.
  pub fn parse(path: &str) -> Option<Self> {
    let trimmed = path.trim().trim_matches('/');
    let mut parts = trimmed.split('/').filter(|p| !p.is_empty());

    let route = match (parts.next(), parts.next()) {
      (None, _) => Route::Dashboard,
      (Some("dashboard"), None) => Route::Dashboard,
      (Some("clients"), None) => Route::Clients,
      (Some("clients"), Some(id)) => Route::ClientDetail(id.parse().ok()?),
      (Some("projects"), None) => Route::Projects,
      (Some("projects"), Some(id)) => Route::ProjectDetail(id.parse().ok()?),
      (Some("contacts"), None) => Route::Contacts,
      (Some("pipeline"), None) => Route::Pipeline,
      _ => return None,
    };

    if parts.next().is_some() {
      return None;
    }
    Some(route)
  }

  /// Detail routes are pushed on top of their list
  pub fn parent(&self) -> Option<Route> {
    match self {
      Route::ClientDetail(_) => Some(Route::Clients),
      Route::ProjectDetail(_) => Some(Route::Projects),
      _ => None,
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.path())
  }
}
