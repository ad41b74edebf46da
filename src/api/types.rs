use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the remote store
pub type Id = u64;

/// Client (customer organisation or person)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
  pub id: Id,
  pub name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub company: Option<String>,
  #[serde(default)]
  pub website: Option<String>,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

/// Full-record payload for creating or replacing a client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientInput {
  pub name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub company: Option<String>,
  pub website: Option<String>,
  pub notes: Option<String>,
}

/// Person attached to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id: Id,
  pub client_id: Id,
  pub first_name: String,
  pub last_name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub role: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

impl Contact {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
      .trim()
      .to_string()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactInput {
  pub client_id: Id,
  pub first_name: String,
  pub last_name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
  #[default]
  Planning,
  Active,
  OnHold,
  Completed,
  Cancelled,
}

impl ProjectStatus {
  pub const ALL: [ProjectStatus; 5] = [
    ProjectStatus::Planning,
    ProjectStatus::Active,
    ProjectStatus::OnHold,
    ProjectStatus::Completed,
    ProjectStatus::Cancelled,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      ProjectStatus::Planning => "Planning",
      ProjectStatus::Active => "Active",
      ProjectStatus::OnHold => "On Hold",
      ProjectStatus::Completed => "Completed",
      ProjectStatus::Cancelled => "Cancelled",
    }
  }

  /// Parse a label or snake_case name, case-insensitively.
  pub fn parse(s: &str) -> Option<Self> {
    let needle = s.trim().to_lowercase().replace([' ', '-'], "_");
    Self::ALL.into_iter().find(|status| {
      status.label().to_lowercase().replace(' ', "_") == needle
    })
  }
}

impl fmt::Display for ProjectStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: Id,
  pub client_id: Id,
  pub name: String,
  #[serde(default)]
  pub status: ProjectStatus,
  #[serde(default)]
  pub budget: Option<f64>,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub end_date: Option<NaiveDate>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectInput {
  pub client_id: Id,
  pub name: String,
  pub status: ProjectStatus,
  pub budget: Option<f64>,
  pub start_date: Option<NaiveDate>,
  pub end_date: Option<NaiveDate>,
  pub description: Option<String>,
}

/// Pipeline stage, in board order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
  #[default]
  Lead,
  Qualified,
  Proposal,
  Negotiation,
  Won,
  Lost,
}

impl DealStage {
  pub const ALL: [DealStage; 6] = [
    DealStage::Lead,
    DealStage::Qualified,
    DealStage::Proposal,
    DealStage::Negotiation,
    DealStage::Won,
    DealStage::Lost,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      DealStage::Lead => "Lead",
      DealStage::Qualified => "Qualified",
      DealStage::Proposal => "Proposal",
      DealStage::Negotiation => "Negotiation",
      DealStage::Won => "Won",
      DealStage::Lost => "Lost",
    }
  }

  /// Column index on the board
  pub fn index(&self) -> usize {
    Self::ALL.iter().position(|s| s == self).unwrap_or(0)
  }

  pub fn is_open(&self) -> bool {
    !matches!(self, DealStage::Won | DealStage::Lost)
  }

  pub fn parse(s: &str) -> Option<Self> {
    let needle = s.trim().to_lowercase();
    Self::ALL
      .into_iter()
      .find(|stage| stage.label().to_lowercase() == needle)
  }
}

impl fmt::Display for DealStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
  pub id: Id,
  pub title: String,
  #[serde(default)]
  pub client_id: Option<Id>,
  #[serde(default)]
  pub client_name: Option<String>,
  #[serde(default)]
  pub value: f64,
  #[serde(default)]
  pub stage: DealStage,
  #[serde(default)]
  pub expected_close: Option<NaiveDate>,
  /// Win probability in percent
  #[serde(default)]
  pub probability: u8,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealInput {
  pub title: String,
  pub client_id: Option<Id>,
  pub value: f64,
  pub stage: DealStage,
  pub expected_close: Option<NaiveDate>,
  pub probability: u8,
}

/// Headline numbers for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
  pub total_clients: u64,
  pub active_projects: u64,
  pub open_deals: u64,
  pub pipeline_value: f64,
  pub won_this_month: f64,
  /// Share of closed deals that were won, 0.0 - 1.0
  pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
  pub stage: DealStage,
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStats {
  pub stages: Vec<StageSummary>,
  /// Sum of value * probability over open deals
  pub weighted_value: f64,
}
