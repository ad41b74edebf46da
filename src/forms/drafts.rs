use futures::future::{BoxFuture, FutureExt};

use super::{
  parse_amount, parse_date, parse_percent, parse_reference, FieldErrors, FieldKind, FieldSpec,
};
use crate::api::{
  CachedCrm, Client, ClientInput, Contact, ContactInput, Deal, DealInput, DealStage, Id, Project,
  ProjectInput, ProjectStatus, ServiceError,
};

use super::controller::Saved;

const PROJECT_STATUSES: &[&str] = &["Planning", "Active", "On Hold", "Completed", "Cancelled"];
const DEAL_STAGES: &[&str] = &["Lead", "Qualified", "Proposal", "Negotiation", "Won", "Lost"];

/// Editable string form of an entity.
pub trait Draft: Clone + Default + Send + 'static {
  type Entity;

  /// Entity name for titles and notifications, e.g. "Client"
  const ENTITY: &'static str;

  fn fields() -> &'static [FieldSpec];

  fn value(&self, field: &str) -> &str;

  fn value_mut(&mut self, field: &str) -> Option<&mut String>;

  /// Pre-fill from an existing record for editing
  fn from_entity(entity: &Self::Entity) -> Self;

  /// Rules spanning several fields
  fn cross_check(&self, _errors: &mut FieldErrors) {}

  /// Create (`id` is `None`) or replace the record. Only called on a draft
  /// that passed validation.
  fn save(&self, crm: &CachedCrm, id: Option<Id>) -> BoxFuture<'static, Result<Saved, ServiceError>>;
}

fn opt(value: &str) -> Option<String> {
  let value = value.trim();
  (!value.is_empty()).then(|| value.to_string())
}

fn text(value: &Option<String>) -> String {
  value.clone().unwrap_or_default()
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDraft {
  pub name: String,
  pub email: String,
  pub phone: String,
  pub company: String,
  pub website: String,
  pub notes: String,
}

const CLIENT_FIELDS: &[FieldSpec] = &[
  FieldSpec::required("name", "Name", FieldKind::Text),
  FieldSpec::optional("email", "Email", FieldKind::Email),
  FieldSpec::optional("phone", "Phone", FieldKind::Phone),
  FieldSpec::optional("company", "Company", FieldKind::Text),
  FieldSpec::optional("website", "Website", FieldKind::Url),
  FieldSpec::optional("notes", "Notes", FieldKind::Text),
];

impl ClientDraft {
  pub fn input(&self) -> ClientInput {
    ClientInput {
      name: self.name.trim().to_string(),
      email: opt(&self.email),
      phone: opt(&self.phone),
      company: opt(&self.company),
      website: opt(&self.website),
      notes: opt(&self.notes),
    }
  }
}

impl Draft for ClientDraft {
  type Entity = Client;
  const ENTITY: &'static str = "Client";

  fn fields() -> &'static [FieldSpec] {
    CLIENT_FIELDS
  }

  fn value(&self, field: &str) -> &str {
    match field {
      "name" => &self.name,
      "email" => &self.email,
      "phone" => &self.phone,
      "company" => &self.company,
      "website" => &self.website,
      "notes" => &self.notes,
      _ => "",
    }
  }

  fn value_mut(&mut self, field: &str) -> Option<&mut String> {
    match field {
      "name" => Some(&mut self.name),
      "email" => Some(&mut self.email),
      "phone" => Some(&mut self.phone),
      "company" => Some(&mut self.company),
      "website" => Some(&mut self.website),
      "notes" => Some(&mut self.notes),
      _ => None,
    }
  }

  fn from_entity(client: &Client) -> Self {
    Self {
      name: client.name.clone(),
      email: text(&client.email),
      phone: text(&client.phone),
      company: text(&client.company),
      website: text(&client.website),
      notes: text(&client.notes),
    }
  }

  fn save(&self, crm: &CachedCrm, id: Option<Id>) -> BoxFuture<'static, Result<Saved, ServiceError>> {
    let crm = crm.clone();
    let input = self.input();
    async move {
      let client = match id {
        Some(id) => crm.update_client(id, &input).await?,
        None => crm.create_client(&input).await?,
      };
      Ok(Saved {
        id: client.id,
        label: client.name,
      })
    }
    .boxed()
  }
}

// ============================================================================
// Contact
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
  pub client_id: String,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub phone: String,
  pub role: String,
}

const CONTACT_FIELDS: &[FieldSpec] = &[
  FieldSpec::required("client_id", "Client", FieldKind::Reference),
  FieldSpec::required("first_name", "First name", FieldKind::Text),
  FieldSpec::required("last_name", "Last name", FieldKind::Text),
  FieldSpec::optional("email", "Email", FieldKind::Email),
  FieldSpec::optional("phone", "Phone", FieldKind::Phone),
  FieldSpec::optional("role", "Role", FieldKind::Text),
];

impl ContactDraft {
  /// Empty draft attached to a client
  pub fn for_client(client_id: Id) -> Self {
    Self {
      client_id: client_id.to_string(),
      ..Self::default()
    }
  }

  pub fn input(&self) -> ContactInput {
    ContactInput {
      client_id: parse_reference(&self.client_id).unwrap_or_default(),
      first_name: self.first_name.trim().to_string(),
      last_name: self.last_name.trim().to_string(),
      email: opt(&self.email),
      phone: opt(&self.phone),
      role: opt(&self.role),
    }
  }
}

impl Draft for ContactDraft {
  type Entity = Contact;
  const ENTITY: &'static str = "Contact";

  fn fields() -> &'static [FieldSpec] {
    CONTACT_FIELDS
  }

  fn value(&self, field: &str) -> &str {
    match field {
      "client_id" => &self.client_id,
      "first_name" => &self.first_name,
      "last_name" => &self.last_name,
      "email" => &self.email,
      "phone" => &self.phone,
      "role" => &self.role,
      _ => "",
    }
  }

  fn value_mut(&mut self, field: &str) -> Option<&mut String> {
    match field {
      "client_id" => Some(&mut self.client_id),
      "first_name" => Some(&mut self.first_name),
      "last_name" => Some(&mut self.last_name),
      "email" => Some(&mut self.email),
      "phone" => Some(&mut self.phone),
      "role" => Some(&mut self.role),
      _ => None,
    }
  }

  fn from_entity(contact: &Contact) -> Self {
    Self {
      client_id: contact.client_id.to_string(),
      first_name: contact.first_name.clone(),
      last_name: contact.last_name.clone(),
      email: text(&contact.email),
      phone: text(&contact.phone),
      role: text(&contact.role),
    }
  }

  fn save(&self, crm: &CachedCrm, id: Option<Id>) -> BoxFuture<'static, Result<Saved, ServiceError>> {
    let crm = crm.clone();
    let input = self.input();
    async move {
      let contact = match id {
        Some(id) => crm.update_contact(id, &input).await?,
        None => crm.create_contact(&input).await?,
      };
      Ok(Saved {
        id: contact.id,
        label: contact.full_name(),
      })
    }
    .boxed()
  }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
  pub client_id: String,
  pub name: String,
  pub status: String,
  pub budget: String,
  pub start_date: String,
  pub end_date: String,
  pub description: String,
}

impl Default for ProjectDraft {
  fn default() -> Self {
    Self {
      client_id: String::new(),
      name: String::new(),
      status: ProjectStatus::default().label().to_string(),
      budget: String::new(),
      start_date: String::new(),
      end_date: String::new(),
      description: String::new(),
    }
  }
}

const PROJECT_FIELDS: &[FieldSpec] = &[
  FieldSpec::required("client_id", "Client", FieldKind::Reference),
  FieldSpec::required("name", "Name", FieldKind::Text),
  FieldSpec::required("status", "Status", FieldKind::Choice(PROJECT_STATUSES)),
  FieldSpec::optional("budget", "Budget", FieldKind::Number),
  FieldSpec::optional("start_date", "Start date", FieldKind::Date),
  FieldSpec::optional("end_date", "End date", FieldKind::Date),
  FieldSpec::optional("description", "Description", FieldKind::Text),
];

impl ProjectDraft {
  pub fn for_client(client_id: Id) -> Self {
    Self {
      client_id: client_id.to_string(),
      ..Self::default()
    }
  }

  pub fn input(&self) -> ProjectInput {
    ProjectInput {
      client_id: parse_reference(&self.client_id).unwrap_or_default(),
      name: self.name.trim().to_string(),
      status: ProjectStatus::parse(&self.status).unwrap_or_default(),
      budget: parse_amount(&self.budget),
      start_date: parse_date(&self.start_date),
      end_date: parse_date(&self.end_date),
      description: opt(&self.description),
    }
  }
}

impl Draft for ProjectDraft {
  type Entity = Project;
  const ENTITY: &'static str = "Project";

  fn fields() -> &'static [FieldSpec] {
    PROJECT_FIELDS
  }

  fn value(&self, field: &str) -> &str {
    match field {
      "client_id" => &self.client_id,
      "name" => &self.name,
      "status" => &self.status,
      "budget" => &self.budget,
      "start_date" => &self.start_date,
      "end_date" => &self.end_date,
      "description" => &self.description,
      _ => "",
    }
  }

  fn value_mut(&mut self, field: &str) -> Option<&mut String> {
    match field {
      "client_id" => Some(&mut self.client_id),
      "name" => Some(&mut self.name),
      "status" => Some(&mut self.status),
      "budget" => Some(&mut self.budget),
      "start_date" => Some(&mut self.start_date),
      "end_date" => Some(&mut self.end_date),
      "description" => Some(&mut self.description),
      _ => None,
    }
  }

  fn from_entity(project: &Project) -> Self {
    Self {
      client_id: project.client_id.to_string(),
      name: project.name.clone(),
      status: project.status.label().to_string(),
      budget: project.budget.map(|b| b.to_string()).unwrap_or_default(),
      start_date: project.start_date.map(|d| d.to_string()).unwrap_or_default(),
      end_date: project.end_date.map(|d| d.to_string()).unwrap_or_default(),
      description: text(&project.description),
    }
  }

  fn cross_check(&self, errors: &mut FieldErrors) {
    if let (Some(start), Some(end)) = (parse_date(&self.start_date), parse_date(&self.end_date)) {
      if end < start {
        errors.insert("end_date", "End date cannot be before the start date");
      }
    }
  }

  fn save(&self, crm: &CachedCrm, id: Option<Id>) -> BoxFuture<'static, Result<Saved, ServiceError>> {
    let crm = crm.clone();
    let input = self.input();
    async move {
      let project = match id {
        Some(id) => crm.update_project(id, &input).await?,
        None => crm.create_project(&input).await?,
      };
      Ok(Saved {
        id: project.id,
        label: project.name,
      })
    }
    .boxed()
  }
}

// ============================================================================
// Deal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealDraft {
  pub title: String,
  pub client_id: String,
  pub value: String,
  pub stage: String,
  pub expected_close: String,
  pub probability: String,
}

impl Default for DealDraft {
  fn default() -> Self {
    Self {
      title: String::new(),
      client_id: String::new(),
      value: String::new(),
      stage: DealStage::default().label().to_string(),
      expected_close: String::new(),
      probability: "10".to_string(),
    }
  }
}

const DEAL_FIELDS: &[FieldSpec] = &[
  FieldSpec::required("title", "Title", FieldKind::Text),
  FieldSpec::optional("client_id", "Client", FieldKind::Reference),
  FieldSpec::required("value", "Value", FieldKind::Number),
  FieldSpec::required("stage", "Stage", FieldKind::Choice(DEAL_STAGES)),
  FieldSpec::optional("expected_close", "Expected close", FieldKind::Date),
  FieldSpec::required("probability", "Probability %", FieldKind::Percent),
];

impl DealDraft {
  pub fn input(&self) -> DealInput {
    DealInput {
      title: self.title.trim().to_string(),
      client_id: parse_reference(&self.client_id),
      value: parse_amount(&self.value).unwrap_or_default(),
      stage: DealStage::parse(&self.stage).unwrap_or_default(),
      expected_close: parse_date(&self.expected_close),
      probability: parse_percent(&self.probability).unwrap_or_default(),
    }
  }
}

impl Draft for DealDraft {
  type Entity = Deal;
  const ENTITY: &'static str = "Deal";

  fn fields() -> &'static [FieldSpec] {
    DEAL_FIELDS
  }

  fn value(&self, field: &str) -> &str {
    match field {
      "title" => &self.title,
      "client_id" => &self.client_id,
      "value" => &self.value,
      "stage" => &self.stage,
      "expected_close" => &self.expected_close,
      "probability" => &self.probability,
      _ => "",
    }
  }

  fn value_mut(&mut self, field: &str) -> Option<&mut String> {
    match field {
      "title" => Some(&mut self.title),
      "client_id" => Some(&mut self.client_id),
      "value" => Some(&mut self.value),
      "stage" => Some(&mut self.stage),
      "expected_close" => Some(&mut self.expected_close),
      "probability" => Some(&mut self.probability),
      _ => None,
    }
  }

  fn from_entity(deal: &Deal) -> Self {
    Self {
      title: deal.title.clone(),
      client_id: deal.client_id.map(|id| id.to_string()).unwrap_or_default(),
      value: deal.value.to_string(),
      stage: deal.stage.label().to_string(),
      expected_close: deal
        .expected_close
        .map(|d| d.to_string())
        .unwrap_or_default(),
      probability: deal.probability.to_string(),
    }
  }

  fn save(&self, crm: &CachedCrm, id: Option<Id>) -> BoxFuture<'static, Result<Saved, ServiceError>> {
    let crm = crm.clone();
    let input = self.input();
    async move {
      let deal = match id {
        Some(id) => crm.update_deal(id, &input).await?,
        None => crm.create_deal(&input).await?,
      };
      Ok(Saved {
        id: deal.id,
        label: deal.title,
      })
    }
    .boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::forms::validate;
  use chrono::NaiveDate;

  #[test]
  fn test_client_requires_name() {
    let errors = validate(&ClientDraft::default());
    assert_eq!(errors.get("name"), Some("Name is required"));
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn test_client_input_trims_and_drops_blanks() {
    let draft = ClientDraft {
      name: "  Acme ".into(),
      email: "ops@acme.io".into(),
      phone: "   ".into(),
      ..ClientDraft::default()
    };
    assert!(validate(&draft).is_empty());
    let input = draft.input();
    assert_eq!(input.name, "Acme");
    assert_eq!(input.email.as_deref(), Some("ops@acme.io"));
    assert_eq!(input.phone, None);
  }

  #[test]
  fn test_contact_requires_client_and_names() {
    let errors = validate(&ContactDraft::default());
    assert!(errors.get("client_id").is_some());
    assert!(errors.get("first_name").is_some());
    assert!(errors.get("last_name").is_some());

    let draft = ContactDraft {
      first_name: "Ada".into(),
      last_name: "Lovelace".into(),
      ..ContactDraft::for_client(4)
    };
    assert!(validate(&draft).is_empty());
    assert_eq!(draft.input().client_id, 4);
  }

  #[test]
  fn test_project_end_before_start_is_rejected() {
    let draft = ProjectDraft {
      name: "Migration".into(),
      start_date: "2026-05-01".into(),
      end_date: "2026-04-30".into(),
      ..ProjectDraft::for_client(1)
    };
    let errors = validate(&draft);
    assert_eq!(
      errors.get("end_date"),
      Some("End date cannot be before the start date")
    );
  }

  #[test]
  fn test_project_round_trips_through_draft() {
    let project = Project {
      id: 9,
      client_id: 2,
      name: "Rollout".into(),
      status: ProjectStatus::OnHold,
      budget: Some(1500.0),
      start_date: NaiveDate::from_ymd_opt(2026, 1, 5),
      end_date: None,
      description: None,
      updated_at: None,
    };
    let draft = ProjectDraft::from_entity(&project);
    assert_eq!(draft.status, "On Hold");
    assert!(validate(&draft).is_empty());

    let input = draft.input();
    assert_eq!(input.status, ProjectStatus::OnHold);
    assert_eq!(input.budget, Some(1500.0));
    assert_eq!(input.start_date, project.start_date);
  }

  #[test]
  fn test_deal_defaults_validate_once_titled() {
    let draft = DealDraft {
      title: "Renewal".into(),
      value: "2500".into(),
      ..DealDraft::default()
    };
    assert!(validate(&draft).is_empty());
    let input = draft.input();
    assert_eq!(input.stage, DealStage::Lead);
    assert_eq!(input.probability, 10);
    assert_eq!(input.client_id, None);
  }

  #[test]
  fn test_value_mut_edits_named_field() {
    let mut draft = ClientDraft::default();
    draft.value_mut("company").unwrap().push_str("Globex");
    assert_eq!(draft.value("company"), "Globex");
    assert!(draft.value_mut("missing").is_none());
  }
}
