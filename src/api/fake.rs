//! In-memory `CrmService` for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::ServiceError;
use super::service::CrmService;
use super::types::{
  Client, ClientInput, Contact, ContactInput, DashboardStats, Deal, DealInput, DealStage, Id,
  PipelineStats, Project, ProjectInput, StageSummary,
};

#[derive(Default)]
struct State {
  clients: Vec<Client>,
  contacts: Vec<Contact>,
  projects: Vec<Project>,
  deals: Vec<Deal>,
  next_id: Id,
  calls: HashMap<&'static str, usize>,
  failures: HashMap<&'static str, ServiceError>,
}

impl State {
  fn next_id(&mut self) -> Id {
    self.next_id += 1;
    self.next_id
  }
}

/// Fake CRM backend with call counters, injectable failures and latency.
#[derive(Default)]
pub struct FakeCrm {
  state: Mutex<State>,
  latency: Mutex<Duration>,
}

impl FakeCrm {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Every call sleeps this long before touching the store.
  pub fn set_latency(&self, latency: Duration) {
    *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
  }

  /// Make every call to `op` fail with `error` until cleared.
  pub fn fail(&self, op: &'static str, error: ServiceError) {
    self.lock().failures.insert(op, error);
  }

  pub fn clear_failures(&self) {
    self.lock().failures.clear();
  }

  /// Number of times `op` was called.
  pub fn calls(&self, op: &str) -> usize {
    self.lock().calls.get(op).copied().unwrap_or(0)
  }

  pub fn with_client(self, name: &str) -> Self {
    {
      let mut state = self.lock();
      let id = state.next_id();
      state.clients.push(Client {
        id,
        name: name.to_string(),
        email: None,
        phone: None,
        company: None,
        website: None,
        notes: None,
        updated_at: None,
      });
    }
    self
  }

  pub fn with_deal(self, title: &str, stage: DealStage, value: f64) -> Self {
    {
      let mut state = self.lock();
      let id = state.next_id();
      state.deals.push(Deal {
        id,
        title: title.to_string(),
        client_id: None,
        client_name: None,
        value,
        stage,
        expected_close: None,
        probability: 50,
        updated_at: None,
      });
    }
    self
  }

  /// Record the call, apply latency and return the injected failure if any.
  async fn enter(&self, op: &'static str) -> Result<(), ServiceError> {
    let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
    {
      let mut state = self.lock();
      *state.calls.entry(op).or_default() += 1;
    }
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }
    match self.lock().failures.get(op) {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }
}

fn not_found(what: &str, id: Id) -> ServiceError {
  ServiceError::Api {
    status: 404,
    message: format!("{} {} not found", what, id),
  }
}

fn client_from(id: Id, input: &ClientInput) -> Client {
  Client {
    id,
    name: input.name.clone(),
    email: input.email.clone(),
    phone: input.phone.clone(),
    company: input.company.clone(),
    website: input.website.clone(),
    notes: input.notes.clone(),
    updated_at: None,
  }
}

fn contact_from(id: Id, input: &ContactInput) -> Contact {
  Contact {
    id,
    client_id: input.client_id,
    first_name: input.first_name.clone(),
    last_name: input.last_name.clone(),
    email: input.email.clone(),
    phone: input.phone.clone(),
    role: input.role.clone(),
    updated_at: None,
  }
}

fn project_from(id: Id, input: &ProjectInput) -> Project {
  Project {
    id,
    client_id: input.client_id,
    name: input.name.clone(),
    status: input.status,
    budget: input.budget,
    start_date: input.start_date,
    end_date: input.end_date,
    description: input.description.clone(),
    updated_at: None,
  }
}

fn deal_from(id: Id, input: &DealInput) -> Deal {
  Deal {
    id,
    title: input.title.clone(),
    client_id: input.client_id,
    client_name: None,
    value: input.value,
    stage: input.stage,
    expected_close: input.expected_close,
    probability: input.probability,
    updated_at: None,
  }
}

fn replace<T>(items: &mut [T], id: Id, id_of: impl Fn(&T) -> Id, value: T) -> Option<()> {
  let slot = items.iter_mut().find(|item| id_of(item) == id)?;
  *slot = value;
  Some(())
}

#[async_trait]
impl CrmService for FakeCrm {
  async fn get_dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
    self.enter("get_dashboard_stats").await?;
    let state = self.lock();
    Ok(DashboardStats {
      total_clients: state.clients.len() as u64,
      active_projects: state
        .projects
        .iter()
        .filter(|p| p.status == super::types::ProjectStatus::Active)
        .count() as u64,
      open_deals: state.deals.iter().filter(|d| d.stage.is_open()).count() as u64,
      pipeline_value: state
        .deals
        .iter()
        .filter(|d| d.stage.is_open())
        .map(|d| d.value)
        .sum(),
      ..DashboardStats::default()
    })
  }

  async fn get_pipeline_stats(&self) -> Result<PipelineStats, ServiceError> {
    self.enter("get_pipeline_stats").await?;
    let state = self.lock();
    let stages = DealStage::ALL
      .into_iter()
      .map(|stage| {
        let deals = state.deals.iter().filter(|d| d.stage == stage);
        StageSummary {
          stage,
          count: deals.clone().count() as u64,
          value: deals.map(|d| d.value).sum(),
        }
      })
      .collect();
    Ok(PipelineStats {
      stages,
      ..PipelineStats::default()
    })
  }

  async fn get_recent_deals(&self, limit: usize) -> Result<Vec<Deal>, ServiceError> {
    self.enter("get_recent_deals").await?;
    Ok(self.lock().deals.iter().rev().take(limit).cloned().collect())
  }

  async fn get_deals_near_closing(&self, limit: usize) -> Result<Vec<Deal>, ServiceError> {
    self.enter("get_deals_near_closing").await?;
    let mut deals: Vec<Deal> = self
      .lock()
      .deals
      .iter()
      .filter(|d| d.stage.is_open() && d.expected_close.is_some())
      .cloned()
      .collect();
    deals.sort_by_key(|d| d.expected_close);
    deals.truncate(limit);
    Ok(deals)
  }

  async fn list_clients(&self) -> Result<Vec<Client>, ServiceError> {
    self.enter("list_clients").await?;
    Ok(self.lock().clients.clone())
  }

  async fn get_client(&self, id: Id) -> Result<Option<Client>, ServiceError> {
    self.enter("get_client").await?;
    Ok(self.lock().clients.iter().find(|c| c.id == id).cloned())
  }

  async fn create_client(&self, input: &ClientInput) -> Result<Client, ServiceError> {
    self.enter("create_client").await?;
    let mut state = self.lock();
    let client = client_from(state.next_id(), input);
    state.clients.push(client.clone());
    Ok(client)
  }

  async fn update_client(&self, id: Id, input: &ClientInput) -> Result<Client, ServiceError> {
    self.enter("update_client").await?;
    let client = client_from(id, input);
    replace(&mut self.lock().clients, id, |c| c.id, client.clone())
      .ok_or_else(|| not_found("client", id))?;
    Ok(client)
  }

  async fn delete_client(&self, id: Id) -> Result<(), ServiceError> {
    self.enter("delete_client").await?;
    let mut state = self.lock();
    state.clients.retain(|c| c.id != id);
    state.contacts.retain(|c| c.client_id != id);
    state.projects.retain(|p| p.client_id != id);
    Ok(())
  }

  async fn list_contacts(&self) -> Result<Vec<Contact>, ServiceError> {
    self.enter("list_contacts").await?;
    Ok(self.lock().contacts.clone())
  }

  async fn list_contacts_for_client(&self, client_id: Id) -> Result<Vec<Contact>, ServiceError> {
    self.enter("list_contacts_for_client").await?;
    Ok(
      self
        .lock()
        .contacts
        .iter()
        .filter(|c| c.client_id == client_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_contact(&self, id: Id) -> Result<Option<Contact>, ServiceError> {
    self.enter("get_contact").await?;
    Ok(self.lock().contacts.iter().find(|c| c.id == id).cloned())
  }

  async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ServiceError> {
    self.enter("create_contact").await?;
    let mut state = self.lock();
    let contact = contact_from(state.next_id(), input);
    state.contacts.push(contact.clone());
    Ok(contact)
  }

  async fn update_contact(&self, id: Id, input: &ContactInput) -> Result<Contact, ServiceError> {
    self.enter("update_contact").await?;
    let contact = contact_from(id, input);
    replace(&mut self.lock().contacts, id, |c| c.id, contact.clone())
      .ok_or_else(|| not_found("contact", id))?;
    Ok(contact)
  }

  async fn delete_contact(&self, id: Id) -> Result<(), ServiceError> {
    self.enter("delete_contact").await?;
    self.lock().contacts.retain(|c| c.id != id);
    Ok(())
  }

  async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
    self.enter("list_projects").await?;
    Ok(self.lock().projects.clone())
  }

  async fn list_projects_for_client(&self, client_id: Id) -> Result<Vec<Project>, ServiceError> {
    self.enter("list_projects_for_client").await?;
    Ok(
      self
        .lock()
        .projects
        .iter()
        .filter(|p| p.client_id == client_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_project(&self, id: Id) -> Result<Option<Project>, ServiceError> {
    self.enter("get_project").await?;
    Ok(self.lock().projects.iter().find(|p| p.id == id).cloned())
  }

  async fn create_project(&self, input: &ProjectInput) -> Result<Project, ServiceError> {
    self.enter("create_project").await?;
    let mut state = self.lock();
    let project = project_from(state.next_id(), input);
    state.projects.push(project.clone());
    Ok(project)
  }

  async fn update_project(&self, id: Id, input: &ProjectInput) -> Result<Project, ServiceError> {
    self.enter("update_project").await?;
    let project = project_from(id, input);
    replace(&mut self.lock().projects, id, |p| p.id, project.clone())
      .ok_or_else(|| not_found("project", id))?;
    Ok(project)
  }

  async fn delete_project(&self, id: Id) -> Result<(), ServiceError> {
    self.enter("delete_project").await?;
    self.lock().projects.retain(|p| p.id != id);
    Ok(())
  }

  async fn list_deals(&self) -> Result<Vec<Deal>, ServiceError> {
    self.enter("list_deals").await?;
    Ok(self.lock().deals.clone())
  }

  async fn create_deal(&self, input: &DealInput) -> Result<Deal, ServiceError> {
    self.enter("create_deal").await?;
    let mut state = self.lock();
    let deal = deal_from(state.next_id(), input);
    state.deals.push(deal.clone());
    Ok(deal)
  }

  async fn update_deal(&self, id: Id, input: &DealInput) -> Result<Deal, ServiceError> {
    self.enter("update_deal").await?;
    let deal = deal_from(id, input);
    replace(&mut self.lock().deals, id, |d| d.id, deal.clone())
      .ok_or_else(|| not_found("deal", id))?;
    Ok(deal)
  }

  async fn update_deal_stage(&self, id: Id, stage: DealStage) -> Result<Deal, ServiceError> {
    self.enter("update_deal_stage").await?;
    let mut state = self.lock();
    let deal = state
      .deals
      .iter_mut()
      .find(|d| d.id == id)
      .ok_or_else(|| not_found("deal", id))?;
    deal.stage = stage;
    Ok(deal.clone())
  }

  async fn delete_deal(&self, id: Id) -> Result<(), ServiceError> {
    self.enter("delete_deal").await?;
    self.lock().deals.retain(|d| d.id != id);
    Ok(())
  }
}
