//! CRM service wrapped with the shared query cache.

use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{QueryCache, ToQueryKey};
use crate::query::{Query, QueryDef};

use super::error::ServiceError;
use super::keys::{CrmQueryKey, Scope};
use super::service::CrmService;
use super::types::{
  Client, ClientInput, Contact, ContactInput, DashboardStats, Deal, DealInput, DealStage, Id,
  PipelineStats, Project, ProjectInput,
};

/// CRM service with cached reads and invalidating writes.
///
/// Reads are handed out as [`QueryDef`]s so views can bind them to a
/// [`Query`]. Writes call the service and, only once the call succeeded,
/// invalidate every key prefix the write can affect.
#[derive(Clone)]
pub struct CachedCrm {
  service: Arc<dyn CrmService>,
  cache: QueryCache,
}

impl CachedCrm {
  pub fn new(service: Arc<dyn CrmService>, cache: QueryCache) -> Self {
    Self { service, cache }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Bind a read to a view-level query handle.
  pub fn query<T: Send + Sync + 'static>(&self, def: QueryDef<T>) -> Query<T> {
    Query::new(self.cache.clone(), def)
  }

  /// Fetch a read through the cache and wait for it.
  #[cfg(test)]
  pub async fn fetch<T: Send + Sync + 'static>(
    &self,
    def: &QueryDef<T>,
  ) -> Result<Arc<T>, crate::cache::QueryError> {
    def.fetch(&self.cache).await
  }

  fn def<T, F, Fut>(&self, key: CrmQueryKey, call: F) -> QueryDef<T>
  where
    T: Send + Sync + 'static,
    F: Fn(Arc<dyn CrmService>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
  {
    let service = Arc::clone(&self.service);
    QueryDef::new(&key, move || call(Arc::clone(&service)))
  }

  fn invalidate(&self, scopes: &[Scope]) {
    for scope in scopes {
      self.cache.invalidate(&scope.query_key());
    }
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub fn dashboard_stats(&self) -> QueryDef<DashboardStats> {
    self.def(CrmQueryKey::DashboardStats, |s| async move {
      s.get_dashboard_stats().await
    })
  }

  pub fn pipeline_stats(&self) -> QueryDef<PipelineStats> {
    self.def(CrmQueryKey::PipelineStats, |s| async move {
      s.get_pipeline_stats().await
    })
  }

  pub fn recent_deals(&self, limit: usize) -> QueryDef<Vec<Deal>> {
    self.def(CrmQueryKey::RecentDeals { limit }, move |s| async move {
      s.get_recent_deals(limit).await
    })
  }

  pub fn deals_near_closing(&self, limit: usize) -> QueryDef<Vec<Deal>> {
    self.def(CrmQueryKey::DealsNearClosing { limit }, move |s| async move {
      s.get_deals_near_closing(limit).await
    })
  }

  pub fn deals(&self) -> QueryDef<Vec<Deal>> {
    self.def(CrmQueryKey::Deals, |s| async move { s.list_deals().await })
  }

  pub fn clients(&self) -> QueryDef<Vec<Client>> {
    self.def(CrmQueryKey::Clients, |s| async move { s.list_clients().await })
  }

  pub fn client(&self, id: Id) -> QueryDef<Option<Client>> {
    self.def(CrmQueryKey::Client { id }, move |s| async move {
      s.get_client(id).await
    })
  }

  pub fn client_contacts(&self, client_id: Id) -> QueryDef<Vec<Contact>> {
    self.def(CrmQueryKey::ClientContacts { client_id }, move |s| async move {
      s.list_contacts_for_client(client_id).await
    })
  }

  pub fn client_projects(&self, client_id: Id) -> QueryDef<Vec<Project>> {
    self.def(CrmQueryKey::ClientProjects { client_id }, move |s| async move {
      s.list_projects_for_client(client_id).await
    })
  }

  pub fn contacts(&self) -> QueryDef<Vec<Contact>> {
    self.def(CrmQueryKey::Contacts, |s| async move { s.list_contacts().await })
  }

  pub fn contact(&self, id: Id) -> QueryDef<Option<Contact>> {
    self.def(CrmQueryKey::Contact { id }, move |s| async move {
      s.get_contact(id).await
    })
  }

  pub fn projects(&self) -> QueryDef<Vec<Project>> {
    self.def(CrmQueryKey::Projects, |s| async move { s.list_projects().await })
  }

  pub fn project(&self, id: Id) -> QueryDef<Option<Project>> {
    self.def(CrmQueryKey::Project { id }, move |s| async move {
      s.get_project(id).await
    })
  }

  // ==========================================================================
  // Clients
  // ==========================================================================

  pub async fn create_client(&self, input: &ClientInput) -> Result<Client, ServiceError> {
    let client = self.service.create_client(input).await?;
    info!(id = client.id, name = %client.name, "client created");
    self.invalidate(&[Scope::Clients, Scope::Dashboard]);
    self.store_client(&client);
    Ok(client)
  }

  pub async fn update_client(&self, id: Id, input: &ClientInput) -> Result<Client, ServiceError> {
    let client = self.service.update_client(id, input).await?;
    info!(id, name = %client.name, "client updated");
    self.invalidate(&[Scope::Clients, Scope::Dashboard]);
    self.store_client(&client);
    Ok(client)
  }

  /// Deleting a client cascades to its contacts, projects and deals.
  pub async fn delete_client(&self, id: Id) -> Result<(), ServiceError> {
    self.service.delete_client(id).await?;
    info!(id, "client deleted");
    self.invalidate(&[
      Scope::Clients,
      Scope::Contacts,
      Scope::Projects,
      Scope::Deals,
      Scope::Pipeline,
      Scope::Dashboard,
    ]);
    self.cache.remove(&Scope::Client(id).query_key());
    Ok(())
  }

  fn store_client(&self, client: &Client) {
    self.cache.set_data(
      &CrmQueryKey::Client { id: client.id }.query_key(),
      Some(client.clone()),
    );
  }

  // ==========================================================================
  // Contacts
  // ==========================================================================

  pub async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ServiceError> {
    let contact = self.service.create_contact(input).await?;
    info!(id = contact.id, client_id = contact.client_id, "contact created");
    self.invalidate(&[Scope::Contacts, Scope::Client(contact.client_id)]);
    Ok(contact)
  }

  pub async fn update_contact(&self, id: Id, input: &ContactInput) -> Result<Contact, ServiceError> {
    let previous_owner = self.contact_owner(id).await;
    let contact = self.service.update_contact(id, input).await?;
    info!(id, client_id = contact.client_id, "contact updated");

    let mut scopes = vec![Scope::Contacts, Scope::Client(contact.client_id)];
    scopes.extend(moved_from(previous_owner, contact.client_id));
    self.invalidate(&scopes);
    self.cache.set_data(
      &CrmQueryKey::Contact { id }.query_key(),
      Some(contact.clone()),
    );
    Ok(contact)
  }

  pub async fn delete_contact(&self, id: Id) -> Result<(), ServiceError> {
    let owner = self.contact_owner(id).await;
    self.service.delete_contact(id).await?;
    info!(id, "contact deleted");
    self.invalidate(&[Scope::Contacts, owner.map(Scope::Client).unwrap_or(Scope::Clients)]);
    self.cache.remove(&CrmQueryKey::Contact { id }.query_key());
    Ok(())
  }

  /// Client owning a contact before a write, read through the cache.
  async fn contact_owner(&self, id: Id) -> Option<Id> {
    match self.contact(id).fetch(&self.cache).await {
      Ok(contact) => contact.as_ref().as_ref().map(|c| c.client_id),
      Err(e) => {
        warn!(id, error = %e, "owner of contact unknown");
        None
      }
    }
  }

  // ==========================================================================
  // Projects
  // ==========================================================================

  pub async fn create_project(&self, input: &ProjectInput) -> Result<Project, ServiceError> {
    let project = self.service.create_project(input).await?;
    info!(id = project.id, client_id = project.client_id, "project created");
    self.invalidate(&[
      Scope::Projects,
      Scope::Client(project.client_id),
      Scope::Dashboard,
    ]);
    Ok(project)
  }

  pub async fn update_project(&self, id: Id, input: &ProjectInput) -> Result<Project, ServiceError> {
    let previous_owner = self.project_owner(id).await;
    let project = self.service.update_project(id, input).await?;
    info!(id, status = %project.status, "project updated");

    let mut scopes = vec![
      Scope::Projects,
      Scope::Client(project.client_id),
      Scope::Dashboard,
    ];
    scopes.extend(moved_from(previous_owner, project.client_id));
    self.invalidate(&scopes);
    self.cache.set_data(
      &CrmQueryKey::Project { id }.query_key(),
      Some(project.clone()),
    );
    Ok(project)
  }

  pub async fn delete_project(&self, id: Id) -> Result<(), ServiceError> {
    let owner = self.project_owner(id).await;
    self.service.delete_project(id).await?;
    info!(id, "project deleted");
    self.invalidate(&[
      Scope::Projects,
      owner.map(Scope::Client).unwrap_or(Scope::Clients),
      Scope::Dashboard,
    ]);
    self.cache.remove(&CrmQueryKey::Project { id }.query_key());
    Ok(())
  }

  /// Client owning a project before a write, read through the cache.
  async fn project_owner(&self, id: Id) -> Option<Id> {
    match self.project(id).fetch(&self.cache).await {
      Ok(project) => project.as_ref().as_ref().map(|p| p.client_id),
      Err(e) => {
        warn!(id, error = %e, "owner of project unknown");
        None
      }
    }
  }

  // ==========================================================================
  // Deals
  // ==========================================================================

  const DEAL_SCOPES: [Scope; 3] = [Scope::Deals, Scope::Pipeline, Scope::Dashboard];

  pub async fn create_deal(&self, input: &DealInput) -> Result<Deal, ServiceError> {
    let deal = self.service.create_deal(input).await?;
    info!(id = deal.id, stage = %deal.stage, "deal created");
    self.invalidate(&Self::DEAL_SCOPES);
    Ok(deal)
  }

  pub async fn update_deal(&self, id: Id, input: &DealInput) -> Result<Deal, ServiceError> {
    let deal = self.service.update_deal(id, input).await?;
    info!(id, stage = %deal.stage, "deal updated");
    self.invalidate(&Self::DEAL_SCOPES);
    Ok(deal)
  }

  /// Move a deal to another pipeline stage.
  pub async fn update_deal_stage(&self, id: Id, stage: DealStage) -> Result<Deal, ServiceError> {
    let deal = self.service.update_deal_stage(id, stage).await?;
    info!(id, %stage, "deal moved");
    self.invalidate(&Self::DEAL_SCOPES);
    Ok(deal)
  }

  pub async fn delete_deal(&self, id: Id) -> Result<(), ServiceError> {
    self.service.delete_deal(id).await?;
    info!(id, "deal deleted");
    self.invalidate(&Self::DEAL_SCOPES);
    Ok(())
  }
}

/// Extra scope for a record that may have changed owner: the previous
/// owner when it differs, every client when it is unknown.
fn moved_from(previous: Option<Id>, current: Id) -> Option<Scope> {
  match previous {
    Some(previous) if previous == current => None,
    Some(previous) => Some(Scope::Client(previous)),
    None => Some(Scope::Clients),
  }
}
