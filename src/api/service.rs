use async_trait::async_trait;

use super::error::ServiceError;
use super::types::{
  Client, ClientInput, Contact, ContactInput, DashboardStats, Deal, DealInput, DealStage, Id,
  PipelineStats, Project, ProjectInput,
};

/// Remote CRM operations.
///
/// Every write is a full-record create or replace. `get_*` returns
/// `Ok(None)` when the record does not exist.
#[async_trait]
pub trait CrmService: Send + Sync {
  async fn get_dashboard_stats(&self) -> Result<DashboardStats, ServiceError>;
  async fn get_pipeline_stats(&self) -> Result<PipelineStats, ServiceError>;
  async fn get_recent_deals(&self, limit: usize) -> Result<Vec<Deal>, ServiceError>;
  async fn get_deals_near_closing(&self, limit: usize) -> Result<Vec<Deal>, ServiceError>;

  async fn list_clients(&self) -> Result<Vec<Client>, ServiceError>;
  async fn get_client(&self, id: Id) -> Result<Option<Client>, ServiceError>;
  async fn create_client(&self, input: &ClientInput) -> Result<Client, ServiceError>;
  async fn update_client(&self, id: Id, input: &ClientInput) -> Result<Client, ServiceError>;
  async fn delete_client(&self, id: Id) -> Result<(), ServiceError>;

  async fn list_contacts(&self) -> Result<Vec<Contact>, ServiceError>;
  async fn list_contacts_for_client(&self, client_id: Id) -> Result<Vec<Contact>, ServiceError>;
  async fn get_contact(&self, id: Id) -> Result<Option<Contact>, ServiceError>;
  async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ServiceError>;
  async fn update_contact(&self, id: Id, input: &ContactInput) -> Result<Contact, ServiceError>;
  async fn delete_contact(&self, id: Id) -> Result<(), ServiceError>;

  async fn list_projects(&self) -> Result<Vec<Project>, ServiceError>;
  async fn list_projects_for_client(&self, client_id: Id) -> Result<Vec<Project>, ServiceError>;
  async fn get_project(&self, id: Id) -> Result<Option<Project>, ServiceError>;
  async fn create_project(&self, input: &ProjectInput) -> Result<Project, ServiceError>;
  async fn update_project(&self, id: Id, input: &ProjectInput) -> Result<Project, ServiceError>;
  async fn delete_project(&self, id: Id) -> Result<(), ServiceError>;

  async fn list_deals(&self) -> Result<Vec<Deal>, ServiceError>;
  async fn create_deal(&self, input: &DealInput) -> Result<Deal, ServiceError>;
  async fn update_deal(&self, id: Id, input: &DealInput) -> Result<Deal, ServiceError>;
  async fn update_deal_stage(&self, id: Id, stage: DealStage) -> Result<Deal, ServiceError>;
  async fn delete_deal(&self, id: Id) -> Result<(), ServiceError>;
}
