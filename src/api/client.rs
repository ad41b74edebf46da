use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::{ApiErrorBody, ApiList, ApiStageUpdate};
use super::error::ServiceError;
use super::service::CrmService;
use super::types::{
  Client, ClientInput, Contact, ContactInput, DashboardStats, Deal, DealInput, DealStage, Id,
  PipelineStats, Project, ProjectInput,
};
use crate::config::Config;

/// HTTP/JSON client for the CRM REST API
#[derive(Clone)]
pub struct CrmClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl CrmClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base = base_url(&config.api.url)?;
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .user_agent(concat!("crmdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      token: Config::get_api_token(),
    })
  }

  fn url(&self, path: &str) -> Result<Url, ServiceError> {
    self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| ServiceError::InvalidRequest(format!("bad path {}: {}", path, e)))
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ServiceError> {
    let url = self.url(path)?;
    debug!(%method, %url, "api request");
    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
    let response = self.request(Method::GET, path)?.send().await?;
    decode(response).await
  }

  async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ServiceError> {
    let list: ApiList<T> = self.get(path).await?;
    Ok(list.into_vec())
  }

  /// GET that maps 404 to `None`
  async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ServiceError> {
    let response = self.request(Method::GET, path)?.send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    decode(response).await.map(Some)
  }

  async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ServiceError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let response = self.request(method, path)?.json(body).send().await?;
    decode(response).await
  }

  async fn delete(&self, path: &str) -> Result<(), ServiceError> {
    let response = self.request(Method::DELETE, path)?.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
  }
}

/// Normalize the base URL so relative joins keep its path.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API url {}: {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
  let status = response.status();
  let body = response.text().await?;
  if !status.is_success() {
    return Err(api_error(status, &body));
  }
  serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Build an error from a non-success response, preferring the message the
/// API put in its body.
fn api_error(status: StatusCode, body: &str) -> ServiceError {
  let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
  let message = parsed
    .message
    .or(parsed.error)
    .filter(|m| !m.trim().is_empty())
    .or_else(|| status.canonical_reason().map(String::from))
    .unwrap_or_else(|| "Request failed".to_string());

  warn!(status = status.as_u16(), %message, "api error");
  ServiceError::Api {
    status: status.as_u16(),
    message,
  }
}

#[async_trait]
impl CrmService for CrmClient {
  async fn get_dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
    self.get("dashboard/stats").await
  }

  async fn get_pipeline_stats(&self) -> Result<PipelineStats, ServiceError> {
    self.get("pipeline/stats").await
  }

  async fn get_recent_deals(&self, limit: usize) -> Result<Vec<Deal>, ServiceError> {
    self.get_list(&format!("deals/recent?limit={}", limit)).await
  }

  async fn get_deals_near_closing(&self, limit: usize) -> Result<Vec<Deal>, ServiceError> {
    self.get_list(&format!("deals/closing?limit={}", limit)).await
  }

  async fn list_clients(&self) -> Result<Vec<Client>, ServiceError> {
    self.get_list("clients").await
  }

  async fn get_client(&self, id: Id) -> Result<Option<Client>, ServiceError> {
    self.get_optional(&format!("clients/{}", id)).await
  }

  async fn create_client(&self, input: &ClientInput) -> Result<Client, ServiceError> {
    self.send_json(Method::POST, "clients", input).await
  }

  async fn update_client(&self, id: Id, input: &ClientInput) -> Result<Client, ServiceError> {
    self
      .send_json(Method::PUT, &format!("clients/{}", id), input)
      .await
  }

  async fn delete_client(&self, id: Id) -> Result<(), ServiceError> {
    self.delete(&format!("clients/{}", id)).await
  }

  async fn list_contacts(&self) -> Result<Vec<Contact>, ServiceError> {
    self.get_list("contacts").await
  }

  async fn list_contacts_for_client(&self, client_id: Id) -> Result<Vec<Contact>, ServiceError> {
    self
      .get_list(&format!("clients/{}/contacts", client_id))
      .await
  }

  async fn get_contact(&self, id: Id) -> Result<Option<Contact>, ServiceError> {
    self.get_optional(&format!("contacts/{}", id)).await
  }

  async fn create_contact(&self, input: &ContactInput) -> Result<Contact, ServiceError> {
    self.send_json(Method::POST, "contacts", input).await
  }

  async fn update_contact(&self, id: Id, input: &ContactInput) -> Result<Contact, ServiceError> {
    self
      .send_json(Method::PUT, &format!("contacts/{}", id), input)
      .await
  }

  async fn delete_contact(&self, id: Id) -> Result<(), ServiceError> {
    self.delete(&format!("contacts/{}", id)).await
  }

  async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
    self.get_list("projects").await
  }

  async fn list_projects_for_client(&self, client_id: Id) -> Result<Vec<Project>, ServiceError> {
    self
      .get_list(&format!("clients/{}/projects", client_id))
      .await
  }

  async fn get_project(&self, id: Id) -> Result<Option<Project>, ServiceError> {
    self.get_optional(&format!("projects/{}", id)).await
  }

  async fn create_project(&self, input: &ProjectInput) -> Result<Project, ServiceError> {
    self.send_json(Method::POST, "projects", input).await
  }

  async fn update_project(&self, id: Id, input: &ProjectInput) -> Result<Project, ServiceError> {
    self
      .send_json(Method::PUT, &format!("projects/{}", id), input)
      .await
  }

  async fn delete_project(&self, id: Id) -> Result<(), ServiceError> {
    self.delete(&format!("projects/{}", id)).await
  }

  async fn list_deals(&self) -> Result<Vec<Deal>, ServiceError> {
    self.get_list("deals").await
  }

  async fn create_deal(&self, input: &DealInput) -> Result<Deal, ServiceError> {
    self.send_json(Method::POST, "deals", input).await
  }

  async fn update_deal(&self, id: Id, input: &DealInput) -> Result<Deal, ServiceError> {
    self
      .send_json(Method::PUT, &format!("deals/{}", id), input)
      .await
  }

  async fn update_deal_stage(&self, id: Id, stage: DealStage) -> Result<Deal, ServiceError> {
    self
      .send_json(
        Method::PATCH,
        &format!("deals/{}/stage", id),
        &ApiStageUpdate { stage },
      )
      .await
  }

  async fn delete_deal(&self, id: Id) -> Result<(), ServiceError> {
    self.delete(&format!("deals/{}", id)).await
  }
}
