use futures::future::BoxFuture;
use tracing::{info, warn};

use super::drafts::Draft;
use super::{validate, FieldErrors};
use crate::api::{CachedCrm, Id, ServiceError};
use crate::toast::ToastSender;

/// Whether the form creates a new record or replaces an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
  Create,
  Edit(Id),
}

impl FormMode {
  pub fn id(&self) -> Option<Id> {
    match self {
      FormMode::Create => None,
      FormMode::Edit(id) => Some(*id),
    }
  }
}

/// The record a successful submit wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
  pub id: Id,
  pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
  /// Validation failed; errors are on the controller
  Invalid,
  /// A submit is already running
  Busy,
  Saved(Saved),
  Failed(ServiceError),
}

/// Draft state plus the submit flow of one form.
///
/// Validation errors stay inline and never raise a toast. A remote failure
/// raises a destructive toast and keeps the draft so the user can retry.
#[derive(Debug, Clone)]
pub struct FormController<D: Draft> {
  mode: FormMode,
  draft: D,
  errors: FieldErrors,
  submitting: bool,
}

impl<D: Draft> FormController<D> {
  pub fn create(draft: D) -> Self {
    Self {
      mode: FormMode::Create,
      draft,
      errors: FieldErrors::default(),
      submitting: false,
    }
  }

  pub fn edit(id: Id, entity: &D::Entity) -> Self {
    Self {
      mode: FormMode::Edit(id),
      draft: D::from_entity(entity),
      errors: FieldErrors::default(),
      submitting: false,
    }
  }

  pub fn draft(&self) -> &D {
    &self.draft
  }

  pub fn errors(&self) -> &FieldErrors {
    &self.errors
  }

  pub fn is_submitting(&self) -> bool {
    self.submitting
  }

  pub fn title(&self) -> String {
    match self.mode {
      FormMode::Create => format!("New {}", D::ENTITY),
      FormMode::Edit(id) => format!("Edit {} #{}", D::ENTITY, id),
    }
  }

  /// Mutable access to one field; clears that field's error.
  pub fn field_mut(&mut self, field: &'static str) -> Option<&mut String> {
    if self.submitting {
      return None;
    }
    self.errors.remove(field);
    self.draft.value_mut(field)
  }

  /// Re-run validation, returning `true` when the draft is valid.
  pub fn validate(&mut self) -> bool {
    self.errors = validate(&self.draft);
    self.errors.is_empty()
  }

  /// Validate and, if valid, start the remote call.
  ///
  /// Returns the outcome without touching the service when validation fails or a
  /// submit is already running. The returned future must be fed back
  /// through [`FormController::finish`].
  pub fn begin_submit(
    &mut self,
    crm: &CachedCrm,
  ) -> Result<BoxFuture<'static, Result<Saved, ServiceError>>, SubmitOutcome> {
    if self.submitting {
      return Err(SubmitOutcome::Busy);
    }
    if !self.validate() {
      info!(entity = D::ENTITY, errors = self.errors.len(), "form has validation errors");
      return Err(SubmitOutcome::Invalid);
    }
    self.submitting = true;
    Ok(self.draft.save(crm, self.mode.id()))
  }

  /// Apply the result of a submit started with [`FormController::begin_submit`].
  pub fn finish(&mut self, result: Result<Saved, ServiceError>, toasts: &ToastSender) -> SubmitOutcome {
    self.submitting = false;
    match result {
      Ok(saved) => {
        let verb = match self.mode {
          FormMode::Create => "created",
          FormMode::Edit(_) => "updated",
        };
        toasts.success(format!("{} {}", D::ENTITY, verb), saved.label.clone());
        self.mode = FormMode::Edit(saved.id);
        SubmitOutcome::Saved(saved)
      }
      Err(e) => {
        warn!(entity = D::ENTITY, error = %e, "form submit failed");
        toasts.error(
          format!("Failed to save {}", D::ENTITY.to_lowercase()),
          e.message(),
        );
        SubmitOutcome::Failed(e)
      }
    }
  }

  /// Validate, submit and wait for the outcome.
  #[cfg(test)]
  pub async fn submit(&mut self, crm: &CachedCrm, toasts: &ToastSender) -> SubmitOutcome {
    match self.begin_submit(crm) {
      Ok(call) => {
        let result = call.await;
        self.finish(result, toasts)
      }
      Err(outcome) => outcome,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeCrm;
  use crate::api::Client;
  use crate::cache::QueryCache;
  use crate::forms::{ClientDraft, ProjectDraft};
  use crate::toast::{ToastVariant, Toaster};
  use std::sync::Arc;

  fn setup() -> (Arc<FakeCrm>, CachedCrm, Toaster, ToastSender) {
    let fake = Arc::new(FakeCrm::new().with_client("Acme"));
    let crm = CachedCrm::new(fake.clone(), QueryCache::default());
    let (toaster, sender) = Toaster::channel();
    (fake, crm, toaster, sender)
  }

  #[tokio::test]
  async fn test_missing_required_field_never_calls_service() {
    let (fake, crm, mut toaster, toasts) = setup();
    let mut form = FormController::create(ClientDraft {
      email: "ops@acme.io".into(),
      ..ClientDraft::default()
    });

    assert_eq!(form.submit(&crm, &toasts).await, SubmitOutcome::Invalid);
    assert_eq!(fake.calls("create_client"), 0);
    assert_eq!(form.errors().get("name"), Some("Name is required"));

    toaster.tick();
    assert!(toaster.is_empty());
  }

  #[tokio::test]
  async fn test_remote_failure_toasts_and_keeps_draft() {
    let (fake, crm, mut toaster, toasts) = setup();
    fake.fail(
      "create_client",
      ServiceError::Api {
        status: 409,
        message: "Client already exists".into(),
      },
    );
    let mut form = FormController::create(ClientDraft {
      name: "Acme".into(),
      ..ClientDraft::default()
    });

    let outcome = form.submit(&crm, &toasts).await;
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    assert_eq!(form.draft().name, "Acme");
    assert_eq!(form.title(), "New Client");
    assert!(!form.is_submitting());

    toaster.tick();
    let toast = toaster.visible().next().unwrap();
    assert_eq!(toast.variant, ToastVariant::Destructive);
    assert_eq!(toast.title, "Failed to save client");
    assert_eq!(toast.description.as_deref(), Some("Client already exists"));

    // Retry succeeds with the same draft
    fake.clear_failures();
    assert!(matches!(
      form.submit(&crm, &toasts).await,
      SubmitOutcome::Saved(_)
    ));
  }

  #[tokio::test]
  async fn test_successful_create_refreshes_client_list() {
    let (_, crm, mut toaster, toasts) = setup();
    let before = crm.fetch(&crm.clients()).await.unwrap();
    assert_eq!(before.len(), 1);

    let mut form = FormController::create(ClientDraft {
      name: "Globex".into(),
      ..ClientDraft::default()
    });
    let SubmitOutcome::Saved(saved) = form.submit(&crm, &toasts).await else {
      panic!("expected save");
    };
    assert_eq!(saved.label, "Globex");
    assert_eq!(form.title(), format!("Edit Client #{}", saved.id));

    let after = crm.fetch(&crm.clients()).await.unwrap();
    assert_eq!(after.len(), 2);

    toaster.tick();
    let toast = toaster.visible().next().unwrap();
    assert_eq!(toast.variant, ToastVariant::Success);
    assert_eq!(toast.title, "Client created");
  }

  #[tokio::test]
  async fn test_edit_prefills_and_updates() {
    let (fake, crm, _toaster, toasts) = setup();
    let client = Client {
      id: 1,
      name: "Acme".into(),
      email: None,
      phone: None,
      company: Some("Acme Holdings".into()),
      website: None,
      notes: None,
      updated_at: None,
    };
    let mut form = FormController::<ClientDraft>::edit(1, &client);
    assert_eq!(form.draft().company, "Acme Holdings");
    assert_eq!(form.title(), "Edit Client #1");

    form.field_mut("name").unwrap().push_str(" Corp");
    assert!(matches!(
      form.submit(&crm, &toasts).await,
      SubmitOutcome::Saved(_)
    ));
    assert_eq!(fake.calls("update_client"), 1);

    let detail = crm.fetch(&crm.client(1)).await.unwrap();
    assert_eq!(detail.as_ref().as_ref().unwrap().name, "Acme Corp");
  }

  #[tokio::test]
  async fn test_editing_a_field_clears_its_error() {
    let (_, crm, _toaster, _) = setup();
    let mut form = FormController::create(ProjectDraft::default());
    assert!(form.begin_submit(&crm).is_err());
    assert!(form.errors().get("name").is_some());
    assert!(form.errors().get("client_id").is_some());

    form.field_mut("name").unwrap().push_str("Rollout");
    assert!(form.errors().get("name").is_none());
    assert!(form.errors().get("client_id").is_some());
  }
}
