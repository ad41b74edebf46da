mod client_detail;
mod clients;
mod contacts;
mod dashboard;
mod form;
mod pipeline;
mod project_detail;
mod projects;

pub use client_detail::ClientDetailView;
pub use clients::ClientListView;
pub use contacts::ContactListView;
pub use dashboard::DashboardView;
pub use form::FormView;
pub use pipeline::PipelineView;
pub use project_detail::ProjectDetailView;
pub use projects::ProjectListView;

use futures::future::BoxFuture;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders};
use tracing::warn;

use crate::api::ServiceError;
use crate::routes::Route;
use crate::toast::ToastSender;
use crate::ui::view::{View, ViewContext};

/// Views making up a route: the parent list first for detail routes
pub fn views_for(route: Route, ctx: &ViewContext) -> Vec<Box<dyn View>> {
  let mut stack: Vec<Box<dyn View>> = Vec::new();
  if let Some(parent) = route.parent() {
    stack.extend(views_for(parent, ctx));
  }
  let view: Box<dyn View> = match route {
    Route::Dashboard => Box::new(DashboardView::new(ctx.clone())),
    Route::Clients => Box::new(ClientListView::new(ctx.clone())),
    Route::ClientDetail(id) => Box::new(ClientDetailView::new(ctx.clone(), id)),
    Route::Projects => Box::new(ProjectListView::new(ctx.clone())),
    Route::ProjectDetail(id) => Box::new(ProjectDetailView::new(ctx.clone(), id)),
    Route::Contacts => Box::new(ContactListView::new(ctx.clone())),
    Route::Pipeline => Box::new(PipelineView::new(ctx.clone())),
  };
  stack.push(view);
  stack
}

/// Run a delete in the background and report the outcome as a toast.
/// Lists refresh on their own through cache invalidation.
fn spawn_delete(
  toasts: &ToastSender,
  entity: &'static str,
  label: String,
  call: BoxFuture<'static, Result<(), ServiceError>>,
) {
  let toasts = toasts.clone();
  tokio::spawn(async move {
    match call.await {
      Ok(()) => toasts.success(format!("{} deleted", entity), label),
      Err(e) => {
        warn!(entity, error = %e, "delete failed");
        toasts.error(format!("Failed to delete {}", entity.to_lowercase()), e.message());
      }
    }
  });
}

/// Bordered panel used by list and detail views
fn panel(title: String, focused: bool) -> Block<'static> {
  let color = if focused { Color::Yellow } else { Color::Blue };
  Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
}

fn highlight_style() -> Style {
  Style::default()
    .bg(Color::DarkGray)
    .add_modifier(Modifier::BOLD)
}
