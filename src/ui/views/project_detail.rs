use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};

use super::{panel, spawn_delete, ClientDetailView, FormView};
use crate::api::{Client, Id, Project};
use crate::forms::ProjectDraft;
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult};
use crate::ui::renderfns::{format_money, project_status_color};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// One project and the client it belongs to
pub struct ProjectDetailView {
  ctx: ViewContext,
  id: Id,
  project: Query<Option<Project>>,
  /// Bound once the project (and so its client id) is known
  client: Option<(Id, Query<Option<Client>>)>,
  confirm: ConfirmPrompt,
}

impl ProjectDetailView {
  pub fn new(ctx: ViewContext, id: Id) -> Self {
    let mut project = ctx.crm.query(ctx.crm.project(id));
    project.fetch();

    Self {
      ctx,
      id,
      project,
      client: None,
      confirm: ConfirmPrompt::new(),
    }
  }

  fn project(&self) -> Option<&Project> {
    self.project.data().and_then(Option::as_ref)
  }

  fn client_name(&self) -> Option<&str> {
    let (_, query) = self.client.as_ref()?;
    let client = query.data()?.as_ref()?;
    Some(client.name.as_str())
  }

  /// Follow the project's client, rebinding if the project moved
  fn bind_client(&mut self) {
    let Some(client_id) = self.project().map(|p| p.client_id) else {
      return;
    };
    if self.client.as_ref().is_some_and(|(id, _)| *id == client_id) {
      return;
    }
    let mut query = self.ctx.crm.query(self.ctx.crm.client(client_id));
    query.fetch();
    self.client = Some((client_id, query));
  }

  fn render_project(&self, frame: &mut Frame, area: Rect, project: &Project) {
    let label = |text: &'static str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());

    let client = match self.client_name() {
      Some(name) => format!("{} (#{})", name, project.client_id),
      None => format!("#{}", project.client_id),
    };

    let mut lines = vec![
      Line::from(Span::styled(project.name.clone(), Style::default().fg(Color::Cyan).bold())),
      Line::raw(""),
      Line::from(vec![
        label("Status"),
        Span::styled(
          project.status.label(),
          Style::default().fg(project_status_color(project.status)),
        ),
      ]),
      Line::from(vec![label("Client"), Span::raw(client)]),
      Line::from(vec![
        label("Budget"),
        Span::raw(
          project
            .budget
            .map(|b| format_money(&self.ctx.currency, b))
            .unwrap_or_else(|| "-".into()),
        ),
      ]),
      Line::from(vec![label("Start"), Span::raw(date(project.start_date))]),
      Line::from(vec![label("End"), Span::raw(date(project.end_date))]),
    ];
    if let Some(description) = &project.description {
      lines.push(Line::raw(""));
      lines.push(Line::raw(description.clone()));
    }

    let title = if self.project.is_fetching() {
      format!(" Project #{} (refreshing...) ", self.id)
    } else {
      format!(" Project #{} ", self.id)
    };
    frame.render_widget(
      Paragraph::new(lines)
        .block(panel(title, false))
        .wrap(Wrap { trim: false }),
      area,
    );
  }
}

impl View for ProjectDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.confirm.handle_key(key) {
      KeyResult::Event(true) => {
        let crm = self.ctx.crm.clone();
        let id = self.id;
        let name = self.project().map(|p| p.name.clone()).unwrap_or_default();
        spawn_delete(
          &self.ctx.toasts,
          "Project",
          name,
          async move { crm.delete_project(id).await }.boxed(),
        );
        return ViewAction::Pop;
      }
      KeyResult::Event(false) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('r') => {
        self.project.refetch();
        if let Some((_, client)) = &mut self.client {
          client.refetch();
        }
      }
      KeyCode::Char('e') => {
        if let Some(project) = self.project() {
          return ViewAction::Push(Box::new(FormView::<ProjectDraft>::edit(
            self.ctx.clone(),
            project.id,
            project,
          )));
        }
      }
      KeyCode::Char('c') => {
        if let Some(project) = self.project() {
          return ViewAction::Push(Box::new(ClientDetailView::new(
            self.ctx.clone(),
            project.client_id,
          )));
        }
      }
      KeyCode::Char('d') => {
        if let Some(project) = self.project() {
          let message = format!("Delete project {}?", project.name);
          self.confirm.ask(message);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    match (self.project.state(), self.project()) {
      (_, Some(project)) => self.render_project(frame, area, project),
      (QueryState::Error(e), None) => {
        let paragraph = Paragraph::new("Failed to load project. Press 'r' to retry.")
          .block(panel(format!(" Project #{} (error: {}) ", self.id, e), false))
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
      }
      (QueryState::Success(_), None) => {
        let paragraph = Paragraph::new(format!(
          "Project #{} was not found. It may have been deleted.",
          self.id
        ))
        .block(panel(" Project ".to_string(), false))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
      }
      _ => {
        frame.render_widget(
          Paragraph::new("").block(panel(format!(" Project #{} (loading...) ", self.id), false)),
          area,
        );
      }
    }
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self
      .project()
      .map(|p| p.name.clone())
      .unwrap_or_else(|| format!("Project #{}", self.id))
  }

  fn route(&self) -> Option<Route> {
    Some(Route::ProjectDetail(self.id))
  }

  fn tick(&mut self) {
    self.project.poll();
    self.bind_client();
    if let Some((_, client)) = &mut self.client {
      client.poll();
    }
  }

  fn captures_input(&self) -> bool {
    self.confirm.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("e", "edit"),
      Shortcut::new("c", "client"),
      Shortcut::new("d", "delete"),
      Shortcut::new("q", "back"),
    ]
  }
}
