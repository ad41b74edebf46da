use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::{highlight_style, panel, spawn_delete, FormView, ProjectDetailView};
use crate::api::Project;
use crate::forms::ProjectDraft;
use crate::query::Query;
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_money, project_status_color, title_with_state, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// All projects, filterable by name or status
pub struct ProjectListView {
  ctx: ViewContext,
  query: Query<Vec<Project>>,
  list_state: ListState,
  search: SearchInput,
  confirm: ConfirmPrompt,
  deleting: Option<Project>,
}

impl ProjectListView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.crm.query(ctx.crm.projects());
    query.fetch();

    Self {
      ctx,
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
      confirm: ConfirmPrompt::new(),
      deleting: None,
    }
  }

  fn visible(&self) -> Vec<&Project> {
    let Some(projects) = self.query.data() else {
      return Vec::new();
    };
    projects
      .iter()
      .filter(|p| self.search.matches([p.name.as_str(), p.status.label()]))
      .collect()
  }

  fn selected(&self) -> Option<&Project> {
    self
      .list_state
      .selected()
      .and_then(|i| self.visible().get(i).copied())
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(title_with_state("Projects", self.query.state(), len), false);

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load projects. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No projects match the filter."
      } else {
        "No projects yet."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let currency = self.ctx.currency.clone();
    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|project| {
        let dates = match (project.start_date, project.end_date) {
          (Some(start), Some(end)) => format!("{} → {}", start, end),
          (Some(start), None) => format!("from {}", start),
          (None, Some(end)) => format!("until {}", end),
          (None, None) => String::new(),
        };
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<30}", truncate(&project.name, 30)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", project.status.label()),
            Style::default().fg(project_status_color(project.status)),
          ),
          Span::raw(" "),
          Span::raw(format!(
            "{:>12}",
            project
              .budget
              .map(|b| format_money(&currency, b))
              .unwrap_or_default()
          )),
          Span::raw("  "),
          Span::styled(dates, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.confirm.handle_key(key) {
      KeyResult::Event(confirmed) => {
        if let Some(project) = self.deleting.take().filter(|_| confirmed) {
          let crm = self.ctx.crm.clone();
          let id = project.id;
          spawn_delete(
            &self.ctx.toasts,
            "Project",
            project.name,
            async move { crm.delete_project(id).await }.boxed(),
          );
        }
        return Some(ViewAction::None);
      }
      KeyResult::Handled => return Some(ViewAction::None),
      KeyResult::NotHandled => {}
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.list_state.select(Some(0));
        Some(ViewAction::None)
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => {
        let id = self.selected()?.id;
        return Some(ViewAction::Push(Box::new(ProjectDetailView::new(
          self.ctx.clone(),
          id,
        ))));
      }
      KeyCode::Char('e') => {
        let project = self.selected()?;
        return Some(ViewAction::Push(Box::new(FormView::<ProjectDraft>::edit(
          self.ctx.clone(),
          project.id,
          project,
        ))));
      }
      KeyCode::Char('n') => return self.new_form().map(ViewAction::Push),
      KeyCode::Char('d') => {
        let project = self.selected()?.clone();
        self.confirm.ask(format!("Delete project {}?", project.name));
        self.deleting = Some(project);
      }
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for ProjectListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    let matches = self.visible().len();
    self.search.render_overlay(frame, area, matches);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Projects".to_string()
  }

  fn route(&self) -> Option<Route> {
    Some(Route::Projects)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.confirm.is_active()
  }

  fn new_form(&self) -> Option<Box<dyn View>> {
    Some(Box::new(FormView::create(
      self.ctx.clone(),
      ProjectDraft::default(),
    )))
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "filter").with_priority(20),
      Shortcut::new("n", "new"),
      Shortcut::new("e", "edit"),
      Shortcut::new("d", "delete"),
      Shortcut::new("r", "refresh"),
    ]
  }
}
