use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::{highlight_style, panel, spawn_delete, ClientDetailView, FormView};
use crate::api::Client;
use crate::forms::ClientDraft;
use crate::query::Query;
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{title_with_state, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// All clients, filterable
pub struct ClientListView {
  ctx: ViewContext,
  query: Query<Vec<Client>>,
  list_state: ListState,
  search: SearchInput,
  confirm: ConfirmPrompt,
  /// Client the open delete prompt is about
  deleting: Option<Client>,
}

impl ClientListView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.crm.query(ctx.crm.clients());
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

  fn visible(&self) -> Vec<&Client> {
    self
      .query
      .data()
      .map(|clients| {
        clients
          .iter()
          .filter(|c| {
            self.search.matches([
              c.name.as_str(),
              c.company.as_deref().unwrap_or(""),
              c.email.as_deref().unwrap_or(""),
            ])
          })
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected(&self) -> Option<&Client> {
    self
      .list_state
      .selected()
      .and_then(|i| self.visible().get(i).copied())
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(title_with_state("Clients", self.query.state(), len), false);

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load clients. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No clients match the filter."
      } else {
        "No clients yet. Press 'n' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|client| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<28}", truncate(&client.name, 28)), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::styled(
            format!("{:<22}", truncate(client.company.as_deref().unwrap_or("-"), 22)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<30}", truncate(client.email.as_deref().unwrap_or(""), 30))),
          Span::styled(
            client.phone.clone().unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
          ),
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
      KeyResult::Event(true) => {
        if let Some(client) = self.deleting.take() {
          let crm = self.ctx.crm.clone();
          let id = client.id;
          spawn_delete(
            &self.ctx.toasts,
            "Client",
            client.name,
            async move { crm.delete_client(id).await }.boxed(),
          );
        }
        return Some(ViewAction::None);
      }
      KeyResult::Event(false) => {
        self.deleting = None;
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

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let id = self.selected()?.id;
        Some(ViewAction::Push(Box::new(ClientDetailView::new(
          self.ctx.clone(),
          id,
        ))))
      }
      KeyCode::Char('n') => self.new_form().map(ViewAction::Push),
      KeyCode::Char('e') => {
        let client = self.selected()?;
        Some(ViewAction::Push(Box::new(FormView::<ClientDraft>::edit(
          self.ctx.clone(),
          client.id,
          client,
        ))))
      }
      KeyCode::Char('d') => {
        let client = self.selected()?.clone();
        self.confirm.ask(format!(
          "Delete client {} with all contacts and projects?",
          client.name
        ));
        self.deleting = Some(client);
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for ClientListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
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
    "Clients".to_string()
  }

  fn route(&self) -> Option<Route> {
    Some(Route::Clients)
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
      ClientDraft::default(),
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
