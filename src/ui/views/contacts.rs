use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::{highlight_style, panel, spawn_delete, ClientDetailView, FormView};
use crate::api::Contact;
use crate::forms::ContactDraft;
use crate::query::Query;
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{title_with_state, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

/// Every contact across clients
pub struct ContactListView {
  ctx: ViewContext,
  query: Query<Vec<Contact>>,
  list_state: ListState,
  search: SearchInput,
  confirm: ConfirmPrompt,
  deleting: Option<Contact>,
}

impl ContactListView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.crm.query(ctx.crm.contacts());
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

  fn visible(&self) -> Vec<&Contact> {
    let Some(contacts) = self.query.data() else {
      return Vec::new();
    };
    contacts
      .iter()
      .filter(|c| {
        self.search.matches([
          c.first_name.as_str(),
          c.last_name.as_str(),
          c.email.as_deref().unwrap_or(""),
          c.role.as_deref().unwrap_or(""),
        ])
      })
      .collect()
  }

  fn selected(&self) -> Option<&Contact> {
    self
      .list_state
      .selected()
      .and_then(|i| self.visible().get(i).copied())
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = panel(title_with_state("Contacts", self.query.state(), len), false);

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load contacts. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No contacts match the filter."
      } else {
        "No contacts yet."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|contact| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<26}", truncate(&contact.full_name(), 26)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<18}", truncate(contact.role.as_deref().unwrap_or("-"), 18)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<30}", truncate(contact.email.as_deref().unwrap_or(""), 30))),
          Span::styled(
            format!("client #{}", contact.client_id),
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
      KeyResult::Event(confirmed) => {
        if let Some(contact) = self.deleting.take().filter(|_| confirmed) {
          let crm = self.ctx.crm.clone();
          let id = contact.id;
          spawn_delete(
            &self.ctx.toasts,
            "Contact",
            contact.full_name(),
            async move { crm.delete_contact(id).await }.boxed(),
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
      KeyCode::Enter | KeyCode::Char('e') => {
        let contact = self.selected()?;
        return Some(ViewAction::Push(Box::new(FormView::<ContactDraft>::edit(
          self.ctx.clone(),
          contact.id,
          contact,
        ))));
      }
      KeyCode::Char('c') => {
        let client_id = self.selected()?.client_id;
        return Some(ViewAction::Push(Box::new(ClientDetailView::new(
          self.ctx.clone(),
          client_id,
        ))));
      }
      KeyCode::Char('n') => return self.new_form().map(ViewAction::Push),
      KeyCode::Char('d') => {
        let contact = self.selected()?.clone();
        self.confirm.ask(format!("Delete contact {}?", contact.full_name()));
        self.deleting = Some(contact);
      }
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for ContactListView {
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
    "Contacts".to_string()
  }

  fn route(&self) -> Option<Route> {
    Some(Route::Contacts)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.confirm.is_active()
  }

  fn new_form(&self) -> Option<Box<dyn View>> {
    // Pre-select the client of the highlighted contact
    let draft = self
      .selected()
      .map(|c| ContactDraft::for_client(c.client_id))
      .unwrap_or_default();
    Some(Box::new(FormView::create(self.ctx.clone(), draft)))
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "filter").with_priority(20),
      Shortcut::new("n", "new"),
      Shortcut::new("e", "edit"),
      Shortcut::new("c", "client"),
      Shortcut::new("d", "delete"),
    ]
  }
}
