use crossterm::event::{KeyCode, KeyEvent};
use futures::FutureExt;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

use super::{highlight_style, panel, spawn_delete, FormView, ProjectDetailView};
use crate::api::{Client, Contact, Id, Project};
use crate::forms::{ClientDraft, ContactDraft, ProjectDraft};
use crate::query::{Query, QueryState};
use crate::routes::Route;
use crate::ui::components::{ConfirmPrompt, KeyResult};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{project_status_color, title_with_state, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Contacts,
  Projects,
}

/// One client with its contacts and projects
pub struct ClientDetailView {
  ctx: ViewContext,
  id: Id,
  client: Query<Option<Client>>,
  contacts: Query<Vec<Contact>>,
  projects: Query<Vec<Project>>,
  pane: Pane,
  contact_state: ListState,
  project_state: ListState,
  confirm: ConfirmPrompt,
}

impl ClientDetailView {
  pub fn new(ctx: ViewContext, id: Id) -> Self {
    let mut client = ctx.crm.query(ctx.crm.client(id));
    let mut contacts = ctx.crm.query(ctx.crm.client_contacts(id));
    let mut projects = ctx.crm.query(ctx.crm.client_projects(id));
    client.fetch();
    contacts.fetch();
    projects.fetch();

    Self {
      ctx,
      id,
      client,
      contacts,
      projects,
      pane: Pane::Contacts,
      contact_state: ListState::default(),
      project_state: ListState::default(),
      confirm: ConfirmPrompt::new(),
    }
  }

  fn client(&self) -> Option<&Client> {
    self.client.data().and_then(Option::as_ref)
  }

  fn contacts(&self) -> &[Contact] {
    self.contacts.data().map(Vec::as_slice).unwrap_or(&[])
  }

  fn projects(&self) -> &[Project] {
    self.projects.data().map(Vec::as_slice).unwrap_or(&[])
  }

  fn is_missing(&self) -> bool {
    matches!(self.client.state(), QueryState::Success(c) if c.is_none())
  }

  fn render_info(&self, frame: &mut Frame, area: Rect) {
    let title = match self.client.state() {
      QueryState::Loading => " Client (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Client (error: {}) ", e),
      _ => format!(" Client #{} ", self.id),
    };
    let block = panel(title, false);

    let Some(client) = self.client() else {
      frame.render_widget(Paragraph::new("").block(block), area);
      return;
    };

    let label = |text: &'static str| Span::styled(format!("{:<10}", text), Style::default().fg(Color::DarkGray));
    let value = |v: &Option<String>| Span::raw(v.clone().unwrap_or_else(|| "-".to_string()));

    let lines = vec![
      Line::from(Span::styled(client.name.clone(), Style::default().fg(Color::Cyan).bold())),
      Line::from(vec![label("Company"), value(&client.company)]),
      Line::from(vec![label("Email"), value(&client.email)]),
      Line::from(vec![label("Phone"), value(&client.phone)]),
      Line::from(vec![label("Website"), value(&client.website)]),
      Line::from(vec![label("Notes"), value(&client.notes)]),
    ];
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }

  fn render_contacts(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.contacts().len();
    ensure_valid_selection(&mut self.contact_state, len);
    let block = panel(
      title_with_state("Contacts", self.contacts.state(), len),
      self.pane == Pane::Contacts,
    );

    let items: Vec<ListItem> = self
      .contacts()
      .iter()
      .map(|c| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<24}", truncate(&c.full_name(), 24)), Style::default().fg(Color::Cyan)),
          Span::styled(c.role.clone().unwrap_or_default(), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.contact_state);
  }

  fn render_projects(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.projects().len();
    ensure_valid_selection(&mut self.project_state, len);
    let block = panel(
      title_with_state("Projects", self.projects.state(), len),
      self.pane == Pane::Projects,
    );

    let items: Vec<ListItem> = self
      .projects()
      .iter()
      .map(|p| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<26}", truncate(&p.name, 26)), Style::default().fg(Color::Cyan)),
          Span::styled(p.status.label(), Style::default().fg(project_status_color(p.status))),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.project_state);
  }

  fn focused_state(&mut self) -> &mut ListState {
    match self.pane {
      Pane::Contacts => &mut self.contact_state,
      Pane::Projects => &mut self.project_state,
    }
  }

  fn open_selected(&self) -> Option<ViewAction> {
    match self.pane {
      Pane::Contacts => {
        let contact = self.contacts().get(self.contact_state.selected()?)?;
        Some(ViewAction::Push(Box::new(FormView::<ContactDraft>::edit(
          self.ctx.clone(),
          contact.id,
          contact,
        ))))
      }
      Pane::Projects => {
        let project = self.projects().get(self.project_state.selected()?)?;
        Some(ViewAction::Push(Box::new(ProjectDetailView::new(
          self.ctx.clone(),
          project.id,
        ))))
      }
    }
  }
}

impl View for ClientDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.confirm.handle_key(key) {
      KeyResult::Event(true) => {
        let crm = self.ctx.crm.clone();
        let id = self.id;
        let name = self.client().map(|c| c.name.clone()).unwrap_or_default();
        spawn_delete(
          &self.ctx.toasts,
          "Client",
          name,
          async move { crm.delete_client(id).await }.boxed(),
        );
        return ViewAction::Pop;
      }
      KeyResult::Event(false) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
        self.pane = match self.pane {
          Pane::Contacts => Pane::Projects,
          Pane::Projects => Pane::Contacts,
        };
      }
      KeyCode::Char('j') | KeyCode::Down => self.focused_state().select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.focused_state().select_previous(),
      KeyCode::Char('r') => {
        self.client.refetch();
        self.contacts.refetch();
        self.projects.refetch();
      }
      KeyCode::Enter => return self.open_selected().unwrap_or(ViewAction::None),
      KeyCode::Char('e') => {
        if let Some(client) = self.client() {
          return ViewAction::Push(Box::new(FormView::<ClientDraft>::edit(
            self.ctx.clone(),
            client.id,
            client,
          )));
        }
      }
      KeyCode::Char('n') => {
        if let Some(form) = self.new_form() {
          return ViewAction::Push(form);
        }
      }
      KeyCode::Char('d') => {
        if let Some(client) = self.client() {
          let message = format!("Delete client {} with all contacts and projects?", client.name);
          self.confirm.ask(message);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    if self.is_missing() {
      let paragraph = Paragraph::new(format!(
        "Client #{} was not found. It may have been deleted.",
        self.id
      ))
      .block(panel(" Client ".to_string(), false))
      .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let [info, lists] = Layout::vertical([Constraint::Length(8), Constraint::Min(3)]).areas(area);
    let [contacts, projects] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(lists);

    self.render_info(frame, info);
    self.render_contacts(frame, contacts);
    self.render_projects(frame, projects);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self
      .client()
      .map(|c| c.name.clone())
      .unwrap_or_else(|| format!("Client #{}", self.id))
  }

  fn route(&self) -> Option<Route> {
    Some(Route::ClientDetail(self.id))
  }

  fn tick(&mut self) {
    self.client.poll();
    self.contacts.poll();
    self.projects.poll();
  }

  fn captures_input(&self) -> bool {
    self.confirm.is_active()
  }

  /// New contact or project for this client, depending on the focused pane
  fn new_form(&self) -> Option<Box<dyn View>> {
    if self.is_missing() {
      return None;
    }
    let form: Box<dyn View> = match self.pane {
      Pane::Contacts => Box::new(FormView::create(
        self.ctx.clone(),
        ContactDraft::for_client(self.id),
      )),
      Pane::Projects => Box::new(FormView::create(
        self.ctx.clone(),
        ProjectDraft::for_client(self.id),
      )),
    };
    Some(form)
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("Tab", "switch pane"),
      Shortcut::new("n", "new"),
      Shortcut::new("e", "edit client"),
      Shortcut::new("d", "delete"),
      Shortcut::new("q", "back"),
    ]
  }
}
