use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use tokio::sync::oneshot;

use crate::api::{Id, ServiceError};
use crate::forms::{Draft, FieldKind, FieldSpec, FormController, Saved, SubmitOutcome};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};

const LABEL_WIDTH: usize = 18;

/// Create/edit form for any [`Draft`], shown as a modal over the content.
///
/// Submitting runs in the background; the view closes itself once the
/// record was saved and stays open with the draft intact on failure.
pub struct FormView<D: Draft> {
  ctx: ViewContext,
  form: FormController<D>,
  focus: usize,
  input: TextInput,
  pending: Option<oneshot::Receiver<Result<Saved, ServiceError>>>,
  finished: bool,
}

impl<D: Draft> FormView<D> {
  pub fn create(ctx: ViewContext, draft: D) -> Self {
    Self::with_controller(ctx, FormController::create(draft))
  }

  pub fn edit(ctx: ViewContext, id: Id, entity: &D::Entity) -> Self {
    Self::with_controller(ctx, FormController::edit(id, entity))
  }

  fn with_controller(ctx: ViewContext, form: FormController<D>) -> Self {
    let mut view = Self {
      ctx,
      form,
      focus: 0,
      input: TextInput::new(),
      pending: None,
      finished: false,
    };
    view.focus_field(0);
    view
  }

  fn field(&self) -> &'static FieldSpec {
    &D::fields()[self.focus]
  }

  fn focus_field(&mut self, index: usize) {
    self.focus = index.min(D::fields().len().saturating_sub(1));
    let value = self.form.draft().value(self.field().name).to_string();
    self.input = TextInput::with_value(value);
  }

  fn move_focus(&mut self, forward: bool) {
    let count = D::fields().len();
    let next = if forward {
      (self.focus + 1) % count
    } else {
      self.focus.checked_sub(1).unwrap_or(count - 1)
    };
    self.focus_field(next);
  }

  /// Copy the text input back into the draft
  fn sync_input(&mut self) {
    let name = self.field().name;
    if let Some(value) = self.form.field_mut(name) {
      *value = self.input.value().to_string();
    }
  }

  fn cycle_choice(&mut self, options: &'static [&'static str], forward: bool) {
    if options.is_empty() {
      return;
    }
    let current = options
      .iter()
      .position(|o| o.eq_ignore_ascii_case(self.input.value().trim()));
    let next = match (current, forward) {
      (None, _) => 0,
      (Some(i), true) => (i + 1) % options.len(),
      (Some(i), false) => i.checked_sub(1).unwrap_or(options.len() - 1),
    };
    self.input.set_value(options[next]);
    self.sync_input();
  }

  fn submit(&mut self) {
    match self.form.begin_submit(&self.ctx.crm) {
      Ok(call) => {
        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        tokio::spawn(async move {
          // Ignore send errors - the form was closed
          let _ = tx.send(call.await);
        });
      }
      Err(SubmitOutcome::Invalid) => {
        if let Some(index) = D::fields()
          .iter()
          .position(|f| self.form.errors().get(f.name).is_some())
        {
          self.focus_field(index);
        }
      }
      Err(_) => {}
    }
  }

  fn render_field(&self, spec: &FieldSpec, focused: bool) -> Vec<Line<'static>> {
    let marker = if spec.required { " *" } else { "" };
    let label = format!("{:<width$}", format!("{}{}", spec.label, marker), width = LABEL_WIDTH);
    let label_style = if focused {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::Gray)
    };
    let mut spans = vec![Span::styled(label, label_style)];

    let value = if focused {
      self.input.value()
    } else {
      self.form.draft().value(spec.name)
    };

    if focused && !self.form.is_submitting() {
      let cursor = self.input.cursor_position();
      let before: String = value.chars().take(cursor).collect();
      let at: String = value.chars().nth(cursor).map(String::from).unwrap_or(" ".into());
      let after: String = value.chars().skip(cursor + 1).collect();
      spans.push(Span::raw(before));
      spans.push(Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)));
      spans.push(Span::raw(after));
    } else if value.is_empty() {
      spans.push(Span::styled(
        spec.placeholder().to_string(),
        Style::default().fg(Color::DarkGray),
      ));
    } else {
      spans.push(Span::raw(value.to_string()));
    }

    if focused {
      if let FieldKind::Choice(_) = spec.kind {
        spans.push(Span::styled("  ←/→", Style::default().fg(Color::DarkGray)));
      }
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(error) = self.form.errors().get(spec.name) {
      lines.push(Line::from(vec![
        Span::raw(" ".repeat(LABEL_WIDTH)),
        Span::styled(error.to_string(), Style::default().fg(Color::Red)),
      ]));
    }
    lines
  }
}

impl<D: Draft> View for FormView<D> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.form.is_submitting() {
      return ViewAction::None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Char('s') if ctrl => self.submit(),
      KeyCode::Tab | KeyCode::Down => self.move_focus(true),
      KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
      KeyCode::Enter => {
        if self.focus + 1 == D::fields().len() {
          self.submit();
        } else {
          self.move_focus(true);
        }
      }
      KeyCode::Left | KeyCode::Right if matches!(self.field().kind, FieldKind::Choice(_)) => {
        if let FieldKind::Choice(options) = self.field().kind {
          self.cycle_choice(options, key.code == KeyCode::Right);
        }
      }
      _ => {
        if self.input.handle_key(key) == InputResult::Consumed {
          self.sync_input();
        }
      }
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let fields = D::fields();
    let error_lines = fields
      .iter()
      .filter(|f| self.form.errors().get(f.name).is_some())
      .count();
    let width = 72.min(area.width);
    let height = ((fields.len() + error_lines) as u16 + 4).min(area.height);
    let modal = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 2,
      width,
      height,
    );

    let title = if self.form.is_submitting() {
      format!(" {} (saving...) ", self.form.title())
    } else {
      format!(" {} ", self.form.title())
    };

    let mut lines: Vec<Line> = fields
      .iter()
      .enumerate()
      .flat_map(|(i, spec)| self.render_field(spec, i == self.focus))
      .collect();
    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
      Span::styled("Tab", Style::default().fg(Color::Cyan)),
      Span::styled(" next  ", Style::default().fg(Color::DarkGray)),
      Span::styled("Ctrl-S", Style::default().fg(Color::Cyan)),
      Span::styled(" save  ", Style::default().fg(Color::DarkGray)),
      Span::styled("Esc", Style::default().fg(Color::Cyan)),
      Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ]));

    frame.render_widget(Clear, modal);
    frame.render_widget(
      Paragraph::new(lines).block(
        Block::default()
          .title(title)
          .title_alignment(Alignment::Center)
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Yellow)),
      ),
      modal,
    );
  }

  fn breadcrumb_label(&self) -> String {
    self.form.title()
  }

  fn tick(&mut self) {
    let Some(rx) = &mut self.pending else {
      return;
    };
    let result = match rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return,
      Err(oneshot::error::TryRecvError::Closed) => {
        Err(ServiceError::Transport("save was interrupted".to_string()))
      }
    };
    self.pending = None;
    if let SubmitOutcome::Saved(_) = self.form.finish(result, &self.ctx.toasts) {
      self.finished = true;
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn is_finished(&self) -> bool {
    self.finished
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("Tab", "next field"),
      Shortcut::new("C-s", "save"),
      Shortcut::new("Esc", "cancel"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeCrm;
  use crate::api::CachedCrm;
  use crate::cache::QueryCache;
  use crate::config::DashboardConfig;
  use crate::forms::{ClientDraft, DealDraft};
  use crate::toast::Toaster;
  use std::sync::Arc;
  use std::time::Duration;

  fn ctx() -> (Arc<FakeCrm>, ViewContext, Toaster) {
    let fake = Arc::new(FakeCrm::new());
    let (toaster, toasts) = Toaster::channel();
    let ctx = ViewContext {
      crm: CachedCrm::new(fake.clone(), QueryCache::default()),
      toasts,
      dashboard: DashboardConfig::default(),
      currency: "$".into(),
    };
    (fake, ctx, toaster)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_text(view: &mut impl View, text: &str) {
    for c in text.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn settle(view: &mut impl View) {
    for _ in 0..50 {
      tokio::time::sleep(Duration::from_millis(5)).await;
      view.tick();
      if view.is_finished() {
        return;
      }
    }
  }

  #[tokio::test]
  async fn test_invalid_submit_focuses_first_error() {
    let (fake, ctx, _toaster) = ctx();
    let mut view = FormView::create(ctx, ClientDraft::default());
    view.handle_key(key(KeyCode::Tab));
    type_text(&mut view, "not-an-email");

    view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

    assert_eq!(view.focus, 0);
    assert!(view.form.errors().get("name").is_some());
    assert!(view.form.errors().get("email").is_some());
    assert!(view.pending.is_none());
    assert_eq!(fake.calls("create_client"), 0);
  }

  #[tokio::test]
  async fn test_saved_form_finishes() {
    let (fake, ctx, mut toaster) = ctx();
    let mut view = FormView::create(ctx, ClientDraft::default());
    type_text(&mut view, "Acme");
    view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
    assert!(view.form.is_submitting());

    settle(&mut view).await;

    assert!(view.is_finished());
    assert_eq!(fake.calls("create_client"), 1);
    toaster.tick();
    assert_eq!(toaster.visible().next().unwrap().title, "Client created");
  }

  #[tokio::test]
  async fn test_failed_save_keeps_form_open() {
    let (fake, ctx, _toaster) = ctx();
    fake.fail("create_client", ServiceError::Transport("offline".into()));
    let mut view = FormView::create(ctx, ClientDraft::default());
    type_text(&mut view, "Acme");
    view.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

    settle(&mut view).await;

    assert!(!view.is_finished());
    assert!(!view.form.is_submitting());
    assert_eq!(view.form.draft().name, "Acme");
  }

  #[tokio::test]
  async fn test_choice_fields_cycle_with_arrows() {
    let (_, ctx, _toaster) = ctx();
    let mut view = FormView::create(ctx, DealDraft::default());
    let stage = DealDraft::fields()
      .iter()
      .position(|f| f.name == "stage")
      .unwrap();
    view.focus_field(stage);

    view.handle_key(key(KeyCode::Right));
    assert_eq!(view.form.draft().stage, "Qualified");
    view.handle_key(key(KeyCode::Left));
    view.handle_key(key(KeyCode::Left));
    assert_eq!(view.form.draft().stage, "Lost");
  }
}
