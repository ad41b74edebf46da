use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Filter changed (on each keystroke, empty string on cancel)
  Changed(String),
  /// Overlay closed, filter persists
  Submitted,
}

/// List filter opened with `/`
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
  }

  /// Case-insensitive match of the current filter against any of the fields.
  /// An empty filter matches everything.
  pub fn matches<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = self.input.value().trim().to_lowercase();
    needle.is_empty()
      || fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
  }

  /// Handle a key event. Call this regardless of active state, it handles
  /// activation too.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Event(SearchEvent::Changed(String::new()));
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active, with the number of matching rows
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, matches: usize) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(
      area.x + 1,
      area.y + 1,
      width.saturating_sub(1),
      3.min(area.height),
    );

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Filter ")
      .title_bottom(Line::from(format!(" {} matches ", matches)).right_aligned());
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}
