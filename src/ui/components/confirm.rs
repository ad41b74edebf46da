use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Yes/no prompt guarding destructive actions
#[derive(Debug, Clone, Default)]
pub struct ConfirmPrompt {
  message: Option<String>,
}

impl ConfirmPrompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.message.is_some()
  }

  pub fn ask(&mut self, message: impl Into<String>) {
    self.message = Some(message.into());
  }

  /// `Event(true)` on `y`, `Event(false)` on `n` or Esc. Swallows every
  /// other key while open.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<bool> {
    if self.message.is_none() {
      return KeyResult::NotHandled;
    }
    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => {
        self.message = None;
        KeyResult::Event(true)
      }
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
        self.message = None;
        KeyResult::Event(false)
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(message) = &self.message else {
      return;
    };

    let width = 50.min(area.width);
    let height = 5.min(area.height);
    let overlay = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 2,
      width,
      height,
    );

    frame.render_widget(Clear, overlay);
    let text = vec![
      Line::from(message.as_str()),
      Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Red).bold()),
        Span::styled(" confirm   ", Style::default().fg(Color::DarkGray)),
        Span::styled("n", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
      ]),
    ];
    let paragraph = Paragraph::new(text).wrap(Wrap { trim: true }).block(
      Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Confirm "),
    );
    frame.render_widget(paragraph, overlay);
  }
}
