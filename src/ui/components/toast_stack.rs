use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::toast::{Toast, ToastVariant};

const TOAST_WIDTH: u16 = 44;

fn variant_color(variant: ToastVariant) -> Color {
  match variant {
    ToastVariant::Default => Color::Blue,
    ToastVariant::Success => Color::Green,
    ToastVariant::Destructive => Color::Red,
  }
}

/// Stack toasts in the bottom-right corner, newest at the bottom
pub fn draw_toasts<'a>(frame: &mut Frame, area: Rect, toasts: impl DoubleEndedIterator<Item = &'a Toast>) {
  let width = TOAST_WIDTH.min(area.width);
  let mut bottom = area.y + area.height;

  for toast in toasts.rev() {
    let height = if toast.description.is_some() { 4 } else { 3 };
    if bottom < area.y + height {
      break;
    }
    bottom -= height;
    let rect = Rect::new(area.x + area.width - width, bottom, width, height);

    let color = variant_color(toast.variant);
    let mut lines = vec![Line::from(Span::styled(
      toast.title.as_str(),
      Style::default().fg(color).bold(),
    ))];
    if let Some(description) = &toast.description {
      lines.push(Line::from(Span::styled(
        description.as_str(),
        Style::default().fg(Color::Gray),
      )));
    }

    frame.render_widget(Clear, rect);
    frame.render_widget(
      Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
          .borders(Borders::ALL)
          .border_style(Style::default().fg(color)),
      ),
      rect,
    );
  }
}
