use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// Header bar: app name, workspace title and the current view's shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, title: &str, shortcuts: &[ShortcutInfo]) {
  let mut spans = vec![
    Span::styled(" crmdeck ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Yellow).bold()),
    Span::raw(" "),
  ];

  for shortcut in shortcuts {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    area,
  );
}

/// Host part of an API URL, used as the default header title
pub fn extract_domain(url: &str) -> &str {
  let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("https://crm.example.com/api/v1"), "crm.example.com");
    assert_eq!(extract_domain("http://localhost:8080"), "localhost:8080");
    assert_eq!(extract_domain("crm.internal"), "crm.internal");
  }
}
