use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Breadcrumb of the view stack on the left, current route on the right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], path: Option<&str>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i + 1 == breadcrumb.len() {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    area,
  );

  if let Some(path) = path {
    frame.render_widget(
      Paragraph::new(Line::from(Span::styled(
        format!("{} ", path),
        Style::default().fg(Color::DarkGray),
      )))
      .alignment(Alignment::Right),
      area,
    );
  }
}
