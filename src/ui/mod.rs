pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

use components::draw_toasts;
use renderfns::{draw_footer, draw_header};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header, content, footer] = Layout::vertical([
    Constraint::Length(1), // Header
    Constraint::Min(1),    // Current view
    Constraint::Length(1), // Breadcrumb
  ])
  .areas(frame.area());

  draw_header(frame, header, app.title(), &app.shortcuts());

  let breadcrumb = app.breadcrumb();
  let path = app.current_route().map(|r| r.path());
  if let Some(view) = app.current_view_mut() {
    view.render(frame, content);
  }

  app.command_input().render_overlay(frame, content);
  if !app.toaster().is_empty() {
    draw_toasts(frame, content, app.toaster().visible());
  }
  draw_footer(frame, footer, &breadcrumb, path.as_deref());
}

/// Keep a list selection inside `0..len`, selecting the first row when
/// nothing is selected.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
