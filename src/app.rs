use crate::api::CachedCrm;
use crate::commands::Action;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::routes::Route;
use crate::toast::Toaster;
use crate::ui;
use crate::ui::components::{CommandInput, KeyResult};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::views_for;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, error, info};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command palette (after pressing :)
  command_input: CommandInput,

  /// Toasts raised by views and background mutations
  toaster: Toaster,

  /// Shared by every view
  ctx: ViewContext,

  /// Header title
  title: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, crm: CachedCrm, title: String, start: Route) -> Self {
    let (toaster, toasts) = Toaster::channel();
    let ctx = ViewContext {
      crm,
      toasts,
      dashboard: config.dashboard.clone(),
      currency: config.currency.clone(),
    };
    let view_stack = views_for(start, &ctx);

    Self {
      view_stack,
      command_input: CommandInput::new(),
      toaster,
      ctx,
      title,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let outcome = self.event_loop().await;
    let restored = restore_terminal();
    self.finish(outcome.and(restored))
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(100));

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  /// Drop cached data with the session, however the loop ended
  fn finish(&self, outcome: Result<()>) -> Result<()> {
    self.ctx.crm.cache().clear();
    if let Err(e) = &outcome {
      error!(error = %e, "ui loop failed");
    }
    outcome
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {} // Redrawn on the next loop iteration
    }
  }

  fn tick(&mut self) {
    for view in &mut self.view_stack {
      view.tick();
    }
    // Forms close themselves once saved
    if self.view_stack.len() > 1 && self.view_stack.last().is_some_and(|v| v.is_finished()) {
      self.view_stack.pop();
    }
    self.toaster.tick();
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_captures = self
      .view_stack
      .last()
      .is_some_and(|v| v.captures_input());

    if self.command_input.is_active() || !view_captures {
      match self.command_input.handle_key(key) {
        KeyResult::Event(action) => {
          self.apply_command(action);
          return;
        }
        KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => return,
    };
    self.apply_view_action(action);
  }

  fn apply_command(&mut self, action: Action) {
    debug!(?action, "command");
    match action {
      Action::Navigate(route) => self.navigate(route),
      Action::New => {
        let form = self.view_stack.last().and_then(|v| v.new_form());
        match form {
          Some(form) => self.view_stack.push(form),
          None => self
            .ctx
            .toasts
            .error("Nothing to create here", "Open a list or the pipeline first"),
        }
      }
      Action::Quit => self.should_quit = true,
      Action::Unknown(input) => self
        .ctx
        .toasts
        .error("Unknown command", format!("'{}' is not a command or route", input)),
    }
  }

  fn apply_view_action(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Navigate(route) => self.navigate(route),
    }
  }

  /// Replace the stack with the views for `route`
  fn navigate(&mut self, route: Route) {
    info!(route = %route.path(), "navigate");
    self.view_stack = views_for(route, &self.ctx);
  }

  // Accessors for UI rendering
  pub fn title(&self) -> &str {
    &self.title
  }

  /// Shortcuts of the current view, lowest priority value first
  pub fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    shortcuts.sort_by_key(|s| s.priority);
    shortcuts
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn current_route(&self) -> Option<Route> {
    self.view_stack.last().and_then(|v| v.route())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn toaster(&self) -> &Toaster {
    &self.toaster
  }
}

fn restore_terminal() -> Result<()> {
  disable_raw_mode()?;
  stdout().execute(LeaveAlternateScreen)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeCrm;
  use crate::cache::{QueryCache, QueryKey};
  use color_eyre::eyre::eyre;
  use std::sync::Arc;

  fn app() -> App {
    let config = Config::parse("api:\n  url: http://localhost\n").unwrap();
    let crm = CachedCrm::new(Arc::new(FakeCrm::new().with_client("Acme")), QueryCache::default());
    App::new(&config, crm, "test".into(), Route::Dashboard)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_command(app: &mut App, text: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in text.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_route_path_command_builds_stack() {
    let mut app = app();
    type_command(&mut app, "/clients/1");
    assert_eq!(app.current_route(), Some(Route::ClientDetail(1)));
    assert_eq!(app.breadcrumb().len(), 2);
    assert_eq!(app.breadcrumb()[0], "Clients");
  }

  #[tokio::test]
  async fn test_pop_at_root_quits() {
    let mut app = app();
    type_command(&mut app, "pipeline");
    assert_eq!(app.current_route(), Some(Route::Pipeline));
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_unknown_command_raises_toast() {
    let mut app = app();
    type_command(&mut app, "/nowhere/else");
    app.toaster.tick();
    assert_eq!(app.toaster().visible().count(), 1);
    assert_eq!(app.current_route(), Some(Route::Dashboard));
  }

  #[tokio::test]
  async fn test_new_command_pushes_form() {
    let mut app = app();
    type_command(&mut app, "clients");
    type_command(&mut app, "new");
    assert_eq!(app.breadcrumb().len(), 2);
    assert_eq!(app.breadcrumb()[1], "New Client");
  }

  #[tokio::test]
  async fn test_failed_loop_still_clears_cache() {
    let mut app = app();
    let cache = app.ctx.crm.cache().clone();
    cache.set_data(&QueryKey::new("clients"), 1u8);

    let err = app.finish(Err(eyre!("draw failed"))).unwrap_err();

    assert_eq!(err.to_string(), "draw failed");
    assert_eq!(cache.len(), 0);
  }
}
