use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::api::CachedCrm;
use crate::config::DashboardConfig;
use crate::routes::Route;
use crate::toast::ToastSender;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

pub type Shortcut = ShortcutInfo;

/// Everything a view needs to load data and talk back to the user
#[derive(Clone)]
pub struct ViewContext {
  pub crm: CachedCrm,
  pub toasts: ToastSender,
  pub dashboard: DashboardConfig,
  pub currency: String,
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Replace the stack with the views for a route
  Navigate(Route),
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, forms, drag) and return
/// actions for the App to execute:
/// App → View → Components
///
/// Views that load data use `Query<T>` internally and poll it in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Route this view stands for, if it is addressable
  fn route(&self) -> Option<Route> {
    None
  }

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}

  /// Whether the view is capturing text input, so global keys like `:`
  /// must be passed through
  fn captures_input(&self) -> bool {
    false
  }

  /// The view is done (e.g. a form saved) and should be popped
  fn is_finished(&self) -> bool {
    false
  }

  /// Form for the `new` command in this view
  fn new_form(&self) -> Option<Box<dyn View>> {
    None
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
