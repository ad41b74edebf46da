//! Global notification channel.
//!
//! Any component holding a [`ToastSender`] can raise a toast; the app owns
//! the single [`Toaster`], drains the channel on every tick and renders the
//! visible stack.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Most toasts shown at once; older ones are dropped first.
pub const MAX_VISIBLE: usize = 5;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(4);
pub const DESTRUCTIVE_DURATION: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastVariant {
  #[default]
  Default,
  Success,
  Destructive,
}

impl ToastVariant {
  fn default_duration(self) -> Duration {
    match self {
      ToastVariant::Destructive => DESTRUCTIVE_DURATION,
      _ => DEFAULT_DURATION,
    }
  }
}

/// A transient notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub title: String,
  pub description: Option<String>,
  pub variant: ToastVariant,
  pub duration: Duration,
}

impl Toast {
  pub fn new(title: impl Into<String>, variant: ToastVariant) -> Self {
    Self {
      title: title.into(),
      description: None,
      variant,
      duration: variant.default_duration(),
    }
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn duration(mut self, duration: Duration) -> Self {
    self.duration = duration;
    self
  }
}

/// Cloneable handle for raising toasts from views and background tasks.
#[derive(Debug, Clone)]
pub struct ToastSender {
  tx: mpsc::UnboundedSender<Toast>,
}

impl ToastSender {
  pub fn show(&self, toast: Toast) {
    debug!(title = %toast.title, variant = ?toast.variant, "toast");
    // Ignore send errors - the app is shutting down
    let _ = self.tx.send(toast);
  }

  pub fn info(&self, title: impl Into<String>, description: impl Into<String>) {
    self.show(Toast::new(title, ToastVariant::Default).description(description));
  }

  pub fn success(&self, title: impl Into<String>, description: impl Into<String>) {
    self.show(Toast::new(title, ToastVariant::Success).description(description));
  }

  pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
    self.show(Toast::new(title, ToastVariant::Destructive).description(description));
  }
}

#[derive(Debug)]
struct Shown {
  toast: Toast,
  shown_at: Instant,
}

/// Receiving end of the toast channel plus the visible stack.
#[derive(Debug)]
pub struct Toaster {
  rx: mpsc::UnboundedReceiver<Toast>,
  visible: VecDeque<Shown>,
}

impl Toaster {
  pub fn channel() -> (Self, ToastSender) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
      Self {
        rx,
        visible: VecDeque::new(),
      },
      ToastSender { tx },
    )
  }

  /// Pull new toasts and expire old ones. Returns `true` if the stack changed.
  pub fn tick(&mut self) -> bool {
    self.tick_at(Instant::now())
  }

  fn tick_at(&mut self, now: Instant) -> bool {
    let before = self.visible.len();
    let mut changed = false;

    while let Ok(toast) = self.rx.try_recv() {
      self.visible.push_back(Shown {
        toast,
        shown_at: now,
      });
      changed = true;
    }
    while self.visible.len() > MAX_VISIBLE {
      self.visible.pop_front();
    }

    self
      .visible
      .retain(|s| now.saturating_duration_since(s.shown_at) < s.toast.duration);

    changed || self.visible.len() != before
  }

  /// Visible toasts, oldest first
  pub fn visible(&self) -> impl DoubleEndedIterator<Item = &Toast> {
    self.visible.iter().map(|s| &s.toast)
  }

  pub fn is_empty(&self) -> bool {
    self.visible.is_empty()
  }
}
