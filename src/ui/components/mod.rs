mod command_input;
mod confirm;
mod input;
mod search_input;
mod toast_stack;

pub use command_input::CommandInput;
pub use confirm::ConfirmPrompt;
pub use input::{InputResult, TextInput};
pub use search_input::{SearchEvent, SearchInput};
pub use toast_stack::draw_toasts;

/// Outcome of offering a key to a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, with an event for the parent
  Event(T),
  /// Not consumed, try the next handler
  NotHandled,
}
