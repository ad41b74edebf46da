use ratatui::prelude::Color;

use crate::api::{DealStage, ProjectStatus};
use crate::query::QueryState;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Panel title reflecting the query: " X (loading...) ", " X (error: e) "
/// or " X (n) "
pub fn title_with_state<T>(label: &str, state: &QueryState<T>, count: usize) -> String {
  match state {
    QueryState::Loading => format!(" {} (loading...) ", label),
    QueryState::Error(e) => format!(" {} (error: {}) ", label, e),
    _ => format!(" {} ({}) ", label, count),
  }
}

/// Money with thousands separators and no cents for whole amounts
pub fn format_money(currency: &str, amount: f64) -> String {
  let negative = amount < 0.0;
  let cents = (amount.abs() * 100.0).round() as u64;
  let (whole, frac) = (cents / 100, cents % 100);

  let digits = whole.to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  let sign = if negative { "-" } else { "" };
  if frac == 0 {
    format!("{}{}{}", sign, currency, grouped)
  } else {
    format!("{}{}{}.{:02}", sign, currency, grouped, frac)
  }
}

pub fn stage_color(stage: DealStage) -> Color {
  match stage {
    DealStage::Lead => Color::Gray,
    DealStage::Qualified => Color::Blue,
    DealStage::Proposal => Color::Cyan,
    DealStage::Negotiation => Color::Yellow,
    DealStage::Won => Color::Green,
    DealStage::Lost => Color::Red,
  }
}

pub fn project_status_color(status: ProjectStatus) -> Color {
  match status {
    ProjectStatus::Planning => Color::Gray,
    ProjectStatus::Active => Color::Yellow,
    ProjectStatus::OnHold => Color::Magenta,
    ProjectStatus::Completed => Color::Green,
    ProjectStatus::Cancelled => Color::Red,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Zoë Müller-Lüdenscheidt", 8), "Zoë M...");
  }

  #[test]
  fn test_format_money() {
    assert_eq!(format_money("$", 0.0), "$0");
    assert_eq!(format_money("$", 999.0), "$999");
    assert_eq!(format_money("$", 1234567.0), "$1,234,567");
    assert_eq!(format_money("€", 1200.5), "€1,200.50");
    assert_eq!(format_money("$", -42.0), "-$42");
  }

  #[test]
  fn test_title_with_state() {
    assert_eq!(
      title_with_state::<()>("Clients", &QueryState::Loading, 0),
      " Clients (loading...) "
    );
    assert_eq!(
      title_with_state::<()>("Clients", &QueryState::Error("HTTP 500".into()), 0),
      " Clients (error: HTTP 500) "
    );
    assert_eq!(title_with_state("Clients", &QueryState::Success(()), 3), " Clients (3) ");
  }

  #[test]
  fn test_stage_colors() {
    assert_eq!(stage_color(DealStage::Won), Color::Green);
    assert_eq!(stage_color(DealStage::Lost), Color::Red);
    assert_eq!(project_status_color(ProjectStatus::Active), Color::Yellow);
  }
}
