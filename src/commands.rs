/// Available commands and autocomplete logic
use crate::routes::Route;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home"],
    description: "Stats, recent deals and deals closing soon",
  },
  Command {
    name: "clients",
    aliases: &["c", "client", "customers"],
    description: "Browse clients",
  },
  Command {
    name: "contacts",
    aliases: &["ct", "contact", "people"],
    description: "Browse contacts",
  },
  Command {
    name: "projects",
    aliases: &["p", "project"],
    description: "Browse projects",
  },
  Command {
    name: "pipeline",
    aliases: &["pl", "deals", "kanban"],
    description: "Sales pipeline board",
  },
  Command {
    name: "new",
    aliases: &["n", "create", "add"],
    description: "Create a record in the current view",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit crmdeck",
  },
];

/// What a submitted command line resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Navigate(Route),
  New,
  Quit,
  Unknown(String),
}

/// Resolve a command name or a route path (`/clients/42`).
pub fn resolve(input: &str) -> Action {
  let input = input.trim();
  if input.starts_with('/') || input.contains('/') {
    return match Route::parse(input) {
      Some(route) => Action::Navigate(route),
      None => Action::Unknown(input.to_string()),
    };
  }

  match input.to_lowercase().as_str() {
    "dashboard" => Action::Navigate(Route::Dashboard),
    "clients" => Action::Navigate(Route::Clients),
    "contacts" => Action::Navigate(Route::Contacts),
    "projects" => Action::Navigate(Route::Projects),
    "pipeline" => Action::Navigate(Route::Pipeline),
    "new" => Action::New,
    "quit" => Action::Quit,
    other => Action::Unknown(other.to_string()),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  // Paths are navigated directly, not completed
  if input_lower.contains('/') {
    return Vec::new();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Stable sort keeps table order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("clients");
    assert_eq!(suggestions[0].name, "clients");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("deals");
    assert_eq!(suggestions[0].name, "pipeline");

    let suggestions = get_suggestions("c");
    assert_eq!(suggestions[0].name, "clients");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("pro");
    assert_eq!(suggestions[0].name, "projects");

    let suggestions = get_suggestions("con");
    assert_eq!(suggestions[0].name, "contacts");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("board");
    assert_eq!(suggestions[0].name, "dashboard");
  }

  #[test]
  fn test_paths_have_no_suggestions() {
    assert!(get_suggestions("/clients/4").is_empty());
  }

  #[test]
  fn test_resolve() {
    assert_eq!(resolve("pipeline"), Action::Navigate(Route::Pipeline));
    assert_eq!(resolve(" Clients "), Action::Navigate(Route::Clients));
    assert_eq!(resolve("/clients/42"), Action::Navigate(Route::ClientDetail(42)));
    assert_eq!(resolve("projects/3"), Action::Navigate(Route::ProjectDetail(3)));
    assert_eq!(resolve("new"), Action::New);
    assert_eq!(resolve("quit"), Action::Quit);
    assert_eq!(resolve("/nope"), Action::Unknown("/nope".into()));
    assert_eq!(resolve("frobnicate"), Action::Unknown("frobnicate".into()));
  }
}
