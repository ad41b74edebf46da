//! Entity forms: field descriptions, drafts, validation and submission.
//!
//! A form edits a draft of plain strings. Drafts are turned into typed
//! payloads only after [`validate`] found no errors, so a form with a bad
//! field never reaches the service.

mod controller;
mod drafts;

pub use controller::{FormController, Saved, SubmitOutcome};
pub use drafts::{ClientDraft, ContactDraft, DealDraft, Draft, ProjectDraft};

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Input kind of a form field, deciding how its value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Email,
  Phone,
  Url,
  /// Non-negative decimal number
  Number,
  /// Whole number from 0 to 100
  Percent,
  /// `YYYY-MM-DD`
  Date,
  /// Identifier of another record
  Reference,
  /// One of a fixed set of values
  Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub name: &'static str,
  pub label: &'static str,
  pub required: bool,
  pub kind: FieldKind,
}

impl FieldSpec {
  pub const fn required(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
    Self {
      name,
      label,
      required: true,
      kind,
    }
  }

  pub const fn optional(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
    Self {
      name,
      label,
      required: false,
      kind,
    }
  }

  /// Hint shown next to an empty field
  pub fn placeholder(&self) -> &'static str {
    match self.kind {
      FieldKind::Email => "name@example.com",
      FieldKind::Url => "https://example.com",
      FieldKind::Date => "YYYY-MM-DD",
      FieldKind::Number => "0.00",
      FieldKind::Percent => "0-100",
      FieldKind::Reference => "id",
      FieldKind::Choice(options) => options.first().copied().unwrap_or(""),
      FieldKind::Text | FieldKind::Phone => "",
    }
  }
}

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
  pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
    self.0.entry(field).or_insert_with(|| message.into());
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn remove(&mut self, field: &str) {
    self.0.remove(field);
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
    self.0.iter().map(|(k, v)| (*k, v.as_str()))
  }
}

/// Check every field of a draft plus its cross-field rules.
pub fn validate<D: Draft>(draft: &D) -> FieldErrors {
  let mut errors = FieldErrors::default();
  for spec in D::fields() {
    if let Some(message) = check_field(spec, draft.value(spec.name)) {
      errors.insert(spec.name, message);
    }
  }
  draft.cross_check(&mut errors);
  errors
}

/// Check a single value against its field description.
pub fn check_field(spec: &FieldSpec, value: &str) -> Option<String> {
  let value = value.trim();
  if value.is_empty() {
    return spec
      .required
      .then(|| format!("{} is required", spec.label));
  }

  let valid = match spec.kind {
    FieldKind::Text => true,
    FieldKind::Email => is_email(value),
    FieldKind::Phone => is_phone(value),
    FieldKind::Url => parse_url(value).is_some(),
    FieldKind::Number => parse_amount(value).is_some(),
    FieldKind::Percent => parse_percent(value).is_some(),
    FieldKind::Date => parse_date(value).is_some(),
    FieldKind::Reference => parse_reference(value).is_some(),
    FieldKind::Choice(options) => options.iter().any(|o| o.eq_ignore_ascii_case(value)),
  };
  if valid {
    return None;
  }

  Some(match spec.kind {
    FieldKind::Email => "Enter a valid email address".to_string(),
    FieldKind::Phone => "Enter a valid phone number".to_string(),
    FieldKind::Url => "Enter a valid URL".to_string(),
    FieldKind::Number => format!("{} must be a non-negative number", spec.label),
    FieldKind::Percent => format!("{} must be between 0 and 100", spec.label),
    FieldKind::Date => "Use the format YYYY-MM-DD".to_string(),
    FieldKind::Reference => format!("{} must be a record id", spec.label),
    FieldKind::Choice(options) => format!("Choose one of: {}", options.join(", ")),
    FieldKind::Text => format!("{} is invalid", spec.label),
  })
}

fn is_email(value: &str) -> bool {
  let mut parts = value.split('@');
  let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
    return false;
  };
  !local.is_empty()
    && !value.contains(char::is_whitespace)
    && domain.contains('.')
    && domain.split('.').all(|label| !label.is_empty())
}

fn is_phone(value: &str) -> bool {
  let digits = value.chars().filter(char::is_ascii_digit).count();
  digits >= 5
    && value
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' '))
}

/// Parse a URL, assuming https when the scheme is missing.
pub fn parse_url(value: &str) -> Option<url::Url> {
  let candidate = if value.contains("://") {
    value.to_string()
  } else {
    format!("https://{}", value)
  };
  let url = url::Url::parse(&candidate).ok()?;
  let host = url.host_str()?;
  (matches!(url.scheme(), "http" | "https") && host.contains('.')).then_some(url)
}

pub fn parse_amount(value: &str) -> Option<f64> {
  let n: f64 = value.trim().replace(',', "").parse().ok()?;
  (n.is_finite() && n >= 0.0).then_some(n)
}

pub fn parse_percent(value: &str) -> Option<u8> {
  value.trim().parse::<u8>().ok().filter(|p| *p <= 100)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn parse_reference(value: &str) -> Option<u64> {
  value.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
  use super::*;

  const EMAIL: FieldSpec = FieldSpec::optional("email", "Email", FieldKind::Email);
  const NAME: FieldSpec = FieldSpec::required("name", "Name", FieldKind::Text);

  #[test]
  fn test_required_field() {
    assert_eq!(check_field(&NAME, "   "), Some("Name is required".into()));
    assert_eq!(check_field(&NAME, "Acme"), None);
    assert_eq!(check_field(&EMAIL, ""), None);
  }

  #[test]
  fn test_email() {
    assert_eq!(check_field(&EMAIL, "ada@example.com"), None);
    for bad in ["ada", "ada@", "@example.com", "a@b@c.com", "ada@localhost", "a da@x.io", "ada@x..io"] {
      assert!(check_field(&EMAIL, bad).is_some(), "{} should be rejected", bad);
    }
  }

  #[test]
  fn test_numbers_and_percent() {
    let budget = FieldSpec::optional("budget", "Budget", FieldKind::Number);
    assert_eq!(check_field(&budget, "12,500.50"), None);
    assert_eq!(parse_amount("12,500.50"), Some(12500.5));
    assert_eq!(
      check_field(&budget, "-1"),
      Some("Budget must be a non-negative number".into())
    );
    assert!(check_field(&budget, "NaN").is_some());

    assert_eq!(parse_percent("100"), Some(100));
    assert_eq!(parse_percent("101"), None);
  }

  #[test]
  fn test_dates() {
    let start = FieldSpec::optional("start", "Start", FieldKind::Date);
    assert_eq!(check_field(&start, "2026-02-28"), None);
    assert_eq!(
      check_field(&start, "2026-02-30"),
      Some("Use the format YYYY-MM-DD".into())
    );
    assert!(check_field(&start, "28/02/2026").is_some());
  }

  #[test]
  fn test_choice_is_case_insensitive() {
    let stage = FieldSpec::required("stage", "Stage", FieldKind::Choice(&["Lead", "Won"]));
    assert_eq!(check_field(&stage, "won"), None);
    assert_eq!(
      check_field(&stage, "Maybe"),
      Some("Choose one of: Lead, Won".into())
    );
  }

  #[test]
  fn test_url_and_phone() {
    let site = FieldSpec::optional("website", "Website", FieldKind::Url);
    assert_eq!(check_field(&site, "acme.io"), None);
    assert_eq!(check_field(&site, "https://acme.io/about"), None);
    assert!(check_field(&site, "ftp://acme.io").is_some());
    assert!(check_field(&site, "acme").is_some());

    let phone = FieldSpec::optional("phone", "Phone", FieldKind::Phone);
    assert_eq!(check_field(&phone, "+1 (555) 010-9999"), None);
    assert!(check_field(&phone, "call me").is_some());
  }

  #[test]
  fn test_reference() {
    assert_eq!(parse_reference("42"), Some(42));
    assert_eq!(parse_reference("0"), None);
    assert_eq!(parse_reference("x"), None);
  }

  #[test]
  fn test_first_error_per_field_wins() {
    let mut errors = FieldErrors::default();
    errors.insert("name", "first");
    errors.insert("name", "second");
    assert_eq!(errors.get("name"), Some("first"));
    assert_eq!(errors.len(), 1);
  }
}
