//! Error types for `sfe-core`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
  /// A field failed validation.
  #[error("{field}: {message}")]
  Invalid {
    field:   &'static str,
    message: String,
  },

  #[error("invalid coordinates: lat {lat}, lng {lng}")]
  InvalidCoordinates { lat: f64, lng: f64 },

  /// A status change that the record's lifecycle does not allow.
  #[error("cannot {action} a {from} {entity}")]
  InvalidTransition {
    entity: &'static str,
    from:   &'static str,
    action: &'static str,
  },

  /// A check-in position too far from the customer.
  #[error("position is {distance_m:.0} m from the customer; the check-in radius is {radius_m:.0} m")]
  OutsideRadius { distance_m: f64, radius_m: f64 },

  #[error("unknown {kind}: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

impl Error {
  pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
    Self::Invalid { field, message: message.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Field checks ────────────────────────────────────────────────────────────

/// Trimmed, non-empty, at most `max` characters.
pub(crate) fn require_text(field: &'static str, value: &str, max: usize) -> Result<()> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::invalid(field, "must not be empty"));
  }
  if trimmed.chars().count() > max {
    return Err(Error::invalid(field, format!("must be at most {max} characters")));
  }
  Ok(())
}

/// A deliberately loose shape check: one `@`, non-empty local part, a dot in
/// the domain, no whitespace.
pub(crate) fn require_email(field: &'static str, value: &str) -> Result<()> {
  let valid = match value.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
    }
    None => false,
  };
  if valid {
    Ok(())
  } else {
    Err(Error::invalid(field, format!("{value:?} is not a valid email address")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_shapes() {
    assert!(require_email("email", "rep@example.co.th").is_ok());
    assert!(require_email("email", "rep@localhost").is_err());
    assert!(require_email("email", "@example.com").is_err());
    assert!(require_email("email", "a b@example.com").is_err());
    assert!(require_email("email", "a@b@example.com").is_err());
  }

  #[test]
  fn text_limits() {
    assert!(require_text("name", "  ", 10).is_err());
    assert!(require_text("name", "Bangkok", 10).is_ok());
    assert!(require_text("name", "Bangkok North", 10).is_err());
  }
}
