//! Helpers for partial-update (PATCH) bodies.

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field from an explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply a double-option patch to a nullable field.
pub fn apply<T>(target: &mut Option<T>, patch: Option<Option<T>>) {
  if let Some(value) = patch {
    *target = value;
  }
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize)]
  struct Body {
    #[serde(default, deserialize_with = "double_option")]
    phone: Option<Option<String>>,
  }

  #[test]
  fn absent_null_and_value_are_distinct() {
    let absent: Body = serde_json::from_str("{}").unwrap();
    let null: Body = serde_json::from_str(r#"{"phone":null}"#).unwrap();
    let value: Body = serde_json::from_str(r#"{"phone":"+66 2 000 0000"}"#).unwrap();

    assert_eq!(absent.phone, None);
    assert_eq!(null.phone, Some(None));
    assert_eq!(value.phone, Some(Some("+66 2 000 0000".to_string())));

    let mut field = Some("old".to_string());
    apply(&mut field, null.phone);
    assert_eq!(field, None);
  }
}
