//! Organisation records: companies, territories, teams and users.
//!
//! Every record except [`Company`] carries the `company_id` of its tenant.
//! Higher layers use it to scope every read and write to the session's
//! company.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::{require_email, require_text},
  patch::double_option,
};

// ─── Role ────────────────────────────────────────────────────────────────────

/// Position in the sales organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
  /// Chief executive.
  Ceo,
  /// Sales director.
  Sd,
  /// Sales manager.
  Sm,
  /// Marketing manager.
  Mm,
  /// Product manager.
  Pm,
  /// Supervisor.
  Sup,
  /// Sales representative, the field user.
  Sr,
}

impl Role {
  pub const ALL: [Role; 7] = [
    Role::Ceo,
    Role::Sd,
    Role::Sm,
    Role::Mm,
    Role::Pm,
    Role::Sup,
    Role::Sr,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Role::Ceo => "CEO",
      Role::Sd => "SD",
      Role::Sm => "SM",
      Role::Mm => "MM",
      Role::Pm => "PM",
      Role::Sup => "SUP",
      Role::Sr => "SR",
    }
  }

  /// May manage the company record, users, territories and teams.
  pub fn is_admin(self) -> bool { matches!(self, Role::Ceo | Role::Sd) }

  /// May review pre-call plans and see every rep's records.
  pub fn is_manager(self) -> bool { !matches!(self, Role::Sr) }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Role::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| Error::UnknownVariant { kind: "role", value: s.to_owned() })
  }
}

// ─── Company ─────────────────────────────────────────────────────────────────

/// The tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
  pub company_id: Uuid,
  pub name:       String,
  /// IANA zone name used by clients for display, e.g. `Asia/Bangkok`.
  pub timezone:   String,
  /// ISO 4217 code, e.g. `THB`.
  pub currency:   String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
  pub name:     String,
  #[serde(default = "default_timezone")]
  pub timezone: String,
  #[serde(default = "default_currency")]
  pub currency: String,
}

fn default_timezone() -> String { "Asia/Bangkok".to_owned() }
fn default_currency() -> String { "THB".to_owned() }

impl NewCompany {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:     name.into(),
      timezone: default_timezone(),
      currency: default_currency(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    require_text("name", &self.name, 200)?;
    require_text("timezone", &self.timezone, 64)?;
    validate_currency(&self.currency)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyPatch {
  pub name:     Option<String>,
  pub timezone: Option<String>,
  pub currency: Option<String>,
}

impl Company {
  pub fn apply(&mut self, patch: CompanyPatch) -> Result<()> {
    if let Some(name) = patch.name {
      require_text("name", &name, 200)?;
      self.name = name.trim().to_owned();
    }
    if let Some(tz) = patch.timezone {
      require_text("timezone", &tz, 64)?;
      self.timezone = tz;
    }
    if let Some(currency) = patch.currency {
      validate_currency(&currency)?;
      self.currency = currency;
    }
    Ok(())
  }
}

fn validate_currency(code: &str) -> Result<()> {
  if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
    Ok(())
  } else {
    Err(Error::invalid("currency", "must be a three-letter ISO 4217 code"))
  }
}

// ─── Territory ───────────────────────────────────────────────────────────────

/// A geographic sales area. `code` is unique within a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Territory {
  pub territory_id: Uuid,
  pub company_id:   Uuid,
  pub code:         String,
  pub name:         String,
  pub description:  Option<String>,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTerritory {
  pub code:        String,
  pub name:        String,
  pub description: Option<String>,
}

impl NewTerritory {
  pub fn validate(&self) -> Result<()> {
    validate_code(&self.code)?;
    require_text("name", &self.name, 200)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerritoryPatch {
  pub code:        Option<String>,
  pub name:        Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub description: Option<Option<String>>,
}

impl Territory {
  pub fn apply(&mut self, patch: TerritoryPatch) -> Result<()> {
    if let Some(code) = patch.code {
      validate_code(&code)?;
      self.code = code;
    }
    if let Some(name) = patch.name {
      require_text("name", &name, 200)?;
      self.name = name;
    }
    crate::patch::apply(&mut self.description, patch.description);
    Ok(())
  }
}

/// Short identifiers: 1–32 chars of ASCII alphanumerics, `-` or `_`.
pub(crate) fn validate_code(code: &str) -> Result<()> {
  let ok = !code.is_empty()
    && code.len() <= 32
    && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if ok {
    Ok(())
  } else {
    Err(Error::invalid(
      "code",
      "must be 1-32 characters of letters, digits, '-' or '_'",
    ))
  }
}

// ─── Team ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
  pub team_id:      Uuid,
  pub company_id:   Uuid,
  pub territory_id: Option<Uuid>,
  pub name:         String,
  /// Must be a user of the same company.
  pub leader_id:    Option<Uuid>,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
  pub name:         String,
  pub territory_id: Option<Uuid>,
  pub leader_id:    Option<Uuid>,
}

impl NewTeam {
  pub fn validate(&self) -> Result<()> { require_text("name", &self.name, 200) }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPatch {
  pub name:         Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub territory_id: Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "double_option")]
  pub leader_id:    Option<Option<Uuid>>,
}

impl Team {
  pub fn apply(&mut self, patch: TeamPatch) -> Result<()> {
    if let Some(name) = patch.name {
      require_text("name", &name, 200)?;
      self.name = name;
    }
    crate::patch::apply(&mut self.territory_id, patch.territory_id);
    crate::patch::apply(&mut self.leader_id, patch.leader_id);
    Ok(())
  }
}

// ─── User ────────────────────────────────────────────────────────────────────

/// A login-capable member of a company.
///
/// The password hash is never serialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  pub company_id:    Uuid,
  pub username:      String,
  pub email:         String,
  pub full_name:     String,
  pub phone:         Option<String>,
  pub role:          Role,
  pub territory_id:  Option<Uuid>,
  pub team_id:       Option<Uuid>,
  /// Receives this user's plan and report submissions for review.
  pub manager_id:    Option<Uuid>,
  pub is_active:     bool,
  #[serde(skip)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::SalesStore::add_user`]. The caller hashes the
/// password before building this.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub company_id:    Uuid,
  pub username:      String,
  pub email:         String,
  pub full_name:     String,
  pub phone:         Option<String>,
  pub role:          Role,
  pub territory_id:  Option<Uuid>,
  pub team_id:       Option<Uuid>,
  pub manager_id:    Option<Uuid>,
  pub password_hash: String,
}

impl NewUser {
  pub fn validate(&self) -> Result<()> {
    validate_username(&self.username)?;
    require_email("email", &self.email)?;
    require_text("full_name", &self.full_name, 200)
  }
}

pub fn validate_username(username: &str) -> Result<()> {
  let ok = (3..=64).contains(&username.len())
    && username
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
  if ok {
    Ok(())
  } else {
    Err(Error::invalid(
      "username",
      "must be 3-64 characters of letters, digits, '.', '-' or '_'",
    ))
  }
}

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::invalid(
      "password",
      format!("must be at least {MIN_PASSWORD_LEN} characters"),
    ));
  }
  Ok(())
}

/// Profile fields a user may change on their own record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
  pub email:     Option<String>,
  pub full_name: Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub phone:     Option<Option<String>>,
}

/// Assignment fields only administrators may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentPatch {
  pub role:         Option<Role>,
  #[serde(default, deserialize_with = "double_option")]
  pub territory_id: Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "double_option")]
  pub team_id:      Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "double_option")]
  pub manager_id:   Option<Option<Uuid>>,
  pub is_active:    Option<bool>,
}

impl AssignmentPatch {
  pub fn is_empty(&self) -> bool {
    self.role.is_none()
      && self.territory_id.is_none()
      && self.team_id.is_none()
      && self.manager_id.is_none()
      && self.is_active.is_none()
  }
}

impl User {
  pub fn apply_profile(&mut self, patch: ProfilePatch) -> Result<()> {
    if let Some(email) = patch.email {
      require_email("email", &email)?;
      self.email = email;
    }
    if let Some(full_name) = patch.full_name {
      require_text("full_name", &full_name, 200)?;
      self.full_name = full_name;
    }
    crate::patch::apply(&mut self.phone, patch.phone);
    Ok(())
  }

  pub fn apply_assignment(&mut self, patch: AssignmentPatch) -> Result<()> {
    if let Some(role) = patch.role {
      self.role = role;
    }
    crate::patch::apply(&mut self.territory_id, patch.territory_id);
    crate::patch::apply(&mut self.team_id, patch.team_id);
    crate::patch::apply(&mut self.manager_id, patch.manager_id);
    if self.manager_id == Some(self.user_id) {
      return Err(Error::invalid("manager_id", "a user cannot manage themselves"));
    }
    if let Some(active) = patch.is_active {
      self.is_active = active;
    }
    Ok(())
  }
}

/// A user together with the records the profile screen shows next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
  pub user:      User,
  pub company:   Company,
  pub territory: Option<Territory>,
  pub team:      Option<Team>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_wire_names_are_uppercase() {
    for role in Role::ALL {
      let json = serde_json::to_string(&role).unwrap();
      assert_eq!(json, format!("\"{}\"", role.as_str()));
      assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
    assert!("Manager".parse::<Role>().is_err());
  }

  #[test]
  fn role_rules() {
    assert!(Role::Ceo.is_admin());
    assert!(Role::Sd.is_admin());
    assert!(!Role::Sm.is_admin());
    assert!(Role::Sup.is_manager());
    assert!(!Role::Sr.is_manager());
  }

  #[test]
  fn territory_codes() {
    assert!(validate_code("BKK-N_1").is_ok());
    assert!(validate_code("").is_err());
    assert!(validate_code("bad code").is_err());
  }

  #[test]
  fn password_hash_is_not_serialised() {
    let now = Utc::now();
    let user = User {
      user_id:       Uuid::new_v4(),
      company_id:    Uuid::new_v4(),
      username:      "somchai".into(),
      email:         "somchai@example.co.th".into(),
      full_name:     "Somchai P.".into(),
      phone:         None,
      role:          Role::Sr,
      territory_id:  None,
      team_id:       None,
      manager_id:    None,
      is_active:     true,
      password_hash: "$argon2id$secret".into(),
      created_at:    now,
      updated_at:    now,
    };
    let json = serde_json::to_string(&user).unwrap();
    assert!(!json.contains("argon2"));
  }

  #[test]
  fn self_management_is_rejected() {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let mut user = User {
      user_id:       id,
      company_id:    Uuid::new_v4(),
      username:      "nok".into(),
      email:         "nok@example.com".into(),
      full_name:     "Nok".into(),
      phone:         None,
      role:          Role::Sm,
      territory_id:  None,
      team_id:       None,
      manager_id:    None,
      is_active:     true,
      password_hash: String::new(),
      created_at:    now,
      updated_at:    now,
    };
    let patch = AssignmentPatch { manager_id: Some(Some(id)), ..Default::default() };
    assert!(user.apply_assignment(patch).is_err());
  }
}
