//! Customers, their ABC tier, and their contacts.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::{require_email, require_text},
  geo::GeoPoint,
  org::validate_code,
  patch::double_option,
};

// ─── ABC classification ──────────────────────────────────────────────────────

/// Monthly revenue (THB) above which a customer is tier A.
pub const TIER_A_MIN_EXCLUSIVE: f64 = 500_000.0;
/// Monthly revenue (THB) at or above which a customer is at least tier B.
pub const TIER_B_MIN_INCLUSIVE: f64 = 100_000.0;

/// Customer tier by monthly revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbcClass {
  A,
  B,
  C,
}

impl AbcClass {
  pub const ALL: [AbcClass; 3] = [AbcClass::A, AbcClass::B, AbcClass::C];

  /// A > 500K; B 100K–500K inclusive; C < 100K.
  pub fn from_monthly_revenue(revenue: f64) -> Self {
    if revenue > TIER_A_MIN_EXCLUSIVE {
      AbcClass::A
    } else if revenue >= TIER_B_MIN_INCLUSIVE {
      AbcClass::B
    } else {
      AbcClass::C
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      AbcClass::A => "A",
      AbcClass::B => "B",
      AbcClass::C => "C",
    }
  }
}

impl fmt::Display for AbcClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AbcClass {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "A" => Ok(AbcClass::A),
      "B" => Ok(AbcClass::B),
      "C" => Ok(AbcClass::C),
      other => Err(Error::UnknownVariant { kind: "abc class", value: other.to_owned() }),
    }
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

/// An account the sales force visits. `code` is unique within a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id:     Uuid,
  pub company_id:      Uuid,
  pub territory_id:    Option<Uuid>,
  pub code:            String,
  pub name:            String,
  pub address:         Option<String>,
  /// Check-ins are radius-checked against this point when present.
  pub location:        Option<GeoPoint>,
  pub monthly_revenue: f64,
  /// Derived from `monthly_revenue` on every write.
  pub class:           AbcClass,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
  pub territory_id:    Option<Uuid>,
  pub code:            String,
  pub name:            String,
  pub address:         Option<String>,
  pub location:        Option<GeoPoint>,
  #[serde(default)]
  pub monthly_revenue: f64,
}

impl NewCustomer {
  pub fn validate(&self) -> Result<()> {
    validate_code(&self.code)?;
    require_text("name", &self.name, 200)?;
    validate_revenue(self.monthly_revenue)?;
    if let Some(point) = self.location {
      point.validate()?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
  #[serde(default, deserialize_with = "double_option")]
  pub territory_id:    Option<Option<Uuid>>,
  pub code:            Option<String>,
  pub name:            Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub address:         Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub location:        Option<Option<GeoPoint>>,
  pub monthly_revenue: Option<f64>,
}

impl Customer {
  pub fn apply(&mut self, patch: CustomerPatch) -> Result<()> {
    crate::patch::apply(&mut self.territory_id, patch.territory_id);
    if let Some(code) = patch.code {
      validate_code(&code)?;
      self.code = code;
    }
    if let Some(name) = patch.name {
      require_text("name", &name, 200)?;
      self.name = name;
    }
    crate::patch::apply(&mut self.address, patch.address);
    if let Some(Some(point)) = patch.location {
      point.validate()?;
    }
    crate::patch::apply(&mut self.location, patch.location);
    if let Some(revenue) = patch.monthly_revenue {
      validate_revenue(revenue)?;
      self.monthly_revenue = revenue;
    }
    self.class = AbcClass::from_monthly_revenue(self.monthly_revenue);
    Ok(())
  }
}

fn validate_revenue(revenue: f64) -> Result<()> {
  if revenue.is_finite() && revenue >= 0.0 {
    Ok(())
  } else {
    Err(Error::invalid("monthly_revenue", "must be a non-negative number"))
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A person at a customer. At most one contact per customer is primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:  Uuid,
  pub customer_id: Uuid,
  pub company_id:  Uuid,
  pub name:        String,
  pub position:    Option<String>,
  pub phone:       Option<String>,
  pub email:       Option<String>,
  pub is_primary:  bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewContact {
  pub name:       String,
  pub position:   Option<String>,
  pub phone:      Option<String>,
  pub email:      Option<String>,
  #[serde(default)]
  pub is_primary: bool,
}

impl NewContact {
  pub fn validate(&self) -> Result<()> {
    require_text("name", &self.name, 200)?;
    if let Some(email) = &self.email {
      require_email("email", email)?;
    }
    Ok(())
  }
}

/// `is_primary: false` is rejected; the flag moves by promoting another
/// contact, never by clearing it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
  pub name:       Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub position:   Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub phone:      Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub email:      Option<Option<String>>,
  pub is_primary: Option<bool>,
}

impl Contact {
  pub fn apply(&mut self, patch: ContactPatch) -> Result<()> {
    if let Some(name) = patch.name {
      require_text("name", &name, 200)?;
      self.name = name;
    }
    crate::patch::apply(&mut self.position, patch.position);
    crate::patch::apply(&mut self.phone, patch.phone);
    if let Some(Some(email)) = &patch.email {
      require_email("email", email)?;
    }
    crate::patch::apply(&mut self.email, patch.email);
    match patch.is_primary {
      Some(true) => self.is_primary = true,
      Some(false) if self.is_primary => {
        return Err(Error::invalid(
          "is_primary",
          "make another contact primary instead of clearing the flag",
        ));
      }
      _ => {}
    }
    Ok(())
  }
}
