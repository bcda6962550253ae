//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings (microseconds,
//! `Z` suffix) so that lexical order is chronological. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored as their wire names.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use sfe_core::{
  customer::{Contact, Customer},
  geo::GeoPoint,
  notification::{Notification, NotificationPreferences},
  org::{Company, Team, Territory, User},
  visit::{CallReport, GpsStamp, Photo, PreCallPlan},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_opt_uuid(id: Option<Uuid>) -> Option<String> { id.map(encode_uuid) }

/// JSON array of ids, consumed in SQL through `json_each`.
pub fn encode_uuid_list(ids: Option<&[Uuid]>) -> Result<Option<String>> {
  ids
    .map(|ids| {
      let strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
      serde_json::to_string(&strs)
    })
    .transpose()
    .map_err(Error::from)
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── GPS ──────────────────────────────────────────────────────────────────────

fn decode_point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
  match (lat, lng) {
    (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
    _ => None,
  }
}

fn decode_stamp(at: Option<String>, lat: Option<f64>, lng: Option<f64>) -> Result<Option<GpsStamp>> {
  let at = decode_opt_dt(at)?;
  Ok(match (at, decode_point(lat, lng)) {
    (Some(at), Some(point)) => Some(GpsStamp { at, point }),
    _ => None,
  })
}

// ─── Text search ──────────────────────────────────────────────────────────────

/// `%text%` with LIKE wildcards escaped; pair with `ESCAPE '\'`.
pub fn like_pattern(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len() + 2);
  escaped.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const COMPANY_COLUMNS: &str = "company_id, name, timezone, currency, created_at, updated_at";

/// Raw strings read directly from a `companies` row.
pub struct RawCompany {
  company_id: String,
  name:       String,
  timezone:   String,
  currency:   String,
  created_at: String,
  updated_at: String,
}

impl RawCompany {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      company_id: row.get(0)?,
      name:       row.get(1)?,
      timezone:   row.get(2)?,
      currency:   row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_company(self) -> Result<Company> {
    Ok(Company {
      company_id: decode_uuid(&self.company_id)?,
      name:       self.name,
      timezone:   self.timezone,
      currency:   self.currency,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const TERRITORY_COLUMNS: &str =
  "territory_id, company_id, code, name, description, created_at";

pub struct RawTerritory {
  territory_id: String,
  company_id:   String,
  code:         String,
  name:         String,
  description:  Option<String>,
  created_at:   String,
}

impl RawTerritory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      territory_id: row.get(0)?,
      company_id:   row.get(1)?,
      code:         row.get(2)?,
      name:         row.get(3)?,
      description:  row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_territory(self) -> Result<Territory> {
    Ok(Territory {
      territory_id: decode_uuid(&self.territory_id)?,
      company_id:   decode_uuid(&self.company_id)?,
      code:         self.code,
      name:         self.name,
      description:  self.description,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const TEAM_COLUMNS: &str = "team_id, company_id, territory_id, name, leader_id, created_at";

pub struct RawTeam {
  team_id:      String,
  company_id:   String,
  territory_id: Option<String>,
  name:         String,
  leader_id:    Option<String>,
  created_at:   String,
}

impl RawTeam {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      team_id:      row.get(0)?,
      company_id:   row.get(1)?,
      territory_id: row.get(2)?,
      name:         row.get(3)?,
      leader_id:    row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_team(self) -> Result<Team> {
    Ok(Team {
      team_id:      decode_uuid(&self.team_id)?,
      company_id:   decode_uuid(&self.company_id)?,
      territory_id: decode_opt_uuid(self.territory_id)?,
      name:         self.name,
      leader_id:    decode_opt_uuid(self.leader_id)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const USER_COLUMNS: &str = "user_id, company_id, username, email, full_name, phone, role, \
                                territory_id, team_id, manager_id, is_active, password_hash, \
                                created_at, updated_at";

pub struct RawUser {
  user_id:       String,
  company_id:    String,
  username:      String,
  email:         String,
  full_name:     String,
  phone:         Option<String>,
  role:          String,
  territory_id:  Option<String>,
  team_id:       Option<String>,
  manager_id:    Option<String>,
  is_active:     bool,
  password_hash: String,
  created_at:    String,
  updated_at:    String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      company_id:    row.get(1)?,
      username:      row.get(2)?,
      email:         row.get(3)?,
      full_name:     row.get(4)?,
      phone:         row.get(5)?,
      role:          row.get(6)?,
      territory_id:  row.get(7)?,
      team_id:       row.get(8)?,
      manager_id:    row.get(9)?,
      is_active:     row.get(10)?,
      password_hash: row.get(11)?,
      created_at:    row.get(12)?,
      updated_at:    row.get(13)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      company_id:    decode_uuid(&self.company_id)?,
      username:      self.username,
      email:         self.email,
      full_name:     self.full_name,
      phone:         self.phone,
      role:          self.role.parse()?,
      territory_id:  decode_opt_uuid(self.territory_id)?,
      team_id:       decode_opt_uuid(self.team_id)?,
      manager_id:    decode_opt_uuid(self.manager_id)?,
      is_active:     self.is_active,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const CUSTOMER_COLUMNS: &str = "customer_id, company_id, territory_id, code, name, address, \
                                    lat, lng, monthly_revenue, class, created_at, updated_at";

pub struct RawCustomer {
  customer_id:     String,
  company_id:      String,
  territory_id:    Option<String>,
  code:            String,
  name:            String,
  address:         Option<String>,
  lat:             Option<f64>,
  lng:             Option<f64>,
  monthly_revenue: f64,
  class:           String,
  created_at:      String,
  updated_at:      String,
}

impl RawCustomer {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      customer_id:     row.get(0)?,
      company_id:      row.get(1)?,
      territory_id:    row.get(2)?,
      code:            row.get(3)?,
      name:            row.get(4)?,
      address:         row.get(5)?,
      lat:             row.get(6)?,
      lng:             row.get(7)?,
      monthly_revenue: row.get(8)?,
      class:           row.get(9)?,
      created_at:      row.get(10)?,
      updated_at:      row.get(11)?,
    })
  }

  pub fn into_customer(self) -> Result<Customer> {
    Ok(Customer {
      customer_id:     decode_uuid(&self.customer_id)?,
      company_id:      decode_uuid(&self.company_id)?,
      territory_id:    decode_opt_uuid(self.territory_id)?,
      code:            self.code,
      name:            self.name,
      address:         self.address,
      location:        decode_point(self.lat, self.lng),
      monthly_revenue: self.monthly_revenue,
      class:           self.class.parse()?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

pub const CONTACT_COLUMNS: &str = "contact_id, customer_id, company_id, name, position, phone, \
                                   email, is_primary, created_at, updated_at";

pub struct RawContact {
  contact_id:  String,
  customer_id: String,
  company_id:  String,
  name:        String,
  position:    Option<String>,
  phone:       Option<String>,
  email:       Option<String>,
  is_primary:  bool,
  created_at:  String,
  updated_at:  String,
}

impl RawContact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:  row.get(0)?,
      customer_id: row.get(1)?,
      company_id:  row.get(2)?,
      name:        row.get(3)?,
      position:    row.get(4)?,
      phone:       row.get(5)?,
      email:       row.get(6)?,
      is_primary:  row.get(7)?,
      created_at:  row.get(8)?,
      updated_at:  row.get(9)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:  decode_uuid(&self.contact_id)?,
      customer_id: decode_uuid(&self.customer_id)?,
      company_id:  decode_uuid(&self.company_id)?,
      name:        self.name,
      position:    self.position,
      phone:       self.phone,
      email:       self.email,
      is_primary:  self.is_primary,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const PLAN_COLUMNS: &str = "plan_id, company_id, sr_id, customer_id, scheduled_at, \
                                objectives, notes, status, submitted_at, reviewer_id, \
                                reviewed_at, review_comment, created_at, updated_at";

pub struct RawPlan {
  plan_id:        String,
  company_id:     String,
  sr_id:          String,
  customer_id:    String,
  scheduled_at:   String,
  objectives:     String,
  notes:          Option<String>,
  status:         String,
  submitted_at:   Option<String>,
  reviewer_id:    Option<String>,
  reviewed_at:    Option<String>,
  review_comment: Option<String>,
  created_at:     String,
  updated_at:     String,
}

impl RawPlan {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      plan_id:        row.get(0)?,
      company_id:     row.get(1)?,
      sr_id:          row.get(2)?,
      customer_id:    row.get(3)?,
      scheduled_at:   row.get(4)?,
      objectives:     row.get(5)?,
      notes:          row.get(6)?,
      status:         row.get(7)?,
      submitted_at:   row.get(8)?,
      reviewer_id:    row.get(9)?,
      reviewed_at:    row.get(10)?,
      review_comment: row.get(11)?,
      created_at:     row.get(12)?,
      updated_at:     row.get(13)?,
    })
  }

  pub fn into_plan(self) -> Result<PreCallPlan> {
    Ok(PreCallPlan {
      plan_id:        decode_uuid(&self.plan_id)?,
      company_id:     decode_uuid(&self.company_id)?,
      sr_id:          decode_uuid(&self.sr_id)?,
      customer_id:    decode_uuid(&self.customer_id)?,
      scheduled_at:   decode_dt(&self.scheduled_at)?,
      objectives:     self.objectives,
      notes:          self.notes,
      status:         self.status.parse()?,
      submitted_at:   decode_opt_dt(self.submitted_at)?,
      reviewer_id:    decode_opt_uuid(self.reviewer_id)?,
      reviewed_at:    decode_opt_dt(self.reviewed_at)?,
      review_comment: self.review_comment,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

pub const REPORT_COLUMNS: &str = "report_id, company_id, sr_id, customer_id, plan_id, summary, \
                                  outcome, next_steps, check_in_at, check_in_lat, check_in_lng, \
                                  check_out_at, check_out_lat, check_out_lng, status, \
                                  submitted_at, created_at, updated_at";

pub struct RawReport {
  report_id:     String,
  company_id:    String,
  sr_id:         String,
  customer_id:   String,
  plan_id:       Option<String>,
  summary:       String,
  outcome:       Option<String>,
  next_steps:    Option<String>,
  check_in_at:   Option<String>,
  check_in_lat:  Option<f64>,
  check_in_lng:  Option<f64>,
  check_out_at:  Option<String>,
  check_out_lat: Option<f64>,
  check_out_lng: Option<f64>,
  status:        String,
  submitted_at:  Option<String>,
  created_at:    String,
  updated_at:    String,
}

impl RawReport {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      report_id:     row.get(0)?,
      company_id:    row.get(1)?,
      sr_id:         row.get(2)?,
      customer_id:   row.get(3)?,
      plan_id:       row.get(4)?,
      summary:       row.get(5)?,
      outcome:       row.get(6)?,
      next_steps:    row.get(7)?,
      check_in_at:   row.get(8)?,
      check_in_lat:  row.get(9)?,
      check_in_lng:  row.get(10)?,
      check_out_at:  row.get(11)?,
      check_out_lat: row.get(12)?,
      check_out_lng: row.get(13)?,
      status:        row.get(14)?,
      submitted_at:  row.get(15)?,
      created_at:    row.get(16)?,
      updated_at:    row.get(17)?,
    })
  }

  pub fn into_report(self) -> Result<CallReport> {
    Ok(CallReport {
      report_id:    decode_uuid(&self.report_id)?,
      company_id:   decode_uuid(&self.company_id)?,
      sr_id:        decode_uuid(&self.sr_id)?,
      customer_id:  decode_uuid(&self.customer_id)?,
      plan_id:      decode_opt_uuid(self.plan_id)?,
      summary:      self.summary,
      outcome:      self.outcome,
      next_steps:   self.next_steps,
      check_in:     decode_stamp(self.check_in_at, self.check_in_lat, self.check_in_lng)?,
      check_out:    decode_stamp(self.check_out_at, self.check_out_lat, self.check_out_lng)?,
      status:       self.status.parse()?,
      submitted_at: decode_opt_dt(self.submitted_at)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const PHOTO_COLUMNS: &str = "photo_id, report_id, company_id, path, content_hash, \
                                 media_type, size_bytes, uploaded_by, uploaded_at";

pub struct RawPhoto {
  photo_id:     String,
  report_id:    String,
  company_id:   String,
  path:         String,
  content_hash: String,
  media_type:   String,
  size_bytes:   i64,
  uploaded_by:  String,
  uploaded_at:  String,
}

impl RawPhoto {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      photo_id:     row.get(0)?,
      report_id:    row.get(1)?,
      company_id:   row.get(2)?,
      path:         row.get(3)?,
      content_hash: row.get(4)?,
      media_type:   row.get(5)?,
      size_bytes:   row.get(6)?,
      uploaded_by:  row.get(7)?,
      uploaded_at:  row.get(8)?,
    })
  }

  pub fn into_photo(self) -> Result<Photo> {
    Ok(Photo {
      photo_id:     decode_uuid(&self.photo_id)?,
      report_id:    decode_uuid(&self.report_id)?,
      company_id:   decode_uuid(&self.company_id)?,
      path:         self.path,
      content_hash: self.content_hash,
      media_type:   self.media_type,
      size_bytes:   self.size_bytes.max(0) as u64,
      uploaded_by:  decode_uuid(&self.uploaded_by)?,
      uploaded_at:  decode_dt(&self.uploaded_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, user_id, kind, title, body, subject_id, is_read, read_at, created_at";

pub struct RawNotification {
  notification_id: String,
  user_id:         String,
  kind:            String,
  title:           String,
  body:            String,
  subject_id:      Option<String>,
  is_read:         bool,
  read_at:         Option<String>,
  created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      user_id:         row.get(1)?,
      kind:            row.get(2)?,
      title:           row.get(3)?,
      body:            row.get(4)?,
      subject_id:      row.get(5)?,
      is_read:         row.get(6)?,
      read_at:         row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      kind:            self.kind.parse()?,
      title:           self.title,
      body:            self.body,
      subject_id:      decode_opt_uuid(self.subject_id)?,
      is_read:         self.is_read,
      read_at:         decode_opt_dt(self.read_at)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const PREFERENCES_COLUMNS: &str =
  "user_id, plan_submitted, plan_reviewed, report_submitted, email_digest, updated_at";

pub struct RawPreferences {
  user_id:          String,
  plan_submitted:   bool,
  plan_reviewed:    bool,
  report_submitted: bool,
  email_digest:     bool,
  updated_at:       String,
}

impl RawPreferences {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:          row.get(0)?,
      plan_submitted:   row.get(1)?,
      plan_reviewed:    row.get(2)?,
      report_submitted: row.get(3)?,
      email_digest:     row.get(4)?,
      updated_at:       row.get(5)?,
    })
  }

  pub fn into_preferences(self) -> Result<NotificationPreferences> {
    Ok(NotificationPreferences {
      user_id:          decode_uuid(&self.user_id)?,
      plan_submitted:   self.plan_submitted,
      plan_reviewed:    self.plan_reviewed,
      report_submitted: self.report_submitted,
      email_digest:     self.email_digest,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = decode_dt("2025-01-01T09:00:00Z").unwrap();
    let b = decode_dt("2025-01-01T09:00:00.5Z").unwrap();
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn like_wildcards_are_escaped() {
    assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
  }
}
