//! Visit planning and logging: pre-call plans, call reports and photos.
//!
//! Both record types carry a small status machine. Every transition is a
//! method on the record that checks the current status and stamps the
//! relevant timestamps; storage only ever persists the result.
//!
//! ```text
//! PreCallPlan:  DRAFT ──submit──▶ PENDING ──approve──▶ APPROVED
//!                 ▲                   └─────reject───▶ REJECTED
//!                 └──────────────edit─────────────────────┘
//!
//! CallReport:   DRAFT ──check-in──▶ ──check-out──▶ ──submit──▶ SUBMITTED
//! ```

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  error::require_text,
  geo::{GeoPoint, Proximity},
  patch::double_option,
};

// ─── Revisions ───────────────────────────────────────────────────────────────

/// The stored state a plan or report was read in.
///
/// Writes carry the revision they started from, and a store applies one only
/// while the row still matches it. Of two requests that read the same row,
/// only the first to write succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision<S> {
  pub status:     S,
  pub updated_at: DateTime<Utc>,
}

// ─── Plan status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStatus {
  Draft,
  Pending,
  Approved,
  Rejected,
}

impl PlanStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PlanStatus::Draft => "DRAFT",
      PlanStatus::Pending => "PENDING",
      PlanStatus::Approved => "APPROVED",
      PlanStatus::Rejected => "REJECTED",
    }
  }

  fn label(self) -> &'static str {
    match self {
      PlanStatus::Draft => "draft",
      PlanStatus::Pending => "pending",
      PlanStatus::Approved => "approved",
      PlanStatus::Rejected => "rejected",
    }
  }
}

impl fmt::Display for PlanStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PlanStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "DRAFT" => Ok(PlanStatus::Draft),
      "PENDING" => Ok(PlanStatus::Pending),
      "APPROVED" => Ok(PlanStatus::Approved),
      "REJECTED" => Ok(PlanStatus::Rejected),
      other => Err(Error::UnknownVariant { kind: "plan status", value: other.to_owned() }),
    }
  }
}

// ─── Pre-call plan ───────────────────────────────────────────────────────────

const PLAN: &str = "pre-call plan";

/// A scheduled intention to visit a customer, subject to manager approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCallPlan {
  pub plan_id:        Uuid,
  pub company_id:     Uuid,
  /// The sales rep who owns the plan.
  pub sr_id:          Uuid,
  pub customer_id:    Uuid,
  pub scheduled_at:   DateTime<Utc>,
  pub objectives:     String,
  pub notes:          Option<String>,
  pub status:         PlanStatus,
  pub submitted_at:   Option<DateTime<Utc>>,
  pub reviewer_id:    Option<Uuid>,
  pub reviewed_at:    Option<DateTime<Utc>>,
  pub review_comment: Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
  pub customer_id:  Uuid,
  pub scheduled_at: DateTime<Utc>,
  pub objectives:   String,
  pub notes:        Option<String>,
}

impl NewPlan {
  pub fn validate(&self) -> Result<()> { require_text("objectives", &self.objectives, 4000) }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanPatch {
  pub customer_id:  Option<Uuid>,
  pub scheduled_at: Option<DateTime<Utc>>,
  pub objectives:   Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub notes:        Option<Option<String>>,
}

/// A manager's verdict on a pending plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
  Approve,
  Reject,
}

impl PreCallPlan {
  pub fn revision(&self) -> Revision<PlanStatus> {
    Revision { status: self.status, updated_at: self.updated_at }
  }

  fn transition_error(&self, action: &'static str) -> Error {
    Error::InvalidTransition { entity: PLAN, from: self.status.label(), action }
  }

  pub fn is_editable(&self) -> bool {
    matches!(self.status, PlanStatus::Draft | PlanStatus::Rejected)
  }

  /// Edit a draft or rejected plan. Editing a rejected plan returns it to
  /// draft and clears the previous review.
  pub fn apply(&mut self, patch: PlanPatch, now: DateTime<Utc>) -> Result<()> {
    if !self.is_editable() {
      return Err(self.transition_error("edit"));
    }
    if let Some(objectives) = patch.objectives {
      require_text("objectives", &objectives, 4000)?;
      self.objectives = objectives;
    }
    if let Some(customer_id) = patch.customer_id {
      self.customer_id = customer_id;
    }
    if let Some(at) = patch.scheduled_at {
      self.scheduled_at = at;
    }
    crate::patch::apply(&mut self.notes, patch.notes);

    if self.status == PlanStatus::Rejected {
      self.status = PlanStatus::Draft;
      self.submitted_at = None;
      self.reviewer_id = None;
      self.reviewed_at = None;
      self.review_comment = None;
    }
    self.updated_at = now;
    Ok(())
  }

  pub fn submit(&mut self, now: DateTime<Utc>) -> Result<()> {
    if self.status != PlanStatus::Draft {
      return Err(self.transition_error("submit"));
    }
    self.status = PlanStatus::Pending;
    self.submitted_at = Some(now);
    self.updated_at = now;
    Ok(())
  }

  /// Record a review. Rejections must carry a comment.
  pub fn review(
    &mut self,
    reviewer_id: Uuid,
    decision: ReviewDecision,
    comment: Option<String>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let action = match decision {
      ReviewDecision::Approve => "approve",
      ReviewDecision::Reject => "reject",
    };
    if self.status != PlanStatus::Pending {
      return Err(self.transition_error(action));
    }
    if reviewer_id == self.sr_id {
      return Err(Error::invalid("reviewer_id", "a plan cannot be reviewed by its owner"));
    }
    let comment = comment.filter(|c| !c.trim().is_empty());
    if decision == ReviewDecision::Reject && comment.is_none() {
      return Err(Error::invalid("comment", "a rejection needs a reason"));
    }

    self.status = match decision {
      ReviewDecision::Approve => PlanStatus::Approved,
      ReviewDecision::Reject => PlanStatus::Rejected,
    };
    self.reviewer_id = Some(reviewer_id);
    self.reviewed_at = Some(now);
    self.review_comment = comment;
    self.updated_at = now;
    Ok(())
  }

  pub fn ensure_deletable(&self) -> Result<()> {
    if self.status == PlanStatus::Draft {
      Ok(())
    } else {
      Err(self.transition_error("delete"))
    }
  }
}

// ─── Report status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
  Draft,
  Submitted,
}

impl ReportStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      ReportStatus::Draft => "DRAFT",
      ReportStatus::Submitted => "SUBMITTED",
    }
  }
}

impl fmt::Display for ReportStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ReportStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "DRAFT" => Ok(ReportStatus::Draft),
      "SUBMITTED" => Ok(ReportStatus::Submitted),
      other => Err(Error::UnknownVariant { kind: "report status", value: other.to_owned() }),
    }
  }
}

// ─── Call report ─────────────────────────────────────────────────────────────

const REPORT: &str = "call report";

/// A timestamped GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsStamp {
  pub at:    DateTime<Utc>,
  pub point: GeoPoint,
}

/// The logged record of an actual customer visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReport {
  pub report_id:    Uuid,
  pub company_id:   Uuid,
  pub sr_id:        Uuid,
  pub customer_id:  Uuid,
  /// Must reference an approved plan of the same rep and customer.
  pub plan_id:      Option<Uuid>,
  pub summary:      String,
  pub outcome:      Option<String>,
  pub next_steps:   Option<String>,
  pub check_in:     Option<GpsStamp>,
  pub check_out:    Option<GpsStamp>,
  pub status:       ReportStatus,
  pub submitted_at: Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
  pub customer_id: Uuid,
  pub plan_id:     Option<Uuid>,
  #[serde(default)]
  pub summary:     String,
  pub outcome:     Option<String>,
  pub next_steps:  Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPatch {
  pub summary:    Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub outcome:    Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub next_steps: Option<Option<String>>,
}

impl CallReport {
  pub fn revision(&self) -> Revision<ReportStatus> {
    Revision { status: self.status, updated_at: self.updated_at }
  }

  fn ensure_draft(&self, action: &'static str) -> Result<()> {
    if self.status == ReportStatus::Draft {
      Ok(())
    } else {
      Err(Error::InvalidTransition { entity: REPORT, from: "submitted", action })
    }
  }

  pub fn apply(&mut self, patch: ReportPatch, now: DateTime<Utc>) -> Result<()> {
    self.ensure_draft("edit")?;
    if let Some(summary) = patch.summary {
      self.summary = summary;
    }
    crate::patch::apply(&mut self.outcome, patch.outcome);
    crate::patch::apply(&mut self.next_steps, patch.next_steps);
    self.updated_at = now;
    Ok(())
  }

  /// Record arrival. When the customer has a location the position must be
  /// within `radius_m` of it; the measured proximity is returned.
  pub fn check_in(
    &mut self,
    point: GeoPoint,
    customer_location: Option<GeoPoint>,
    radius_m: f64,
    now: DateTime<Utc>,
  ) -> Result<Option<Proximity>> {
    self.ensure_draft("check in")?;
    point.validate()?;
    if self.check_in.is_some() {
      return Err(Error::InvalidTransition { entity: REPORT, from: "checked-in", action: "check in" });
    }

    let proximity = customer_location.map(|loc| Proximity::measure(point, loc, radius_m));
    if let Some(p) = proximity
      && !p.within_radius
    {
      return Err(Error::OutsideRadius { distance_m: p.distance_m, radius_m: p.radius_m });
    }

    self.check_in = Some(GpsStamp { at: now, point });
    self.updated_at = now;
    Ok(proximity)
  }

  pub fn check_out(&mut self, point: GeoPoint, now: DateTime<Utc>) -> Result<()> {
    self.ensure_draft("check out")?;
    point.validate()?;
    let Some(check_in) = self.check_in else {
      return Err(Error::invalid("check_in", "check in before checking out"));
    };
    if self.check_out.is_some() {
      return Err(Error::InvalidTransition {
        entity: REPORT,
        from:   "checked-out",
        action: "check out",
      });
    }
    if now < check_in.at {
      return Err(Error::invalid("check_out", "check-out cannot precede check-in"));
    }
    self.check_out = Some(GpsStamp { at: now, point });
    self.updated_at = now;
    Ok(())
  }

  pub fn submit(&mut self, now: DateTime<Utc>) -> Result<()> {
    self.ensure_draft("submit")?;
    if self.check_in.is_none() || self.check_out.is_none() {
      return Err(Error::invalid("check_out", "check in and out before submitting"));
    }
    require_text("summary", &self.summary, 8000)?;
    self.status = ReportStatus::Submitted;
    self.submitted_at = Some(now);
    self.updated_at = now;
    Ok(())
  }

  pub fn ensure_deletable(&self) -> Result<()> { self.ensure_draft("delete") }

  pub fn ensure_photo_editable(&self) -> Result<()> { self.ensure_draft("attach photos to") }

  /// Minutes between check-in and check-out, when both are recorded.
  pub fn visit_minutes(&self) -> Option<f64> {
    let (start, end) = (self.check_in?, self.check_out?);
    Some((end.at - start.at).num_seconds() as f64 / 60.0)
  }
}

// ─── Photo ───────────────────────────────────────────────────────────────────

/// A visit photo stored on disk; no binary data lives in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
  pub photo_id:     Uuid,
  pub report_id:    Uuid,
  pub company_id:   Uuid,
  /// Path relative to the configured `photo_dir`.
  pub path:         String,
  /// SHA-256 hex digest of the bytes.
  pub content_hash: String,
  pub media_type:   String,
  pub size_bytes:   u64,
  pub uploaded_by:  Uuid,
  pub uploaded_at:  DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn plan(status: PlanStatus) -> PreCallPlan {
    let now = Utc::now();
    PreCallPlan {
      plan_id: Uuid::new_v4(),
      company_id: Uuid::new_v4(),
      sr_id: Uuid::new_v4(),
      customer_id: Uuid::new_v4(),
      scheduled_at: now,
      objectives: "Introduce new SKU".into(),
      notes: None,
      status,
      submitted_at: None,
      reviewer_id: None,
      reviewed_at: None,
      review_comment: None,
      created_at: now,
      updated_at: now,
    }
  }

  fn report() -> CallReport {
    let now = Utc::now();
    CallReport {
      report_id: Uuid::new_v4(),
      company_id: Uuid::new_v4(),
      sr_id: Uuid::new_v4(),
      customer_id: Uuid::new_v4(),
      plan_id: None,
      summary: String::new(),
      outcome: None,
      next_steps: None,
      check_in: None,
      check_out: None,
      status: ReportStatus::Draft,
      submitted_at: None,
      created_at: now,
      updated_at: now,
    }
  }

  const SHOP: GeoPoint = GeoPoint { lat: 13.7563, lng: 100.5018 };

  #[test]
  fn plan_happy_path() {
    let mut p = plan(PlanStatus::Draft);
    let now = Utc::now();
    p.submit(now).unwrap();
    assert_eq!(p.status, PlanStatus::Pending);
    assert_eq!(p.submitted_at, Some(now));

    let manager = Uuid::new_v4();
    p.review(manager, ReviewDecision::Approve, None, now).unwrap();
    assert_eq!(p.status, PlanStatus::Approved);
    assert_eq!(p.reviewer_id, Some(manager));
  }

  #[test]
  fn pending_and_approved_plans_are_frozen() {
    for status in [PlanStatus::Pending, PlanStatus::Approved] {
      let mut p = plan(status);
      let err = p.apply(PlanPatch::default(), Utc::now()).unwrap_err();
      assert!(matches!(err, Error::InvalidTransition { action: "edit", .. }));
      assert!(p.ensure_deletable().is_err());
    }
  }

  #[test]
  fn editing_a_rejected_plan_returns_it_to_draft() {
    let mut p = plan(PlanStatus::Pending);
    let now = Utc::now();
    p.review(Uuid::new_v4(), ReviewDecision::Reject, Some("Wrong customer".into()), now)
      .unwrap();
    assert_eq!(p.status, PlanStatus::Rejected);

    let patch = PlanPatch { objectives: Some("Follow up on order".into()), ..Default::default() };
    p.apply(patch, now).unwrap();
    assert_eq!(p.status, PlanStatus::Draft);
    assert!(p.review_comment.is_none());
    assert!(p.reviewer_id.is_none());
  }

  #[test]
  fn rejection_requires_comment_and_owner_cannot_review() {
    let mut p = plan(PlanStatus::Pending);
    let now = Utc::now();
    assert!(p.review(Uuid::new_v4(), ReviewDecision::Reject, Some("  ".into()), now).is_err());
    let owner = p.sr_id;
    assert!(p.review(owner, ReviewDecision::Approve, None, now).is_err());
    assert_eq!(p.status, PlanStatus::Pending);
  }

  #[test]
  fn submit_twice_fails() {
    let mut p = plan(PlanStatus::Draft);
    p.submit(Utc::now()).unwrap();
    let err = p.submit(Utc::now()).unwrap_err();
    assert_eq!(err.to_string(), "cannot submit a pending pre-call plan");
  }

  #[test]
  fn report_lifecycle() {
    let mut r = report();
    let t0 = Utc::now();
    let prox = r
      .check_in(GeoPoint { lat: 13.7564, lng: 100.5018 }, Some(SHOP), 200.0, t0)
      .unwrap()
      .unwrap();
    assert!(prox.within_radius);

    assert!(r.submit(t0).is_err(), "cannot submit before check-out");
    r.check_out(SHOP, t0 + Duration::minutes(45)).unwrap();
    assert!(r.submit(t0).is_err(), "summary is required");

    r.apply(ReportPatch { summary: Some("Took an order".into()), ..Default::default() }, t0)
      .unwrap();
    r.submit(t0 + Duration::minutes(46)).unwrap();
    assert_eq!(r.status, ReportStatus::Submitted);
    assert_eq!(r.visit_minutes(), Some(45.0));

    assert!(r.apply(ReportPatch::default(), t0).is_err());
    assert!(r.ensure_deletable().is_err());
  }

  #[test]
  fn check_in_outside_radius_is_rejected() {
    let mut r = report();
    let far = GeoPoint { lat: 13.7663, lng: 100.5018 };
    let err = r.check_in(far, Some(SHOP), 200.0, Utc::now()).unwrap_err();
    match err {
      Error::OutsideRadius { distance_m, radius_m } => {
        assert!(distance_m > 1_000.0);
        assert_eq!(radius_m, 200.0);
      }
      other => panic!("unexpected error: {other}"),
    }
    assert!(r.check_in.is_none());
  }

  #[test]
  fn check_in_without_customer_location_is_unconstrained() {
    let mut r = report();
    let prox = r.check_in(SHOP, None, 200.0, Utc::now()).unwrap();
    assert!(prox.is_none());
    assert!(r.check_in(SHOP, None, 200.0, Utc::now()).is_err());
  }

  #[test]
  fn check_out_requires_check_in_and_ordering() {
    let mut r = report();
    let t0 = Utc::now();
    assert!(r.check_out(SHOP, t0).is_err());
    r.check_in(SHOP, None, 200.0, t0).unwrap();
    assert!(r.check_out(SHOP, t0 - Duration::minutes(1)).is_err());
    r.check_out(SHOP, t0).unwrap();
    assert!(r.check_out(SHOP, t0).is_err());
  }
}
