//! Per-user notification feed and delivery preferences.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  PlanSubmitted,
  PlanApproved,
  PlanRejected,
  ReportSubmitted,
  System,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      NotificationKind::PlanSubmitted => "plan_submitted",
      NotificationKind::PlanApproved => "plan_approved",
      NotificationKind::PlanRejected => "plan_rejected",
      NotificationKind::ReportSubmitted => "report_submitted",
      NotificationKind::System => "system",
    }
  }
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for NotificationKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "plan_submitted" => Ok(NotificationKind::PlanSubmitted),
      "plan_approved" => Ok(NotificationKind::PlanApproved),
      "plan_rejected" => Ok(NotificationKind::PlanRejected),
      "report_submitted" => Ok(NotificationKind::ReportSubmitted),
      "system" => Ok(NotificationKind::System),
      other => Err(Error::UnknownVariant { kind: "notification kind", value: other.to_owned() }),
    }
  }
}

/// One entry in a user's feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  /// The owning user; nobody else can read or change it.
  pub user_id:         Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub body:            String,
  /// The plan or report this notification is about.
  pub subject_id:      Option<Uuid>,
  pub is_read:         bool,
  pub read_at:         Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
  pub user_id:    Uuid,
  pub kind:       NotificationKind,
  pub title:      String,
  pub body:       String,
  pub subject_id: Option<Uuid>,
}

/// Boolean delivery toggles. A row is created with [`Default`] values the
/// first time a user's preferences are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
  pub user_id:          Uuid,
  /// Managers: a rep submitted a plan for review.
  pub plan_submitted:   bool,
  /// Reps: one of their plans was approved or rejected.
  pub plan_reviewed:    bool,
  /// Managers: a rep submitted a call report.
  pub report_submitted: bool,
  /// Stored for clients; no mail is sent by this service.
  pub email_digest:     bool,
  pub updated_at:       DateTime<Utc>,
}

impl NotificationPreferences {
  pub fn defaults_for(user_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      user_id,
      plan_submitted: true,
      plan_reviewed: true,
      report_submitted: true,
      email_digest: true,
      updated_at: now,
    }
  }

  /// Whether a notification of `kind` should be delivered.
  pub fn allows(&self, kind: NotificationKind) -> bool {
    match kind {
      NotificationKind::PlanSubmitted => self.plan_submitted,
      NotificationKind::PlanApproved | NotificationKind::PlanRejected => self.plan_reviewed,
      NotificationKind::ReportSubmitted => self.report_submitted,
      NotificationKind::System => true,
    }
  }

  pub fn apply(&mut self, patch: PreferencesPatch, now: DateTime<Utc>) {
    if let Some(v) = patch.plan_submitted {
      self.plan_submitted = v;
    }
    if let Some(v) = patch.plan_reviewed {
      self.plan_reviewed = v;
    }
    if let Some(v) = patch.report_submitted {
      self.report_submitted = v;
    }
    if let Some(v) = patch.email_digest {
      self.email_digest = v;
    }
    self.updated_at = now;
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesPatch {
  pub plan_submitted:   Option<bool>,
  pub plan_reviewed:    Option<bool>,
  pub report_submitted: Option<bool>,
  pub email_digest:     Option<bool>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toggles_gate_kinds() {
    let mut prefs = NotificationPreferences::defaults_for(Uuid::new_v4(), Utc::now());
    assert!(prefs.allows(NotificationKind::PlanRejected));

    prefs.apply(
      PreferencesPatch { plan_reviewed: Some(false), ..Default::default() },
      Utc::now(),
    );
    assert!(!prefs.allows(NotificationKind::PlanApproved));
    assert!(!prefs.allows(NotificationKind::PlanRejected));
    assert!(prefs.allows(NotificationKind::PlanSubmitted));
    assert!(prefs.allows(NotificationKind::System));
  }

  #[test]
  fn kind_names_round_trip() {
    for kind in [
      NotificationKind::PlanSubmitted,
      NotificationKind::PlanApproved,
      NotificationKind::PlanRejected,
      NotificationKind::ReportSubmitted,
      NotificationKind::System,
    ] {
      assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
      assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{kind}\""));
    }
  }
}
