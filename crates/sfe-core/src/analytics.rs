//! Dashboard aggregation.
//!
//! Everything here is a pure function over records the caller has already
//! loaded and scoped (company, date range, territory or team). The output
//! shapes map one-to-one onto the chart types the dashboard draws: a pie for
//! the customer mix, a funnel for plan progress and a radar per rep.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  customer::{AbcClass, Customer},
  org::{Role, User},
  visit::{CallReport, PlanStatus, PreCallPlan, ReportStatus},
};

// ─── Range ───────────────────────────────────────────────────────────────────

/// Half-open `[from, to)` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub from: DateTime<Utc>,
  pub to:   DateTime<Utc>,
}

impl DateRange {
  pub const DEFAULT_DAYS: i64 = 30;

  pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
    if from >= to {
      return Err(Error::invalid("from", "must be earlier than `to`"));
    }
    Ok(Self { from, to })
  }

  /// The `days` days ending at `now`.
  pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
    Self { from: now - Duration::days(days), to: now }
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool { self.from <= at && at < self.to }
}

// ─── Chart payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
  pub label: String,
  pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStageKind {
  Planned,
  Submitted,
  Approved,
  Visited,
  Reported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
  pub stage:      FunnelStageKind,
  pub count:      u64,
  /// `count` as a fraction of the previous stage; `None` for the first stage
  /// or when the previous stage is empty.
  pub conversion: Option<f64>,
}

/// Raw per-rep numbers behind the radar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepPerformance {
  pub user_id:           Uuid,
  pub full_name:         String,
  pub plans:             u64,
  pub approved_plans:    u64,
  /// Approved over reviewed (approved + rejected); `0.0` when none reviewed.
  pub approval_rate:     f64,
  /// Reports with a check-in.
  pub visits:            u64,
  pub submitted_reports: u64,
  pub unique_customers:  u64,
  pub avg_visit_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
  pub axis:  String,
  /// Normalised to 0–100.
  pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarSeries {
  pub user_id: Uuid,
  pub label:   String,
  pub axes:    Vec<RadarAxis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
  pub customers: u64,
  pub plans:     u64,
  pub reports:   u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
  pub range:           DateRange,
  pub totals:          Totals,
  pub customer_mix:    Vec<PieSlice>,
  pub plan_funnel:     Vec<FunnelStage>,
  pub rep_performance: Vec<RepPerformance>,
  pub rep_radar:       Vec<RadarSeries>,
}

impl Dashboard {
  pub fn build(
    range: DateRange,
    customers: &[Customer],
    users: &[User],
    plans: &[PreCallPlan],
    reports: &[CallReport],
  ) -> Self {
    let rep_performance = rep_performance(users, plans, reports);
    let rep_radar = rep_radar(&rep_performance);
    Self {
      range,
      totals: Totals {
        customers: customers.len() as u64,
        plans:     plans.len() as u64,
        reports:   reports.len() as u64,
      },
      customer_mix: customer_mix(customers),
      plan_funnel: plan_funnel(plans, reports),
      rep_performance,
      rep_radar,
    }
  }
}

// ─── Aggregations ────────────────────────────────────────────────────────────

/// Customer counts per ABC class, always `A`, `B`, `C` in that order.
pub fn customer_mix(customers: &[Customer]) -> Vec<PieSlice> {
  AbcClass::ALL
    .into_iter()
    .map(|class| PieSlice {
      label: class.as_str().to_owned(),
      value: customers.iter().filter(|c| c.class == class).count() as u64,
    })
    .collect()
}

/// Planned → Submitted → Approved → Visited → Reported.
///
/// Visited and Reported count approved plans whose linked report has a
/// check-in or has been submitted, so the funnel never widens.
pub fn plan_funnel(plans: &[PreCallPlan], reports: &[CallReport]) -> Vec<FunnelStage> {
  let visited_plans: HashSet<Uuid> = reports
    .iter()
    .filter(|r| r.check_in.is_some())
    .filter_map(|r| r.plan_id)
    .collect();
  let reported_plans: HashSet<Uuid> = reports
    .iter()
    .filter(|r| r.status == ReportStatus::Submitted)
    .filter_map(|r| r.plan_id)
    .collect();

  let approved: Vec<&PreCallPlan> =
    plans.iter().filter(|p| p.status == PlanStatus::Approved).collect();

  let counts = [
    (FunnelStageKind::Planned, plans.len()),
    (
      FunnelStageKind::Submitted,
      plans.iter().filter(|p| p.status != PlanStatus::Draft).count(),
    ),
    (FunnelStageKind::Approved, approved.len()),
    (
      FunnelStageKind::Visited,
      approved.iter().filter(|p| visited_plans.contains(&p.plan_id)).count(),
    ),
    (
      FunnelStageKind::Reported,
      approved.iter().filter(|p| reported_plans.contains(&p.plan_id)).count(),
    ),
  ];

  let mut previous: Option<usize> = None;
  counts
    .into_iter()
    .map(|(stage, count)| {
      let conversion = previous.filter(|&p| p > 0).map(|p| count as f64 / p as f64);
      previous = Some(count);
      FunnelStage { stage, count: count as u64, conversion }
    })
    .collect()
}

/// One row per sales rep in `users`, sorted by name.
pub fn rep_performance(
  users: &[User],
  plans: &[PreCallPlan],
  reports: &[CallReport],
) -> Vec<RepPerformance> {
  let mut plans_by_rep: HashMap<Uuid, Vec<&PreCallPlan>> = HashMap::new();
  for plan in plans {
    plans_by_rep.entry(plan.sr_id).or_default().push(plan);
  }
  let mut reports_by_rep: HashMap<Uuid, Vec<&CallReport>> = HashMap::new();
  for report in reports {
    reports_by_rep.entry(report.sr_id).or_default().push(report);
  }

  let mut rows: Vec<RepPerformance> = users
    .iter()
    .filter(|u| u.role == Role::Sr)
    .map(|rep| {
      let rep_plans = plans_by_rep.get(&rep.user_id).map(Vec::as_slice).unwrap_or_default();
      let rep_reports = reports_by_rep.get(&rep.user_id).map(Vec::as_slice).unwrap_or_default();

      let approved = rep_plans.iter().filter(|p| p.status == PlanStatus::Approved).count();
      let rejected = rep_plans.iter().filter(|p| p.status == PlanStatus::Rejected).count();
      let reviewed = approved + rejected;

      let visits: Vec<&&CallReport> =
        rep_reports.iter().filter(|r| r.check_in.is_some()).collect();
      let unique_customers: HashSet<Uuid> = visits.iter().map(|r| r.customer_id).collect();
      let durations: Vec<f64> = rep_reports.iter().filter_map(|r| r.visit_minutes()).collect();

      RepPerformance {
        user_id:           rep.user_id,
        full_name:         rep.full_name.clone(),
        plans:             rep_plans.len() as u64,
        approved_plans:    approved as u64,
        approval_rate:     if reviewed == 0 { 0.0 } else { approved as f64 / reviewed as f64 },
        visits:            visits.len() as u64,
        submitted_reports: rep_reports
          .iter()
          .filter(|r| r.status == ReportStatus::Submitted)
          .count() as u64,
        unique_customers:  unique_customers.len() as u64,
        avg_visit_minutes: mean(&durations),
      }
    })
    .collect();

  rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));
  rows
}

/// Radar series normalised per axis: counts against the best rep in the set,
/// rates as percentages.
pub fn rep_radar(rows: &[RepPerformance]) -> Vec<RadarSeries> {
  let max = |f: fn(&RepPerformance) -> f64| rows.iter().map(f).fold(0.0_f64, f64::max);
  let max_plans = max(|r| r.plans as f64);
  let max_visits = max(|r| r.visits as f64);
  let max_reports = max(|r| r.submitted_reports as f64);
  let max_customers = max(|r| r.unique_customers as f64);
  let max_minutes = max(|r| r.avg_visit_minutes.unwrap_or(0.0));

  let scale = |value: f64, max: f64| if max > 0.0 { value / max * 100.0 } else { 0.0 };

  rows
    .iter()
    .map(|r| RadarSeries {
      user_id: r.user_id,
      label:   r.full_name.clone(),
      axes:    vec![
        axis("plans", scale(r.plans as f64, max_plans)),
        axis("approval_rate", r.approval_rate * 100.0),
        axis("visits", scale(r.visits as f64, max_visits)),
        axis("reports", scale(r.submitted_reports as f64, max_reports)),
        axis("customers", scale(r.unique_customers as f64, max_customers)),
        axis("visit_minutes", scale(r.avg_visit_minutes.unwrap_or(0.0), max_minutes)),
      ],
    })
    .collect()
}

fn axis(name: &str, value: f64) -> RadarAxis { RadarAxis { axis: name.to_owned(), value } }

fn mean(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    None
  } else {
    Some(values.iter().sum::<f64>() / values.len() as f64)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    geo::GeoPoint,
    visit::GpsStamp,
  };

  fn rep(name: &str) -> User {
    let now = Utc::now();
    User {
      user_id:       Uuid::new_v4(),
      company_id:    Uuid::nil(),
      username:      name.to_lowercase(),
      email:         format!("{}@example.com", name.to_lowercase()),
      full_name:     name.into(),
      phone:         None,
      role:          Role::Sr,
      territory_id:  None,
      team_id:       None,
      manager_id:    None,
      is_active:     true,
      password_hash: String::new(),
      created_at:    now,
      updated_at:    now,
    }
  }

  fn customer(revenue: f64) -> Customer {
    let now = Utc::now();
    Customer {
      customer_id:     Uuid::new_v4(),
      company_id:      Uuid::nil(),
      territory_id:    None,
      code:            "C".into(),
      name:            "Customer".into(),
      address:         None,
      location:        None,
      monthly_revenue: revenue,
      class:           AbcClass::from_monthly_revenue(revenue),
      created_at:      now,
      updated_at:      now,
    }
  }

  fn plan(sr: &User, customer_id: Uuid, status: PlanStatus) -> PreCallPlan {
    let now = Utc::now();
    PreCallPlan {
      plan_id: Uuid::new_v4(),
      company_id: Uuid::nil(),
      sr_id: sr.user_id,
      customer_id,
      scheduled_at: now,
      objectives: "Visit".into(),
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

  fn visit(p: &PreCallPlan, minutes: i64, submitted: bool) -> CallReport {
    let start = Utc::now();
    let point = GeoPoint { lat: 13.75, lng: 100.5 };
    CallReport {
      report_id: Uuid::new_v4(),
      company_id: Uuid::nil(),
      sr_id: p.sr_id,
      customer_id: p.customer_id,
      plan_id: Some(p.plan_id),
      summary: "ok".into(),
      outcome: None,
      next_steps: None,
      check_in: Some(GpsStamp { at: start, point }),
      check_out: Some(GpsStamp { at: start + Duration::minutes(minutes), point }),
      status: if submitted { ReportStatus::Submitted } else { ReportStatus::Draft },
      submitted_at: None,
      created_at: start,
      updated_at: start,
    }
  }

  #[test]
  fn mix_has_three_ordered_slices() {
    let customers = [customer(600_000.0), customer(200_000.0), customer(300_000.0)];
    let mix = customer_mix(&customers);
    let pairs: Vec<(&str, u64)> = mix.iter().map(|s| (s.label.as_str(), s.value)).collect();
    assert_eq!(pairs, vec![("A", 1), ("B", 2), ("C", 0)]);
  }

  #[test]
  fn funnel_narrows() {
    let sr = rep("Anan");
    let c = Uuid::new_v4();
    let plans = vec![
      plan(&sr, c, PlanStatus::Draft),
      plan(&sr, c, PlanStatus::Pending),
      plan(&sr, c, PlanStatus::Rejected),
      plan(&sr, c, PlanStatus::Approved),
      plan(&sr, c, PlanStatus::Approved),
    ];
    let reports = vec![visit(&plans[3], 30, true), visit(&plans[4], 20, false)];

    let funnel = plan_funnel(&plans, &reports);
    let counts: Vec<u64> = funnel.iter().map(|s| s.count).collect();
    assert_eq!(counts, vec![5, 4, 2, 2, 1]);
    assert_eq!(funnel[0].conversion, None);
    assert_eq!(funnel[1].conversion, Some(0.8));
    assert_eq!(funnel[4].conversion, Some(0.5));
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
  }

  #[test]
  fn empty_funnel_has_no_conversions() {
    let funnel = plan_funnel(&[], &[]);
    assert_eq!(funnel.len(), 5);
    assert!(funnel.iter().all(|s| s.count == 0 && s.conversion.is_none()));
  }

  #[test]
  fn rep_rows_and_radar() {
    let anan = rep("Anan");
    let busaba = rep("Busaba");
    let mut manager = rep("Chai");
    manager.role = Role::Sm;

    let c1 = Uuid::new_v4();
    let c2 = Uuid::new_v4();
    let plans = vec![
      plan(&anan, c1, PlanStatus::Approved),
      plan(&anan, c2, PlanStatus::Approved),
      plan(&anan, c2, PlanStatus::Rejected),
      plan(&busaba, c1, PlanStatus::Pending),
    ];
    let reports = vec![visit(&plans[0], 30, true), visit(&plans[1], 60, true)];

    let rows = rep_performance(&[busaba.clone(), manager, anan.clone()], &plans, &reports);
    assert_eq!(rows.len(), 2, "managers are not reps");
    assert_eq!(rows[0].full_name, "Anan");
    assert_eq!(rows[0].plans, 3);
    assert_eq!(rows[0].approved_plans, 2);
    assert!((rows[0].approval_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(rows[0].visits, 2);
    assert_eq!(rows[0].unique_customers, 2);
    assert_eq!(rows[0].avg_visit_minutes, Some(45.0));
    assert_eq!(rows[1].visits, 0);
    assert_eq!(rows[1].avg_visit_minutes, None);

    let radar = rep_radar(&rows);
    let anan_plans = radar[0].axes.iter().find(|a| a.axis == "plans").unwrap();
    assert_eq!(anan_plans.value, 100.0);
    let busaba_visits = radar[1].axes.iter().find(|a| a.axis == "visits").unwrap();
    assert_eq!(busaba_visits.value, 0.0);
  }

  #[test]
  fn range_validation() {
    let now = Utc::now();
    assert!(DateRange::new(now, now).is_err());
    let r = DateRange::last_days(7, now);
    assert!(r.contains(now - Duration::days(1)));
    assert!(!r.contains(now));
  }
}
