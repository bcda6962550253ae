//! `GET /analytics/dashboard`
//!
//! Query: optional `from`, `to` (RFC 3339; default the last 30 days),
//! `territory_id`, `team_id`. Sales reps always get their own numbers only;
//! managers get every rep of the company, narrowed by territory or team.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sfe_core::{
  analytics::{Dashboard, DateRange},
  org::Role,
  store::{CustomerQuery, PlanQuery, ReportQuery, SalesStore, UserQuery},
};
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
  pub from:         Option<DateTime<Utc>>,
  pub to:           Option<DateTime<Utc>>,
  pub territory_id: Option<Uuid>,
  pub team_id:      Option<Uuid>,
}

fn range(params: &DashboardParams, now: DateTime<Utc>) -> Result<DateRange, ApiError> {
  let days = DateRange::DEFAULT_DAYS;
  Ok(match (params.from, params.to) {
    (None, None) => DateRange::last_days(days, now),
    (Some(from), None) => DateRange::new(from, now)?,
    (None, Some(to)) => DateRange::new(to - chrono::Duration::days(days), to)?,
    (Some(from), Some(to)) => DateRange::new(from, to)?,
  })
}

pub async fn dashboard<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<DashboardParams>,
) -> Result<Json<Dashboard>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let range = range(&params, Utc::now())?;
  let company_id = session.company_id();

  // Customers follow the territory filter, or the team's territory.
  let mut territory_id = params.territory_id;
  if let Some(team_id) = params.team_id {
    let team = scope::team(store, &session, team_id).await?;
    territory_id = territory_id.or(team.territory_id);
  }
  if let Some(id) = params.territory_id {
    scope::territory(store, &session, id).await?;
  }

  let (users, sr_ids) = if session.is_manager() {
    let query = UserQuery {
      role: Some(Role::Sr),
      team_id: params.team_id,
      territory_id: params.territory_id,
      ..UserQuery::company(company_id)
    };
    let reps = store.list_users(&query).await.map_err(ApiError::store)?;
    let narrowed = params.team_id.is_some() || params.territory_id.is_some();
    let ids = narrowed.then(|| reps.iter().map(|u| u.user_id).collect::<Vec<_>>());
    (reps, ids)
  } else {
    (vec![session.user.clone()], Some(vec![session.user_id()]))
  };

  let customers = store
    .list_customers(&CustomerQuery { territory_id, ..CustomerQuery::company(company_id) })
    .await
    .map_err(ApiError::store)?;

  let plans = store
    .list_plans(&PlanQuery {
      sr_ids: sr_ids.clone(),
      scheduled_after: Some(range.from),
      scheduled_before: Some(range.to),
      ..PlanQuery::company(company_id)
    })
    .await
    .map_err(ApiError::store)?;

  let reports = store
    .list_reports(&ReportQuery {
      sr_ids,
      created_after: Some(range.from),
      created_before: Some(range.to),
      ..ReportQuery::company(company_id)
    })
    .await
    .map_err(ApiError::store)?;

  debug!(
    user_id = %session.user_id(),
    customers = customers.len(),
    plans = plans.len(),
    reports = reports.len(),
    "dashboard built"
  );
  Ok(Json(Dashboard::build(range, &customers, &users, &plans, &reports)))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn params(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> DashboardParams {
    DashboardParams { from, to, territory_id: None, team_id: None }
  }

  #[test]
  fn defaults_to_last_thirty_days() {
    let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
    let r = range(&params(None, None), now).unwrap();
    assert_eq!(r.to, now);
    assert_eq!(r.from, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
  }

  #[test]
  fn inverted_range_is_rejected() {
    let now = Utc::now();
    let from = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let err = range(&params(Some(from), Some(to)), now).unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
  }
}
