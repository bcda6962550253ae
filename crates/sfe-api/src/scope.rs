//! Tenant-scoped record loaders.
//!
//! Each loader fetches a record by id and checks it belongs to the session's
//! company. Records of another company are reported as missing, never as
//! forbidden, so ids do not leak across tenants.

use sfe_core::{
  customer::{Contact, Customer},
  org::{Team, Territory, User},
  store::SalesStore,
  visit::{CallReport, Photo, PreCallPlan},
};
use uuid::Uuid;

use crate::{auth::Session, error::ApiError};

fn scoped<T>(
  record: Option<T>,
  company_id: impl Fn(&T) -> Uuid,
  session: &Session,
  entity: &str,
  id: Uuid,
) -> Result<T, ApiError> {
  record
    .filter(|r| company_id(r) == session.company_id())
    .ok_or_else(|| ApiError::not_found(entity, id))
}

pub async fn territory<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<Territory, ApiError> {
  let record = store.get_territory(id).await.map_err(ApiError::store)?;
  scoped(record, |t| t.company_id, session, "territory", id)
}

pub async fn team<S: SalesStore>(store: &S, session: &Session, id: Uuid) -> Result<Team, ApiError> {
  let record = store.get_team(id).await.map_err(ApiError::store)?;
  scoped(record, |t| t.company_id, session, "team", id)
}

pub async fn user<S: SalesStore>(store: &S, session: &Session, id: Uuid) -> Result<User, ApiError> {
  let record = store.get_user(id).await.map_err(ApiError::store)?;
  scoped(record, |u| u.company_id, session, "user", id)
}

pub async fn customer<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<Customer, ApiError> {
  let record = store.get_customer(id).await.map_err(ApiError::store)?;
  scoped(record, |c| c.company_id, session, "customer", id)
}

pub async fn contact<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<Contact, ApiError> {
  let record = store.get_contact(id).await.map_err(ApiError::store)?;
  scoped(record, |c| c.company_id, session, "contact", id)
}

/// Sales reps only see their own plans.
pub async fn plan<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<PreCallPlan, ApiError> {
  let record = store.get_plan(id).await.map_err(ApiError::store)?;
  let plan = scoped(record, |p| p.company_id, session, "plan", id)?;
  if !session.is_manager() && plan.sr_id != session.user_id() {
    return Err(ApiError::not_found("plan", id));
  }
  Ok(plan)
}

/// Sales reps only see their own reports.
pub async fn report<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<CallReport, ApiError> {
  let record = store.get_report(id).await.map_err(ApiError::store)?;
  let report = scoped(record, |r| r.company_id, session, "report", id)?;
  if !session.is_manager() && report.sr_id != session.user_id() {
    return Err(ApiError::not_found("report", id));
  }
  Ok(report)
}

/// A photo is visible to whoever can see its report.
pub async fn photo<S: SalesStore>(
  store: &S,
  session: &Session,
  id: Uuid,
) -> Result<(Photo, CallReport), ApiError> {
  let record = store.get_photo(id).await.map_err(ApiError::store)?;
  let photo = scoped(record, |p| p.company_id, session, "photo", id)?;
  let report = match report(store, session, photo.report_id).await {
    Err(ApiError::NotFound(_)) => return Err(ApiError::not_found("photo", id)),
    other => other?,
  };
  Ok((photo, report))
}

/// Turn a missing referenced record into a validation error on `field`.
pub fn as_reference<T>(result: Result<T, ApiError>, field: &str) -> Result<T, ApiError> {
  match result {
    Err(ApiError::NotFound(message)) => Err(ApiError::Unprocessable(format!("{field}: {message}"))),
    other => other,
  }
}

/// Validate optional territory and team references of a create or update
/// body against the session's company.
pub async fn check_refs<S: SalesStore>(
  store: &S,
  session: &Session,
  territory_id: Option<Uuid>,
  team_id: Option<Uuid>,
) -> Result<(), ApiError> {
  if let Some(id) = territory_id {
    as_reference(territory(store, session, id).await, "territory_id")?;
  }
  if let Some(id) = team_id {
    as_reference(team(store, session, id).await, "team_id")?;
  }
  Ok(())
}
