//! Handlers for `/reports` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/reports` | Optional `?sr_id`, `status`, `customer_id`, `plan_id`, `from`, `to`; reps only see their own |
//! | `POST`   | `/reports` | Body: [`NewReport`]; a linked plan must be approved, same rep and customer |
//! | `GET`    | `/reports/{id}` | |
//! | `PATCH`  | `/reports/{id}` | Owner only; drafts only |
//! | `DELETE` | `/reports/{id}` | Owner only; drafts only; removes photo files no other report shares |
//! | `POST`   | `/reports/{id}/check-in` | Body: `{lat, lng}`; 422 outside the check-in radius |
//! | `POST`   | `/reports/{id}/check-out` | Body: `{lat, lng}` |
//! | `POST`   | `/reports/{id}/submit` | Notifies the owner's manager |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfe_core::{
  Error as CoreError,
  geo::{GeoPoint, Proximity},
  notification::{NewNotification, NotificationKind},
  store::{ReportQuery, SalesStore},
  visit::{CallReport, NewReport, PlanStatus, ReportPatch, ReportStatus},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, notifications, photos, scope};

fn ensure_owner(session: &Session, report: &CallReport) -> Result<(), ApiError> {
  if report.sr_id == session.user_id() {
    Ok(())
  } else {
    Err(ApiError::Forbidden("only the report's owner may change it".into()))
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub sr_id:       Option<Uuid>,
  pub status:      Option<ReportStatus>,
  pub customer_id: Option<Uuid>,
  pub plan_id:     Option<Uuid>,
  /// Inclusive lower bound on `created_at`.
  pub from:        Option<DateTime<Utc>>,
  /// Exclusive upper bound on `created_at`.
  pub to:          Option<DateTime<Utc>>,
}

/// `GET /reports`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CallReport>>, ApiError>
where
  S: SalesStore + 'static,
{
  let sr_id = if session.is_manager() { params.sr_id } else { Some(session.user_id()) };
  let query = ReportQuery {
    sr_id,
    customer_id: params.customer_id,
    plan_id: params.plan_id,
    status: params.status,
    created_after: params.from,
    created_before: params.to,
    ..ReportQuery::company(session.company_id())
  };
  let reports = state.store.list_reports(&query).await.map_err(ApiError::store)?;
  Ok(Json(reports))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /reports`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewReport>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  scope::as_reference(scope::customer(store, &session, body.customer_id).await, "customer_id")?;

  if let Some(plan_id) = body.plan_id {
    let plan = scope::as_reference(scope::plan(store, &session, plan_id).await, "plan_id")?;
    if plan.status != PlanStatus::Approved {
      return Err(ApiError::Unprocessable(format!(
        "plan_id: plan {plan_id} is {}, not APPROVED",
        plan.status
      )));
    }
    if plan.sr_id != session.user_id() {
      return Err(ApiError::Unprocessable(format!("plan_id: plan {plan_id} belongs to another rep")));
    }
    if plan.customer_id != body.customer_id {
      return Err(ApiError::Unprocessable(format!(
        "plan_id: plan {plan_id} is for a different customer"
      )));
    }
  }

  let report = store
    .add_report(session.company_id(), session.user_id(), body)
    .await
    .map_err(ApiError::store)?;

  info!(
    report_id = %report.report_id,
    sr_id = %report.sr_id,
    customer_id = %report.customer_id,
    "call report created"
  );
  Ok((StatusCode::CREATED, Json(report)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /reports/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<CallReport>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::report(state.store.as_ref(), &session, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /reports/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<ReportPatch>,
) -> Result<Json<CallReport>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut report = scope::report(store, &session, id).await?;
  ensure_owner(&session, &report)?;

  let loaded = report.revision();
  report.apply(patch, Utc::now())?;
  store.update_report(&report, loaded).await.map_err(ApiError::store)?;
  Ok(Json(report))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /reports/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let report = scope::report(store, &session, id).await?;
  ensure_owner(&session, &report)?;
  report.ensure_deletable()?;

  let attached = store.list_photos(id).await.map_err(ApiError::store)?;
  if !store.delete_report(id).await.map_err(ApiError::store)? {
    return Err(ApiError::Conflict(format!("report {id} was changed by another request")));
  }
  for photo in &attached {
    photos::release_file(store, &state.config.photo_dir, photo).await;
  }

  info!(report_id = %id, photos = attached.len(), "call report deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Check-in / check-out ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PositionBody {
  pub lat: f64,
  pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
  pub report:    CallReport,
  /// Absent when the customer has no recorded location.
  pub proximity: Option<Proximity>,
}

/// `POST /reports/{id}/check-in`
pub async fn check_in<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<PositionBody>,
) -> Result<Json<CheckInResponse>, ApiError>
where
  S: SalesStore + 'static,
{
  let point = GeoPoint::new(body.lat, body.lng)?;
  let store = state.store.as_ref();
  let mut report = scope::report(store, &session, id).await?;
  ensure_owner(&session, &report)?;
  let customer = scope::customer(store, &session, report.customer_id).await?;

  let radius_m = state.config.checkin_radius_m;
  let loaded = report.revision();
  let proximity = match report.check_in(point, customer.location, radius_m, Utc::now()) {
    Ok(proximity) => proximity,
    Err(e) => {
      if let CoreError::OutsideRadius { distance_m, .. } = &e {
        warn!(
          report_id = %id,
          sr_id = %report.sr_id,
          customer_id = %customer.customer_id,
          distance_m = *distance_m,
          radius_m,
          "check-in rejected outside radius"
        );
      }
      return Err(e.into());
    }
  };
  store.update_report(&report, loaded).await.map_err(ApiError::store)?;

  info!(
    report_id = %id,
    distance_m = proximity.map(|p| p.distance_m),
    "checked in"
  );
  Ok(Json(CheckInResponse { report, proximity }))
}

/// `POST /reports/{id}/check-out`
pub async fn check_out<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<PositionBody>,
) -> Result<Json<CallReport>, ApiError>
where
  S: SalesStore + 'static,
{
  let point = GeoPoint::new(body.lat, body.lng)?;
  let store = state.store.as_ref();
  let mut report = scope::report(store, &session, id).await?;
  ensure_owner(&session, &report)?;

  let loaded = report.revision();
  report.check_out(point, Utc::now())?;
  store.update_report(&report, loaded).await.map_err(ApiError::store)?;

  info!(report_id = %id, minutes = report.visit_minutes(), "checked out");
  Ok(Json(report))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /reports/{id}/submit`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<CallReport>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut report = scope::report(store, &session, id).await?;
  ensure_owner(&session, &report)?;

  let loaded = report.revision();
  report.submit(Utc::now())?;
  store.update_report(&report, loaded).await.map_err(ApiError::store)?;
  info!(report_id = %id, sr_id = %report.sr_id, "call report submitted");

  let owner = &session.user;
  let customer_name = store
    .get_customer(report.customer_id)
    .await
    .map_err(ApiError::store)?
    .map(|c| c.name)
    .unwrap_or_else(|| "a customer".to_owned());
  notifications::notify_manager(store, owner, |manager_id| NewNotification {
    user_id:    manager_id,
    kind:       NotificationKind::ReportSubmitted,
    title:      "Call report submitted".into(),
    body:       format!("{} submitted a call report for {customer_name}.", owner.full_name),
    subject_id: Some(report.report_id),
  })
  .await;

  Ok(Json(report))
}
