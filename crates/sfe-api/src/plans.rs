//! Handlers for `/plans` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/plans` | Optional `?sr_id`, `status`, `customer_id`, `from`, `to`; reps only see their own |
//! | `POST`   | `/plans` | Body: [`NewPlan`]; the caller owns the plan |
//! | `GET`    | `/plans/{id}` | |
//! | `PATCH`  | `/plans/{id}` | Owner only; draft or rejected plans |
//! | `DELETE` | `/plans/{id}` | Owner only; drafts only |
//! | `POST`   | `/plans/{id}/submit` | Owner only; notifies the owner's manager |
//! | `POST`   | `/plans/{id}/review` | Body: [`ReviewBody`]; managers only; notifies the owner |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sfe_core::{
  notification::{NewNotification, NotificationKind},
  store::{PlanQuery, SalesStore},
  visit::{NewPlan, PlanPatch, PlanStatus, PreCallPlan, ReviewDecision},
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, notifications, scope};

fn ensure_owner(session: &Session, plan: &PreCallPlan) -> Result<(), ApiError> {
  if plan.sr_id == session.user_id() {
    Ok(())
  } else {
    Err(ApiError::Forbidden("only the plan's owner may change it".into()))
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub sr_id:       Option<Uuid>,
  pub status:      Option<PlanStatus>,
  pub customer_id: Option<Uuid>,
  /// Inclusive lower bound on `scheduled_at`.
  pub from:        Option<DateTime<Utc>>,
  /// Exclusive upper bound on `scheduled_at`.
  pub to:          Option<DateTime<Utc>>,
}

/// `GET /plans`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PreCallPlan>>, ApiError>
where
  S: SalesStore + 'static,
{
  let sr_id = if session.is_manager() { params.sr_id } else { Some(session.user_id()) };
  let query = PlanQuery {
    sr_id,
    customer_id: params.customer_id,
    status: params.status,
    scheduled_after: params.from,
    scheduled_before: params.to,
    ..PlanQuery::company(session.company_id())
  };
  let plans = state.store.list_plans(&query).await.map_err(ApiError::store)?;
  Ok(Json(plans))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /plans`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewPlan>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  body.validate()?;
  let store = state.store.as_ref();
  scope::as_reference(scope::customer(store, &session, body.customer_id).await, "customer_id")?;

  let plan = store
    .add_plan(session.company_id(), session.user_id(), body)
    .await
    .map_err(ApiError::store)?;

  info!(plan_id = %plan.plan_id, sr_id = %plan.sr_id, customer_id = %plan.customer_id, "plan created");
  Ok((StatusCode::CREATED, Json(plan)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /plans/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<PreCallPlan>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::plan(state.store.as_ref(), &session, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /plans/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<PlanPatch>,
) -> Result<Json<PreCallPlan>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut plan = scope::plan(store, &session, id).await?;
  ensure_owner(&session, &plan)?;

  if let Some(customer_id) = patch.customer_id {
    scope::as_reference(scope::customer(store, &session, customer_id).await, "customer_id")?;
  }

  let loaded = plan.revision();
  plan.apply(patch, Utc::now())?;
  store.update_plan(&plan, loaded).await.map_err(ApiError::store)?;
  Ok(Json(plan))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /plans/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let plan = scope::plan(store, &session, id).await?;
  ensure_owner(&session, &plan)?;
  plan.ensure_deletable()?;

  if !store.delete_plan(id).await.map_err(ApiError::store)? {
    return Err(ApiError::Conflict(format!("plan {id} was changed by another request")));
  }
  info!(plan_id = %id, "plan deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /plans/{id}/submit`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<PreCallPlan>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut plan = scope::plan(store, &session, id).await?;
  ensure_owner(&session, &plan)?;

  let loaded = plan.revision();
  plan.submit(Utc::now())?;
  store.update_plan(&plan, loaded).await.map_err(ApiError::store)?;
  info!(plan_id = %id, sr_id = %plan.sr_id, "plan submitted for review");

  let owner = &session.user;
  notifications::notify_manager(store, owner, |manager_id| NewNotification {
    user_id:    manager_id,
    kind:       NotificationKind::PlanSubmitted,
    title:      "Visit plan awaiting review".into(),
    body:       format!(
      "{} submitted a visit plan scheduled for {}.",
      owner.full_name,
      plan.scheduled_at.format("%Y-%m-%d %H:%M UTC")
    ),
    subject_id: Some(plan.plan_id),
  })
  .await;

  Ok(Json(plan))
}

// ─── Review ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub decision: ReviewDecision,
  /// Required when rejecting.
  pub comment:  Option<String>,
}

/// `POST /plans/{id}/review`
pub async fn review<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<PreCallPlan>, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_manager()?;
  let store = state.store.as_ref();
  let mut plan = scope::plan(store, &session, id).await?;

  let loaded = plan.revision();
  plan.review(session.user_id(), body.decision, body.comment, Utc::now())?;
  store.update_plan(&plan, loaded).await.map_err(ApiError::store)?;
  info!(
    plan_id = %id,
    reviewer_id = %session.user_id(),
    status = %plan.status,
    "plan reviewed"
  );

  let (kind, title) = match body.decision {
    ReviewDecision::Approve => (NotificationKind::PlanApproved, "Visit plan approved"),
    ReviewDecision::Reject => (NotificationKind::PlanRejected, "Visit plan rejected"),
  };
  let body = match &plan.review_comment {
    Some(comment) => format!("{} reviewed your plan: {comment}", session.user.full_name),
    None => format!("{} reviewed your plan.", session.user.full_name),
  };
  notifications::notify(store, NewNotification {
    user_id: plan.sr_id,
    kind,
    title: title.into(),
    body,
    subject_id: Some(plan.plan_id),
  })
  .await;

  Ok(Json(plan))
}
