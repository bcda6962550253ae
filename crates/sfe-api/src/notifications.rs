//! Handlers for `/notifications` endpoints, plus the fan-out helper the plan
//! and report handlers use.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notifications` | Newest first; `?unread_only`, `limit` (default 50) |
//! | `GET`    | `/notifications/unread-count` | `{"unread": n}` |
//! | `POST`   | `/notifications/{id}/read` | 404 for someone else's notification |
//! | `POST`   | `/notifications/read-all` | `{"updated": n}` |
//! | `DELETE` | `/notifications/{id}` | |
//! | `GET`    | `/notifications/preferences` | Created with every toggle on at first read |
//! | `PATCH`  | `/notifications/preferences` | Body: [`PreferencesPatch`] |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use sfe_core::{
  notification::{NewNotification, Notification, NotificationPreferences, PreferencesPatch},
  org::User,
  store::SalesStore,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

// ─── Fan-out ──────────────────────────────────────────────────────────────────

/// Deliver `note` unless the recipient has switched its kind off. Failures
/// are logged and never fail the request that triggered them.
pub(crate) async fn notify<S: SalesStore>(store: &S, note: NewNotification) {
  let recipient = note.user_id;
  let kind = note.kind;
  let prefs = match store.get_preferences(recipient).await {
    Ok(prefs) => prefs,
    Err(e) => {
      warn!(user_id = %recipient, %kind, error = %e, "could not read notification preferences");
      return;
    }
  };
  if !prefs.allows(kind) {
    debug!(user_id = %recipient, %kind, "notification suppressed by preferences");
    return;
  }
  match store.add_notification(note).await {
    Ok(n) => debug!(notification_id = %n.notification_id, user_id = %recipient, %kind, "notified"),
    Err(e) => warn!(user_id = %recipient, %kind, error = %e, "could not store notification"),
  }
}

/// Notify the manager of `owner`, if they have one.
pub(crate) async fn notify_manager<S, F>(store: &S, owner: &User, build: F)
where
  S: SalesStore,
  F: FnOnce(Uuid) -> NewNotification,
{
  match owner.manager_id {
    Some(manager_id) => notify(store, build(manager_id)).await,
    None => debug!(user_id = %owner.user_id, "no manager to notify"),
  }
}

// ─── Feed ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unread_only: bool,
  pub limit:       Option<usize>,
}

/// `GET /notifications`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: SalesStore + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
  let notifications = state
    .store
    .list_notifications(session.user_id(), params.unread_only, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(notifications))
}

/// `GET /notifications/unread-count`
pub async fn unread_count<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: SalesStore + 'static,
{
  let unread = state
    .store
    .count_unread(session.user_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "unread": unread })))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError>
where
  S: SalesStore + 'static,
{
  let notification = state
    .store
    .mark_read(session.user_id(), id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("notification", id))?;
  Ok(Json(notification))
}

/// `POST /notifications/read-all`
pub async fn mark_all_read<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: SalesStore + 'static,
{
  let updated = state
    .store
    .mark_all_read(session.user_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "updated": updated })))
}

/// `DELETE /notifications/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let removed = state
    .store
    .delete_notification(session.user_id(), id)
    .await
    .map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::not_found("notification", id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Preferences ──────────────────────────────────────────────────────────────

/// `GET /notifications/preferences`
pub async fn get_preferences<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<NotificationPreferences>, ApiError>
where
  S: SalesStore + 'static,
{
  let prefs = state
    .store
    .get_preferences(session.user_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(prefs))
}

/// `PATCH /notifications/preferences`
pub async fn update_preferences<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(patch): Json<PreferencesPatch>,
) -> Result<Json<NotificationPreferences>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut prefs = store
    .get_preferences(session.user_id())
    .await
    .map_err(ApiError::store)?;
  prefs.apply(patch, Utc::now());
  store.update_preferences(&prefs).await.map_err(ApiError::store)?;

  info!(user_id = %session.user_id(), "notification preferences updated");
  Ok(Json(prefs))
}
