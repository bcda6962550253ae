//! Handlers for `/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users` | Optional `?role`, `team_id`, `territory_id`, `active_only` |
//! | `POST`   | `/users` | Body: [`CreateUserBody`]; administrators only; 409 on duplicate username |
//! | `GET`    | `/users/{id}` | |
//! | `PATCH`  | `/users/{id}` | Profile fields by the user or an administrator; assignment fields by administrators |
//! | `DELETE` | `/users/{id}` | Deactivates; administrators only |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use sfe_core::{
  org::{AssignmentPatch, NewUser, ProfilePatch, Role, User, validate_password},
  store::{SalesStore, UserQuery},
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, auth::hash_password, error::ApiError, scope};

/// A manager must belong to the same company and hold a management role.
async fn check_manager<S: SalesStore>(
  store: &S,
  session: &Session,
  manager_id: Option<Uuid>,
) -> Result<(), ApiError> {
  let Some(id) = manager_id else {
    return Ok(());
  };
  let manager = scope::as_reference(scope::user(store, session, id).await, "manager_id")?;
  if !manager.role.is_manager() {
    return Err(ApiError::Unprocessable(format!(
      "manager_id: {} holds role {} and cannot manage others",
      manager.username, manager.role
    )));
  }
  Ok(())
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub role:         Option<Role>,
  pub team_id:      Option<Uuid>,
  pub territory_id: Option<Uuid>,
  #[serde(default)]
  pub active_only:  bool,
}

/// `GET /users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SalesStore + 'static,
{
  let query = UserQuery {
    company_id:   session.company_id(),
    role:         params.role,
    team_id:      params.team_id,
    territory_id: params.territory_id,
    active_only:  params.active_only,
  };
  let users = state.store.list_users(&query).await.map_err(ApiError::store)?;
  Ok(Json(users))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
  pub username:     String,
  pub email:        String,
  pub full_name:    String,
  pub phone:        Option<String>,
  pub role:         Role,
  pub territory_id: Option<Uuid>,
  pub team_id:      Option<Uuid>,
  pub manager_id:   Option<Uuid>,
  pub password:     String,
}

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<CreateUserBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  validate_password(&body.password)?;

  let input = NewUser {
    company_id:    session.company_id(),
    username:      body.username.trim().to_owned(),
    email:         body.email.trim().to_owned(),
    full_name:     body.full_name,
    phone:         body.phone,
    role:          body.role,
    territory_id:  body.territory_id,
    team_id:       body.team_id,
    manager_id:    body.manager_id,
    password_hash: String::new(),
  };
  input.validate()?;

  let store = state.store.as_ref();
  if store
    .find_user_by_username(&input.username)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(ApiError::Conflict(format!("username {:?} is already taken", input.username)));
  }
  scope::check_refs(store, &session, input.territory_id, input.team_id).await?;
  check_manager(store, &session, input.manager_id).await?;

  let input = NewUser { password_hash: hash_password(&body.password)?, ..input };
  let user = store.add_user(input).await.map_err(ApiError::store)?;

  info!(user_id = %user.user_id, role = %user.role, by = %session.user_id(), "user created");
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::user(state.store.as_ref(), &session, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// Profile and assignment fields in one body; either part may be empty.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
  #[serde(flatten)]
  pub profile:    ProfilePatch,
  #[serde(flatten)]
  pub assignment: AssignmentPatch,
}

/// `PATCH /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateUserBody>,
) -> Result<Json<User>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut user = scope::user(store, &session, id).await?;

  let is_admin = session.role().is_admin();
  if !is_admin && session.user_id() != id {
    return Err(ApiError::Forbidden("only administrators may edit other users".into()));
  }
  if !body.assignment.is_empty() {
    session.require_admin()?;
    if id == session.user_id() && body.assignment.is_active == Some(false) {
      return Err(ApiError::Conflict("you cannot deactivate your own account".into()));
    }
    scope::check_refs(
      store,
      &session,
      body.assignment.territory_id.flatten(),
      body.assignment.team_id.flatten(),
    )
    .await?;
    check_manager(store, &session, body.assignment.manager_id.flatten()).await?;
  }

  user.apply_profile(body.profile)?;
  user.apply_assignment(body.assignment)?;
  user.updated_at = Utc::now();
  store.update_user(&user).await.map_err(ApiError::store)?;

  info!(user_id = %id, by = %session.user_id(), "user updated");
  Ok(Json(user))
}

// ─── Deactivate ───────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`: users are never removed, only deactivated.
pub async fn deactivate<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  if id == session.user_id() {
    return Err(ApiError::Conflict("you cannot deactivate your own account".into()));
  }
  let store = state.store.as_ref();
  let mut user = scope::user(store, &session, id).await?;

  if user.is_active {
    user.is_active = false;
    user.updated_at = Utc::now();
    store.update_user(&user).await.map_err(ApiError::store)?;
    info!(user_id = %id, by = %session.user_id(), "user deactivated");
  }
  Ok(Json(user))
}
