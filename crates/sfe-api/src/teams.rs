//! Handlers for `/teams` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/teams` | |
//! | `POST`   | `/teams` | Body: [`NewTeam`]; administrators only |
//! | `GET`    | `/teams/{id}` | |
//! | `PATCH`  | `/teams/{id}` | Body: [`TeamPatch`]; administrators only |
//! | `DELETE` | `/teams/{id}` | 409 while the team has members |
//! | `GET`    | `/teams/{id}/members` | Users assigned to the team |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use sfe_core::{
  org::{NewTeam, Team, TeamPatch, User},
  store::{SalesStore, UserQuery},
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

async fn check_leader<S: SalesStore>(
  store: &S,
  session: &Session,
  leader_id: Option<Uuid>,
) -> Result<(), ApiError> {
  if let Some(id) = leader_id {
    scope::as_reference(scope::user(store, session, id).await, "leader_id")?;
  }
  Ok(())
}

async fn members_of<S: SalesStore>(
  store: &S,
  session: &Session,
  team_id: Uuid,
) -> Result<Vec<User>, ApiError> {
  let mut query = UserQuery::company(session.company_id());
  query.team_id = Some(team_id);
  store.list_users(&query).await.map_err(ApiError::store)
}

/// `GET /teams`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Vec<Team>>, ApiError>
where
  S: SalesStore + 'static,
{
  let teams = state
    .store
    .list_teams(session.company_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(teams))
}

/// `POST /teams`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewTeam>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  body.validate()?;
  let store = state.store.as_ref();
  scope::check_refs(store, &session, body.territory_id, None).await?;
  check_leader(store, &session, body.leader_id).await?;

  let team = store
    .add_team(session.company_id(), body)
    .await
    .map_err(ApiError::store)?;

  info!(team_id = %team.team_id, name = %team.name, "team created");
  Ok((StatusCode::CREATED, Json(team)))
}

/// `GET /teams/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Team>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::team(state.store.as_ref(), &session, id).await?))
}

/// `PATCH /teams/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<TeamPatch>,
) -> Result<Json<Team>, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  let store = state.store.as_ref();
  let mut team = scope::team(store, &session, id).await?;

  scope::check_refs(store, &session, patch.territory_id.flatten(), None).await?;
  check_leader(store, &session, patch.leader_id.flatten()).await?;

  team.apply(patch)?;
  store.update_team(&team).await.map_err(ApiError::store)?;
  Ok(Json(team))
}

/// `DELETE /teams/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  let store = state.store.as_ref();
  let team = scope::team(store, &session, id).await?;

  let members = members_of(store, &session, id).await?;
  if !members.is_empty() {
    return Err(ApiError::Conflict(format!(
      "team {:?} still has {} members",
      team.name,
      members.len()
    )));
  }

  store.delete_team(id).await.map_err(ApiError::store)?;
  info!(team_id = %id, "team deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /teams/{id}/members`
pub async fn members<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  scope::team(store, &session, id).await?;
  Ok(Json(members_of(store, &session, id).await?))
}
