//! Handlers for `/territories` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/territories` | All territories of the company, by code |
//! | `POST`   | `/territories` | Body: [`NewTerritory`]; administrators only; 409 on duplicate code |
//! | `GET`    | `/territories/{id}` | |
//! | `PATCH`  | `/territories/{id}` | Body: [`TerritoryPatch`]; administrators only |
//! | `DELETE` | `/territories/{id}` | 409 while customers, users or teams reference it |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use sfe_core::{
  org::{NewTerritory, Territory, TerritoryPatch},
  store::SalesStore,
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

async fn ensure_code_free<S: SalesStore>(
  store: &S,
  company_id: Uuid,
  code: &str,
) -> Result<(), ApiError> {
  let existing = store
    .find_territory_by_code(company_id, code)
    .await
    .map_err(ApiError::store)?;
  match existing {
    Some(_) => Err(ApiError::Conflict(format!("territory code {code:?} is already in use"))),
    None => Ok(()),
  }
}

/// `GET /territories`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Vec<Territory>>, ApiError>
where
  S: SalesStore + 'static,
{
  let territories = state
    .store
    .list_territories(session.company_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(territories))
}

/// `POST /territories`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewTerritory>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  body.validate()?;
  ensure_code_free(state.store.as_ref(), session.company_id(), body.code.trim()).await?;

  let territory = state
    .store
    .add_territory(session.company_id(), body)
    .await
    .map_err(ApiError::store)?;

  info!(territory_id = %territory.territory_id, code = %territory.code, "territory created");
  Ok((StatusCode::CREATED, Json(territory)))
}

/// `GET /territories/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Territory>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::territory(state.store.as_ref(), &session, id).await?))
}

/// `PATCH /territories/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<TerritoryPatch>,
) -> Result<Json<Territory>, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  let mut territory = scope::territory(state.store.as_ref(), &session, id).await?;

  if let Some(code) = patch.code.as_deref()
    && code != territory.code
  {
    ensure_code_free(state.store.as_ref(), session.company_id(), code).await?;
  }

  territory.apply(patch)?;
  state.store.update_territory(&territory).await.map_err(ApiError::store)?;
  Ok(Json(territory))
}

/// `DELETE /territories/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  let territory = scope::territory(state.store.as_ref(), &session, id).await?;

  let refs = state.store.count_territory_refs(id).await.map_err(ApiError::store)?;
  if refs > 0 {
    return Err(ApiError::Conflict(format!(
      "territory {} is still assigned to {refs} customers, users or teams",
      territory.code
    )));
  }

  state.store.delete_territory(id).await.map_err(ApiError::store)?;
  info!(territory_id = %id, "territory deleted");
  Ok(StatusCode::NO_CONTENT)
}
