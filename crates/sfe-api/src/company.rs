//! Handlers for `/company`: the session's own company.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/company` | |
//! | `PATCH` | `/company` | Body: [`CompanyPatch`]; administrators only |

use axum::{Json, extract::State};
use chrono::Utc;
use sfe_core::{
  org::{Company, CompanyPatch},
  store::SalesStore,
};
use tracing::info;

use crate::{AppState, auth::Session, error::ApiError};

async fn load<S: SalesStore>(store: &S, session: &Session) -> Result<Company, ApiError> {
  store
    .get_company(session.company_id())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("company", session.company_id()))
}

/// `GET /company`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Company>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(load(state.store.as_ref(), &session).await?))
}

/// `PATCH /company`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(patch): Json<CompanyPatch>,
) -> Result<Json<Company>, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_admin()?;
  let mut company = load(state.store.as_ref(), &session).await?;

  if let Some(name) = patch.name.as_deref().map(str::trim)
    && name != company.name
    && state
      .store
      .find_company_by_name(name)
      .await
      .map_err(ApiError::store)?
      .is_some()
  {
    return Err(ApiError::Conflict(format!("company name {name:?} is already taken")));
  }

  company.apply(patch)?;
  company.updated_at = Utc::now();
  state.store.update_company(&company).await.map_err(ApiError::store)?;

  info!(company_id = %company.company_id, by = %session.user_id(), "company updated");
  Ok(Json(company))
}
