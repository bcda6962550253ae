//! Handlers for `/customers` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/customers` | Optional `?territory_id`, `class`, `q`, `limit`, `offset` |
//! | `POST`   | `/customers` | Body: [`NewCustomer`]; class derived from revenue; 409 on duplicate code |
//! | `GET`    | `/customers/{id}` | |
//! | `PATCH`  | `/customers/{id}` | Body: [`CustomerPatch`] |
//! | `DELETE` | `/customers/{id}` | Managers only; 409 while plans or reports reference it |
//! | `GET`    | `/customers/{id}/proximity` | `?lat&lng`; distance to the customer and radius check |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sfe_core::{
  customer::{AbcClass, Customer, CustomerPatch, NewCustomer},
  geo::{GeoPoint, Proximity},
  store::{CustomerQuery, SalesStore},
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

const MAX_PAGE: usize = 500;

async fn ensure_code_free<S: SalesStore>(
  store: &S,
  company_id: Uuid,
  code: &str,
) -> Result<(), ApiError> {
  match store.find_customer_by_code(company_id, code).await.map_err(ApiError::store)? {
    Some(_) => Err(ApiError::Conflict(format!("customer code {code:?} is already in use"))),
    None => Ok(()),
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub territory_id: Option<Uuid>,
  pub class:        Option<AbcClass>,
  /// Free text over name and code.
  pub q:            Option<String>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// `GET /customers`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Customer>>, ApiError>
where
  S: SalesStore + 'static,
{
  let query = CustomerQuery {
    company_id:   session.company_id(),
    territory_id: params.territory_id,
    class:        params.class,
    text:         params.q,
    limit:        Some(params.limit.unwrap_or(MAX_PAGE).min(MAX_PAGE)),
    offset:       params.offset,
  };
  let customers = state.store.list_customers(&query).await.map_err(ApiError::store)?;
  Ok(Json(customers))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /customers`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<NewCustomer>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  body.validate()?;
  let store = state.store.as_ref();
  ensure_code_free(store, session.company_id(), body.code.trim()).await?;
  scope::check_refs(store, &session, body.territory_id, None).await?;

  let customer = store
    .add_customer(session.company_id(), body)
    .await
    .map_err(ApiError::store)?;

  info!(
    customer_id = %customer.customer_id,
    code = %customer.code,
    class = %customer.class,
    "customer created"
  );
  Ok((StatusCode::CREATED, Json(customer)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /customers/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::customer(state.store.as_ref(), &session, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /customers/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<CustomerPatch>,
) -> Result<Json<Customer>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut customer = scope::customer(store, &session, id).await?;

  if let Some(code) = patch.code.as_deref()
    && code != customer.code
  {
    ensure_code_free(store, session.company_id(), code).await?;
  }
  scope::check_refs(store, &session, patch.territory_id.flatten(), None).await?;

  let before = customer.class;
  customer.apply(patch)?;
  customer.updated_at = chrono::Utc::now();
  store.update_customer(&customer).await.map_err(ApiError::store)?;

  if customer.class != before {
    info!(customer_id = %id, from = %before, to = %customer.class, "customer reclassified");
  }
  Ok(Json(customer))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /customers/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  session.require_manager()?;
  let store = state.store.as_ref();
  let customer = scope::customer(store, &session, id).await?;

  let refs = store.count_customer_refs(id).await.map_err(ApiError::store)?;
  if refs > 0 {
    return Err(ApiError::Conflict(format!(
      "customer {} has {refs} visit plans or reports",
      customer.code
    )));
  }

  store.delete_customer(id).await.map_err(ApiError::store)?;
  info!(customer_id = %id, by = %session.user_id(), "customer deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Proximity ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PointParams {
  pub lat: f64,
  pub lng: f64,
}

/// `GET /customers/{id}/proximity?lat=..&lng=..`
pub async fn proximity<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Query(params): Query<PointParams>,
) -> Result<Json<Proximity>, ApiError>
where
  S: SalesStore + 'static,
{
  let point = GeoPoint::new(params.lat, params.lng)?;
  let customer = scope::customer(state.store.as_ref(), &session, id).await?;
  let location = customer
    .location
    .ok_or_else(|| ApiError::Unprocessable(format!("customer {} has no location", customer.code)))?;

  Ok(Json(Proximity::measure(point, location, state.config.checkin_radius_m)))
}
