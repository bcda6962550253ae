//! Handlers for customer contacts.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/customers/{id}/contacts` | Primary contact first |
//! | `POST`   | `/customers/{id}/contacts` | Body: [`NewContact`]; the first contact is always primary |
//! | `GET`    | `/contacts/{id}` | |
//! | `PATCH`  | `/contacts/{id}` | Body: [`ContactPatch`]; `is_primary: false` is rejected |
//! | `DELETE` | `/contacts/{id}` | The oldest sibling inherits the primary flag |
//! | `POST`   | `/contacts/{id}/primary` | Make this the customer's only primary contact |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use sfe_core::{
  customer::{Contact, ContactPatch, NewContact},
  store::SalesStore,
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

/// `GET /customers/{id}/contacts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  scope::customer(store, &session, customer_id).await?;
  let contacts = store.list_contacts(customer_id).await.map_err(ApiError::store)?;
  Ok(Json(contacts))
}

/// `POST /customers/{id}/contacts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(customer_id): Path<Uuid>,
  Json(body): Json<NewContact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  body.validate()?;
  let store = state.store.as_ref();
  let customer = scope::customer(store, &session, customer_id).await?;
  let contact = store.add_contact(&customer, body).await.map_err(ApiError::store)?;

  info!(
    contact_id = %contact.contact_id,
    customer_id = %customer_id,
    primary = contact.is_primary,
    "contact added"
  );
  Ok((StatusCode::CREATED, Json(contact)))
}

/// `GET /contacts/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError>
where
  S: SalesStore + 'static,
{
  Ok(Json(scope::contact(state.store.as_ref(), &session, id).await?))
}

/// `PATCH /contacts/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
  Json(patch): Json<ContactPatch>,
) -> Result<Json<Contact>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let mut contact = scope::contact(store, &session, id).await?;
  contact.apply(patch)?;
  contact.updated_at = Utc::now();
  store.update_contact(&contact).await.map_err(ApiError::store)?;
  Ok(Json(contact))
}

/// `DELETE /contacts/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let contact = scope::contact(store, &session, id).await?;
  store.delete_contact(id).await.map_err(ApiError::store)?;
  info!(contact_id = %id, customer_id = %contact.customer_id, "contact deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /contacts/{id}/primary`
pub async fn make_primary<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  scope::contact(store, &session, id).await?;
  let contact = store
    .set_primary_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("contact", id))?;
  Ok(Json(contact))
}
