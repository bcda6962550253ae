//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use sfe_core::store::StoreError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  /// A check-in too far from the customer; the body carries the distance.
  #[error("outside check-in radius: {distance_m:.0} m > {radius_m:.0} m")]
  OutsideRadius { distance_m: f64, radius_m: f64 },

  #[error("payload too large: {0}")]
  PayloadTooLarge(String),

  #[error("unsupported media type: {0}")]
  UnsupportedMediaType(String),

  #[error("upstream error: {0}")]
  BadGateway(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Wrap a backend error; use as `.map_err(ApiError::store)`. Lost races
  /// (duplicate keys, stale revisions) become 409.
  pub fn store<E: StoreError>(e: E) -> Self {
    if e.is_conflict() {
      tracing::debug!(error = %e, "store conflict");
      ApiError::Conflict(e.to_string())
    } else {
      ApiError::Store(Box::new(e))
    }
  }

  pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
    ApiError::NotFound(format!("{entity} {id} not found"))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unprocessable(_) | ApiError::OutsideRadius { .. } => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
      ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<sfe_core::Error> for ApiError {
  fn from(e: sfe_core::Error) -> Self {
    use sfe_core::Error as E;
    match e {
      E::OutsideRadius { distance_m, radius_m } => {
        ApiError::OutsideRadius { distance_m, radius_m }
      }
      E::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
      E::UnknownVariant { .. } => ApiError::BadRequest(e.to_string()),
      E::Invalid { .. } | E::InvalidCoordinates { .. } => ApiError::Unprocessable(e.to_string()),
    }
  }
}

impl From<MultipartError> for ApiError {
  fn from(e: MultipartError) -> Self {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
      ApiError::PayloadTooLarge(e.body_text())
    } else {
      ApiError::BadRequest(e.body_text())
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        json!({ "error": "internal server error" })
      }
      ApiError::Internal(m) => {
        tracing::error!(error = %m, "internal error");
        json!({ "error": "internal server error" })
      }
      ApiError::OutsideRadius { distance_m, radius_m } => json!({
        "error": format!(
          "position is {distance_m:.0} m from the customer; the check-in radius is {radius_m:.0} m"
        ),
        "distance_m": distance_m,
        "radius_m": radius_m,
      }),
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Unauthorized(m)
      | ApiError::Forbidden(m)
      | ApiError::Conflict(m)
      | ApiError::Unprocessable(m)
      | ApiError::PayloadTooLarge(m)
      | ApiError::UnsupportedMediaType(m)
      | ApiError::BadGateway(m) => json!({ "error": m }),
    };

    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let transition = sfe_core::Error::InvalidTransition {
      entity: "plan",
      from:   "approved",
      action: "edit",
    };
    assert_eq!(ApiError::from(transition).status(), StatusCode::CONFLICT);

    let invalid = sfe_core::Error::invalid("name", "must not be empty");
    assert_eq!(ApiError::from(invalid).status(), StatusCode::UNPROCESSABLE_ENTITY);

    let far = sfe_core::Error::OutsideRadius { distance_m: 512.0, radius_m: 200.0 };
    assert!(matches!(ApiError::from(far), ApiError::OutsideRadius { .. }));
  }

  #[derive(Debug, Error)]
  #[error("backend failure")]
  struct BackendError {
    conflict: bool,
  }

  impl StoreError for BackendError {
    fn is_conflict(&self) -> bool { self.conflict }
  }

  #[test]
  fn store_conflicts_map_to_409() {
    let lost_race = ApiError::store(BackendError { conflict: true });
    assert_eq!(lost_race.status(), StatusCode::CONFLICT);

    let broken = ApiError::store(BackendError { conflict: false });
    assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn unauthorized_carries_bearer_challenge() {
    let res = ApiError::Unauthorized("missing token".into()).into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
  }
}
