//! Address lookup against a Nominatim-compatible service.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/geocode/search` | `?q=`; up to five candidates |
//! | `GET`  | `/geocode/reverse` | `?lat&lng`; 404 when nothing is there |
//!
//! Upstream failures surface as 502.

use std::time::Duration;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use sfe_core::{geo::GeoPoint, store::SalesStore};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{AppState, auth::Session, error::ApiError};

const MAX_RESULTS: usize = 5;

// ─── Client ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
  #[serde(default = "default_base_url")]
  pub base_url:     String,
  /// Public Nominatim instances require an identifying user agent.
  #[serde(default = "default_user_agent")]
  pub user_agent:   String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_base_url() -> String { "https://nominatim.openstreetmap.org".into() }
fn default_user_agent() -> String { concat!("sfe/", env!("CARGO_PKG_VERSION")).into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for GeocoderConfig {
  fn default() -> Self {
    Self {
      base_url:     default_base_url(),
      user_agent:   default_user_agent(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
  #[error("geocoder request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("geocoder returned an unusable result: {0}")]
  Malformed(String),

  #[error("no address found")]
  NotFound,
}

impl From<GeocodeError> for ApiError {
  fn from(e: GeocodeError) -> Self {
    match e {
      GeocodeError::NotFound => ApiError::NotFound(e.to_string()),
      other => {
        warn!(error = %other, "geocoder failure");
        ApiError::BadGateway(other.to_string())
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
  pub display_name: String,
  pub location:     GeoPoint,
}

/// One place as Nominatim's `jsonv2` format returns it; coordinates are
/// strings.
#[derive(Debug, Deserialize)]
struct Place {
  display_name: String,
  lat:          String,
  lon:          String,
}

impl Place {
  fn into_result(self) -> Result<GeocodeResult, GeocodeError> {
    let parse = |v: &str| {
      v.parse::<f64>()
        .map_err(|_| GeocodeError::Malformed(format!("coordinate {v:?}")))
    };
    let location = GeoPoint::new(parse(&self.lat)?, parse(&self.lon)?)
      .map_err(|e| GeocodeError::Malformed(e.to_string()))?;
    Ok(GeocodeResult { display_name: self.display_name, location })
  }
}

/// `/reverse` answers `{"error": ...}` with status 200 when nothing matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseReply {
  Miss { error: String },
  Hit(Place),
}

pub struct Geocoder {
  client:   reqwest::Client,
  base_url: String,
}

impl Geocoder {
  pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
    let client = reqwest::Client::builder()
      .user_agent(config.user_agent)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() })
  }

  pub async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, GeocodeError> {
    let limit = MAX_RESULTS.to_string();
    let places: Vec<Place> = self
      .client
      .get(format!("{}/search", self.base_url))
      .query(&[("format", "jsonv2"), ("q", query), ("limit", limit.as_str())])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    debug!(query, hits = places.len(), "geocoder search");
    places.into_iter().take(MAX_RESULTS).map(Place::into_result).collect()
  }

  pub async fn reverse(&self, point: GeoPoint) -> Result<GeocodeResult, GeocodeError> {
    let reply: ReverseReply = self
      .client
      .get(format!("{}/reverse", self.base_url))
      .query(&[
        ("format", "jsonv2".to_owned()),
        ("lat", point.lat.to_string()),
        ("lon", point.lng.to_string()),
      ])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    match reply {
      ReverseReply::Hit(place) => place.into_result(),
      ReverseReply::Miss { error } => {
        debug!(lat = point.lat, lng = point.lng, %error, "geocoder reverse miss");
        Err(GeocodeError::NotFound)
      }
    }
  }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q: String,
}

/// `GET /geocode/search?q=..`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  _session: Session,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<GeocodeResult>>, ApiError>
where
  S: SalesStore + 'static,
{
  let q = params.q.trim();
  if q.is_empty() {
    return Err(ApiError::BadRequest("q must not be empty".into()));
  }
  Ok(Json(state.geocoder.search(q).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReverseParams {
  pub lat: f64,
  pub lng: f64,
}

/// `GET /geocode/reverse?lat=..&lng=..`
pub async fn reverse<S>(
  State(state): State<AppState<S>>,
  _session: Session,
  Query(params): Query<ReverseParams>,
) -> Result<Json<GeocodeResult>, ApiError>
where
  S: SalesStore + 'static,
{
  let point = GeoPoint::new(params.lat, params.lng)?;
  Ok(Json(state.geocoder.reverse(point).await?))
}

#[cfg(test)]
mod tests {
  use httpmock::prelude::*;
  use serde_json::json;

  use super::*;

  fn geocoder(server: &MockServer) -> Geocoder {
    Geocoder::new(GeocoderConfig {
      base_url:     server.base_url(),
      user_agent:   "sfe-test".into(),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn search_parses_places() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(GET)
          .path("/search")
          .query_param("q", "Siam Paragon")
          .query_param("format", "jsonv2")
          .header("user-agent", "sfe-test");
        then.status(200).json_body(json!([
          { "display_name": "Siam Paragon, Bangkok", "lat": "13.7462", "lon": "100.5347" },
          { "display_name": "Siam Paragon Parking", "lat": "13.7460", "lon": "100.5350" }
        ]));
      })
      .await;

    let results = geocoder(&server).search("Siam Paragon").await.unwrap();
    mock.assert_async().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].display_name, "Siam Paragon, Bangkok");
    assert!((results[0].location.lat - 13.7462).abs() < 1e-9);
    assert!((results[0].location.lng - 100.5347).abs() < 1e-9);
  }

  #[tokio::test]
  async fn reverse_miss_is_not_found() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/reverse");
        then.status(200).json_body(json!({ "error": "Unable to geocode" }));
      })
      .await;

    let err = geocoder(&server)
      .reverse(GeoPoint { lat: 0.0, lng: 0.0 })
      .await
      .unwrap_err();
    assert!(matches!(err, GeocodeError::NotFound));
    assert_eq!(ApiError::from(err).status(), axum::http::StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn reverse_hit() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/reverse").query_param("lat", "13.7563");
        then.status(200).json_body(json!({
          "display_name": "Bangkok City Hall", "lat": "13.7563", "lon": "100.5018"
        }));
      })
      .await;

    let result = geocoder(&server)
      .reverse(GeoPoint { lat: 13.7563, lng: 100.5018 })
      .await
      .unwrap();
    assert_eq!(result.display_name, "Bangkok City Hall");
  }

  #[tokio::test]
  async fn upstream_error_is_bad_gateway() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/search");
        then.status(503);
      })
      .await;

    let err = geocoder(&server).search("anything").await.unwrap_err();
    assert!(matches!(err, GeocodeError::Http(_)));
    assert_eq!(ApiError::from(err).status(), axum::http::StatusCode::BAD_GATEWAY);
  }
}
