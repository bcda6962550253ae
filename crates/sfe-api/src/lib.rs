//! JSON REST API for the SFE backend.
//!
//! Exposes an axum [`Router`] backed by any [`sfe_core::store::SalesStore`].
//! Every route except the login endpoints requires a bearer token, and every
//! record is scoped to the session's company. TLS and listener concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sfe_api::api_router(state))
//! ```

pub mod analytics;
pub mod auth;
pub mod company;
pub mod contacts;
pub mod customers;
pub mod error;
pub mod geocode;
pub mod notifications;
pub mod photos;
pub mod plans;
pub mod reports;
pub mod scope;
pub mod teams;
pub mod territories;
pub mod users;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use serde::Deserialize;
use sfe_core::{geo::DEFAULT_CHECKIN_RADIUS_M, store::SalesStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::{auth::TokenIssuer, geocode::Geocoder};

// ─── Configuration ────────────────────────────────────────────────────────────

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 720;
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Settings the API layer needs at request time.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
  /// HMAC key for session tokens.
  pub jwt_secret:        String,
  #[serde(default = "default_token_ttl_minutes")]
  pub token_ttl_minutes: i64,
  #[serde(default = "default_checkin_radius_m")]
  pub checkin_radius_m:  f64,
  #[serde(default = "default_max_photo_bytes")]
  pub max_photo_bytes:   usize,
  /// Directory photo files are written under.
  pub photo_dir:         PathBuf,
  #[serde(default)]
  pub demo_login:        bool,
  #[serde(default)]
  pub demo_username:     Option<String>,
}

fn default_token_ttl_minutes() -> i64 { DEFAULT_TOKEN_TTL_MINUTES }
fn default_checkin_radius_m() -> f64 { DEFAULT_CHECKIN_RADIUS_M }
fn default_max_photo_bytes() -> usize { DEFAULT_MAX_PHOTO_BYTES }

impl ApiConfig {
  /// A configuration with every optional setting at its default.
  pub fn new(jwt_secret: impl Into<String>, photo_dir: impl Into<PathBuf>) -> Self {
    Self {
      jwt_secret:        jwt_secret.into(),
      token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
      checkin_radius_m:  DEFAULT_CHECKIN_RADIUS_M,
      max_photo_bytes:   DEFAULT_MAX_PHOTO_BYTES,
      photo_dir:         photo_dir.into(),
      demo_login:        false,
      demo_username:     None,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub config:   Arc<ApiConfig>,
  pub tokens:   Arc<TokenIssuer>,
  pub geocoder: Arc<Geocoder>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      config:   Arc::clone(&self.config),
      tokens:   Arc::clone(&self.tokens),
      geocoder: Arc::clone(&self.geocoder),
    }
  }
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, config: ApiConfig, geocoder: Geocoder) -> Self {
    let tokens = TokenIssuer::new(
      config.jwt_secret.as_bytes(),
      chrono::Duration::minutes(config.token_ttl_minutes),
    );
    Self {
      store,
      config: Arc::new(config),
      tokens: Arc::new(tokens),
      geocoder: Arc::new(geocoder),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SalesStore + 'static,
{
  // Multipart framing adds a little on top of the file itself.
  let upload_limit = state.config.max_photo_bytes.saturating_add(64 * 1024);

  Router::new()
    // Auth
    .route("/auth/login", post(auth::login::<S>))
    .route("/auth/demo", post(auth::demo_login::<S>))
    .route("/auth/me", get(auth::me::<S>))
    .route("/auth/password", post(auth::change_password::<S>))
    // Organisation
    .route("/company", get(company::get_one::<S>).patch(company::update::<S>))
    .route("/territories", get(territories::list::<S>).post(territories::create::<S>))
    .route(
      "/territories/{id}",
      get(territories::get_one::<S>)
        .patch(territories::update::<S>)
        .delete(territories::delete::<S>),
    )
    .route("/teams", get(teams::list::<S>).post(teams::create::<S>))
    .route(
      "/teams/{id}",
      get(teams::get_one::<S>).patch(teams::update::<S>).delete(teams::delete::<S>),
    )
    .route("/teams/{id}/members", get(teams::members::<S>))
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>).patch(users::update::<S>).delete(users::deactivate::<S>),
    )
    // Customers and contacts
    .route("/customers", get(customers::list::<S>).post(customers::create::<S>))
    .route(
      "/customers/{id}",
      get(customers::get_one::<S>)
        .patch(customers::update::<S>)
        .delete(customers::delete::<S>),
    )
    .route("/customers/{id}/proximity", get(customers::proximity::<S>))
    .route(
      "/customers/{id}/contacts",
      get(contacts::list::<S>).post(contacts::create::<S>),
    )
    .route(
      "/contacts/{id}",
      get(contacts::get_one::<S>).patch(contacts::update::<S>).delete(contacts::delete::<S>),
    )
    .route("/contacts/{id}/primary", post(contacts::make_primary::<S>))
    // Pre-call plans
    .route("/plans", get(plans::list::<S>).post(plans::create::<S>))
    .route(
      "/plans/{id}",
      get(plans::get_one::<S>).patch(plans::update::<S>).delete(plans::delete::<S>),
    )
    .route("/plans/{id}/submit", post(plans::submit::<S>))
    .route("/plans/{id}/review", post(plans::review::<S>))
    // Call reports and photos
    .route("/reports", get(reports::list::<S>).post(reports::create::<S>))
    .route(
      "/reports/{id}",
      get(reports::get_one::<S>).patch(reports::update::<S>).delete(reports::delete::<S>),
    )
    .route("/reports/{id}/check-in", post(reports::check_in::<S>))
    .route("/reports/{id}/check-out", post(reports::check_out::<S>))
    .route("/reports/{id}/submit", post(reports::submit::<S>))
    .route(
      "/reports/{id}/photos",
      get(photos::list::<S>)
        .post(photos::upload::<S>)
        .layer(DefaultBodyLimit::max(upload_limit)),
    )
    .route("/photos/{id}", get(photos::get_one::<S>).delete(photos::delete::<S>))
    .route("/photos/{id}/raw", get(photos::raw::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/unread-count", get(notifications::unread_count::<S>))
    .route("/notifications/read-all", post(notifications::mark_all_read::<S>))
    .route(
      "/notifications/preferences",
      get(notifications::get_preferences::<S>).patch(notifications::update_preferences::<S>),
    )
    .route("/notifications/{id}", axum::routing::delete(notifications::delete::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    // Geocoding and analytics
    .route("/geocode/search", get(geocode::search::<S>))
    .route("/geocode/reverse", get(geocode::reverse::<S>))
    .route("/analytics/dashboard", get(analytics::dashboard::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
