//! Password hashing, session tokens and the `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: `{"username","password"}`; returns a bearer token |
//! | `POST` | `/auth/demo` | Logs in as the configured demo user; 403 when disabled |
//! | `GET`  | `/auth/me` | Current user with company, territory and team |
//! | `POST` | `/auth/password` | Body: `{"current_password","new_password"}` |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sfe_core::{
  org::{Role, User, UserProfile, validate_password},
  store::SalesStore,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Passwords ────────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// Check `password` against a PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(password_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

// ─── Tokens ───────────────────────────────────────────────────────────────────

/// JWT claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
  /// User id.
  pub sub:        Uuid,
  pub company_id: Uuid,
  pub role:       Role,
  pub iat:        i64,
  pub exp:        i64,
}

/// A freshly signed token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 session tokens.
pub struct TokenIssuer {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
  ttl:        Duration,
}

impl TokenIssuer {
  pub fn new(secret: &[u8], ttl: Duration) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 30;
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
      ttl,
    }
  }

  pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, ApiError> {
    let expires_at = now + self.ttl;
    let claims = Claims {
      sub:        user.user_id,
      company_id: user.company_id,
      role:       user.role,
      iat:        now.timestamp(),
      exp:        expires_at.timestamp(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))?;
    Ok(IssuedToken { token, expires_at })
  }

  pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &self.decoding, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))
  }
}

// ─── Session extractor ────────────────────────────────────────────────────────

/// The authenticated user behind a request.
///
/// The user row is re-read on every request, so deactivation and role
/// changes take effect without waiting for the token to expire.
#[derive(Debug, Clone)]
pub struct Session {
  pub user: User,
}

impl Session {
  pub fn user_id(&self) -> Uuid { self.user.user_id }

  pub fn company_id(&self) -> Uuid { self.user.company_id }

  pub fn role(&self) -> Role { self.user.role }

  pub fn is_manager(&self) -> bool { self.user.role.is_manager() }

  pub fn require_admin(&self) -> Result<(), ApiError> {
    if self.user.role.is_admin() {
      Ok(())
    } else {
      Err(ApiError::Forbidden("administrator role required".into()))
    }
  }

  pub fn require_manager(&self) -> Result<(), ApiError> {
    if self.is_manager() {
      Ok(())
    } else {
      Err(ApiError::Forbidden("management role required".into()))
    }
  }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

  value
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: SalesStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let claims = state.tokens.verify(bearer_token(&parts.headers)?)?;

    let user = state
      .store
      .get_user(claims.sub)
      .await
      .map_err(ApiError::store)?
      .filter(|u| u.is_active && u.company_id == claims.company_id)
      .ok_or_else(|| ApiError::Unauthorized("session is no longer valid".into()))?;

    Ok(Session { user })
  }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token:      String,
  pub token_type: &'static str,
  pub expires_at: DateTime<Utc>,
  pub user:       User,
}

fn login_response<S>(state: &AppState<S>, user: User) -> Result<Json<LoginResponse>, ApiError> {
  let issued = state.tokens.issue(&user, Utc::now())?;
  Ok(Json(LoginResponse {
    token: issued.token,
    token_type: "Bearer",
    expires_at: issued.expires_at,
    user,
  }))
}

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: SalesStore + 'static,
{
  let bad_credentials = || ApiError::Unauthorized("invalid username or password".into());

  let Some(user) = state
    .store
    .find_user_by_username(body.username.trim())
    .await
    .map_err(ApiError::store)?
  else {
    warn!(username = %body.username, "login for unknown user");
    return Err(bad_credentials());
  };

  if !verify_password(&body.password, &user.password_hash) {
    warn!(user_id = %user.user_id, "login with wrong password");
    return Err(bad_credentials());
  }
  if !user.is_active {
    warn!(user_id = %user.user_id, "login for deactivated user");
    return Err(ApiError::Forbidden("account is deactivated".into()));
  }

  info!(user_id = %user.user_id, role = %user.role, "user logged in");
  login_response(&state, user)
}

/// `POST /auth/demo`
pub async fn demo_login<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: SalesStore + 'static,
{
  let username = match (state.config.demo_login, state.config.demo_username.as_deref()) {
    (true, Some(username)) => username.to_owned(),
    _ => return Err(ApiError::Forbidden("demo login is disabled".into())),
  };

  let user = state
    .store
    .find_user_by_username(&username)
    .await
    .map_err(ApiError::store)?
    .filter(|u| u.is_active)
    .ok_or_else(|| ApiError::Unauthorized("demo user is not available".into()))?;

  info!(user_id = %user.user_id, "demo login");
  login_response(&state, user)
}

/// `GET /auth/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<UserProfile>, ApiError>
where
  S: SalesStore + 'static,
{
  let user = session.user;
  let company = state
    .store
    .get_company(user.company_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("company", user.company_id))?;

  let territory = match user.territory_id {
    Some(id) => state.store.get_territory(id).await.map_err(ApiError::store)?,
    None => None,
  };
  let team = match user.team_id {
    Some(id) => state.store.get_team(id).await.map_err(ApiError::store)?,
    None => None,
  };

  Ok(Json(UserProfile { user, company, territory, team }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
  pub current_password: String,
  pub new_password:     String,
}

/// `POST /auth/password`
pub async fn change_password<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let mut user = session.user;
  if !verify_password(&body.current_password, &user.password_hash) {
    warn!(user_id = %user.user_id, "password change with wrong current password");
    return Err(ApiError::Forbidden("current password is incorrect".into()));
  }
  validate_password(&body.new_password)?;

  user.password_hash = hash_password(&body.new_password)?;
  user.updated_at = Utc::now();
  state.store.update_user(&user).await.map_err(ApiError::store)?;

  info!(user_id = %user.user_id, "password changed");
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user() -> User {
    let now = Utc::now();
    User {
      user_id:       Uuid::new_v4(),
      company_id:    Uuid::new_v4(),
      username:      "somchai".into(),
      email:         "somchai@example.com".into(),
      full_name:     "Somchai".into(),
      phone:         None,
      role:          Role::Sr,
      territory_id:  None,
      team_id:       None,
      manager_id:    None,
      is_active:     true,
      password_hash: String::new(),
      created_at:    now,
      updated_at:    now,
    }
  }

  #[test]
  fn password_round_trip() {
    let hash = hash_password("correct horse").unwrap();
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
    assert!(!verify_password("correct horse", "not-a-phc-string"));
  }

  #[test]
  fn token_carries_claims() {
    let issuer = TokenIssuer::new(b"test-secret", Duration::minutes(10));
    let u = user();
    let issued = issuer.issue(&u, Utc::now()).unwrap();
    let claims = issuer.verify(&issued.token).unwrap();
    assert_eq!(claims.sub, u.user_id);
    assert_eq!(claims.company_id, u.company_id);
    assert_eq!(claims.role, Role::Sr);
  }

  #[test]
  fn expired_token_is_rejected() {
    let issuer = TokenIssuer::new(b"test-secret", Duration::minutes(10));
    let issued = issuer.issue(&user(), Utc::now() - Duration::hours(2)).unwrap();
    assert!(matches!(issuer.verify(&issued.token), Err(ApiError::Unauthorized(_))));
  }

  #[test]
  fn token_from_other_secret_is_rejected() {
    let a = TokenIssuer::new(b"secret-a", Duration::minutes(10));
    let b = TokenIssuer::new(b"secret-b", Duration::minutes(10));
    let issued = a.issue(&user(), Utc::now()).unwrap();
    assert!(b.verify(&issued.token).is_err());
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
    assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
  }
}
