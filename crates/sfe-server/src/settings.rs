//! Server settings: a TOML file layered under `SFE_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use sfe_api::{ApiConfig, DEFAULT_MAX_PHOTO_BYTES, DEFAULT_TOKEN_TTL_MINUTES, geocode::GeocoderConfig};
use sfe_core::geo::DEFAULT_CHECKIN_RADIUS_M;

/// Not `Debug`: it carries the token signing secret.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_database_path")]
  pub database_path:     PathBuf,
  #[serde(default = "default_photo_dir")]
  pub photo_dir:         PathBuf,
  pub jwt_secret:        String,
  #[serde(default = "default_token_ttl_minutes")]
  pub token_ttl_minutes: i64,
  #[serde(default = "default_checkin_radius_m")]
  pub checkin_radius_m:  f64,
  #[serde(default = "default_max_photo_bytes")]
  pub max_photo_bytes:   usize,
  #[serde(default)]
  pub demo_login:        bool,
  #[serde(default)]
  pub demo_username:     Option<String>,
  #[serde(default)]
  pub geocoder:          GeocoderConfig,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }
fn default_database_path() -> PathBuf { PathBuf::from("~/.local/share/sfe/sfe.db") }
fn default_photo_dir() -> PathBuf { PathBuf::from("~/.local/share/sfe/photos") }
fn default_token_ttl_minutes() -> i64 { DEFAULT_TOKEN_TTL_MINUTES }
fn default_checkin_radius_m() -> f64 { DEFAULT_CHECKIN_RADIUS_M }
fn default_max_photo_bytes() -> usize { DEFAULT_MAX_PHOTO_BYTES }

impl ServerConfig {
  /// Read `path` (if it exists) and the environment. Nested keys use a
  /// double underscore: `SFE_GEOCODER__BASE_URL`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SFE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config from {}", path.display()))?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise server configuration")?;
    cfg.database_path = expand_tilde(&cfg.database_path);
    cfg.photo_dir = expand_tilde(&cfg.photo_dir);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn api_config(&self) -> ApiConfig {
    ApiConfig {
      jwt_secret:        self.jwt_secret.clone(),
      token_ttl_minutes: self.token_ttl_minutes,
      checkin_radius_m:  self.checkin_radius_m,
      max_photo_bytes:   self.max_photo_bytes,
      photo_dir:         self.photo_dir.clone(),
      demo_login:        self.demo_login,
      demo_username:     self.demo_username.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn file_values_and_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      r#"
jwt_secret = "0123456789abcdef0123456789abcdef"
port = 9100
photo_dir = "/srv/sfe/photos"
demo_login = true
demo_username = "demo-pharma.sr"

[geocoder]
base_url = "http://geocoder.internal"
"#
    )
    .unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.photo_dir, PathBuf::from("/srv/sfe/photos"));
    assert_eq!(cfg.token_ttl_minutes, 720);
    assert_eq!(cfg.checkin_radius_m, 200.0);
    assert!(cfg.demo_login);
    assert_eq!(cfg.geocoder.base_url, "http://geocoder.internal");
    assert_eq!(cfg.geocoder.timeout_secs, 10);

    let api = cfg.api_config();
    assert_eq!(api.demo_username.as_deref(), Some("demo-pharma.sr"));
    assert_eq!(api.max_photo_bytes, 10 * 1024 * 1024);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/sfe.db")), PathBuf::from(home).join("sfe.db"));
    assert_eq!(expand_tilde(Path::new("/abs/sfe.db")), PathBuf::from("/abs/sfe.db"));
  }
}
