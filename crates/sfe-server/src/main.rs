//! `sfe`: the SFE backend server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers `SFE_*`
//! environment variables over it, opens the SQLite store and serves the JSON
//! API under `/api`.
//!
//! ```text
//! sfe serve
//! sfe hash-password          # reads a password from stdin
//! sfe seed --company "Demo Pharma" --password demo-password
//! ```

mod seed;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::{Json, Router, routing::get};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sfe_api::{AppState, api_router, auth::hash_password, geocode::Geocoder};
use sfe_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Parser)]
#[command(author, version, about = "Sales force effectiveness backend")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API.
  Serve,
  /// Print the argon2 hash of a password read from stdin.
  HashPassword,
  /// Create a demo company with users and customers; does nothing if the
  /// company already exists.
  Seed {
    #[arg(long, default_value = "Demo Pharma")]
    company:  String,
    /// Password shared by the demo users.
    #[arg(long, default_value = "demo-password")]
    password: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => {
      let password = read_password()?;
      println!("{}", hash_password(&password)?);
      Ok(())
    }
    Command::Seed { company, password } => {
      let cfg = ServerConfig::load(&cli.config)?;
      let store = open_store(&cfg).await?;
      let hash = hash_password(&password)?;
      match seed::run(&store, &company, &hash).await? {
        seed::Outcome::Created { users } => {
          println!("created {company:?} with users: {}", users.join(", "));
        }
        seed::Outcome::AlreadySeeded => println!("{company:?} already exists; nothing to do"),
      }
      Ok(())
    }
    Command::Serve => serve(ServerConfig::load(&cli.config)?).await,
  }
}

async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  if let Some(parent) = cfg.database_path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  if cfg.jwt_secret.len() < MIN_SECRET_BYTES {
    warn!("jwt_secret is shorter than {MIN_SECRET_BYTES} bytes; use a longer random value");
  }
  if cfg.demo_login {
    warn!(user = ?cfg.demo_username, "demo login is enabled");
  }

  let store = open_store(&cfg).await?;
  tokio::fs::create_dir_all(&cfg.photo_dir)
    .await
    .with_context(|| format!("failed to create photo directory {:?}", cfg.photo_dir))?;
  let geocoder = Geocoder::new(cfg.geocoder.clone()).context("failed to build geocoder client")?;

  let state = AppState::new(Arc::new(store), cfg.api_config(), geocoder);
  let app = Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(state));

  let address = cfg.address();
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

#[derive(Serialize)]
struct Health {
  status:  &'static str,
  version: &'static str,
}

async fn health() -> Json<Health> {
  Json(Health { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

/// Read one line from stdin, without the trailing newline.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
