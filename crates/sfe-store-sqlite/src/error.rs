//! Error type for `sfe-store-sqlite`.

use rusqlite::ffi;
use sfe_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sfe_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An update addressed a row that does not exist.
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: uuid::Uuid },

  /// A unique index rejected the write, or a guarded update matched no row
  /// because the record changed after it was read.
  #[error("conflict: {0}")]
  Conflict(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message))
        if is_unique_violation(&failure) =>
      {
        Error::Conflict(message.unwrap_or_else(|| failure.to_string()))
      }
      e => Error::Database(e),
    }
  }
}

fn is_unique_violation(failure: &ffi::Error) -> bool {
  matches!(
    failure.extended_code,
    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Error::Conflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
