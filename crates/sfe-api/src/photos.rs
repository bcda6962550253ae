//! Handlers for visit photos.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/reports/{id}/photos` | Metadata of the report's photos |
//! | `POST`   | `/reports/{id}/photos` | Multipart, one `file` part; owner only; draft reports only |
//! | `GET`    | `/photos/{id}` | Metadata |
//! | `GET`    | `/photos/{id}/raw` | The stored bytes with their media type |
//! | `DELETE` | `/photos/{id}` | Owner only; draft reports only |
//!
//! Files live under the configured photo directory as
//! `<first two hex digits>/<sha256>.<ext>`. Identical uploads share a file,
//! which is removed once no photo row references its hash.

use std::path::{Path as FsPath, PathBuf};

use axum::{
  Json,
  extract::{Multipart, Path, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use sfe_core::{
  store::SalesStore,
  visit::{CallReport, Photo},
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Session, error::ApiError, scope};

// ─── Media types ──────────────────────────────────────────────────────────────

/// An accepted image format, recognised by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
  Jpeg,
  Png,
  Webp,
}

impl ImageKind {
  pub fn sniff(data: &[u8]) -> Option<Self> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
      Some(ImageKind::Jpeg)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
      Some(ImageKind::Png)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
      Some(ImageKind::Webp)
    } else {
      None
    }
  }

  pub fn media_type(self) -> &'static str {
    match self {
      ImageKind::Jpeg => "image/jpeg",
      ImageKind::Png => "image/png",
      ImageKind::Webp => "image/webp",
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      ImageKind::Jpeg => "jpg",
      ImageKind::Png => "png",
      ImageKind::Webp => "webp",
    }
  }
}

/// Storage path of a file relative to the photo directory.
fn relative_path(hash: &str, kind: ImageKind) -> String {
  format!("{}/{hash}.{}", &hash[..2], kind.extension())
}

// ─── File handling ────────────────────────────────────────────────────────────

async fn write_file(photo_dir: &FsPath, relative: &str, data: &[u8]) -> Result<(), ApiError> {
  let target = photo_dir.join(relative);
  if tokio::fs::try_exists(&target).await.unwrap_or(false) {
    return Ok(());
  }
  if let Some(parent) = target.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| ApiError::Internal(format!("creating {}: {e}", parent.display())))?;
  }

  // Write then rename so a concurrent reader never sees a partial file.
  let staging = target.with_extension(format!("{}.part", Uuid::new_v4().simple()));
  tokio::fs::write(&staging, data)
    .await
    .map_err(|e| ApiError::Internal(format!("writing {}: {e}", staging.display())))?;
  tokio::fs::rename(&staging, &target)
    .await
    .map_err(|e| ApiError::Internal(format!("renaming {}: {e}", staging.display())))?;
  Ok(())
}

/// Remove the file behind `photo` once no photo row references its hash.
/// Called after the row itself is gone; failures are logged only.
pub(crate) async fn release_file<S: SalesStore>(store: &S, photo_dir: &FsPath, photo: &Photo) {
  match store.count_photos_with_hash(&photo.content_hash).await {
    Ok(0) => {}
    Ok(_) => return,
    Err(e) => {
      warn!(photo_id = %photo.photo_id, error = %e, "could not count photo references");
      return;
    }
  }
  let path: PathBuf = photo_dir.join(&photo.path);
  match tokio::fs::remove_file(&path).await {
    Ok(()) => info!(path = %path.display(), "photo file removed"),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => warn!(path = %path.display(), error = %e, "could not remove photo file"),
  }
}

fn ensure_owner(session: &Session, report: &CallReport) -> Result<(), ApiError> {
  if report.sr_id == session.user_id() {
    Ok(())
  } else {
    Err(ApiError::Forbidden("only the report's owner may change its photos".into()))
  }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// `GET /reports/{id}/photos`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(report_id): Path<Uuid>,
) -> Result<Json<Vec<Photo>>, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  scope::report(store, &session, report_id).await?;
  let photos = store.list_photos(report_id).await.map_err(ApiError::store)?;
  Ok(Json(photos))
}

/// `POST /reports/{id}/photos`
pub async fn upload<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(report_id): Path<Uuid>,
  mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let report = scope::report(store, &session, report_id).await?;
  ensure_owner(&session, &report)?;
  report.ensure_photo_editable()?;

  let mut data: Option<Bytes> = None;
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some("file") {
      data = Some(field.bytes().await?);
      break;
    }
  }
  let data = data.ok_or_else(|| ApiError::BadRequest("missing multipart part `file`".into()))?;

  let max = state.config.max_photo_bytes;
  if data.len() > max {
    return Err(ApiError::PayloadTooLarge(format!(
      "photo is {} bytes; the limit is {max}",
      data.len()
    )));
  }
  if data.is_empty() {
    return Err(ApiError::BadRequest("photo is empty".into()));
  }
  let kind = ImageKind::sniff(&data).ok_or_else(|| {
    ApiError::UnsupportedMediaType("photos must be JPEG, PNG or WebP images".into())
  })?;

  let hash = hex::encode(Sha256::digest(&data));
  let path = relative_path(&hash, kind);
  write_file(&state.config.photo_dir, &path, &data).await?;

  let photo = Photo {
    photo_id: Uuid::new_v4(),
    report_id,
    company_id: session.company_id(),
    path,
    content_hash: hash,
    media_type: kind.media_type().to_owned(),
    size_bytes: data.len() as u64,
    uploaded_by: session.user_id(),
    uploaded_at: Utc::now(),
  };
  // The report may have been submitted since it was loaded.
  if let Err(e) = store.add_photo(&photo).await {
    release_file(store, &state.config.photo_dir, &photo).await;
    return Err(ApiError::store(e));
  }

  info!(
    photo_id = %photo.photo_id,
    report_id = %report_id,
    bytes = photo.size_bytes,
    media_type = %photo.media_type,
    "photo uploaded"
  );
  Ok((StatusCode::CREATED, Json(photo)))
}

/// `GET /photos/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<Json<Photo>, ApiError>
where
  S: SalesStore + 'static,
{
  let (photo, _) = scope::photo(state.store.as_ref(), &session, id).await?;
  Ok(Json(photo))
}

/// `GET /photos/{id}/raw`
pub async fn raw<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SalesStore + 'static,
{
  let (photo, _) = scope::photo(state.store.as_ref(), &session, id).await?;
  let path = state.config.photo_dir.join(&photo.path);
  let data = match tokio::fs::read(&path).await {
    Ok(data) => data,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      warn!(photo_id = %id, path = %path.display(), "photo file missing");
      return Err(ApiError::not_found("photo file", id));
    }
    Err(e) => return Err(ApiError::Internal(format!("reading {}: {e}", path.display()))),
  };

  Ok((
    [
      (header::CONTENT_TYPE, photo.media_type),
      (header::CACHE_CONTROL, "private, max-age=86400".to_owned()),
    ],
    Bytes::from(data),
  ))
}

/// `DELETE /photos/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SalesStore + 'static,
{
  let store = state.store.as_ref();
  let (photo, report) = scope::photo(store, &session, id).await?;
  ensure_owner(&session, &report)?;
  report.ensure_photo_editable()?;

  store.delete_photo(id).await.map_err(ApiError::store)?;
  release_file(store, &state.config.photo_dir, &photo).await;

  info!(photo_id = %id, report_id = %report.report_id, "photo deleted");
  Ok(StatusCode::NO_CONTENT)
}
