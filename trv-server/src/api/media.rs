//! Media file serving
//!
//! Streams audio files from the configured media directory. The route is
//! `/media/*path` for the production variant and `/static/*path` for the
//! test variant; both resolve against the same directory.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::{Component, Path as FsPath, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;
use trv_common::Error;

use super::ApiError;
use crate::AppState;

/// Message returned for any file that cannot be served
pub const FILE_NOT_FOUND: &str = "Файл не найден";

/// GET /media/*path (or /static/*path)
pub async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let Some(full_path) = resolve_media_path(&state.config.media_dir, &path) else {
        debug!("Rejected media path: {}", path);
        return Err(file_not_found());
    };

    match tokio::fs::metadata(&full_path).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            debug!("Media file not found: {}", full_path.display());
            return Err(file_not_found());
        }
    }

    stream_file(&full_path, request).await
}

/// Stream `full_path` with a content type guessed from its extension
///
/// The file can vanish between the metadata check and the open; that
/// still answers with the localized not-found body.
async fn stream_file(full_path: &FsPath, request: Request) -> Result<Response, ApiError> {
    let response = ServeFile::new(full_path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    if response.status() == StatusCode::NOT_FOUND {
        debug!("Media file disappeared: {}", full_path.display());
        return Err(file_not_found());
    }

    Ok(response.into_response())
}

fn file_not_found() -> ApiError {
    Error::NotFound(FILE_NOT_FOUND.to_string()).into()
}

/// Join `requested` onto `base`, refusing anything that could leave `base`
///
/// Only plain path segments are accepted; `..`, absolute paths and drive
/// prefixes yield `None`.
pub fn resolve_media_path(base: &FsPath, requested: &str) -> Option<PathBuf> {
    let mut resolved = base.to_path_buf();
    let mut segments = 0;

    for component in FsPath::new(requested).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                segments += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (segments > 0).then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_filename() {
        let base = FsPath::new("/srv/media");
        assert_eq!(
            resolve_media_path(base, "sample.wav"),
            Some(PathBuf::from("/srv/media/sample.wav"))
        );
    }

    #[test]
    fn test_resolve_nested_path() {
        let base = FsPath::new("/srv/media");
        assert_eq!(
            resolve_media_path(base, "batch1/./sample.wav"),
            Some(PathBuf::from("/srv/media/batch1/sample.wav"))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let base = FsPath::new("/srv/media");
        assert_eq!(resolve_media_path(base, "../etc/passwd"), None);
        assert_eq!(resolve_media_path(base, "a/../../b"), None);
        assert_eq!(resolve_media_path(base, "/etc/passwd"), None);
    }

    #[tokio::test]
    async fn test_stream_missing_file_uses_localized_body() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .uri("/media/gone.wav")
            .body(axum::body::Body::empty())
            .unwrap();

        let err = stream_file(&dir.path().join("gone.wav"), request)
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::NotFound(msg) if msg == FILE_NOT_FOUND));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"RIFF0000WAVE").unwrap();
        let request = Request::builder()
            .uri("/media/clip.wav")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = stream_file(&path, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"RIFF0000WAVE");
    }

    #[test]
    fn test_resolve_rejects_empty() {
        let base = FsPath::new("/srv/media");
        assert_eq!(resolve_media_path(base, ""), None);
        assert_eq!(resolve_media_path(base, "."), None);
    }
}
