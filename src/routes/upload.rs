use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
/// Multipart framing on top of the largest accepted file.
pub const MAX_BODY_SIZE: usize = MAX_FILE_SIZE + 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

/// Image type detected from the file signature, regardless of the client's
/// filename or content type.
fn detect_image_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(("image/jpeg", "jpg")),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(("image/png", "png")),
        [0x47, 0x49, 0x46, 0x38, ..] => Some(("image/gif", "gif")),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => {
            Some(("image/webp", "webp"))
        }
        _ => None,
    }
}

/// POST /api/upload
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "invalid multipart upload");
            ApiError::BadRequest("Invalid multipart data".to_string())
        })?
        .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let bytes = field.bytes().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to read upload bytes");
        ApiError::BadRequest("Failed to read file data".to_string())
    })?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty file".to_string()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }
    let (mime_type, ext) = detect_image_type(&bytes).ok_or_else(|| {
        ApiError::BadRequest("Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.".to_string())
    })?;

    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload directory: {}", e)))?;

    let filename = format!("{}.{}", Uuid::new_v4(), ext);
    tokio::fs::write(upload_dir.join(&filename), &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to save upload: {}", e)))?;

    tracing::info!(filename = %filename, size = bytes.len(), "image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/uploads/{}", filename),
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};

    use crate::routes::test_support::{request, send, test_app};

    const BOUNDARY: &str = "storefront-boundary";

    fn multipart_request(filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_detect_image_type() {
        assert_eq!(
            detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(("image/jpeg", "jpg"))
        );
        assert_eq!(
            detect_image_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D]),
            Some(("image/png", "png"))
        );
        assert_eq!(
            detect_image_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(("image/webp", "webp"))
        );
        assert_eq!(detect_image_type(b"<svg></svg>"), None);
        assert_eq!(detect_image_type(&[0xFF]), None);
    }

    #[tokio::test]
    async fn test_upload_stores_and_serves_image() {
        let t = test_app();
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01];

        let (status, _, body) = send(&t.app, multipart_request("photo.png", &png)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["mimeType"], "image/png");
        assert_eq!(body["size"], png.len());
        let url = body["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

        let stored = t.state.config.upload_dir.join(body["filename"].as_str().unwrap());
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), png);

        let res = tower::ServiceExt::oneshot(
            t.app.clone(),
            request(Method::GET, &url, None, None),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let _ = tokio::fs::remove_dir_all(&t.state.config.upload_dir).await;
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let t = test_app();
        let (status, _, body) =
            send(&t.app, multipart_request("evil.png", b"<?php echo 1; ?>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Unsupported"));
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let t = test_app();
        let mut big = vec![0u8; MAX_FILE_SIZE + 1];
        big[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        let (status, _, _) = send(&t.app, multipart_request("big.jpg", &big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
