//! Multipart upload extraction

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use visiongate_core::{AppError, UploadedBlob};

use crate::constants::UPLOAD_FIELD;

fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed size".to_string())
    } else {
        AppError::InvalidRequest(format!("{}: {}", context, err.body_text()))
    }
}

/// Extract the uploaded image from a multipart form.
/// Only one field named "file" is accepted; multiple file fields are rejected.
/// Other fields are ignored.
pub async fn extract_multipart_file(mut multipart: Multipart) -> Result<UploadedBlob, AppError> {
    let mut blob: Option<UploadedBlob> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart", e))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if blob.is_some() {
            return Err(AppError::InvalidRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file data", e))?;

        blob = Some(UploadedBlob::new(data, filename, content_type));
    }

    blob.ok_or_else(|| {
        AppError::InvalidRequest("No file provided; send the image in a field named 'file'".to_string())
    })
}
