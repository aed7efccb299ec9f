use crate::config::UploadSettings;
use crate::services::proxy::TOO_MANY_IMAGES;
use crate::services::{ProxyError, ProxyRequest, TempUpload};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

pub const PROMPT_FIELD: &str = "prompt";
pub const IMAGE_FIELD: &str = "image";

/// `POST /api/openai`
///
/// Multipart form with a required `prompt` and an optional `image`.
/// Replies with the upstream chat-completion body unchanged.
pub async fn proxy_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = match multipart {
        Ok(multipart) => read_form(multipart, &state.config.upload).await?,
        Err(rejection) => {
            // Not a multipart body at all: nothing to read, so the prompt is missing.
            tracing::debug!(error = %rejection, "Request body is not multipart");
            ProxyRequest::default()
        }
    };

    let body = state.proxy.handle(request).await?;
    Ok(Json(body))
}

/// Parse the form, spooling the image to disk as it streams in.
///
/// Any upload already spooled is owned by the returned request (or dropped
/// with it on error), so early returns never leak files.
async fn read_form(
    mut multipart: Multipart,
    settings: &UploadSettings,
) -> Result<ProxyRequest, ProxyError> {
    let mut request = ProxyRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match name.as_str() {
            PROMPT_FIELD if file_name.is_none() => {
                request.prompt = Some(field.text().await.map_err(multipart_error)?);
            }
            // Browsers send an empty, nameless part when no file was chosen.
            IMAGE_FIELD if file_name.as_deref().is_some_and(|n| !n.is_empty()) => {
                if request.image.is_some() {
                    return Err(ProxyError::Validation(TOO_MANY_IMAGES.to_string()));
                }
                request.image = Some(spool_image(field, file_name.as_deref(), settings).await?);
            }
            _ => drain(field).await?,
        }
    }

    Ok(request)
}

async fn spool_image(
    mut field: Field<'_>,
    file_name: Option<&str>,
    settings: &UploadSettings,
) -> Result<TempUpload, ProxyError> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut upload = TempUpload::create(&settings.dir, &content_type, file_name)
        .await
        .map_err(|e| ProxyError::Internal(anyhow::anyhow!("Failed to store upload: {}", e)))?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if upload.size() + chunk.len() > settings.max_file_bytes {
            tracing::info!(
                limit = settings.max_file_bytes,
                "Rejected upload exceeding size limit"
            );
            return Err(too_large(settings.max_file_bytes));
        }
        upload
            .write_chunk(&chunk)
            .await
            .map_err(|e| ProxyError::Internal(anyhow::anyhow!("Failed to store upload: {}", e)))?;
    }

    upload
        .finish()
        .await
        .map_err(|e| ProxyError::Internal(anyhow::anyhow!("Failed to store upload: {}", e)))?;

    tracing::debug!(
        size = upload.size(),
        content_type = %upload.content_type(),
        file_name = upload.file_name().unwrap_or_default(),
        "Spooled image upload"
    );

    Ok(upload)
}

async fn drain(mut field: Field<'_>) -> Result<(), ProxyError> {
    while field.chunk().await.map_err(multipart_error)?.is_some() {}
    Ok(())
}

fn too_large(limit: usize) -> ProxyError {
    ProxyError::PayloadTooLarge(format!(
        "Image exceeds the {} MiB upload limit",
        limit / (1024 * 1024)
    ))
}

fn multipart_error(err: MultipartError) -> ProxyError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ProxyError::PayloadTooLarge("Request body too large".to_string());
    }
    ProxyError::Validation(format!("Invalid form data: {}", err.body_text()))
}
