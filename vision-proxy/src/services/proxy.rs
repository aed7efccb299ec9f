//! Core request handling, independent of the HTTP layer.
//!
//! The axum handler turns a multipart body into a [`ProxyRequest`]; this
//! module validates it, encodes the image and calls the upstream provider.
//! Failures come back as a tagged [`ProxyError`] which the handler maps to
//! a status code.

use super::metrics;
use super::providers::{ChatProvider, ProviderError};
use super::upload::TempUpload;
use crate::models::ImageType;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const PROMPT_REQUIRED: &str = "Prompt is required";
pub const UNSUPPORTED_IMAGE_TYPE: &str = "Only JPEG/PNG images are allowed";
pub const TOO_MANY_IMAGES: &str = "Only one image may be uploaded";

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Bad client input; never reaches the upstream API.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Validation(msg) => AppError::BadRequest(msg),
            ProxyError::PayloadTooLarge(msg) => AppError::PayloadTooLarge(msg),
            ProxyError::Upstream(e) => AppError::InternalError(anyhow::Error::new(e)),
            ProxyError::Internal(e) => AppError::InternalError(e),
        }
    }
}

/// One parsed inbound request.
#[derive(Default)]
pub struct ProxyRequest {
    pub prompt: Option<String>,
    pub image: Option<TempUpload>,
}

#[derive(Clone)]
pub struct ProxyService {
    provider: Arc<dyn ChatProvider>,
}

impl ProxyService {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Validate, encode and forward one request.
    ///
    /// The upload is owned by this call and dropped (deleting the file) on
    /// every return path.
    pub async fn handle(&self, request: ProxyRequest) -> Result<serde_json::Value, ProxyError> {
        let ProxyRequest { prompt, image } = request;

        let prompt = match prompt {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => return Err(ProxyError::Validation(PROMPT_REQUIRED.to_string())),
        };

        let attachment = match image {
            Some(upload) => {
                let Some(image_type) = ImageType::from_content_type(upload.content_type()) else {
                    tracing::info!(
                        content_type = %upload.content_type(),
                        "Rejected upload with unsupported content type"
                    );
                    return Err(ProxyError::Validation(UNSUPPORTED_IMAGE_TYPE.to_string()));
                };

                let size = upload.size();
                let attachment = upload.into_attachment(image_type).await.map_err(|e| {
                    ProxyError::Internal(anyhow::anyhow!("Failed to read uploaded image: {}", e))
                })?;
                metrics::record_image_bytes(size);
                Some(attachment)
            }
            None => None,
        };

        let provider = self.provider.name();
        let start = Instant::now();
        let result = self.provider.submit(&prompt, attachment.as_ref()).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    provider,
                    has_image = attachment.is_some(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Upstream request completed"
                );
                metrics::record_upstream(provider, "success", elapsed);
            }
            Err(e) => {
                tracing::error!(
                    provider,
                    error = %e,
                    error_detail = ?e,
                    latency_ms = elapsed.as_millis() as u64,
                    "Upstream request failed"
                );
                metrics::record_upstream(provider, e.kind(), elapsed);
            }
        }

        result.map_err(ProxyError::from)
    }
}
