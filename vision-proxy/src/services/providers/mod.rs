//! Upstream chat-completion provider abstraction.
//!
//! The proxy only ever talks to a [`ChatProvider`], so tests can swap the
//! real OpenAI client for [`mock::MockChatProvider`] without network I/O.

pub mod mock;
pub mod openai;

use crate::models::ImageAttachment;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Api { .. } => "api_error",
            ProviderError::Network(_) => "network",
            ProviderError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// A multimodal chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one user turn (prompt plus optional image) and return the
    /// upstream JSON body unchanged.
    async fn submit(
        &self,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;
}
