//! Mock provider implementation for testing.

use super::{ChatProvider, ProviderError};
use crate::models::{ChatMessage, ImageAttachment};
use async_trait::async_trait;
use std::sync::Mutex;

enum Reply {
    Respond(serde_json::Value),
    Fail(ProviderError),
}

/// Records every outbound message and answers with a canned reply.
pub struct MockChatProvider {
    reply: Reply,
    calls: Mutex<Vec<ChatMessage>>,
}

impl MockChatProvider {
    /// Reply to every call with `body`.
    pub fn responding(body: serde_json::Value) -> Self {
        Self {
            reply: Reply::Respond(body),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            reply: Reply::Fail(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Messages received so far, in call order.
    pub fn calls(&self) -> Vec<ChatMessage> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn submit(
        &self,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<serde_json::Value, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ChatMessage::user(prompt, image));
        }

        match &self.reply {
            Reply::Respond(body) => Ok(body.clone()),
            Reply::Fail(error) => Err(error.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
