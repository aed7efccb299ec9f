//! Wire types for the OpenAI-compatible chat-completion API.
//!
//! Only the request side is modelled; responses are forwarded untouched
//! as `serde_json::Value`.

use super::ImageAttachment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    /// Build the single user turn sent upstream.
    ///
    /// The prompt always comes first; the image part follows only when an
    /// attachment is present.
    pub fn user(prompt: &str, image: Option<&ImageAttachment>) -> Self {
        let mut content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];

        if let Some(image) = image {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_uri.clone(),
                },
            });
        }

        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}
