pub mod chat;
pub mod image;

pub use chat::{ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl};
pub use image::{ImageAttachment, ImageType};
