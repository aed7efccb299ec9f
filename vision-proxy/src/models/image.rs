use base64::{engine::general_purpose::STANDARD, Engine};

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
}

impl ImageType {
    /// Classify a declared content type. `image/jpg` is a common
    /// non-standard alias and is accepted alongside `image/jpeg`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageType::Jpeg),
            "image/png" => Some(ImageType::Png),
            _ => None,
        }
    }

    /// Canonical MIME type sent upstream, whatever alias or parameters
    /// the client declared.
    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
        }
    }
}

/// An uploaded image, already encoded for the upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
}

impl ImageAttachment {
    pub fn from_bytes(image_type: ImageType, bytes: &[u8]) -> Self {
        Self {
            data_uri: format!("data:{};base64,{}", image_type.mime(), STANDARD.encode(bytes)),
        }
    }
}
