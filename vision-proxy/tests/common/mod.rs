//! Test helpers shared by the vision-proxy integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::path::Path;
use tempfile::TempDir;
use vision_proxy::config::{
    OpenAiSettings, ProxyConfig, UploadSettings, DEFAULT_MAX_TOKENS, DEFAULT_OPENAI_MODEL,
    MAX_UPLOAD_BYTES,
};

pub const BOUNDARY: &str = "vision-proxy-test-boundary";

pub const TEST_API_KEY: &str = "sk-test-not-a-real-key";

/// Scratch directories for one test; removed when dropped.
pub struct TestDirs {
    pub uploads: TempDir,
    pub public: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        let public = tempfile::tempdir().expect("Failed to create static dir");
        std::fs::write(
            public.path().join("index.html"),
            "<!DOCTYPE html><title>Vision Proxy</title>",
        )
        .expect("Failed to write index.html");

        Self {
            uploads: tempfile::tempdir().expect("Failed to create upload dir"),
            public,
        }
    }

    /// True when no upload file is left behind.
    pub fn uploads_empty(&self) -> bool {
        dir_is_empty(self.uploads.path())
    }
}

pub fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

pub fn test_config(dirs: &TestDirs, base_url: &str) -> ProxyConfig {
    ProxyConfig {
        common: CoreConfig { port: 0 },
        openai: OpenAiSettings {
            api_key: Secret::new(TEST_API_KEY.to_string()),
            base_url: base_url.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 30,
        },
        upload: UploadSettings {
            dir: dirs.uploads.path().to_path_buf(),
            max_file_bytes: MAX_UPLOAD_BYTES,
        },
        static_dir: dirs.public.path().to_path_buf(),
        otlp_endpoint: None,
    }
}

/// One part of a hand-built multipart body.
pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn form_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/openai")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// A JPEG-looking payload of `len` bytes.
pub fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(len, 0x5A);
    data
}

/// A canned chat-completion response.
pub fn completion_body() -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "A cat on a sofa." },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18 }
    })
}
