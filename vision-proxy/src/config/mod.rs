use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Upstream chat-completion endpoint root (OpenAI-compatible).
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Vision-capable model used for every request.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Maximum output tokens requested from the upstream API.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Wall-clock budget for a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Per-file upload cap (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub common: core_config::Config,
    pub openai: OpenAiSettings,
    pub upload: UploadSettings,
    /// Directory holding the front-end page and its assets.
    pub static_dir: PathBuf,
    /// OTLP collector; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl OpenAiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Where in-flight uploads are spooled before encoding.
    pub dir: PathBuf,
    pub max_file_bytes: usize,
}

impl ProxyConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ProxyConfig {
            common: common_config,
            openai: OpenAiSettings {
                api_key: Secret::new(get_required_secret("OPENAI_API_KEY")?),
                base_url: get_env("OPENAI_BASE_URL", Some(DEFAULT_OPENAI_BASE_URL), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                model: get_env("OPENAI_MODEL", Some(DEFAULT_OPENAI_MODEL), is_prod)?,
                max_tokens: parse_env(
                    "OPENAI_MAX_TOKENS",
                    &get_env(
                        "OPENAI_MAX_TOKENS",
                        Some(&DEFAULT_MAX_TOKENS.to_string()),
                        is_prod,
                    )?,
                )?,
                timeout_secs: parse_env(
                    "OPENAI_TIMEOUT_SECS",
                    &get_env(
                        "OPENAI_TIMEOUT_SECS",
                        Some(&DEFAULT_UPSTREAM_TIMEOUT_SECS.to_string()),
                        is_prod,
                    )?,
                )?,
            },
            upload: UploadSettings {
                dir: PathBuf::from(get_env("UPLOAD_DIR", Some("uploads"), is_prod)?),
                max_file_bytes: MAX_UPLOAD_BYTES,
            },
            static_dir: PathBuf::from(get_env("STATIC_DIR", Some("public"), is_prod)?),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// The credential has no default in any environment, and an empty value
/// counts as missing.
fn get_required_secret(key: &str) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "Missing {} in environment variables",
            key
        ))),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_accepts_numbers() {
        let value: u32 = parse_env("OPENAI_MAX_TOKENS", " 1000 ").unwrap();
        assert_eq!(value, 1000);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        let result: Result<u64, _> = parse_env("OPENAI_TIMEOUT_SECS", "soon");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_get_env_falls_back_to_default_outside_prod() {
        let value = get_env("VISION_PROXY_TEST_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn test_get_env_requires_value_in_prod() {
        let result = get_env("VISION_PROXY_TEST_UNSET_KEY", Some("fallback"), true);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let result = get_required_secret("VISION_PROXY_TEST_UNSET_SECRET");
        let err = result.unwrap_err();
        assert!(err
            .to_string()
            .contains("Missing VISION_PROXY_TEST_UNSET_SECRET"));
    }
}
