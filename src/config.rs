use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the service against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub media_url: String,
    pub max_upload_bytes: usize,
    pub external: ExternalConfig,
}

/// Credentials and endpoints for the outbound collaborators.
#[derive(Debug, Clone)]
pub struct ExternalConfig {
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub images_path: PathBuf,
    pub vision_api_key: Option<String>,
    pub vision_base_url: String,
    pub search_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let google_api_key = optional("GOOGLE_API_KEY");

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            media_root: std::env::var("MEDIA_ROOT")
                .unwrap_or_else(|_| "media".to_string())
                .into(),
            media_url: std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .context("MAX_UPLOAD_BYTES must be a valid number")?,
            external: ExternalConfig {
                vision_api_key: optional("GOOGLE_VISION_API_KEY").or_else(|| google_api_key.clone()),
                google_api_key,
                google_cx: optional("GOOGLE_CX"),
                images_path: std::env::var("IMAGES_PATH")
                    .unwrap_or_else(|_| "images".to_string())
                    .into(),
                vision_base_url: std::env::var("GOOGLE_VISION_BASE_URL")
                    .unwrap_or_else(|_| "https://vision.googleapis.com".to_string()),
                search_base_url: std::env::var("GOOGLE_SEARCH_BASE_URL")
                    .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
                openai_api_key: optional("OPENAI_API_KEY"),
                openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
                openai_base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                timeout: Duration::from_secs(
                    std::env::var("EXTERNAL_TIMEOUT_SECS")
                        .unwrap_or_else(|_| "60".to_string())
                        .parse()
                        .context("EXTERNAL_TIMEOUT_SECS must be a valid number")?,
                ),
            },
        })
    }
}

/// Reads an env var, treating an empty value the same as an unset one.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
impl ExternalConfig {
    /// Points every collaborator at `base_url` with dummy credentials.
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            google_api_key: Some("search-key".to_string()),
            google_cx: Some("engine-id".to_string()),
            images_path: std::env::temp_dir().join(format!("listing-images-{}", uuid::Uuid::new_v4())),
            vision_api_key: Some("vision-key".to_string()),
            vision_base_url: base_url.to_string(),
            search_base_url: base_url.to_string(),
            openai_api_key: Some("openai-key".to_string()),
            openai_model: "gpt-4".to_string(),
            openai_base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}
