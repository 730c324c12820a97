//! Outbound collaborators used by advertisement generation. Each one sits
//! behind a narrow trait so the handler can be driven by fakes in tests.

mod image_search;
mod openai;
mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExternalConfig;

pub use image_search::GoogleImageSearch;
pub use openai::OpenAiTextGenerator;
pub use vision::GoogleVisionAnalyzer;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// What the vision service recognised in an uploaded image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub labels: Vec<String>,
    pub objects: Vec<String>,
    /// The main text block, when any text was detected.
    pub text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSearchParams {
    pub num: u8,
    pub img_size: String,
    pub img_color_type: String,
}

impl Default for ImageSearchParams {
    fn default() -> Self {
        Self {
            num: 2,
            img_size: "medium".to_string(),
            img_color_type: "color".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSearchResult {
    pub url: String,
    pub title: Option<String>,
    /// Where the image was downloaded to, if the download succeeded.
    pub path: Option<PathBuf>,
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, ClientError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system_instruction: &str) -> Result<String, ClientError>;
}

#[async_trait]
pub trait ImageSearcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        params: &ImageSearchParams,
    ) -> Result<Vec<ImageSearchResult>, ClientError>;
}

pub type DynVisionAnalyzer = Arc<dyn VisionAnalyzer>;
pub type DynTextGenerator = Arc<dyn TextGenerator>;
pub type DynImageSearcher = Arc<dyn ImageSearcher>;

/// The three collaborators bundled for injection into the app state.
#[derive(Clone)]
pub struct Collaborators {
    pub vision: DynVisionAnalyzer,
    pub text: DynTextGenerator,
    pub search: DynImageSearcher,
}

impl Collaborators {
    /// Builds the production clients, all sharing one HTTP connection pool.
    pub fn from_config(config: &ExternalConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("listing-service/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            vision: Arc::new(GoogleVisionAnalyzer::new(http.clone(), config)),
            text: Arc::new(OpenAiTextGenerator::new(http.clone(), config)),
            search: Arc::new(GoogleImageSearch::new(http, config)),
        })
    }
}

/// Turns a non-2xx response into [`ClientError::Status`], preferring the
/// provider's `error.message` over the raw body.
async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    Err(ClientError::Status {
        service,
        status: status.as_u16(),
        message,
    })
}

fn http_error(service: &'static str) -> impl FnOnce(reqwest::Error) -> ClientError {
    move |source| ClientError::Http { service, source }
}
