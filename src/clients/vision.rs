use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, http_error, ClientError, ImageAnalysis, VisionAnalyzer};
use crate::config::ExternalConfig;

const SERVICE: &str = "vision";

/// Google Cloud Vision over its REST `images:annotate` endpoint. Label,
/// object and text detection are requested in a single batch.
pub struct GoogleVisionAnalyzer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleVisionAnalyzer {
    pub fn new(http: reqwest::Client, config: &ExternalConfig) -> Self {
        Self {
            http,
            base_url: config.vision_base_url.trim_end_matches('/').to_string(),
            api_key: config.vision_api_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<LocalizedObjectAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LocalizedObjectAnnotation {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl From<AnnotateImageResponse> for ImageAnalysis {
    fn from(r: AnnotateImageResponse) -> Self {
        ImageAnalysis {
            labels: r.label_annotations.into_iter().map(|a| a.description).collect(),
            objects: r
                .localized_object_annotations
                .into_iter()
                .map(|o| o.name)
                .collect(),
            // The first text annotation is the full detected text block.
            text: r
                .text_annotations
                .into_iter()
                .take(1)
                .map(|a| a.description)
                .collect(),
        }
    }
}

#[async_trait]
impl VisionAnalyzer for GoogleVisionAnalyzer {
    async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, ClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClientError::NotConfigured("GOOGLE_VISION_API_KEY"))?;

        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [
                    { "type": "LABEL_DETECTION" },
                    { "type": "OBJECT_LOCALIZATION" },
                    { "type": "TEXT_DETECTION" },
                ],
            }],
        });

        let response = self
            .http
            .post(format!("{}/v1/images:annotate", self.base_url))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        let parsed: AnnotateResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(http_error(SERVICE))?;

        let first = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(status) = &first.error {
            return Err(ClientError::Status {
                service: SERVICE,
                status: status.code,
                message: status.message.clone(),
            });
        }

        Ok(first.into())
    }
}
