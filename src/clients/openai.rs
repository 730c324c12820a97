use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ensure_success, http_error, ClientError, TextGenerator};
use crate::config::ExternalConfig;

const SERVICE: &str = "text generation";

/// Chat-completion client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiTextGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTextGenerator {
    pub fn new(http: reqwest::Client, config: &ExternalConfig) -> Self {
        Self {
            http,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, prompt: &str, system_instruction: &str) -> Result<String, ClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClientError::NotConfigured("OPENAI_API_KEY"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        let parsed: ChatResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(http_error(SERVICE))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ClientError::InvalidResponse {
                service: SERVICE,
                message: "completion contained no content".to_string(),
            })
    }
}
