//! Anthropic Messages API adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::Provider;
use crate::error::{CoreError, NetworkError};

use super::http::{anthropic_headers, classify_failure, request_error, shared_client};
use super::TextAdapter;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug)]
pub struct AnthropicAdapter {
    model_id: String,
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(model_id: String, api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model_id,
            api_key,
            client: shared_client().clone(),
        }
    }

    fn build_request_body(&self, text: &str, instruction: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model_id,
            "max_tokens": MAX_TOKENS,
            "system": instruction,
            "messages": [
                {"role": "user", "content": text},
            ],
        })
    }
}

#[async_trait]
impl TextAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn process(&self, text: &str, instruction: &str) -> Result<String, CoreError> {
        let body = self.build_request_body(text, instruction);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %self.model_id, "Anthropic process");

        let resp = self
            .client
            .post(&url)
            .headers(anthropic_headers(self.api_key.expose_secret(), API_VERSION))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(classify_failure(Provider::Anthropic, resp).await);
        }

        let data: MessagesResponse = resp.json().await.map_err(|_| {
            CoreError::Network(NetworkError::InvalidResponse(
                "malformed response body".to_string(),
            ))
        })?;

        let text = data
            .content
            .into_iter()
            .filter(|block| block.r#type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(
                NetworkError::InvalidResponse("no text content in response".to_string()).into(),
            );
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}
