//! OpenAI Chat Completions adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::Provider;
use crate::error::{CoreError, NetworkError};

use super::http::{bearer_headers, classify_failure, request_error, shared_client};
use super::TextAdapter;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug)]
pub struct OpenAiAdapter {
    model_id: String,
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(model_id: String, api_key: SecretString, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model_id,
            api_key,
            client: shared_client().clone(),
        }
    }

    #[cfg(test)]
    fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.client = super::http::client_with_timeout(timeout);
        self
    }

    fn build_request_body(&self, text: &str, instruction: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model_id,
            "messages": [
                {"role": "system", "content": instruction},
                {"role": "user", "content": text},
            ],
        })
    }
}

#[async_trait]
impl TextAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn process(&self, text: &str, instruction: &str) -> Result<String, CoreError> {
        let body = self.build_request_body(text, instruction);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model_id, "OpenAI process");

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(self.api_key.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(classify_failure(Provider::OpenAi, resp).await);
        }

        let data: ChatResponse = resp.json().await.map_err(|_| {
            CoreError::Network(NetworkError::InvalidResponse(
                "malformed response body".to_string(),
            ))
        })?;

        let choice = data.choices.into_iter().next().ok_or_else(|| {
            NetworkError::InvalidResponse("no choices in response".to_string())
        })?;

        choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                NetworkError::InvalidResponse("empty completion".to_string()).into()
            })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}
