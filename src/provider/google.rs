//! Google Gemini generateContent adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::Provider;
use crate::error::{CoreError, NetworkError};

use super::http::{classify_failure, google_headers, request_error, shared_client};
use super::TextAdapter;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub struct GoogleAdapter {
    model_id: String,
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleAdapter {
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
            "systemInstruction": {
                "parts": [{"text": instruction}],
            },
            "contents": [
                {"role": "user", "parts": [{"text": text}]},
            ],
        })
    }
}

#[async_trait]
impl TextAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn process(&self, text: &str, instruction: &str) -> Result<String, CoreError> {
        let body = self.build_request_body(text, instruction);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);

        debug!(model = %self.model_id, "Google process");

        let resp = self
            .client
            .post(&url)
            .headers(google_headers(self.api_key.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(classify_failure(Provider::Google, resp).await);
        }

        let data: GenerateContentResponse = resp.json().await.map_err(|_| {
            CoreError::Network(NetworkError::InvalidResponse(
                "malformed response body".to_string(),
            ))
        })?;

        let candidate = data.candidates.into_iter().next().ok_or_else(|| {
            NetworkError::InvalidResponse("no candidates in response".to_string())
        })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(
                NetworkError::InvalidResponse("no text content in response".to_string()).into(),
            );
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
