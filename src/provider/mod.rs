//! Client adapter trait and implementations, one per provider.
//!
//! An adapter translates a generic `(text, instruction)` request into its
//! provider's wire format, issues one HTTPS request, and maps the response
//! into a plain string or a classified [`CoreError`]. Secrets never appear
//! in adapter errors, debug output, or request descriptions.

pub mod anthropic;
pub mod google;
pub mod http;
pub mod openai;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::catalog::Provider;
use crate::error::CoreError;

/// Core trait implemented by all provider adapters.
#[async_trait]
pub trait TextAdapter: Send + Sync {
    /// Which provider this adapter speaks to.
    fn provider(&self) -> Provider;

    /// The model ID this adapter instance targets.
    fn model_id(&self) -> &str;

    /// Apply `instruction` to `text` via one provider round trip.
    async fn process(&self, text: &str, instruction: &str) -> Result<String, CoreError>;

    /// Minimal live round trip confirming the key is currently accepted.
    async fn validate(&self) -> Result<(), CoreError> {
        self.process("Hi", "Reply with the single word OK.")
            .await
            .map(|_| ())
    }
}

/// Create the adapter for a provider/model pair.
pub fn create_adapter(
    provider: Provider,
    model_id: impl Into<String>,
    api_key: SecretString,
    base_url: Option<String>,
) -> Box<dyn TextAdapter> {
    let model_id = model_id.into();
    match provider {
        Provider::OpenAi => Box::new(openai::OpenAiAdapter::new(model_id, api_key, base_url)),
        Provider::Anthropic => {
            Box::new(anthropic::AnthropicAdapter::new(model_id, api_key, base_url))
        }
        Provider::Google => Box::new(google::GoogleAdapter::new(model_id, api_key, base_url)),
    }
}
