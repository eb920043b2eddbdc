//! Provider and model catalog.
//!
//! The set of supported providers is closed and defined at build time; each
//! provider exposes a non-empty, ordered list of models. Models compare by
//! full value equality, not id alone.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A vendor exposing a text-generation API.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[strum(serialize = "openai")]
    OpenAi,
    #[strum(serialize = "anthropic")]
    Anthropic,
    #[strum(serialize = "google")]
    Google,
}

impl Provider {
    /// Stable identifier used in persistence and wire-level lookups.
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Human-readable name for settings surfaces.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google",
        }
    }

    /// All supported providers, in catalog order.
    pub fn all() -> impl Iterator<Item = Provider> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

/// A specific model variant offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub provider: Provider,
}

/// (id, display name, description) tables. Ordered; the first entry is the
/// default model for its provider.
const OPENAI_MODELS: &[(&str, &str, &str)] = &[
    (
        "gpt-4o",
        "GPT-4o",
        "Flagship multimodal model, best overall quality",
    ),
    (
        "gpt-4o-mini",
        "GPT-4o mini",
        "Fast and inexpensive, good for short rewrites",
    ),
    (
        "gpt-4.1-mini",
        "GPT-4.1 mini",
        "Newer mid-tier model with a large context window",
    ),
];

const ANTHROPIC_MODELS: &[(&str, &str, &str)] = &[
    (
        "claude-sonnet-4-5-20250929",
        "Claude Sonnet 4.5",
        "Balanced quality and latency",
    ),
    (
        "claude-haiku-3-5-20241022",
        "Claude Haiku 3.5",
        "Fastest Claude, suited to quick transformations",
    ),
    (
        "claude-opus-4-5-20251101",
        "Claude Opus 4.5",
        "Highest quality, slower and more expensive",
    ),
];

const GOOGLE_MODELS: &[(&str, &str, &str)] = &[
    (
        "gemini-2.5-flash",
        "Gemini 2.5 Flash",
        "Fast default with strong quality",
    ),
    (
        "gemini-2.5-pro",
        "Gemini 2.5 Pro",
        "Strongest reasoning in the Gemini line",
    ),
    (
        "gemini-2.0-flash",
        "Gemini 2.0 Flash",
        "Previous-generation fast model",
    ),
];

fn table(provider: Provider) -> &'static [(&'static str, &'static str, &'static str)] {
    match provider {
        Provider::OpenAi => OPENAI_MODELS,
        Provider::Anthropic => ANTHROPIC_MODELS,
        Provider::Google => GOOGLE_MODELS,
    }
}

/// All models for a provider, in catalog order. Non-empty for every provider.
pub fn models(provider: Provider) -> Vec<Model> {
    table(provider)
        .iter()
        .map(|(id, name, description)| Model {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            description: (*description).to_string(),
            provider,
        })
        .collect()
}

/// The first catalog entry for a provider.
pub fn default_model(provider: Provider) -> Model {
    models(provider)
        .into_iter()
        .next()
        .expect("catalog tables are non-empty")
}

/// Look up a model by id within a provider's catalog.
pub fn find_model(provider: Provider, id: &str) -> Option<Model> {
    models(provider).into_iter().find(|m| m.id == id)
}
