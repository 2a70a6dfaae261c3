//! Provider implementations - wire-format strategies and transports.
//!
//! Each supported provider exposes the same `{build_request,
//! parse_response}` contract through a [`WireFormat`] strategy, selected
//! by an explicit [`ProviderKind`] tag - never by inspecting response
//! shapes at runtime. The [`HttpProvider`] drives any strategy over
//! reqwest; [`RateLimitedProvider`] adds a quota in front of any
//! provider.

mod anthropic;
mod http;
mod ollama;
mod openai;
mod rate_limited;

pub use http::{HttpProvider, HttpProviderConfig};
pub use rate_limited::{ProviderExt, RateLimitedProvider};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::traits::provider::ExtractionRequest;
use crate::types::schema::OutputSchema;

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-style chat completions
    OpenAi,
    /// Anthropic-style messages
    Anthropic,
    /// Ollama-style local generation
    Ollama,
}

impl ProviderKind {
    /// Short tag used for provenance and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider request/response strategy.
///
/// One implementation per provider family; all expose an identical
/// contract over plain JSON values.
pub trait WireFormat: Send + Sync {
    /// The provider family this format serves.
    fn kind(&self) -> ProviderKind;

    /// Request path appended to the configured base URL.
    fn endpoint(&self) -> &'static str;

    /// Authentication header, if the provider requires one.
    fn auth_header(&self, api_key: &str) -> Option<(&'static str, String)>;

    /// Build the HTTP request body for an extraction request.
    fn build_request(
        &self,
        request: &ExtractionRequest,
        schema: &OutputSchema,
        model: &str,
    ) -> Value;

    /// Extract the structured-output JSON from a response body.
    fn parse_response(&self, body: &Value) -> Result<Value, ProviderError>;
}

/// Select the wire format for a provider tag.
pub fn wire_for(kind: ProviderKind) -> Box<dyn WireFormat> {
    match kind {
        ProviderKind::OpenAi => Box::new(openai::OpenAiWire),
        ProviderKind::Anthropic => Box::new(anthropic::AnthropicWire),
        ProviderKind::Ollama => Box::new(ollama::OllamaWire),
    }
}

/// Parse a model's text output as JSON, tolerating markdown code fences.
pub(crate) fn parse_json_payload(text: &str) -> Result<Value, ProviderError> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(stripped).map_err(|err| ProviderError::MalformedResponse {
        message: format!("output is not valid JSON: {}", err),
    })
}
