//! OpenAI-style chat-completions wire format.

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::pipeline::prompts::EXTRACT_SYSTEM_PROMPT;
use crate::providers::{parse_json_payload, ProviderKind, WireFormat};
use crate::traits::provider::ExtractionRequest;
use crate::types::schema::OutputSchema;

pub(crate) struct OpenAiWire;

impl WireFormat for OpenAiWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn endpoint(&self) -> &'static str {
        "/v1/chat/completions"
    }

    fn auth_header(&self, api_key: &str) -> Option<(&'static str, String)> {
        Some(("authorization", format!("Bearer {}", api_key)))
    }

    fn build_request(
        &self,
        request: &ExtractionRequest,
        _schema: &OutputSchema,
        model: &str,
    ) -> Value {
        json!({
            "model": model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": EXTRACT_SYSTEM_PROMPT},
                {"role": "user", "content": request.prompt},
            ],
        })
    }

    fn parse_response(&self, body: &Value) -> Result<Value, ProviderError> {
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse {
                message: "missing choices[0].message.content".into(),
            })?;
        parse_json_payload(content)
    }
}
