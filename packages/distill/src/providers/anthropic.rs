//! Anthropic-style messages wire format.

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::pipeline::prompts::EXTRACT_SYSTEM_PROMPT;
use crate::providers::{parse_json_payload, ProviderKind, WireFormat};
use crate::traits::provider::ExtractionRequest;
use crate::types::schema::OutputSchema;

pub(crate) struct AnthropicWire;

impl WireFormat for AnthropicWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn endpoint(&self) -> &'static str {
        "/v1/messages"
    }

    fn auth_header(&self, api_key: &str) -> Option<(&'static str, String)> {
        Some(("x-api-key", api_key.to_string()))
    }

    fn build_request(
        &self,
        request: &ExtractionRequest,
        _schema: &OutputSchema,
        model: &str,
    ) -> Value {
        json!({
            "model": model,
            "max_tokens": 1024,
            "system": EXTRACT_SYSTEM_PROMPT,
            "messages": [
                {"role": "user", "content": request.prompt},
            ],
        })
    }

    fn parse_response(&self, body: &Value) -> Result<Value, ProviderError> {
        let text = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse {
                message: "missing content[0].text".into(),
            })?;
        parse_json_payload(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::{FieldKind, OutputSchema};

    #[test]
    fn test_build_request_shape() {
        let request = ExtractionRequest::new("notes/a.md", "content", "extract the title");
        let schema = OutputSchema::new("note").required_field("title", FieldKind::String, "Title");

        let body = AnthropicWire.build_request(&request, &schema, "claude-sonnet");
        assert_eq!(body["model"], "claude-sonnet");
        assert_eq!(body["system"], EXTRACT_SYSTEM_PROMPT);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "content": [{"type": "text", "text": "{\"title\": \"A\"}"}]
        });
        let fields = AnthropicWire.parse_response(&body).unwrap();
        assert_eq!(fields["title"], "A");
    }
}
