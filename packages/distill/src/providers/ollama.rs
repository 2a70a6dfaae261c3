//! Ollama-style local generation wire format.

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::pipeline::prompts::EXTRACT_SYSTEM_PROMPT;
use crate::providers::{parse_json_payload, ProviderKind, WireFormat};
use crate::traits::provider::ExtractionRequest;
use crate::types::schema::OutputSchema;

pub(crate) struct OllamaWire;

impl WireFormat for OllamaWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn endpoint(&self) -> &'static str {
        "/api/generate"
    }

    fn auth_header(&self, _api_key: &str) -> Option<(&'static str, String)> {
        // Local models need no authentication.
        None
    }

    fn build_request(
        &self,
        request: &ExtractionRequest,
        _schema: &OutputSchema,
        model: &str,
    ) -> Value {
        json!({
            "model": model,
            "prompt": format!("{}\n\n{}", EXTRACT_SYSTEM_PROMPT, request.prompt),
            "format": "json",
            "stream": false,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<Value, ProviderError> {
        let text = body["response"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse {
                message: "missing response field".into(),
            })?;
        parse_json_payload(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::{FieldKind, OutputSchema};

    #[test]
    fn test_build_request_is_non_streaming_json() {
        let request = ExtractionRequest::new("notes/a.md", "content", "extract the title");
        let schema = OutputSchema::new("note").required_field("title", FieldKind::String, "Title");

        let body = OllamaWire.build_request(&request, &schema, "llama3");
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert!(body["prompt"].as_str().unwrap().contains("extract the title"));
    }

    #[test]
    fn test_parse_response() {
        let body = json!({"response": "{\"title\": \"A\"}", "done": true});
        let fields = OllamaWire.parse_response(&body).unwrap();
        assert_eq!(fields["title"], "A");
    }
}
