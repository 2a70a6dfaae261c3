//! HTTP transport for any wire format.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::providers::{wire_for, ProviderKind, WireFormat};
use crate::security::SecretString;
use crate::traits::provider::{ExtractionProvider, ExtractionRequest, ProviderResponse};
use crate::types::schema::OutputSchema;

/// Configuration for an HTTP-backed provider.
#[derive(Clone)]
pub struct HttpProviderConfig {
    /// Which wire format to speak
    pub kind: ProviderKind,

    /// Base URL, e.g. `https://api.openai.com` or `http://localhost:11434`
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// API key, if the provider requires one
    pub api_key: Option<SecretString>,

    /// Hard per-attempt timeout; a timeout is a retryable failure
    pub timeout: Duration,
}

impl HttpProviderConfig {
    /// Create a config with the default 60s per-attempt timeout.
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key));
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// An [`ExtractionProvider`] speaking a wire format over reqwest.
///
/// The client-level timeout is the per-attempt budget; elapsed timeouts
/// surface as retryable [`ProviderError::Timeout`].
pub struct HttpProvider {
    config: HttpProviderConfig,
    wire: Box<dyn WireFormat>,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Build a provider from its config.
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Transport(Box::new(err)))?;

        Ok(Self {
            wire: wire_for(config.kind),
            config,
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.wire.endpoint()
        )
    }
}

#[async_trait]
impl ExtractionProvider for HttpProvider {
    async fn call(
        &self,
        request: &ExtractionRequest,
        schema: &OutputSchema,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.wire.build_request(request, schema, &self.config.model);

        let mut http_request = self.client.post(self.url()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            if let Some((name, value)) = self.wire.auth_header(api_key.expose()) {
                http_request = http_request.header(name, value);
            }
        }

        debug!(path = %request.path, provider = %self.config.kind, "calling provider");
        let response = http_request.send().await.map_err(|err| {
            if err.is_timeout() {
                ProviderError::Timeout {
                    elapsed_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                ProviderError::Transport(Box::new(err))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &detail));
        }

        let json: serde_json::Value = response.json().await.map_err(|err| {
            ProviderError::MalformedResponse {
                message: format!("response body is not JSON: {}", err),
            }
        })?;

        let fields = self.wire.parse_response(&json)?;
        Ok(ProviderResponse::new(fields).with_model(self.config.model.clone()))
    }

    fn name(&self) -> &str {
        self.config.kind.as_str()
    }
}

/// Map a non-success HTTP status to the provider error taxonomy.
fn classify_status(status: u16, detail: &str) -> ProviderError {
    match status {
        408 => ProviderError::Timeout { elapsed_ms: 0 },
        429 => ProviderError::RateLimited,
        500..=599 => ProviderError::Server { status },
        _ => ProviderError::BadRequest {
            message: format!("status {}: {}", status, truncate(detail, 200)),
        },
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
