//! HTTP oracle client.

use std::time::Duration;

use async_trait::async_trait;
use inferret_core::{parse_verdict, Oracle, OracleError, OracleRequest};
use tracing::{debug, instrument, trace};

use crate::config::OpenAiConfig;
use crate::wire::{ChatCompletionRequest, ChatCompletionResponse};

/// Oracle backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

impl OpenAiOracle {
    /// Build a client for `config`.
    ///
    /// Fails with [`OracleError::Configuration`] when the API key is empty or
    /// the HTTP client cannot be constructed.
    pub fn new(config: OpenAiConfig) -> Result<Self, OracleError> {
        if config.api_key.trim().is_empty() {
            return Err(OracleError::Configuration(
                "OpenAI API key is not set".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("inferret/", env!("CARGO_PKG_VERSION")));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| OracleError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    #[instrument(skip_all, fields(model = %request.model, tag = %request.tag))]
    async fn ask(&self, request: &OracleRequest<'_>) -> Result<bool, OracleError> {
        let body = ChatCompletionRequest::from_request(request);
        debug!(
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            assertion = %request.assertion,
            "requesting chat completion"
        );

        let response = self
            .http_client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        trace!(status = status.as_u16(), body = %text, "chat completion response");

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::MalformedResponse("no choices in completion response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        let verdict = parse_verdict(&content)?;
        debug!(verdict, "chat completion verdict");
        Ok(verdict)
    }
}
