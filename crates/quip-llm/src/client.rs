//! Ollama HTTP client.
//!
//! Wire types match the Ollama generate API. Requests are non-streaming;
//! response length is bounded via `num_predict` rather than cancellation —
//! a slow generation merely occupies its caller for longer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quip_core::domain::SamplingOptions;
use quip_core::ports::{GenerationError, LanguageModel};
use quip_core::settings::OllamaSettings;

/// Connection settings for an [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server (no trailing slash).
    pub base_url: String,

    /// Model name passed to the generate endpoint.
    pub model: String,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::from(&OllamaSettings::default())
    }
}

impl From<&OllamaSettings> for OllamaConfig {
    fn from(settings: &OllamaSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            model: settings.model.clone(),
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Request body for `POST /api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// The `options` object of a generate request.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl From<&SamplingOptions> for GenerateOptions {
    fn from(options: &SamplingOptions) -> Self {
        Self {
            num_predict: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        }
    }
}

/// Response body of a non-streaming generate call.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Language-model client backed by a local Ollama server.
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Build a client from connection settings.
    pub fn new(config: OllamaConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerationError::Service(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            url = %config.base_url,
            model = %config.model,
            "ollama client initialized"
        );

        Ok(Self { http, config })
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.base_url)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &SamplingOptions,
    ) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions::from(options),
        };

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "sending generate request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service(format!(
                "generate returned {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Service(format!("malformed response: {e}")))?;

        tracing::debug!(reply_len = parsed.response.len(), "generate complete");

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let options = SamplingOptions::with_hardcoded_defaults();
        let request = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "User: hello\nAssistant:",
            stream: false,
            options: GenerateOptions::from(&options),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 100);
        assert_eq!(json["options"]["top_p"], 0.9);
    }

    #[test]
    fn unset_options_are_omitted() {
        let request = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            options: GenerateOptions::from(&SamplingOptions::default()),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["options"].get("num_predict").is_none());
        assert!(json["options"].get("temperature").is_none());
    }

    #[test]
    fn response_parses() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model":"llama3.2:3b","response":"four","done":true}"#)
                .unwrap();
        assert_eq!(parsed.response, "four");
    }

    #[test]
    fn config_strips_trailing_slash() {
        let settings = OllamaSettings {
            base_url: "http://localhost:11434/".to_owned(),
            ..Default::default()
        };
        let config = OllamaConfig::from(&settings);
        assert_eq!(config.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_service_error() {
        // Nothing listens on this port; the request must fail soft with a
        // Service error rather than panicking.
        let client = OllamaClient::new(OllamaConfig {
            base_url: "http://127.0.0.1:1".to_owned(),
            model: "m".to_owned(),
            request_timeout: Duration::from_millis(200),
        })
        .unwrap();

        let err = client
            .generate("hello", &SamplingOptions::default())
            .await
            .unwrap_err();
        let GenerationError::Service(detail) = err;
        assert!(detail.contains("request failed"));
    }
}
