//! Assistant replies for the chat endpoint.
//!
//! A remote generator is optional. Risk scoring never depends on it: the
//! keyword analysis in `intelligence::message_risk` runs first and picks the
//! canned reply used whenever the generator is absent or fails.

mod context;
mod ollama;
mod openai;

pub use context::build_context;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::intelligence::message_risk::fallback_reply;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Cannot reach text generator at {0}")]
    Connection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Generator returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("Failed to parse generator response: {0}")]
    ResponseParsing(String),
}

pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// Remote text generation behind a system prompt.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a>;
}

/// Build the generator selected in configuration.
pub fn from_config(config: &GeneratorConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    Ok(match config {
        GeneratorConfig::OpenAi {
            base_url,
            api_key,
            model,
        } => Arc::new(OpenAiGenerator::new(base_url, api_key, model)?),
        GeneratorConfig::Ollama { base_url, model } => {
            Arc::new(OllamaGenerator::new(base_url, model)?)
        }
    })
}

fn http_client() -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| GenerationError::HttpClient(e.to_string()))
}

fn transport_error(base_url: &str, e: reqwest::Error) -> GenerationError {
    if e.is_connect() {
        GenerationError::Connection(base_url.to_string())
    } else if e.is_timeout() {
        GenerationError::HttpClient(format!("Request timed out after {REQUEST_TIMEOUT_SECS}s"))
    } else {
        GenerationError::HttpClient(e.to_string())
    }
}

/// Turn a non-2xx response into [`GenerationError::Remote`].
async fn require_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::Remote {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyOrigin {
    Remote,
    /// The generator is configured but the call failed.
    Fallback,
    /// No generator configured.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub content: String,
    pub confidence: u32,
    pub origin: ReplyOrigin,
}

impl AssistantReply {
    fn canned(risk_score: u32, origin: ReplyOrigin, confidence: u32) -> Self {
        Self {
            content: fallback_reply(risk_score).to_string(),
            confidence,
            origin,
        }
    }
}

/// Ask the generator for a reply, degrading to the canned text for `risk_score`.
pub async fn respond(
    generator: Option<&dyn TextGenerator>,
    system: &str,
    message: &str,
    risk_score: u32,
) -> AssistantReply {
    let Some(generator) = generator else {
        return AssistantReply::canned(risk_score, ReplyOrigin::Offline, 0);
    };
    match generator.generate(system, message).await {
        Ok(content) => AssistantReply {
            content,
            confidence: 85,
            origin: ReplyOrigin::Remote,
        },
        Err(e) => {
            tracing::warn!(
                generator = generator.name(),
                error = %e,
                "text generation failed, using fallback reply"
            );
            AssistantReply::canned(risk_score, ReplyOrigin::Fallback, 60)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Generator that answers with a fixed string, or always fails.
    pub(crate) struct StubGenerator(pub Option<&'static str>);

    impl TextGenerator for StubGenerator {
        fn name(&self) -> &str {
            "stub"
        }

        fn generate<'a>(&'a self, _system: &'a str, _prompt: &'a str) -> GenerateFuture<'a> {
            Box::pin(async move {
                self.0.map(str::to_string).ok_or(GenerationError::Remote {
                    status: 503,
                    body: "unavailable".into(),
                })
            })
        }
    }
}
