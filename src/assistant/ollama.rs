use serde::{Deserialize, Serialize};

use super::{
    http_client, require_success, transport_error, GenerateFuture, GenerationError, TextGenerator,
};

/// Local Ollama instance, non-streaming `/api/generate`.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client()?,
        })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;
        let parsed: GenerateResponse = require_success(response)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(self.complete(system, prompt))
    }
}
