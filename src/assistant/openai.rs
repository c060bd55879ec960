use serde::{Deserialize, Serialize};

use super::{
    http_client, require_success, transport_error, GenerateFuture, GenerationError, TextGenerator,
};

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;
const EMPTY_COMPLETION: &str = "I apologize, but I cannot process your request at the moment.";

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: http_client()?,
        })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: system,
                },
                ChatTurn {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;
        let parsed: CompletionResponse = require_success(response)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::ResponseParsing(e.to_string()))?;
        Ok(parsed.into_text())
    }
}

#[derive(Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_else(|| EMPTY_COMPLETION.to_string())
    }
}

impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(self.complete(system, prompt))
    }
}
