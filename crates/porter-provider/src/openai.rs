//! OpenAI-compatible chat-completions provider.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, ReplyProvider};

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    temperature: f32,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ReplyProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ApiRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ApiMessage {
                    role: "user",
                    content: request.user_turn(),
                },
            ],
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, model = %self.model, "completion request failed");
            return Err(anyhow!("completion failed ({status}): {text}"));
        }

        let parsed: ApiResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion response had no choices"))?;
        Ok(text.trim().to_string())
    }
}
