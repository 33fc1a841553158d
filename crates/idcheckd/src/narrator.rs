//! Chat-completion client for the report narrative.
//!
//! Built once at startup and shared by every request. Without an API key
//! every call fails fast with [`NarratorError::NotConfigured`], which sends
//! the report to the deterministic fallback.

use std::time::Duration;

use async_trait::async_trait;
use idcheck_core::services::{Narrator, NarratorError};
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You are an identity verification analyst. \
    Summarize the automated checks for a compliance reviewer in plain language.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiNarrator {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiNarrator {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    async fn narrate(&self, prompt: &str) -> Result<String, NarratorError> {
        let api_key = self.api_key.as_deref().ok_or(NarratorError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NarratorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarratorError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NarratorError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(NarratorError::EmptyReply)
    }
}
