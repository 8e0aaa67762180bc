//! Forwards a support-chat transcript to an OpenAI-compatible completion
//! endpoint and hands back a single reply.

use crate::config::ChatConfig;
use crate::models::IncomingChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = "You are a gentle, supportive companion in a mood journaling app. \
You listen, validate feelings, and offer small, realistic suggestions. \
You are NOT a therapist and must remind users you cannot give medical advice.";
pub const EMPTY_REPLY_FALLBACK: &str = "I'm here with you. I'm listening.";
pub const UNAVAILABLE_REPLY: &str =
    "Sorry, chat is unavailable right now. Please try again in a moment.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub async fn reply(&self, transcript: &[IncomingChatMessage]) -> Result<String, ChatError> {
        let api_key = self.config.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;
        let messages = build_messages(transcript);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &self.config.model,
                messages: &messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        Ok(extract_reply(completion))
    }
}

/// System prompt first, then every transcript line that has text.
pub fn build_messages(transcript: &[IncomingChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatMessage {
        role: Role::System,
        content: SYSTEM_PROMPT.to_string(),
    });

    for line in transcript {
        let content = line
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
            .or_else(|| line.text.as_deref().filter(|text| !text.is_empty()));
        let Some(content) = content else {
            continue;
        };
        let role = match line.role.as_deref() {
            Some("user") => Role::User,
            _ => Role::Assistant,
        };
        messages.push(ChatMessage {
            role,
            content: content.to_string(),
        });
    }
    messages
}

fn extract_reply(completion: CompletionResponse) -> String {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
}
