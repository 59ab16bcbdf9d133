//! OpenAI Chat Completions client producing the travel-guide description.

use crate::domain::model::Description;
use crate::domain::ports::DescriptionSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const SYSTEM_PROMPT: &str = "You are a travel guide.";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn complete(&self, subject: &str, location: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: guide_prompt(subject, location),
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EtlError::ProviderError {
                provider: "OpenAI".to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| EtlError::ProviderError {
                provider: "OpenAI".to_string(),
                message: "response contained no completion".to_string(),
            })
    }
}

#[async_trait]
impl DescriptionSource for OpenAiClient {
    async fn fetch_description(&self, subject: &str, location: &str) -> Description {
        match self.complete(subject, location).await {
            Ok(text) => {
                let hyperlinks = extract_hyperlinks(&text);
                Description { text, hyperlinks }
            }
            Err(e) => {
                tracing::error!("Error fetching description for {}: {}", subject, e);
                Description::fallback()
            }
        }
    }
}

pub fn guide_prompt(city: &str, country: &str) -> String {
    format!(
        "Write a short tourist guide for {}, {} with 2-3 hyperlinks to related websites.",
        city, country
    )
}

/// Whitespace tokens starting with `http`, joined by `", "`.
///
/// Punctuation or markdown around a URL stays attached to the token; links
/// written as `[text](https://..)` are not picked up at all.
pub fn extract_hyperlinks(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| token.starts_with("http"))
        .collect::<Vec<_>>()
        .join(", ")
}
