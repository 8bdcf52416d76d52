//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatMessage, LlmClient, LlmError};

/// Client for any server speaking the OpenAI `/chat/completions` API.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    role: super::Role,
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<ChatMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };
        debug!("Sending {} message(s) to {} ({})", messages.len(), url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::from)?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: text,
            }
            .into());
        }

        Ok(parse_response(&text)?)
    }
}

fn parse_response(text: &str) -> Result<ChatMessage, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Parse(e.to_string()))?;
    let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;

    Ok(ChatMessage {
        role: choice.message.role,
        content: choice.message.content.unwrap_or_default().trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn parses_first_choice_and_trims() {
        let msg = parse_response(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Thought: hi \n"}},{"message":{"role":"assistant","content":"other"}}]}"#,
        )
        .unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Thought: hi");
    }

    #[test]
    fn null_content_becomes_empty() {
        let msg = parse_response(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
            .unwrap();
        assert_eq!(msg.content, "");
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(matches!(
            parse_response(r#"{"choices":[]}"#),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(parse_response(r#"{}"#), Err(LlmError::EmptyResponse)));
        assert!(matches!(parse_response("not json"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn request_body_matches_api_shape() {
        let messages = [ChatMessage::user("hello")];
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 0.0,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "hello"}],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = OpenAiClient::new("key", "https://api.example.com/v1/", "m");
        assert_eq!(client.base_url, "https://api.example.com/v1");
        assert_eq!(client.model(), "m");
    }
}
