//! OpenAI provider (gpt-4o-mini and friends)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{CompletionRequest, LlmProvider};

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn to_openai_messages(request: &CompletionRequest) -> Vec<OpenAiMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });
        messages
    }

    fn from_openai_response(resp: OpenAiApiResponse) -> Result<String> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI response had no choices"))?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_openai_messages(request),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        debug!(
            "OpenAI request: model={}, json_mode={}, prompt_chars={}",
            self.model,
            request.json_mode,
            request.prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAiApiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        Self::from_openai_response(api_response)
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_openai_messages_with_system() {
        let req = CompletionRequest::new("hello").with_system("You are helpful.");
        let msgs = OpenAiProvider::to_openai_messages(&req);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "hello");
    }

    #[test]
    fn test_to_openai_messages_without_system() {
        let msgs = OpenAiProvider::to_openai_messages(&CompletionRequest::new("hi"));
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, "user");
    }

    #[test]
    fn test_from_openai_response_trims() {
        let resp = OpenAiApiResponse {
            choices: vec![OpenAiChoice {
                message: OpenAiChoiceMessage {
                    content: Some("  Hi Dana!  \n".to_string()),
                },
            }],
        };
        assert_eq!(OpenAiProvider::from_openai_response(resp).unwrap(), "Hi Dana!");
    }

    #[test]
    fn test_from_openai_response_no_choices() {
        let resp = OpenAiApiResponse { choices: vec![] };
        assert!(OpenAiProvider::from_openai_response(resp).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenAiProvider::new(
            "sk-secret-key".to_string(),
            "gpt-4o-mini".to_string(),
            "https://api.openai.com".to_string(),
        );
        assert!(!format!("{:?}", provider).contains("sk-secret-key"));
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"},
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"{\"ok\":true}"}}]}"#)
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("sk-test".to_string(), "gpt-4o-mini".to_string(), server.url());
        let text = provider
            .complete(&CompletionRequest::new("plan").json())
            .await
            .unwrap();
        assert_eq!(text, r#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let provider =
            OpenAiProvider::new("sk-test".to_string(), "gpt-4o-mini".to_string(), server.url());
        let err = provider
            .complete(&CompletionRequest::new("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }
}
