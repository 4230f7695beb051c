//! Anthropic messages API

use crate::config::{api_key, LlmConfig};
use crate::llm::{api_error, build_client, network_error, LlmError, LlmResult, TextCompletion};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

/// Claude client used by the feeler and resolver graphs
pub struct AnthropicChat {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl AnthropicChat {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> LlmResult<Self> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("missing Anthropic API key".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| LlmError::Config("invalid Anthropic API key".into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: build_client()?,
            headers,
            endpoint: format!("{}/messages", base_url.trim_end_matches('/')),
            model: model.into(),
            temperature,
            max_tokens,
        })
    }

    /// Builds the client for the agent model, reading `ANTHROPIC_API_KEY`
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        Self::new(
            &api_key(API_KEY_VAR)?,
            &config.anthropic_base_url,
            config.agent_model.as_str(),
            config.temperature,
            config.max_tokens,
        )
    }
}

#[async_trait]
impl TextCompletion for AnthropicChat {
    async fn complete(&self, node: &str, system: &str, prompt: &str) -> LlmResult<String> {
        tracing::debug!("[{}] calling {} ({} prompt chars)", node, self.model, prompt.len());

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: if system.is_empty() { None } else { Some(system) },
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: prompt,
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("Anthropic messages API", e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse Anthropic response: {}", e)))?;

        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if answer.is_empty() {
            return Err(LlmError::Parse(
                "Anthropic response missing text content".into(),
            ));
        }

        tracing::trace!("[{}] response: {}", node, answer);
        Ok(answer)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_messages_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-test",
                "system": "You judge.",
                "messages": [{ "role": "user", "content": [{ "type": "text", "text": "Rate this" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    { "type": "thinking", "thinking": "hmm" },
                    { "type": "text", "text": "{\"good_score\": 0.95}" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = AnthropicChat::new("ak-test", &server.uri(), "claude-test", 0.0, 512).unwrap();
        let answer = chat.complete("JUDGE", "You judge.", "Rate this").await.unwrap();
        assert_eq!(answer, "{\"good_score\": 0.95}");
    }

    #[tokio::test]
    async fn test_missing_text_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
            .mount(&server)
            .await;

        let chat = AnthropicChat::new("ak-test", &server.uri(), "claude-test", 0.0, 512).unwrap();
        let result = chat.complete("CODER", "", "Fix it").await;
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let chat = AnthropicChat::new("ak-bad", &server.uri(), "claude-test", 0.0, 512).unwrap();
        let result = chat.complete("CODER", "", "Fix it").await;
        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
    }
}
