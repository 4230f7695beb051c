//! OpenAI-compatible chat completions and embeddings

use crate::config::{api_key, LlmConfig};
use crate::llm::{
    api_error, build_client, network_error, Embedder, LlmError, LlmResult, TextCompletion,
};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Chat completions client
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> LlmResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("missing OpenAI API key".into()));
        }
        Ok(Self {
            client: build_client()?,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            temperature,
            max_tokens,
        })
    }

    /// Builds the client for the question answering model, reading `OPENAI_API_KEY`
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        Self::new(
            api_key(API_KEY_VAR)?,
            &config.openai_base_url,
            config.chat_model.as_str(),
            config.temperature,
            config.max_tokens,
        )
    }
}

#[async_trait]
impl TextCompletion for OpenAiChat {
    async fn complete(&self, node: &str, system: &str, prompt: &str) -> LlmResult<String> {
        tracing::debug!("[{}] calling {} ({} prompt chars)", node, self.model, prompt.len());

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_completion_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.trim()))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("OpenAI chat completions", e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse OpenAI response: {}", e)))?;

        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Parse("OpenAI response had no message content".into()))?;

        tracing::trace!("[{}] response: {}", node, answer);
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_completion_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Embeddings client
pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
    ) -> LlmResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("missing OpenAI API key".into()));
        }
        Ok(Self {
            client: build_client()?,
            api_key,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        Self::new(
            api_key(API_KEY_VAR)?,
            &config.openai_base_url,
            config.embedding_model.as_str(),
        )
    }
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.trim()))
            .json(&request)
            .send()
            .await
            .map_err(|e| network_error("OpenAI embeddings", e))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            LlmError::Parse(format!("failed to parse OpenAI embedding response: {}", e))
        })?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(LlmError::Parse(format!(
                "OpenAI returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-test",
                "messages": [
                    { "role": "system", "content": "Be brief." },
                    { "role": "user", "content": "What is a PCU?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Power control unit." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("sk-test", &server.uri(), "gpt-test", 0.0, 256).unwrap();
        let answer = chat
            .complete("SUMMARIZE", "Be brief.", "What is a PCU?")
            .await
            .unwrap();
        assert_eq!(answer, "Power control unit.");
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("sk-test", &server.uri(), "gpt-test", 0.0, 256).unwrap();
        let result = chat.complete("INTENT", "s", "p").await;
        assert!(matches!(result, Err(LlmError::Api { status: 429, ref body }) if body == "rate limited"));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiChat::new("  ", "https://api.openai.com/v1", "gpt-test", 0.0, 256);
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[tokio::test]
    async fn test_embeddings_sorted_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "model": "embed-test", "input": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbeddings::new("sk-test", &server.uri(), "embed-test").unwrap();
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [1.0] }]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbeddings::new("sk-test", &server.uri(), "embed-test").unwrap();
        let result = embedder.embed(&["a".to_string(), "b".to_string()]).await;
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder =
            OpenAiEmbeddings::new("sk-test", "http://127.0.0.1:9", "embed-test").unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
