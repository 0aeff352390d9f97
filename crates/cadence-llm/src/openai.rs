//! OpenAI-compatible text and embedding oracles.
//!
//! Any service speaking the `/chat/completions` and `/embeddings` dialect
//! works here (OpenAI, DeepSeek, DashScope compatible mode, local proxies).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use cadence_core::oracle::{EmbeddingOracle, OracleError, OracleRequest, TextOracle};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// HTTP client config (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL; `/chat/completions` and `/embeddings` are appended.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub extra_headers: HeaderMap,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: 60,
            extra_headers: HeaderMap::new(),
        }
    }
}

impl OpenAiConfig {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap, OracleError> {
        let mut headers = self.extra_headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| OracleError::Auth(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

/// Shared HTTP plumbing for both oracles
#[derive(Clone)]
struct OpenAiTransport {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiTransport {
    fn new(config: OpenAiConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, OracleError> {
        let response = self
            .client
            .post(self.config.url(path))
            .headers(self.config.headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

/// Map a non-success HTTP status to an oracle error.
pub(crate) fn classify_status(status: StatusCode, body: String) -> OracleError {
    let detail = format!("HTTP {}: {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OracleError::Auth(detail),
        StatusCode::REQUEST_TIMEOUT => OracleError::Http(detail),
        s if s.is_server_error() => OracleError::Http(detail),
        _ => OracleError::InvalidRequest(detail),
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Text oracle over `POST {endpoint}/chat/completions`
#[derive(Clone)]
pub struct OpenAiTextOracle {
    transport: OpenAiTransport,
}

impl OpenAiTextOracle {
    pub fn new(config: OpenAiConfig) -> Result<Self, OracleError> {
        Ok(Self {
            transport: OpenAiTransport::new(config)?,
        })
    }
}

#[async_trait]
impl TextOracle for OpenAiTextOracle {
    async fn complete(&self, request: OracleRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            response_format: request
                .json_mode
                .then(|| json!({"type": "json_object"})),
        };

        let parsed: ChatResponse = self.transport.post("chat/completions", &body).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("missing choices".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding oracle over `POST {endpoint}/embeddings`
#[derive(Clone)]
pub struct OpenAiEmbeddingOracle {
    transport: OpenAiTransport,
}

impl OpenAiEmbeddingOracle {
    pub fn new(config: OpenAiConfig) -> Result<Self, OracleError> {
        Ok(Self {
            transport: OpenAiTransport::new(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingOracle for OpenAiEmbeddingOracle {
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>, OracleError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            model,
            input: texts.iter().map(|t| t.replace('\n', " ")).collect(),
        };
        let parsed: EmbeddingResponse = self.transport.post("embeddings", &body).await?;
        order_embeddings(parsed, texts.len())
    }
}

fn order_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, OracleError> {
    if response.data.len() != expected {
        return Err(OracleError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::retry::Transient;

    #[test]
    fn test_status_classification() {
        let rate = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(matches!(rate, OracleError::RateLimited(_)));
        assert!(rate.is_transient());

        let server = classify_status(StatusCode::BAD_GATEWAY, String::new());
        assert!(server.is_transient());

        let auth = classify_status(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(auth, OracleError::Auth(_)));
        assert!(!auth.is_transient());

        let bad = classify_status(StatusCode::BAD_REQUEST, "no such model".into());
        assert!(matches!(bad, OracleError::InvalidRequest(ref d) if d.contains("no such model")));
    }

    #[test]
    fn test_chat_request_serializes_json_mode() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
            response_format: Some(json!({"type": "json_object"})),
        };
        let raw = serde_json::to_value(&body).unwrap();
        assert_eq!(raw["response_format"]["type"], "json_object");

        let plain = ChatRequest {
            response_format: None,
            ..body
        };
        let raw = serde_json::to_value(&plain).unwrap();
        assert!(raw.get("response_format").is_none());
    }

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        }))
        .unwrap();
        let vectors = order_embeddings(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_embedding_count_mismatch_is_malformed() {
        let response: EmbeddingResponse =
            serde_json::from_value(json!({"data": [{"index": 0, "embedding": [1.0]}]})).unwrap();
        assert!(matches!(
            order_embeddings(response, 2),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = OpenAiConfig {
            endpoint: "https://api.deepseek.com/v1/".to_string(),
            ..OpenAiConfig::default()
        };
        assert_eq!(
            config.url("chat/completions"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }
}
