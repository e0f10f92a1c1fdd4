//! OpenAI-compatible `/embeddings` HTTP provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingProvider;
use crate::error::{EmbeddingError, is_transient_status};
use crate::models::EmbeddingConfig;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Permanent(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            input: text,
            model: &self.model,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let msg = format!("status {}: {}", status, body);
            return Err(if is_transient_status(status.as_u16()) {
                EmbeddingError::Transient(msg)
            } else {
                EmbeddingError::Permanent(msg)
            });
        }

        let body = response.bytes().await?;
        let embed_response: EmbedResponse = serde_json::from_slice(&body)
            .map_err(|e| EmbeddingError::Permanent(format!("invalid response: {e}")))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Permanent("empty embedding response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model(), "text-embedding-3-small");
    }

    #[test]
    fn test_base_url_trimming() {
        let config = EmbeddingConfig {
            url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    /// Serve one canned HTTP response after reading the full request.
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/v1")
    }

    fn provider_at(url: String) -> OpenAiProvider {
        OpenAiProvider::new(&EmbeddingConfig {
            url,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_body_cut_short_is_transient() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"data\":[",
        )
        .await;
        let err = provider_at(url).embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Transient(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_malformed_body_is_permanent() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 8\r\n\r\nnot json",
        )
        .await;
        let err = provider_at(url).embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Permanent(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let url = serve_once(
            "HTTP/1.1 429 Too Many Requests\r\ncontent-length: 4\r\n\r\nslow",
        )
        .await;
        let err = provider_at(url).embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Transient(_)), "{err:?}");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"m","usage":{"prompt_tokens":1,"total_tokens":1}}"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
