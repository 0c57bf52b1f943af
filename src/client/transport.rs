use crate::wire::{TranslateResponse, TranslationBatch};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("translation endpoint error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("translation endpoint unreachable: {0}")]
    Network(String),
    #[error("unexpected translation endpoint response: {0}")]
    InvalidResponse(String),
}

/// What the endpoint answered for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportReply {
    pub translations: BTreeMap<String, String>,
    /// The endpoint signalled that some entries fell back to their source text.
    pub degraded: bool,
}

/// Delivers a batch to the translation endpoint.
#[async_trait]
pub trait TranslationTransport: Send + Sync + 'static {
    async fn send(&self, batch: &TranslationBatch) -> Result<TransportReply, TransportError>;
}

/// Posts batches to `{base_url}/translate`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/translate", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TranslationTransport for HttpTransport {
    async fn send(&self, batch: &TranslationBatch) -> Result<TransportReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&batch.to_request())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let degraded = status == StatusCode::INTERNAL_SERVER_ERROR;

        if !status.is_success() && !degraded {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        // A 500 still carries usable translations; without a body it is a plain failure.
        let body: TranslateResponse = response.json().await.map_err(|e| {
            if degraded {
                TransportError::Http {
                    status: status.as_u16(),
                    body: e.to_string(),
                }
            } else {
                TransportError::InvalidResponse(e.to_string())
            }
        })?;

        Ok(TransportReply {
            translations: body.translations,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn batch(texts: &[&str]) -> TranslationBatch {
        TranslationBatch::new(Language::FRENCH, texts.iter().map(|s| s.to_string()))
            .expect("Non-empty batch")
    }

    async fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&server.uri(), Duration::from_secs(2)).expect("Should build client")
    }

    #[tokio::test]
    async fn test_send_posts_wire_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(json!({ "texts": ["Hello", "World"], "target": "fr" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": { "Hello": "Bonjour", "World": "Monde" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = transport_for(&server)
            .await
            .send(&batch(&["Hello", "World"]))
            .await
            .expect("Should succeed");

        assert_eq!(reply.translations["Hello"], "Bonjour");
        assert!(!reply.degraded);
    }

    #[tokio::test]
    async fn test_send_accepts_degraded_500_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "translations": { "Hello": "Bonjour", "World": "World" }
            })))
            .mount(&server)
            .await;

        let reply = transport_for(&server)
            .await
            .send(&batch(&["Hello", "World"]))
            .await
            .expect("Degraded reply still carries translations");

        assert!(reply.degraded);
        assert_eq!(reply.translations["World"], "World");
    }

    #[tokio::test]
    async fn test_send_500_without_body_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Server Error"))
            .mount(&server)
            .await;

        let result = transport_for(&server).await.send(&batch(&["Hello"])).await;

        assert!(matches!(result, Err(TransportError::Http { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_send_422_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "The selected target is invalid.",
                "errors": { "target": ["The selected target is invalid."] }
            })))
            .mount(&server)
            .await;

        let result = transport_for(&server).await.send(&batch(&["Hello"])).await;

        assert!(matches!(result, Err(TransportError::Http { status: 422, .. })));
    }

    #[tokio::test]
    async fn test_send_unreachable_endpoint() {
        let transport =
            HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(1)).expect("client");

        let result = transport.send(&batch(&["Hello"])).await;

        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
