use crate::i18n::Language;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PROVIDER_URL: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("translation provider error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("translation provider unreachable: {0}")]
    Network(String),
    #[error("translation provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected translation provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// 429 and 5xx answers and connection failures are transient. Other 4xx
    /// answers, malformed bodies and timeouts are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Network(_) => true,
            ProviderError::Timeout(_) | ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// Machine translation of a single text. There is no batch call; callers loop.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, ProviderError>;
}

/// Client for the public Google Translate web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslateProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl GoogleTranslateProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            timeout,
            retry: RetryConfig::provider_call(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.code()),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        parse_segments(&body)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else if error.is_decode() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, ProviderError> {
        with_retry_if(
            &self.retry,
            &format!("Translation to {}", target.name()),
            || self.request_once(text, source, target),
            ProviderError::is_retryable,
        )
        .await
    }
}

/// The endpoint answers `[[["Bonjour ","Hello ",...],["le monde","world",...]],null,"en",...]`;
/// the translation is the concatenation of each segment's first element.
fn parse_segments(body: &Value) -> Result<String, ProviderError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing segment list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "response contained no translated segments".to_string(),
        ));
    }

    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn google_response(segments: &[(&str, &str)]) -> Value {
        let segments: Vec<Value> = segments
            .iter()
            .map(|(translated, original)| json!([translated, original, null, null, 10]))
            .collect();
        json!([segments, null, "en", null, null, null, 1.0])
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(10))
    }

    async fn provider_for(server: &MockServer) -> GoogleTranslateProvider {
        GoogleTranslateProvider::new(
            &format!("{}/translate_a/single", server.uri()),
            Duration::from_secs(2),
        )
        .expect("Should build client")
        .with_retry(fast_retry())
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn test_parse_single_segment() {
        let body = google_response(&[("Bonjour", "Hello")]);
        assert_eq!(parse_segments(&body).unwrap(), "Bonjour");
    }

    #[test]
    fn test_parse_concatenates_segments() {
        let body = google_response(&[("Bonjour. ", "Hello. "), ("Au revoir.", "Goodbye.")]);
        assert_eq!(parse_segments(&body).unwrap(), "Bonjour. Au revoir.");
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(matches!(
            parse_segments(&json!({"error": "nope"})),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_segments(&json!([[]])),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    // ==================== Retry Classification Tests ====================

    #[test]
    fn test_is_retryable() {
        let http = |status| ProviderError::Http {
            status,
            body: String::new(),
        };

        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(http(429).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(403).is_retryable());
        assert!(ProviderError::Network("connection refused".to_string()).is_retryable());
        assert!(!ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ProviderError::InvalidResponse("bad".to_string()).is_retryable());
    }

    // ==================== Integration Tests with Wiremock ====================

    #[tokio::test]
    async fn test_translate_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("client", "gtx"))
            .and(query_param("sl", "en"))
            .and(query_param("tl", "fr"))
            .and(query_param("q", "Hello"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(google_response(&[("Bonjour", "Hello")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let translated = provider
            .translate("Hello", Language::ENGLISH, Language::FRENCH)
            .await
            .expect("Should succeed");

        assert_eq!(translated, "Bonjour");
    }

    #[tokio::test]
    async fn test_translate_retries_on_500() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(google_response(&[("Hallo", "Hello")])),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .translate("Hello", Language::ENGLISH, Language::GERMAN)
            .await;

        assert_eq!(result.unwrap(), "Hallo");
    }

    #[tokio::test]
    async fn test_translate_no_retry_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .translate("Hello", Language::ENGLISH, Language::FRENCH)
            .await;

        assert_eq!(
            result,
            Err(ProviderError::Http {
                status: 400,
                body: "Bad request".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_translate_exhausts_retries_on_persistent_503() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .translate("Hello", Language::ENGLISH, Language::FRENCH)
            .await;

        assert!(matches!(result, Err(ProviderError::Http { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_translate_timeout_is_a_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(google_response(&[("Bonjour", "Hello")]))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = GoogleTranslateProvider::new(
            &format!("{}/translate_a/single", server.uri()),
            Duration::from_millis(100),
        )
        .expect("Should build client")
        .with_retry(fast_retry());

        let result = provider
            .translate("Hello", Language::ENGLISH, Language::FRENCH)
            .await;

        assert_eq!(
            result,
            Err(ProviderError::Timeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_translate_invalid_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .translate("Hello", Language::ENGLISH, Language::FRENCH)
            .await;

        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
