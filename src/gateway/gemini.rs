//! Gemini `generateContent` transport.
//!
//! One attempt per call; retries belong to [`super::Gateway`]. The API key
//! travels in the `key` query parameter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GatewayError, GenerateRequest, TextGenerator};
use crate::config::AppConfig;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

/// HTTP client for a Gemini-compatible endpoint
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.api_base, &config.model, config.api_key.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// Request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        Self {
            contents: vec![Content::text(&request.prompt)],
            system_instruction: request.system_instruction.as_deref().map(Content::text),
        }
    }
}

/// Response envelope; every level is optional so a missing field surfaces
/// as "no text" rather than a decode error
#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GatewayError::MissingCredential)?;

        let body = GenerateContentBody::from_request(request);

        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::NonSuccessResponse {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedEnvelope(e.without_url().to_string()))?;

        Ok(envelope.first_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/models/test-model:generateContent";

    fn client_for(server: &MockServer, key: Option<&str>) -> GeminiClient {
        GeminiClient::new(server.uri(), "test-model", key.map(|k| k.to_string()))
    }

    #[test]
    fn test_body_shape_with_system_instruction() {
        let request = GenerateRequest::new("prompt").with_system("be brief");
        let body = serde_json::to_value(GenerateContentBody::from_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"parts": [{"text": "prompt"}]}],
                "systemInstruction": {"parts": [{"text": "be brief"}]}
            })
        );
    }

    #[test]
    fn test_body_omits_missing_system_instruction() {
        let request = GenerateRequest::new("prompt");
        let body = serde_json::to_value(GenerateContentBody::from_request(&request)).unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_first_text_tolerates_missing_levels() {
        let parse = |v: serde_json::Value| {
            serde_json::from_value::<GenerateContentResponse>(v).unwrap().first_text()
        };
        assert_eq!(parse(json!({})), None);
        assert_eq!(parse(json!({"candidates": []})), None);
        assert_eq!(parse(json!({"candidates": [{}]})), None);
        assert_eq!(parse(json!({"candidates": [{"content": {"parts": [{}]}}]})), None);
        assert_eq!(
            parse(json!({"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]})),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_generate_url_trims_trailing_slash() {
        let client = GeminiClient::new("http://localhost/v1beta/", "m", None);
        assert_eq!(client.generate_url(), "http://localhost/v1beta/models/m:generateContent");
    }

    #[tokio::test]
    async fn test_generate_sends_key_and_extracts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(query_param("key", "secret"))
            .and(body_json(json!({
                "contents": [{"parts": [{"text": "olá"}]}],
                "systemInstruction": {"parts": [{"text": "mentor"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "resposta"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let request = GenerateRequest::new("olá").with_system("mentor");

        let text = client.generate(&request).await.unwrap();
        assert_eq!(text.as_deref(), Some("resposta"));
    }

    #[tokio::test]
    async fn test_generate_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let err = client.generate(&GenerateRequest::new("x")).await.unwrap_err();

        assert_eq!(
            err,
            GatewayError::NonSuccessResponse { status: 429, body: "quota".to_string() }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let err = client.generate(&GenerateRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedEnvelope(_)));
    }

    #[tokio::test]
    async fn test_generate_without_key_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.generate(&GenerateRequest::new("x")).await.unwrap_err();
        assert_eq!(err, GatewayError::MissingCredential);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_transport_failure() {
        // Port 1 is reserved; the connection is refused
        let client = GeminiClient::new("http://127.0.0.1:1", "test-model", Some("secret".to_string()));

        let err = client.generate(&GenerateRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(err.is_retryable());
    }
}
