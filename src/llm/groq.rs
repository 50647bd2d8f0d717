//! Groq backend: OpenAI-compatible chat completions over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

const PROVIDER: &str = "groq";

/// Default Groq endpoint (OpenAI-compatible).
pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Maximum number of error-body characters carried into an error message.
const ERROR_BODY_PREVIEW: usize = 200;

/// HTTP client bound to a single API key.
pub struct GroqClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GroqClient {
    /// Build a client for one key. Fails if the key cannot be used as a
    /// header value or the HTTP client cannot be constructed.
    pub fn new(api_key: &SecretString, api_base: &str) -> Result<Self, LlmError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|_| LlmError::ClientInit {
                provider: PROVIDER.to_string(),
                reason: "API key contains characters not allowed in a header".to_string(),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::ClientInit {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        })
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for GroqClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ApiRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;
        parse_completion(&text)
    }
}

/// Map a non-success HTTP status to an `LlmError`.
async fn status_error(response: reqwest::Response) -> LlmError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        _ => {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {preview}"),
            }
        }
    }
}

/// Parse a chat-completions body, taking the first choice's text.
fn parse_completion(body: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: ApiResponse = serde_json::from_str(body)?;
    let usage = parsed.usage.unwrap_or(ApiUsage {
        prompt_tokens: 0,
        completion_tokens: 0,
    });

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response has no choices".to_string(),
        })?;

    let content = choice.message.content.ok_or_else(|| LlmError::InvalidResponse {
        provider: PROVIDER.to_string(),
        reason: "first choice has no message content".to_string(),
    })?;

    Ok(CompletionResponse {
        content,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        response_id: parsed.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"message": {"role": "assistant", "content": "Terracotta tiles"}, "finish_reason": "stop"},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let resp = parse_completion(body).unwrap();
        assert_eq!(resp.content, "Terracotta tiles");
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.response_id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn parse_without_choices_is_invalid() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.category(), "invalid_response");
    }

    #[test]
    fn parse_null_content_is_invalid() {
        let err =
            parse_completion(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap_err();
        assert_eq!(err.category(), "invalid_response");
    }

    #[test]
    fn parse_garbage_is_json_error() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.category(), "json");
    }

    #[test]
    fn key_with_newline_fails_to_construct() {
        let key = SecretString::from("gsk_abc\ndef");
        let err = GroqClient::new(&key, DEFAULT_API_BASE).err().unwrap();
        assert_eq!(err.category(), "client_init");
        // The secret must not leak into the error text.
        assert!(!err.to_string().contains("gsk_abc"));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let key = SecretString::from("gsk_test");
        let client = GroqClient::new(&key, "http://localhost:1234/v1/").unwrap();
        assert_eq!(client.endpoint, "http://localhost:1234/v1/chat/completions");
    }

    #[tokio::test]
    async fn sends_bearer_and_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk_good")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model": "llama-3.1-8b-instant", "messages": [{"role": "user", "content": "hi"}]}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}]}"#)
            .create_async()
            .await;

        let client = GroqClient::new(&SecretString::from("gsk_good"), &server.url()).unwrap();
        let resp = client
            .complete(CompletionRequest::new(
                "llama-3.1-8b-instant",
                vec![ChatMessage::user("hi")],
            ))
            .await
            .unwrap();

        assert_eq!(resp.content, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Invalid API Key"}}"#)
            .create_async()
            .await;

        let client = GroqClient::new(&SecretString::from("gsk_bad"), &server.url()).unwrap();
        let err = client
            .complete(CompletionRequest::new("m", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let client = GroqClient::new(&SecretString::from("gsk_busy"), &server.url()).unwrap();
        let err = client
            .complete(CompletionRequest::new("m", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        match err {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_includes_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let client = GroqClient::new(&SecretString::from("gsk_x"), &server.url()).unwrap();
        let err = client
            .complete(CompletionRequest::new("m", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("503"), "unexpected message: {msg}");
        assert!(msg.contains("upstream unavailable"));
    }
}
