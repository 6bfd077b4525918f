//! HTTP client for the chat agent

use crate::{
    ChatAgent, ChatFuture,
    error::AgentError,
    types::{ChatReply, ChatRequest},
};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default agent endpoint when none is configured
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8000";

/// Chat agent reached over HTTP at `{base_url}/api/v1/chat`
#[derive(Clone, Debug)]
pub struct HttpChatAgent {
    client: Client,
    base_url: String,
}

impl HttpChatAgent {
    /// Create a client for `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `AgentError::RequestFailed` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from `AGENT_URL` and `AGENT_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns `AgentError::RequestFailed` if the HTTP client cannot be built
    pub fn from_env() -> Result<Self, AgentError> {
        let base_url =
            std::env::var("AGENT_URL").unwrap_or_else(|_| DEFAULT_AGENT_URL.to_string());
        let timeout = std::env::var("AGENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        Self::new(base_url, Duration::from_secs(timeout))
    }

    /// Send one message
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, timeouts, non-2xx statuses or
    /// unparsable bodies
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AgentError> {
        let response = self
            .client
            .post(format!("{}/api/v1/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout
                } else {
                    AgentError::RequestFailed(e.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => response
                .json::<ChatReply>()
                .await
                .map_err(|e| AgentError::ResponseParseFailed(e.to_string())),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Err(AgentError::Timeout),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AgentError::ApiError {
                    status: status.as_u16(),
                    message: body,
                })
            },
        }
    }
}

impl ChatAgent for HttpChatAgent {
    fn send(&self, request: ChatRequest) -> ChatFuture<'_> {
        Box::pin(async move {
            let result = self.chat(&request).await;
            if let Err(error) = &result {
                tracing::warn!(error = %error, "Chat agent request failed");
            }
            result
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent(server: &MockServer) -> HttpChatAgent {
        HttpChatAgent::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn posts_message_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .and(body_partial_json(json!({
                "message": "Are you free June 1?",
                "sender_type": "venue",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversation_id": "c-1",
                "response": "Let me check!",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = agent(&server)
            .send(ChatRequest::from_venue("Are you free June 1?", "Sam", "sam@venue.com"))
            .await
            .unwrap();

        assert_eq!(reply.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(reply.response, "Let me check!");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = agent(&server)
            .send(ChatRequest::from_venue("hi", "Sam", "sam@venue.com"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AgentError::ApiError {
                status: 500,
                message: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = agent(&server)
            .send(ChatRequest::from_venue("hi", "Sam", "sam@venue.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ResponseParseFailed(_)));
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"response": "late"})),
            )
            .mount(&server)
            .await;

        let agent = HttpChatAgent::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = agent
            .send(ChatRequest::from_venue("hi", "Sam", "sam@venue.com"))
            .await
            .unwrap_err();

        assert_eq!(err, AgentError::Timeout);
    }
}
