use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cleanup::error::AgentError;
use super::cleanup::traits::AgentClient;

/// Ollama HTTP client used for both the extraction and the review agent.
///
/// Requests are plain futures: dropping one (timeout, cancellation) aborts
/// the underlying HTTP request.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for the instance at `base_url`.
    ///
    /// `transport_timeout` is a hard ceiling on any single request; the
    /// pipeline applies its own, shorter, per-stage deadlines on top.
    pub fn new(base_url: &str, transport_timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(transport_timeout)
            .build()
            .map_err(|e| AgentError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl AgentClient for OllamaClient {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AgentError::Connection(self.base_url.clone())
                } else {
                    AgentError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }
}

type Responder = dyn Fn(&str, &str) -> Result<String, AgentError> + Send + Sync;

/// Scripted agent for tests. Answers from a closure of `(system, prompt)`.
pub struct MockAgentClient {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockAgentClient {
    /// Always answer with the same text.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::with_responder(move |_, _| Ok(response.clone()))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, AgentError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with a transport error.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_responder(move |_, _| Err(AgentError::HttpClient(message.clone())))
    }

    /// Sleep before answering (pair with a paused tokio clock in tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn generate(&self, _model: &str, system: &str, prompt: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(system, prompt)
    }
}
