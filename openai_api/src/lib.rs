//! A client for OpenAI's assistant-run API.
//!
//! This crate provides an `OpenAIHandler` that drives one complete
//! create/poll/extract cycle per request against the Assistants v2 endpoints,
//! plus a single-turn chat completion used by the threadless mode.

mod chat_completion;
mod models;
mod retry;
mod run_completion;

pub use chat_completion::chat_completion;
pub use models::RunStatus;
pub use retry::RetryPolicy;
pub use run_completion::{run_completion, RunError};

use std::error::Error;
use std::time::Duration;

use completion::RequestHandler;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot::Sender;
use tracing::*;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Cap on any single provider request. Without it a connection that accepts
/// but never responds would stall the worker past its own poll deadline.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One handler per process is enough; it is cheap to clone into the
/// per-request worker task.
#[derive(Clone)]
pub struct OpenAIHandler {
    pub api_key: String,
    pub assistant_id: String,
    /// Model used by the single-turn chat completion.
    pub model: String,
    /// Overridable so tests can point the client at a local stub server.
    pub base_url: String,
    pub client: reqwest::Client,
    pub poll: RetryPolicy,
    /// Per-request transport bound, applied to every provider call.
    pub http_timeout: Duration,
}

impl OpenAIHandler {
    pub fn new(api_key: String, assistant_id: String, model: String) -> Self {
        OpenAIHandler {
            api_key,
            assistant_id,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            poll: RetryPolicy::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(self.http_timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ProviderError> {
        trace!("POST {}{}", self.base_url, path);
        let resp = self.request(Method::POST, path).json(body).send().await?;
        decode(resp).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        trace!("GET {}{}", self.base_url, path);
        let resp = self.request(Method::GET, path).send().await?;
        decode(resp).await
    }
}

/// Anything that can go wrong talking to the provider, decoded once at the
/// client boundary.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{0}")]
    Malformed(&'static str),
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ProviderError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ProviderError::Status { status, body });
    }
    Ok(resp.json().await?)
}

impl RequestHandler for OpenAIHandler {
    fn answer_request(&self, prompt: &str, result: Sender<String>) {
        let handler = self.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            let response = match run_completion(&handler, &prompt).await {
                Ok(text) => text,
                Err(e) => {
                    error!("run_completion failed: {}", e);
                    e.response_text()
                }
            };
            let _ = result.send(response);
        });
    }

    fn single_completion(
        &self,
        message: &str,
        result: Sender<Result<String, Box<dyn Error + Send + Sync>>>,
    ) {
        let handler = self.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            let r: Result<String, Box<dyn Error + Send + Sync>> =
                chat_completion(&handler, &message)
                    .await
                    .map_err(|e| e.into());
            let _ = result.send(r);
        });
    }
}
