//! OpenAI Assistants (v2) adapter.
//!
//! `OpenAiAssistantsClient` wraps a `reqwest::Client` and maps each
//! [`AssistantsApi`] method onto the corresponding REST call, retrying
//! idempotent calls with exponential back-off on 5xx and transport errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use tl_domain::config::AssistantConfig;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;

use crate::traits::AssistantsApi;
use crate::types::{MessageList, MessageQuery, Run, RunRequest, ThreadMessage, ThreadObject};
use crate::util::{from_reqwest, resolve_api_key, snippet};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Assistants API client. Created once at startup and shared; the inner
/// `reqwest::Client` keeps a connection pool.
#[derive(Clone)]
pub struct OpenAiAssistantsClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl std::fmt::Debug for OpenAiAssistantsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantsClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiAssistantsClient {
    /// Build a client from config, reading the API key from `$api_key_env`.
    pub fn from_config(cfg: &AssistantConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;
        Self::new(cfg, api_key)
    }

    pub fn new(cfg: &AssistantConfig, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .header("X-Request-Id", Uuid::new_v4().to_string())
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Send a request, retrying on 5xx and transport errors when
    /// `idempotent` is set.  4xx responses are never retried; 404 becomes
    /// `Error::NotFound`.
    async fn execute(
        &self,
        endpoint: &str,
        idempotent: bool,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let attempts = if idempotent { self.max_retries + 1 } else { 1 };
        let mut last_err: Option<Error> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    TraceEvent::AssistantsCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    tracing::warn!(endpoint, attempt, error = %e, "assistants request failed");
                    last_err = Some(from_reqwest(e));
                    continue;
                }
            };

            let status = resp.status();
            TraceEvent::AssistantsCall {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
                duration_ms,
            }
            .emit();

            if status.is_success() {
                return Ok(resp);
            }

            let body = resp.text().await.unwrap_or_default();
            let message = format!("{endpoint} returned {status}: {}", snippet(&body));

            if status.is_server_error() {
                tracing::warn!(endpoint, attempt, %status, "assistants service error");
                last_err = Some(Error::ExternalService(message));
                continue;
            }

            return Err(if status == StatusCode::NOT_FOUND {
                Error::NotFound(message)
            } else {
                Error::ExternalService(message)
            });
        }

        Err(last_err
            .unwrap_or_else(|| Error::ExternalService(format!("{endpoint}: all retries exhausted"))))
    }

    async fn parse<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            Error::ExternalService(format!(
                "failed to parse {endpoint} response: {e}: {}",
                snippet(&body)
            ))
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl AssistantsApi for OpenAiAssistantsClient {
    async fn create_thread(&self) -> Result<String> {
        let endpoint = "POST /threads";
        let url = self.url("/threads");
        // A duplicate empty thread is harmless, so this call is retried.
        let resp = self
            .execute(endpoint, true, || {
                self.http.post(&url).json(&serde_json::json!({}))
            })
            .await?;
        let thread: ThreadObject = Self::parse(endpoint, resp).await?;
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let endpoint = "POST /threads/{id}/messages";
        let url = self.url(&format!("/threads/{thread_id}/messages"));
        let body = serde_json::json!({ "role": "user", "content": content });
        let resp = self
            .execute(endpoint, false, || self.http.post(&url).json(&body))
            .await?;
        Self::parse(endpoint, resp).await
    }

    async fn create_run(&self, thread_id: &str, req: RunRequest) -> Result<Run> {
        let endpoint = "POST /threads/{id}/runs";
        let url = self.url(&format!("/threads/{thread_id}/runs"));
        let resp = self
            .execute(endpoint, false, || self.http.post(&url).json(&req))
            .await?;
        Self::parse(endpoint, resp).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let endpoint = "GET /threads/{id}/runs/{run_id}";
        let url = self.url(&format!("/threads/{thread_id}/runs/{run_id}"));
        let resp = self.execute(endpoint, true, || self.http.get(&url)).await?;
        Self::parse(endpoint, resp).await
    }

    async fn list_messages(&self, thread_id: &str, query: MessageQuery) -> Result<MessageList> {
        let endpoint = "GET /threads/{id}/messages";
        let url = self.url(&format!("/threads/{thread_id}/messages"));
        let resp = self
            .execute(endpoint, true, || self.http.get(&url).query(&query))
            .await?;
        Self::parse(endpoint, resp).await
    }
}
