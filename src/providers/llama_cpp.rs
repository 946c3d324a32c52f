//! llama.cpp server provider
//!
//! Talks to the `/health` and `/completion` endpoints of a locally running
//! llama.cpp-compatible server. Streaming responses arrive as newline
//! separated `data: {json}` lines and are exposed as a [`FragmentStream`].

use crate::config::{GenerationConfig, ServerConfig};
use crate::error::{Result, StickllmError};
use crate::providers::{CompletionProvider, FragmentStream, HealthReport};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Completion client for a llama.cpp server
///
/// # Examples
///
/// ```
/// use stickllm::config::Config;
/// use stickllm::providers::LlamaCppProvider;
///
/// let config = Config::default();
/// let provider = LlamaCppProvider::new(&config.server, &config.generation);
/// assert!(provider.is_ok());
/// ```
pub struct LlamaCppProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
    generation: GenerationConfig,
}

/// Request body for `POST /completion`
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    n_predict: u32,
    stop: &'a [String],
    stream: bool,
}

impl LlamaCppProvider {
    /// Create a new provider for the configured server
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(server: &ServerConfig, generation: &GenerationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(server.timeout);
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("stickllm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StickllmError::Network(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Initialized llama.cpp provider: url={}", server.url);

        Ok(Self {
            client,
            base_url: server.url.trim_end_matches('/').to_string(),
            timeout,
            health_timeout: Duration::from_secs(server.health_timeout),
            generation: generation.clone(),
        })
    }

    /// Base URL of the server, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(&'a self, prompt: &'a str, stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            prompt,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
            n_predict: self.generation.n_predict,
            stop: &self.generation.stop,
            stream,
        }
    }

    async fn probe_once(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| StickllmError::Network(format!("Health probe failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                StickllmError::Network(format!("Health endpoint returned {}", status)).into(),
            );
        }
        Ok(())
    }

    async fn post_completion(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/completion", self.base_url);
        tracing::debug!(
            "Requesting completion: stream={}, prompt_len={}",
            stream,
            prompt.len()
        );

        let send = self
            .client
            .post(&url)
            .json(&self.request_body(prompt, stream))
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                StickllmError::Network(format!(
                    "Completion request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                tracing::warn!("Completion request failed: {}", e);
                StickllmError::Network(format!("Failed to connect to completion server: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Completion server returned error {}: {}", status, error_text);
            return Err(StickllmError::Network(format!(
                "Completion server returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for LlamaCppProvider {
    async fn probe_health(&self, retries: u32, wait: Duration) -> HealthReport {
        let mut report = HealthReport {
            healthy: false,
            attempts: 0,
            waits: 0,
        };

        for attempt in 1..=retries {
            report.attempts = attempt;
            match self.probe_once().await {
                Ok(()) => {
                    tracing::debug!("Completion server healthy after {} attempt(s)", attempt);
                    report.healthy = true;
                    return report;
                }
                Err(e) => {
                    tracing::debug!("Health probe {}/{} failed: {}", attempt, retries, e);
                    if attempt < retries {
                        tokio::time::sleep(wait).await;
                        report.waits += 1;
                    }
                }
            }
        }

        tracing::warn!("Completion server unreachable after {} attempt(s)", retries);
        report
    }

    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream> {
        let response = self.post_completion(prompt, true).await?;
        Ok(fragment_stream(response.bytes_stream().boxed(), self.timeout))
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        let response = self.post_completion(prompt, false).await?;
        let body: serde_json::Value = tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| StickllmError::Network("Timed out reading completion".to_string()))?
            .map_err(|e| {
                StickllmError::Network(format!("Failed to parse completion response: {}", e))
            })?;

        body.get("content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StickllmError::Network("Completion response has no content field".to_string())
                    .into()
            })
    }
}

/// One parsed line of a streaming response
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Fragment(String),
    Skip,
    Done,
}

/// Parse a single streamed line
///
/// Blank lines and SSE comments are skipped, a `data: ` prefix is removed
/// and the rest must be a JSON object whose string `content` field is the
/// fragment.
fn parse_stream_line(raw: &[u8]) -> Result<StreamLine> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| StickllmError::Network(format!("Invalid UTF-8 in stream: {}", e)))?;
    let line = line.trim_end_matches(['\r', '\n']);

    if line.trim().is_empty() || line.starts_with(':') {
        return Ok(StreamLine::Skip);
    }

    let payload = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
        .unwrap_or(line);

    if payload.trim() == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        tracing::warn!("Malformed stream line: {}", payload);
        StickllmError::Network(format!("Malformed stream data: {}", e))
    })?;

    match value.get("content").and_then(|c| c.as_str()) {
        Some(content) if !content.is_empty() => Ok(StreamLine::Fragment(content.to_string())),
        _ => Ok(StreamLine::Skip),
    }
}

struct LineState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    ready: VecDeque<Result<String>>,
    read_timeout: Duration,
    finished: bool,
}

impl LineState {
    /// Parse one line into `ready`; returns false once the stream must stop
    fn push_line(&mut self, raw: &[u8]) -> bool {
        match parse_stream_line(raw) {
            Ok(StreamLine::Fragment(fragment)) => {
                self.ready.push_back(Ok(fragment));
                true
            }
            Ok(StreamLine::Skip) => true,
            Ok(StreamLine::Done) => false,
            Err(e) => {
                self.ready.push_back(Err(e));
                false
            }
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if !self.push_line(&line) {
                self.finished = true;
                return;
            }
        }
    }
}

/// Turn a raw response body into a stream of content fragments
///
/// Each body read is bounded by `read_timeout`; a stalled server ends the
/// stream with a network error.
fn fragment_stream(
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    read_timeout: Duration,
) -> FragmentStream {
    let state = LineState {
        body,
        buffer: Vec::new(),
        ready: VecDeque::new(),
        read_timeout,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match tokio::time::timeout(state.read_timeout, state.body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_complete_lines();
                }
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    state.ready.push_back(Err(StickllmError::Network(format!(
                        "Stream interrupted: {}",
                        e
                    ))
                    .into()));
                }
                Ok(None) => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.push_line(&rest);
                }
                Err(_) => {
                    state.finished = true;
                    state.ready.push_back(Err(StickllmError::Network(format!(
                        "No data from completion server for {}s",
                        state.read_timeout.as_secs()
                    ))
                    .into()));
                }
            }
        }
    })
    .boxed()
}
