//! HTTP transport for the backend services.
//!
//! Request/response calls decode a JSON body; the analytics stream is read as
//! Server-Sent Events and decoded incrementally.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use switchboard_chart::TabularResult;
use switchboard_core::config::DispatchConfig;
use switchboard_core::Target;
use tracing::{debug, warn};

use super::{Backend, BackendResult, DeltaStream, StreamEvent};
use crate::error::BackendError;

/// `reqwest` implementation of [`Backend`].
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client whose request/response calls time out after `timeout`.
    ///
    /// Streams are bounded only by the connect timeout; a long analytics
    /// answer is not cut off mid-stream.
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, BackendError> {
        Self::new(Duration::from_secs(config.request_timeout_secs))
    }

    fn map_error(&self, err: reqwest::Error) -> BackendError {
        map_reqwest_error(err, self.timeout.as_secs())
    }

    /// Send a request and decode its JSON body. An empty body decodes to null.
    async fn fetch_json(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let response = check_status(response).await?;
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn knowledge_ask(
        &self,
        endpoint: &str,
        prompt: &str,
    ) -> Result<BackendResult, BackendError> {
        debug!(endpoint = %endpoint, "POST knowledge");
        let raw = self
            .fetch_json(self.client.post(endpoint).json(&json!({ "prompt": prompt })))
            .await?;
        Ok(BackendResult::from_payload(Target::Knowledge, raw))
    }

    async fn analytics_ask_once(
        &self,
        endpoint: &str,
        prompt: &str,
    ) -> Result<BackendResult, BackendError> {
        debug!(endpoint = %endpoint, "POST analytics");
        let raw = self
            .fetch_json(self.client.post(endpoint).json(&json!({ "prompt": prompt })))
            .await?;
        Ok(BackendResult::from_payload(Target::Analytics, raw))
    }

    async fn analytics_ask(
        &self,
        endpoint: &str,
        prompt: &str,
    ) -> Result<DeltaStream, BackendError> {
        debug!(endpoint = %endpoint, "GET analytics stream");
        let response = self
            .client
            .get(endpoint)
            .query(&[("prompt", prompt)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let response = check_status(response).await?;

        let timeout_secs = self.timeout.as_secs();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| map_reqwest_error(e, timeout_secs)));
        Ok(sse_events(body))
    }

    async fn tasks_digest(&self, endpoint: &str) -> Result<BackendResult, BackendError> {
        debug!(endpoint = %endpoint, "GET tasks digest");
        let raw = self.fetch_json(self.client.get(endpoint)).await?;
        Ok(BackendResult::from_payload(Target::Tasks, raw))
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout_secs: u64) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout_secs)
    } else if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else if err.is_connect() {
        BackendError::Transport(format!("connection failed: {}", err))
    } else {
        BackendError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Backend returned error status");
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

// =============================================================================
// Server-Sent Events
// =============================================================================

/// Turn a raw SSE byte stream into a [`DeltaStream`].
///
/// A transport error is yielded once and ends the stream. Data still buffered
/// when the body ends is flushed as a final event.
pub fn sse_events<S, B>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, BackendError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    struct State<S> {
        body: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<StreamEvent>,
        finished: bool,
    }

    let state = State {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    let events = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    });

    Box::pin(events)
}

/// Incremental SSE decoder.
///
/// Buffers partial lines across chunks, joins multi-line `data:` fields and
/// emits one event per blank-line-terminated block. Comments and non-data
/// fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left when the body ends.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.feed_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(parse_event_data(data))
    }
}

/// Interpret one event's data.
///
/// `[DONE]` ends the stream. A JSON object with `delta` (or `content`) is a
/// content fragment, one with `columns` and `rows` is a table, and anything
/// else is taken verbatim as a fragment.
fn parse_event_data(data: String) -> StreamEvent {
    if data.trim() == "[DONE]" {
        return StreamEvent::Done;
    }
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&data) {
        if let Some(text) = value
            .get("delta")
            .or_else(|| value.get("content"))
            .and_then(Value::as_str)
        {
            return StreamEvent::Delta(text.to_string());
        }
        if let Some(table) = TabularResult::from_payload(&value) {
            return StreamEvent::Table(table);
        }
    }
    StreamEvent::Delta(data)
}
