//! Backend contracts and typed results.
//!
//! Defines the async `Backend` trait the router dispatches through and the
//! per-target result types built from untyped JSON payloads.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use switchboard_chart::TabularResult;
use switchboard_core::Target;

use crate::error::BackendError;

pub use http::HttpBackend;

/// Content used when a payload carries nothing displayable.
pub const EMPTY_RESPONSE: &str = "No response received.";

/// Incremental feed of one analytics stream.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, BackendError>> + Send>>;

/// One event read from an analytics stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A content fragment to append.
    Delta(String),
    /// A tabular payload to chart against the streamed entry.
    Table(TabularResult),
    /// End of stream.
    Done,
}

/// Transport to the knowledge, analytics and task services.
///
/// Every call receives the resolved endpoint so the implementation never
/// needs its own routing table.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn knowledge_ask(&self, endpoint: &str, prompt: &str)
        -> Result<BackendResult, BackendError>;

    /// Single complete analytics answer, used by fan-out.
    async fn analytics_ask_once(
        &self,
        endpoint: &str,
        prompt: &str,
    ) -> Result<BackendResult, BackendError>;

    /// Streamed analytics answer, used for the single-target path.
    async fn analytics_ask(&self, endpoint: &str, prompt: &str)
        -> Result<DeltaStream, BackendError>;

    async fn tasks_digest(&self, endpoint: &str) -> Result<BackendResult, BackendError>;
}

/// Issue the request/response call for `target`.
///
/// Analytics goes through `analytics_ask_once`; streaming is the caller's
/// decision, not this helper's.
pub async fn request_once(
    backend: &dyn Backend,
    target: Target,
    endpoint: &str,
    prompt: &str,
) -> Result<BackendResult, BackendError> {
    match target {
        Target::Knowledge => backend.knowledge_ask(endpoint, prompt).await,
        Target::Analytics => backend.analytics_ask_once(endpoint, prompt).await,
        Target::Tasks => backend.tasks_digest(endpoint).await,
    }
}

// =============================================================================
// Typed results
// =============================================================================

/// A citation returned by the knowledge service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeResult {
    pub answer: Option<String>,
    pub sources: Vec<SourceRef>,
    pub entities: Vec<Value>,
    pub table: Option<TabularResult>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResult {
    pub narrative: Option<String>,
    pub answer: Option<String>,
    pub sql: Option<String>,
    pub table: Option<TabularResult>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TasksResult {
    pub answer: Option<String>,
    pub narrative: Option<String>,
    pub table: Option<TabularResult>,
    pub raw: Value,
}

/// A backend reply tagged by the endpoint that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum BackendResult {
    Knowledge(KnowledgeResult),
    Analytics(AnalyticsResult),
    Tasks(TasksResult),
}

impl BackendResult {
    /// Build the typed result for `target` from an untyped payload.
    pub fn from_payload(target: Target, raw: Value) -> Self {
        match target {
            Target::Knowledge => BackendResult::Knowledge(KnowledgeResult {
                answer: text_field(&raw, "answer"),
                sources: sources_field(&raw),
                entities: raw
                    .get("entities")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                table: TabularResult::from_payload(&raw),
                raw,
            }),
            Target::Analytics => BackendResult::Analytics(AnalyticsResult {
                narrative: text_field(&raw, "narrative"),
                answer: text_field(&raw, "answer"),
                sql: text_field(&raw, "sql"),
                table: TabularResult::from_payload(&raw),
                raw,
            }),
            Target::Tasks => BackendResult::Tasks(TasksResult {
                answer: text_field(&raw, "answer"),
                narrative: text_field(&raw, "narrative"),
                table: TabularResult::from_payload(&raw),
                raw,
            }),
        }
    }

    pub fn target(&self) -> Target {
        match self {
            BackendResult::Knowledge(_) => Target::Knowledge,
            BackendResult::Analytics(_) => Target::Analytics,
            BackendResult::Tasks(_) => Target::Tasks,
        }
    }

    pub fn raw(&self) -> &Value {
        match self {
            BackendResult::Knowledge(r) => &r.raw,
            BackendResult::Analytics(r) => &r.raw,
            BackendResult::Tasks(r) => &r.raw,
        }
    }

    /// Display content: `answer`, then `narrative`, then the payload as
    /// pretty-printed JSON, then a fixed placeholder for an empty payload.
    pub fn content(&self) -> String {
        let raw = self.raw();
        if let Some(text) = text_field(raw, "answer").or_else(|| text_field(raw, "narrative")) {
            return text;
        }
        if is_empty_payload(raw) {
            return EMPTY_RESPONSE.to_string();
        }
        serde_json::to_string_pretty(raw).unwrap_or_else(|_| EMPTY_RESPONSE.to_string())
    }

    /// Tabular payload to chart, if the reply carried one.
    pub fn tabular(&self) -> Option<&TabularResult> {
        match self {
            BackendResult::Knowledge(r) => r.table.as_ref(),
            BackendResult::Analytics(r) => r.table.as_ref(),
            BackendResult::Tasks(r) => r.table.as_ref(),
        }
    }
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn sources_field(raw: &Value) -> Vec<SourceRef> {
    let Some(items) = raw.get("sources").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(SourceRef {
                title: s.clone(),
                url: None,
            }),
            Value::Object(_) => {
                let url = text_field(item, "url");
                let title = text_field(item, "title").or_else(|| url.clone())?;
                Some(SourceRef { title, url })
            }
            _ => None,
        })
        .collect()
}

fn is_empty_payload(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
