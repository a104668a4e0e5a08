//! Route handler functions for all API endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use switchboard_chart::{resolve, ChartSpec, TabularResult};
use switchboard_chat::{classify_detailed, ChatEntry, CommandSuggestion, Intent};
use switchboard_core::Target;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / query types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CommandParams {
    pub input: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub transcript_len: usize,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub intent: Intent,
    pub matched: Vec<Target>,
    pub reasons: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub chart_spec: ChartSpec,
    pub chartjs: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub entries: Vec<ChatEntry>,
    pub active_sources: Vec<Target>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub entries: Vec<ChatEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<Target>,
}

#[derive(Debug, Serialize)]
pub struct CommandsResponse {
    pub visible: bool,
    pub suggestions: Vec<CommandSuggestion>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let transcript_len = state.session.lock().await.transcript().len();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        transcript_len,
    })
}

/// POST /router/classify - classify a prompt without dispatching it.
pub async fn classify(
    Json(body): Json<PromptRequest>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    let classification = classify_detailed(prompt);
    debug!(intent = %classification.intent, "Classified via API");
    Ok(Json(ClassifyResponse {
        intent: classification.intent,
        matched: classification.matched.into_iter().collect(),
        reasons: classification.reasons,
    }))
}

/// POST /charts/render - resolve a chart for a tabular payload.
pub async fn render_chart(
    State(state): State<AppState>,
    Json(table): Json<TabularResult>,
) -> Json<RenderResponse> {
    let chart_spec = resolve(&table);
    let chartjs = chart_spec.to_chartjs(&state.config.chart.color);
    Json(RenderResponse {
        chart_spec,
        chartjs,
    })
}

/// POST /chat - submit a prompt and return the entries it produced.
///
/// A streamed answer is drained before responding; its progress is visible
/// on `/stream` meanwhile.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<PromptRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let entries = session.ask(&body.prompt).await?;
    info!(appended = entries.len(), "Prompt handled");
    Ok(Json(ChatResponse {
        entries,
        active_sources: session.active_sources().iter().copied().collect(),
    }))
}

/// GET /chat/transcript - most recent entries, oldest first.
pub async fn transcript(
    State(state): State<AppState>,
    Query(params): Query<TranscriptParams>,
) -> Json<TranscriptResponse> {
    let limit = params
        .limit
        .unwrap_or(state.config.dispatch.history_window);
    let session = state.session.lock().await;
    let transcript = session.transcript();
    Json(TranscriptResponse {
        entries: transcript.last_n(limit).to_vec(),
        total: transcript.len(),
    })
}

/// GET /chat/sources - targets that have answered this session.
pub async fn sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    let session = state.session.lock().await;
    Json(SourcesResponse {
        sources: session.active_sources().iter().copied().collect(),
    })
}

/// GET /commands - slash-command suggestions for the current input.
pub async fn commands(
    State(state): State<AppState>,
    Query(params): Query<CommandParams>,
) -> Json<CommandsResponse> {
    let input = params.input.unwrap_or_default();
    Json(CommandsResponse {
        visible: switchboard_chat::CommandPalette::is_command(&input),
        suggestions: state.palette.suggest(&input),
    })
}

/// GET /stream - SSE feed of session events.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event(event.event_name()).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
