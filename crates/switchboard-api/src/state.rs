//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use switchboard_chat::{Backend, ChatSession, CommandPalette, TranscriptObserver};
use switchboard_core::{ConsoleEvent, SwitchboardConfig};
use tokio::sync::{broadcast, Mutex};

/// Shared application state.
///
/// The chat session sits behind an async mutex: one prompt is dispatched at
/// a time, matching the single-writer transcript.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SwitchboardConfig>,
    pub session: Arc<Mutex<ChatSession>>,
    pub palette: CommandPalette,
    /// Broadcast sender for SSE events.
    pub event_tx: broadcast::Sender<ConsoleEvent>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: SwitchboardConfig, backend: Arc<dyn Backend>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let mut session = ChatSession::from_config(backend, &config);
        session.subscribe(Box::new(BroadcastObserver {
            tx: event_tx.clone(),
        }));

        Self {
            config: Arc::new(config),
            session: Arc::new(Mutex::new(session)),
            palette: CommandPalette,
            event_tx,
            start_time: Instant::now(),
        }
    }
}

/// Forwards transcript events onto the SSE broadcast channel.
struct BroadcastObserver {
    tx: broadcast::Sender<ConsoleEvent>,
}

impl TranscriptObserver for BroadcastObserver {
    fn on_event(&mut self, event: &ConsoleEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}
