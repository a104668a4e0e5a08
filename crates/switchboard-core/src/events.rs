use serde::{Deserialize, Serialize};

use crate::types::{EntryId, Role, StreamId, Target, Timestamp};

/// Why an analytics stream stopped accepting deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamCloseReason {
    /// The backend signalled end-of-stream.
    Completed,
    /// Transport error or abrupt close mid-stream.
    Failed,
    /// A newer stream was opened in the same chat pane.
    Superseded,
}

/// Domain events raised by a chat session.
///
/// Consumed by transcript observers and forwarded by the API onto its SSE
/// broadcast channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConsoleEvent {
    /// A new entry was appended to the transcript.
    EntryAppended {
        entry_id: EntryId,
        role: Role,
        source: Option<Target>,
        timestamp: Timestamp,
    },

    /// The streaming tail entry received more content.
    EntryExtended {
        entry_id: EntryId,
        content_len: usize,
        timestamp: Timestamp,
    },

    /// The set of sources that produced entries changed (full set, never a diff).
    SourcesChanged {
        sources: Vec<Target>,
        timestamp: Timestamp,
    },

    /// An analytics stream was opened.
    StreamOpened {
        stream_id: StreamId,
        source: Target,
        timestamp: Timestamp,
    },

    /// An analytics stream was closed.
    StreamClosed {
        stream_id: StreamId,
        reason: StreamCloseReason,
        timestamp: Timestamp,
    },
}

impl ConsoleEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ConsoleEvent::EntryAppended { timestamp, .. }
            | ConsoleEvent::EntryExtended { timestamp, .. }
            | ConsoleEvent::SourcesChanged { timestamp, .. }
            | ConsoleEvent::StreamOpened { timestamp, .. }
            | ConsoleEvent::StreamClosed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging and SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            ConsoleEvent::EntryAppended { .. } => "entry_appended",
            ConsoleEvent::EntryExtended { .. } => "entry_extended",
            ConsoleEvent::SourcesChanged { .. } => "sources_changed",
            ConsoleEvent::StreamOpened { .. } => "stream_opened",
            ConsoleEvent::StreamClosed { .. } => "stream_closed",
        }
    }
}
