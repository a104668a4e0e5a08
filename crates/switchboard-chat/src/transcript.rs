//! Session transcript: ordered chat entries plus the active-source set.
//!
//! Entries are append-only. Only the last entry may be mutated, and only by
//! the caller that names it by id, which is how an in-flight stream extends
//! its own entry without touching anything appended after it.

use std::collections::BTreeSet;

use serde::Serialize;
use switchboard_chart::ChartSpec;
use switchboard_core::{ConsoleEvent, EntryId, Role, Target, Timestamp};
use tracing::debug;

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEntry {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    pub source: Option<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    /// Content describes a backend failure rather than an answer.
    pub is_error: bool,
    pub created_at: Timestamp,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn assistant(content: impl Into<String>, source: Option<Target>) -> Self {
        Self::new(Role::Assistant, content, source)
    }

    /// An assistant entry reporting a failed backend call.
    pub fn error(content: impl Into<String>, source: Option<Target>) -> Self {
        Self {
            is_error: true,
            ..Self::new(Role::Assistant, content, source)
        }
    }

    pub fn with_chart(mut self, chart: Option<ChartSpec>) -> Self {
        self.chart = chart;
        self
    }

    fn new(role: Role, content: impl Into<String>, source: Option<Target>) -> Self {
        Self {
            id: EntryId::new(),
            role,
            content: content.into(),
            source,
            chart: None,
            is_error: false,
            created_at: Timestamp::now(),
        }
    }
}

/// Receives transcript events.
pub trait TranscriptObserver: Send {
    fn on_event(&mut self, event: &ConsoleEvent);
}

/// Handle returned by [`Transcript::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
    active_sources: BTreeSet<Target>,
    observers: Vec<(ObserverId, Box<dyn TranscriptObserver>)>,
    next_observer: u64,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("entries", &self.entries.len())
            .field("active_sources", &self.active_sources)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and notify observers.
    ///
    /// An entry with a source adds it to the active set and raises
    /// `SourcesChanged` carrying the full set, whether or not it grew.
    pub fn append(&mut self, entry: ChatEntry) -> EntryId {
        let id = entry.id;
        let role = entry.role;
        let source = entry.source;
        self.entries.push(entry);

        self.emit(&ConsoleEvent::EntryAppended {
            entry_id: id,
            role,
            source,
            timestamp: Timestamp::now(),
        });

        if let Some(target) = source {
            self.active_sources.insert(target);
            let sources: Vec<Target> = self.active_sources.iter().copied().collect();
            debug!(sources = ?sources, "Active sources");
            self.emit(&ConsoleEvent::SourcesChanged {
                sources,
                timestamp: Timestamp::now(),
            });
        }
        id
    }

    /// Append `delta` to the last entry if it is `id`.
    ///
    /// Returns the new content length, or `None` when `id` is no longer the
    /// last entry.
    pub fn extend_tail(&mut self, id: EntryId, delta: &str) -> Option<usize> {
        let tail = self.entries.last_mut().filter(|e| e.id == id)?;
        tail.content.push_str(delta);
        let content_len = tail.content.len();
        self.emit(&ConsoleEvent::EntryExtended {
            entry_id: id,
            content_len,
            timestamp: Timestamp::now(),
        });
        Some(content_len)
    }

    /// Attach a chart to the last entry if it is `id`.
    pub fn attach_chart_to_tail(&mut self, id: EntryId, chart: ChartSpec) -> bool {
        match self.entries.last_mut().filter(|e| e.id == id) {
            Some(tail) => {
                tail.chart = Some(chart);
                true
            }
            None => false,
        }
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    /// The most recent `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> &[ChatEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&ChatEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Targets that produced at least one entry this session.
    pub fn active_sources(&self) -> &BTreeSet<Target> {
        &self.active_sources
    }

    pub fn subscribe(&mut self, observer: Box<dyn TranscriptObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Deliver an event to every observer, in subscription order.
    pub fn emit(&mut self, event: &ConsoleEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer.on_event(event);
        }
    }
}
