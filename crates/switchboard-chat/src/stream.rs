//! Streaming aggregation of analytics answers.
//!
//! State machine: Idle -> Streaming -> Closed. At most one stream is open at
//! a time; opening a new one closes the previous stream as superseded, and
//! deltas carrying a stale stream id are dropped.

use switchboard_chart::{resolve, TabularResult};
use switchboard_core::events::StreamCloseReason;
use switchboard_core::{ConsoleEvent, EntryId, StreamId, Target, Timestamp};
use tracing::{debug, info, warn};

use crate::transcript::{ChatEntry, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream, or a stream waiting for its first delta.
    Idle,
    /// At least one delta has been applied.
    Streaming,
    /// The most recent stream has terminated.
    Closed,
}

#[derive(Debug)]
struct OpenStream {
    id: StreamId,
    target: Target,
    accumulated: String,
    /// Entry currently receiving this stream's content.
    entry: Option<EntryId>,
}

/// Folds the deltas of one stream into a single transcript entry.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    next_id: u64,
    open: Option<OpenStream>,
    closed_any: bool,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        match &self.open {
            Some(stream) if stream.entry.is_some() && !stream.accumulated.is_empty() => {
                StreamState::Streaming
            }
            Some(_) => StreamState::Idle,
            None if self.closed_any => StreamState::Closed,
            None => StreamState::Idle,
        }
    }

    pub fn open_stream(&self) -> Option<StreamId> {
        self.open.as_ref().map(|s| s.id)
    }

    pub fn is_open(&self, id: StreamId) -> bool {
        self.open_stream() == Some(id)
    }

    /// Content accumulated so far by the open stream.
    pub fn accumulated(&self) -> Option<&str> {
        self.open.as_ref().map(|s| s.accumulated.as_str())
    }

    /// Open a stream for `target`, superseding any open one.
    ///
    /// With `placeholder` set, an empty assistant entry is appended at once so
    /// the caller has something to show before the first delta.
    pub fn begin(
        &mut self,
        target: Target,
        transcript: &mut Transcript,
        placeholder: bool,
    ) -> StreamId {
        if let Some(previous) = self.open_stream() {
            self.close(previous, StreamCloseReason::Superseded, transcript);
        }

        self.next_id += 1;
        let id = StreamId(self.next_id);
        let entry =
            placeholder.then(|| transcript.append(ChatEntry::assistant("", Some(target))));

        self.open = Some(OpenStream {
            id,
            target,
            accumulated: String::new(),
            entry,
        });
        transcript.emit(&ConsoleEvent::StreamOpened {
            stream_id: id,
            source: target,
            timestamp: Timestamp::now(),
        });
        info!(stream_id = %id, backend = %target, placeholder, "Stream opened");
        id
    }

    /// Apply one content fragment. Returns false if it was dropped.
    ///
    /// The fragment extends the stream's own entry while that entry is still
    /// the transcript tail. If something else was appended in between, a new
    /// entry is started holding the full accumulated content.
    pub fn apply_delta(&mut self, id: StreamId, delta: &str, transcript: &mut Transcript) -> bool {
        let Some(stream) = self.open.as_mut().filter(|s| s.id == id) else {
            debug!(stream_id = %id, "Dropping delta for stream that is not open");
            return false;
        };
        if delta.is_empty() {
            return false;
        }

        stream.accumulated.push_str(delta);
        let extended = stream
            .entry
            .and_then(|entry| transcript.extend_tail(entry, delta))
            .is_some();
        if !extended {
            let entry = ChatEntry::assistant(stream.accumulated.clone(), Some(stream.target));
            stream.entry = Some(transcript.append(entry));
        }
        debug!(
            stream_id = %id,
            len = stream.accumulated.len(),
            "Applied delta"
        );
        true
    }

    /// Resolve a chart for the stream's table and attach it to its entry.
    pub fn attach_table(
        &mut self,
        id: StreamId,
        table: &TabularResult,
        transcript: &mut Transcript,
    ) -> bool {
        let Some(stream) = self.open.as_mut().filter(|s| s.id == id) else {
            return false;
        };
        let chart = resolve(table);
        let attached = match stream.entry {
            Some(entry) => transcript.attach_chart_to_tail(entry, chart.clone()),
            None => false,
        };
        if !attached {
            let entry = ChatEntry::assistant(stream.accumulated.clone(), Some(stream.target))
                .with_chart(Some(chart));
            stream.entry = Some(transcript.append(entry));
        }
        true
    }

    /// Close the stream. Failures close silently; partial content stands.
    pub fn close(
        &mut self,
        id: StreamId,
        reason: StreamCloseReason,
        transcript: &mut Transcript,
    ) -> bool {
        let Some(stream) = self.open.take_if(|s| s.id == id) else {
            return false;
        };
        self.closed_any = true;

        match reason {
            StreamCloseReason::Failed => warn!(
                stream_id = %id,
                kept = stream.accumulated.len(),
                "Stream failed; keeping partial content"
            ),
            _ => info!(stream_id = %id, reason = ?reason, "Stream closed"),
        }
        transcript.emit(&ConsoleEvent::StreamClosed {
            stream_id: id,
            reason,
            timestamp: Timestamp::now(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::tests::Recorder;
    use serde_json::json;
    use switchboard_core::Role;

    fn contents(transcript: &Transcript) -> Vec<String> {
        transcript.entries().iter().map(|e| e.content.clone()).collect()
    }

    #[test]
    fn test_deltas_accumulate_into_one_entry() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        assert!(transcript.is_empty());
        assert_eq!(agg.state(), StreamState::Idle);

        for delta in ["A", "B", "C"] {
            assert!(agg.apply_delta(id, delta, &mut transcript));
        }
        assert_eq!(agg.state(), StreamState::Streaming);
        assert_eq!(contents(&transcript), vec!["ABC"]);
        let entry = transcript.last().unwrap();
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.source, Some(Target::Analytics));

        assert!(agg.close(id, StreamCloseReason::Completed, &mut transcript));
        assert_eq!(agg.state(), StreamState::Closed);
        assert!(!agg.apply_delta(id, "D", &mut transcript));
        assert_eq!(contents(&transcript), vec!["ABC"]);
    }

    #[test]
    fn test_superseded_stream_cannot_mutate_new_entry() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let first = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(first, "old", &mut transcript);

        let second = agg.begin(Target::Analytics, &mut transcript, false);
        assert_ne!(first, second);
        assert!(!agg.is_open(first));
        agg.apply_delta(second, "new", &mut transcript);
        assert!(!agg.apply_delta(first, " late", &mut transcript));

        assert_eq!(contents(&transcript), vec!["old", "new"]);
    }

    #[test]
    fn test_interleaved_append_starts_fresh_entry() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(id, "Rev", &mut transcript);
        transcript.append(ChatEntry::assistant("unrelated", Some(Target::Tasks)));
        agg.apply_delta(id, "enue", &mut transcript);

        assert_eq!(contents(&transcript), vec!["Rev", "unrelated", "Revenue"]);
        agg.apply_delta(id, "!", &mut transcript);
        assert_eq!(transcript.last().unwrap().content, "Revenue!");
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_matching_foreign_tail_is_not_reused() {
        let mut transcript = Transcript::new();
        transcript.append(ChatEntry::assistant("fan-out answer", Some(Target::Analytics)));
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(id, "stream", &mut transcript);
        assert_eq!(contents(&transcript), vec!["fan-out answer", "stream"]);
    }

    #[test]
    fn test_placeholder_entry_is_extended() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, true);
        assert_eq!(contents(&transcript), vec![""]);
        assert_eq!(agg.state(), StreamState::Idle);
        agg.apply_delta(id, "hi", &mut transcript);
        assert_eq!(contents(&transcript), vec!["hi"]);
    }

    #[test]
    fn test_empty_delta_is_ignored() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        assert!(!agg.apply_delta(id, "", &mut transcript));
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_failure_closes_silently_keeping_partial_content() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(id, "partial", &mut transcript);
        assert!(agg.close(id, StreamCloseReason::Failed, &mut transcript));
        assert_eq!(contents(&transcript), vec!["partial"]);
        assert!(!transcript.last().unwrap().is_error);
        assert!(!agg.close(id, StreamCloseReason::Failed, &mut transcript));
    }

    #[test]
    fn test_attach_table_charts_stream_entry() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(id, "Monthly totals", &mut transcript);
        let table = TabularResult::from_payload(&json!({
            "columns": ["month", "value"],
            "rows": [["2024-01", 100], ["2024-02", 120]],
            "viz_hints": {"isTimeSeries": true}
        }))
        .unwrap();
        assert!(agg.attach_table(id, &table, &mut transcript));
        assert_eq!(transcript.len(), 1);
        let chart = transcript.last().unwrap().chart.as_ref().unwrap();
        assert_eq!(chart.kind, switchboard_chart::ChartKind::Line);
    }

    #[test]
    fn test_table_before_any_delta_appends_entry() {
        let mut transcript = Transcript::new();
        let mut agg = StreamAggregator::new();
        let id = agg.begin(Target::Analytics, &mut transcript, false);
        let table = TabularResult::new(vec!["k".into(), "v".into()], vec![vec![json!("a"), json!(1)]]);
        assert!(agg.attach_table(id, &table, &mut transcript));
        assert_eq!(transcript.len(), 1);
        assert!(transcript.last().unwrap().chart.is_some());
        agg.apply_delta(id, "text", &mut transcript);
        assert_eq!(contents(&transcript), vec!["text"]);
    }

    #[test]
    fn test_stream_events_are_emitted() {
        let recorder = Recorder::default();
        let mut transcript = Transcript::new();
        transcript.subscribe(Box::new(recorder.clone()));
        let mut agg = StreamAggregator::new();
        let first = agg.begin(Target::Analytics, &mut transcript, false);
        agg.apply_delta(first, "a", &mut transcript);
        agg.apply_delta(first, "b", &mut transcript);
        agg.begin(Target::Analytics, &mut transcript, false);

        assert_eq!(
            recorder.names(),
            vec![
                "stream_opened",
                "entry_appended",
                "sources_changed",
                "entry_extended",
                "stream_closed",
                "stream_opened",
            ]
        );
        let events = recorder.0.lock().unwrap();
        assert!(matches!(
            events[4],
            ConsoleEvent::StreamClosed {
                reason: StreamCloseReason::Superseded,
                ..
            }
        ));
    }
}
