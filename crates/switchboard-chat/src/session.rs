//! Chat session: ties classification, dispatch and aggregation to one
//! transcript.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt;
use switchboard_core::config::{DispatchConfig, SwitchboardConfig};
use switchboard_core::events::StreamCloseReason;
use switchboard_core::{StreamId, Target};
use tracing::{debug, info, warn};

use crate::backend::{Backend, DeltaStream, StreamEvent};
use crate::classifier::classify_detailed;
use crate::error::ChatError;
use crate::router::{Execution, Router};
use crate::stream::{StreamAggregator, StreamState};
use crate::transcript::{ChatEntry, ObserverId, Transcript, TranscriptObserver};

/// Content of the entry appended when no endpoint can take a prompt.
pub const UNROUTABLE_MESSAGE: &str =
    "Unable to determine route. Please try refining your request.";

/// Outcome of submitting a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// All entries for the prompt are in the transcript.
    Completed,
    /// An analytics stream is open; drive it with `poll_stream`.
    Streaming(StreamId),
}

/// One chat pane: a transcript, its router and at most one open stream.
pub struct ChatSession {
    backend: Arc<dyn Backend>,
    router: Router,
    transcript: Transcript,
    aggregator: StreamAggregator,
    stream: Option<(StreamId, DeltaStream)>,
    placeholder: bool,
    max_prompt_chars: usize,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, router: Router, dispatch: &DispatchConfig) -> Self {
        Self {
            backend,
            router,
            transcript: Transcript::new(),
            aggregator: StreamAggregator::new(),
            stream: None,
            placeholder: dispatch.stream_placeholder,
            max_prompt_chars: dispatch.max_prompt_chars,
        }
    }

    pub fn from_config(backend: Arc<dyn Backend>, config: &SwitchboardConfig) -> Self {
        Self::new(
            backend,
            Router::from_config(&config.endpoints),
            &config.dispatch,
        )
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn active_sources(&self) -> &BTreeSet<Target> {
        self.transcript.active_sources()
    }

    pub fn stream_state(&self) -> StreamState {
        self.aggregator.state()
    }

    pub fn subscribe(&mut self, observer: Box<dyn TranscriptObserver>) -> ObserverId {
        self.transcript.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.transcript.unsubscribe(id)
    }

    /// Submit a prompt.
    ///
    /// The trimmed prompt is appended as a user entry before dispatch.
    /// Backend failures are recorded in the transcript, not returned; only a
    /// rejected prompt is an error, and then nothing is appended.
    pub async fn submit(&mut self, prompt: &str) -> Result<Submission, ChatError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        if prompt.chars().count() > self.max_prompt_chars {
            return Err(ChatError::PromptTooLong(self.max_prompt_chars));
        }

        self.transcript.append(ChatEntry::user(prompt));

        let classification = classify_detailed(prompt);
        info!(
            intent = %classification.intent,
            reasons = ?classification.reasons,
            "Classified prompt"
        );
        let plan = self.router.plan(classification.intent);

        if plan.is_streaming() {
            // Drop the previous connection before the new request goes out.
            self.stream = None;
        }

        match self.router.execute(self.backend.as_ref(), &plan, prompt).await {
            Execution::Complete(fragments) => {
                for fragment in fragments {
                    self.transcript.append(fragment.into_entry());
                }
                Ok(Submission::Completed)
            }
            Execution::Stream { target, opened } => {
                let id = self.aggregator.begin(target, &mut self.transcript, self.placeholder);
                match opened {
                    Ok(stream) => self.stream = Some((id, stream)),
                    Err(e) => {
                        let err = ChatError::Stream(e.to_string());
                        warn!(stream_id = %id, error = %err, "Stream could not be opened");
                        self.aggregator
                            .close(id, StreamCloseReason::Failed, &mut self.transcript);
                    }
                }
                Ok(Submission::Streaming(id))
            }
            Execution::Unroutable { .. } => {
                self.transcript
                    .append(ChatEntry::assistant(UNROUTABLE_MESSAGE, None));
                Ok(Submission::Completed)
            }
        }
    }

    /// Read one event from the open stream and apply it.
    ///
    /// Returns false once no stream is open. End of stream closes it as
    /// completed; a stream error closes it silently as failed.
    pub async fn poll_stream(&mut self) -> bool {
        let Some((id, stream)) = self.stream.as_mut() else {
            return false;
        };
        let id = *id;

        match stream.next().await {
            Some(Ok(StreamEvent::Delta(delta))) => {
                self.aggregator
                    .apply_delta(id, &delta, &mut self.transcript);
                true
            }
            Some(Ok(StreamEvent::Table(table))) => {
                debug!(stream_id = %id, rows = table.rows.len(), "Stream carried a table");
                self.aggregator
                    .attach_table(id, &table, &mut self.transcript);
                true
            }
            Some(Ok(StreamEvent::Done)) | None => {
                self.stream = None;
                self.aggregator
                    .close(id, StreamCloseReason::Completed, &mut self.transcript);
                false
            }
            Some(Err(e)) => {
                self.stream = None;
                let err = ChatError::Stream(e.to_string());
                warn!(stream_id = %id, error = %err, "Stream interrupted");
                self.aggregator
                    .close(id, StreamCloseReason::Failed, &mut self.transcript);
                false
            }
        }
    }

    /// Drive the open stream, if any, until it closes.
    pub async fn finish_stream(&mut self) {
        while self.poll_stream().await {}
    }

    /// Submit a prompt, drain any stream it opened, and return the entries
    /// appended for it (the user entry first).
    pub async fn ask(&mut self, prompt: &str) -> Result<Vec<ChatEntry>, ChatError> {
        let start = self.transcript.len();
        self.submit(prompt).await?;
        self.finish_stream().await;
        Ok(self.transcript.entries()[start..].to_vec())
    }
}
