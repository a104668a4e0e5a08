//! Prompt routing and response aggregation for the Switchboard console.
//!
//! A prompt is classified into backend targets, dispatched as a single
//! request, a fan-out or a stream, and folded into the session transcript.

pub mod backend;
pub mod classifier;
pub mod commands;
pub mod error;
pub mod router;
pub mod session;
pub mod stream;
pub mod transcript;

pub use backend::{Backend, BackendResult, DeltaStream, StreamEvent};
pub use classifier::{classify, classify_detailed, Classification, Intent};
pub use commands::{CommandPalette, CommandSuggestion};
pub use error::{BackendError, ChatError};
pub use router::{
    DispatchMode, DispatchPlan, EndpointTable, Execution, FanoutPlan, ResponseFragment, Router,
};
pub use session::{ChatSession, Submission};
pub use stream::{StreamAggregator, StreamState};
pub use transcript::{ChatEntry, ObserverId, Transcript, TranscriptObserver};
