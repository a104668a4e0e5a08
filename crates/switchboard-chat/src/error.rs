//! Error types for prompt dispatch.

use switchboard_core::{SwitchboardError, Target};

/// Failures talking to a backend service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode backend payload: {0}")]
    Decode(String),
    #[error("request timed out after {0} seconds")]
    Timeout(u64),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Errors surfaced to callers of a chat session.
///
/// Backend failures during dispatch are normally recovered into transcript
/// entries; these variants cover what is rejected before dispatch or what a
/// caller asks to see directly.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("prompt cannot be empty")]
    EmptyPrompt,
    #[error("prompt exceeds maximum length of {0} characters")]
    PromptTooLong(usize),
    #[error("no endpoint configured for {0}")]
    Unroutable(Target),
    #[error("{target} backend failed: {source}")]
    Transport {
        target: Target,
        #[source]
        source: BackendError,
    },
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<ChatError> for SwitchboardError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Transport { .. } | ChatError::Stream(_) => {
                SwitchboardError::Backend(err.to_string())
            }
            other => SwitchboardError::Dispatch(other.to_string()),
        }
    }
}
