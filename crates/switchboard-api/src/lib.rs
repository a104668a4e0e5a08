//! Switchboard API crate - axum HTTP surface over a chat session.
//!
//! Exposes intent classification, chart rendering, prompt submission,
//! transcript reads, command suggestions and an SSE feed of session events.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
