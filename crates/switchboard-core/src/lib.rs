pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::SwitchboardConfig;
pub use error::{Result, SwitchboardError};
pub use events::ConsoleEvent;
pub use types::*;
