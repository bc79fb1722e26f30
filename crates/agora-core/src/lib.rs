pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AgoraConfig;
pub use error::{AgoraError, Result};
pub use event::EventBus;
pub use state::ConversationState;
pub use traits::{LlmClient, State, Tool};
pub use types::*;
