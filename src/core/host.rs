//! The conversation host the engine talks to.
//!
//! The host owns the user-facing surfaces (display, prompts), the workspace
//! checkpoint store, the browser session and telemetry. The engine only ever
//! reaches them through this trait.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::block::ContentBlock;
use super::events::{AskReply, AskRequest, SayMessage};

/// Failure of a host channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("host channel closed")]
    Closed,
    #[error("{0}")]
    Message(String),
}

impl HostError {
    pub fn message(message: impl Into<String>) -> Self {
        HostError::Message(message.into())
    }
}

#[async_trait]
pub trait TaskHost: Send + Sync {
    /// Display a message.
    async fn say(&self, message: SayMessage) -> Result<(), HostError>;

    /// Block until the user answers a prompt.
    async fn ask(&self, request: AskRequest) -> Result<AskReply, HostError>;

    /// Snapshot the workspace before a mutating tool runs.
    async fn checkpoint_save(&self, force: bool) -> Result<(), HostError>;

    /// Close the browser session if one is open.
    async fn close_browser(&self) {}

    /// A tool failed validation or execution.
    fn record_tool_error(&self, _tool: &str, _message: &str) {}

    /// A complete tool invocation is about to be dispatched.
    fn capture_tool_usage(&self, _tool: &str) {}

    /// The model produced malformed input again.
    fn capture_consecutive_mistake(&self) {}

    /// The loop presented the last buffered block of a turn.
    fn log_turn(&self, _turn_id: Uuid, _blocks: &[ContentBlock]) {}
}
