//! Presentation engine: block model, turn state, dispatch and the host seam.

pub mod block;
pub mod callbacks;
pub mod checkpoint;
mod dispatch;
pub mod engine;
pub mod events;
pub mod host;
pub mod repetition;
pub mod text;
pub mod turn;

pub use block::{ContentBlock, TextBlock, ToolParams, ToolUse};
pub use callbacks::{ToolCallbacks, ToolOutput};
pub use engine::{Engine, EngineConfig, ToolUsage};
pub use host::{HostError, TaskHost};
pub use turn::{ResultContent, StreamError, StreamWriter};
