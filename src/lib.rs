//! Streaming presentation and tool-dispatch engine for the Zentara coding agent.

pub mod audit;
pub mod config;
pub mod core;
pub mod logging;
pub mod replay;
pub mod tools;

pub use crate::core::{
    ContentBlock, Engine, EngineConfig, ResultContent, StreamWriter, TaskHost, ToolUse,
};
