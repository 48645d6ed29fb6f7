//! The contract every tool implements to plug into the dispatch engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::block::ToolUse;
use crate::core::callbacks::ToolCallbacks;
use crate::core::engine::Engine;
use crate::core::events::SayMessage;
use crate::core::host::{HostError, TaskHost};

use super::catalog;

// === Errors ===

/// Errors a tool handler can return.
///
/// Input errors count as model mistakes; everything else is reported through
/// [`ToolCallbacks::handle_error`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("missing required parameter '{param}'")]
    MissingParam { param: String },
    #[error("invalid JSON payload: {message}")]
    InvalidJson { message: String },
    #[error("{message}")]
    NotAvailable { message: String },
    #[error("{message}")]
    PermissionDenied { message: String },
    #[error("{message}")]
    ExecutionFailed { message: String },
    #[error(transparent)]
    Host(#[from] HostError),
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ToolError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn missing_param(param: impl Into<String>) -> Self {
        ToolError::MissingParam {
            param: param.into(),
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ToolError::InvalidJson {
            message: message.into(),
        }
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        ToolError::NotAvailable {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        ToolError::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        ToolError::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Whether this error means the model produced malformed input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ToolError::InvalidInput { .. }
                | ToolError::MissingParam { .. }
                | ToolError::InvalidJson { .. }
        )
    }

    /// Stable variant name used when serializing the error for the model.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidInput { .. } => "InvalidInput",
            ToolError::MissingParam { .. } => "MissingParam",
            ToolError::InvalidJson { .. } => "InvalidJson",
            ToolError::NotAvailable { .. } => "NotAvailable",
            ToolError::PermissionDenied { .. } => "PermissionDenied",
            ToolError::ExecutionFailed { .. } => "ExecutionFailed",
            ToolError::Host(_) => "HostError",
        }
    }
}

// === Capabilities ===

/// What a tool may do to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCapability {
    ReadOnly,
    WritesFiles,
    ExecutesCode,
    Network,
    Browser,
}

// === Context ===

/// Handle to the running engine given to each handler invocation.
pub struct ToolContext {
    engine: Engine,
}

impl ToolContext {
    pub(crate) fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// The conversation host.
    #[must_use]
    pub fn host(&self) -> &dyn TaskHost {
        self.engine.host()
    }

    /// Display a message through the host.
    pub async fn say(&self, message: SayMessage) -> Result<(), ToolError> {
        self.engine.host().say(message).await?;
        Ok(())
    }

    /// Slug of the active mode.
    #[must_use]
    pub fn mode(&self) -> String {
        self.engine.mode()
    }

    /// Take a workspace checkpoint unless one was already taken for this block.
    pub async fn checkpoint(&self) {
        self.engine.checkpoint_gate().await;
    }

    /// Whether the host aborted the task.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.engine.is_aborted()
    }

    /// Count a malformed-input mistake made by the model.
    pub fn record_mistake(&self) {
        self.engine.record_mistake();
    }
}

// === Handler trait ===

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Exact tool name the model uses.
    fn name(&self) -> &str;

    /// Full model-facing documentation.
    fn description(&self) -> String;

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::ReadOnly]
    }

    /// Opt in to being called while the block is still streaming, for
    /// progressive display only.
    fn supports_partial(&self) -> bool {
        false
    }

    /// Whether a checkpoint must be taken before this tool runs.
    fn mutates_workspace(&self) -> bool {
        catalog::is_mutating_tool(self.name())
            || self.capabilities().contains(&ToolCapability::WritesFiles)
    }

    /// Run the tool. Complete invocations must push exactly one result through
    /// `callbacks`; errors returned here are reported by the engine.
    async fn handle(
        &self,
        cx: &ToolContext,
        block: &ToolUse,
        callbacks: &ToolCallbacks,
    ) -> Result<(), ToolError>;
}

// === Param helpers ===

/// Required, non-blank parameter.
pub fn required_param<'a>(block: &'a ToolUse, key: &str) -> Result<&'a str, ToolError> {
    block
        .non_empty_param(key)
        .ok_or_else(|| ToolError::missing_param(key))
}

/// Optional unsigned integer parameter.
pub fn optional_u64(block: &ToolUse, key: &str) -> Result<Option<u64>, ToolError> {
    let Some(raw) = block.non_empty_param(key) else {
        return Ok(None);
    };
    raw.trim().parse::<u64>().map(Some).map_err(|_| {
        ToolError::invalid_input(format!(
            "parameter '{key}' must be a non-negative integer, got '{raw}'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_param_rejects_blank_values() {
        let block = ToolUse::new("read_file").with_param("path", "  ");
        assert_eq!(
            required_param(&block, "path"),
            Err(ToolError::missing_param("path"))
        );
    }

    #[test]
    fn numeric_params_parse() {
        let block = ToolUse::new("fetch_tool_description").with_param("page", "2");
        assert_eq!(optional_u64(&block, "page"), Ok(Some(2)));
        assert_eq!(optional_u64(&block, "absent"), Ok(None));

        let bad = ToolUse::new("x").with_param("page", "-1");
        assert!(optional_u64(&bad, "page").unwrap_err().is_input_error());
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(ToolError::missing_param("path").is_input_error());
        assert!(ToolError::invalid_json("eof").is_input_error());
        assert!(!ToolError::execution_failed("boom").is_input_error());
        assert_eq!(ToolError::from(HostError::Closed).kind(), "HostError");
    }
}
