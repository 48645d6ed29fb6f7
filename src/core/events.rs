//! Messages exchanged between the engine and its host.
//!
//! `say` messages flow one way, from the engine to the UI. `ask` messages
//! block the current tool until the user answers.

use serde::{Deserialize, Serialize};

/// Kinds of one-way display messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SayKind {
    /// Assistant prose
    Text,
    /// Tool or engine error surfaced to the user
    Error,
    /// Free text the user attached to an approval or prompt
    UserFeedback,
    /// Tool output rendered for the user
    ToolOutput,
}

/// Kinds of blocking prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskKind {
    /// Approve a tool invocation
    Tool,
    /// Approve a shell command
    Command,
    /// Approve a browser session action
    BrowserActionLaunch,
    /// Approve an MCP server call
    UseMcpServer,
    /// A follow-up question from the model
    Followup,
    /// The same tool call was repeated too often
    MistakeLimitReached,
}

/// How the user answered a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskResponse {
    YesButtonClicked,
    NoButtonClicked,
    MessageResponse,
}

/// A display message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SayMessage {
    pub kind: SayKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default)]
    pub partial: bool,
}

impl SayMessage {
    pub fn new(kind: SayKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            images: Vec::new(),
            partial: false,
        }
    }

    #[must_use]
    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Progress hint shown next to an approval prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProgress {
    pub icon: Option<String>,
    pub text: Option<String>,
}

/// A blocking prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub kind: AskKind,
    pub text: Option<String>,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub progress: Option<ToolProgress>,
    /// Protected prompts are never auto-approved by the host.
    #[serde(default)]
    pub force_protected: bool,
}

impl AskRequest {
    pub fn new(kind: AskKind, text: Option<String>) -> Self {
        Self {
            kind,
            text,
            partial: false,
            progress: None,
            force_protected: false,
        }
    }

    #[must_use]
    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: Option<ToolProgress>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn protected(mut self, force_protected: bool) -> Self {
        self.force_protected = force_protected;
        self
    }
}

/// The user's answer to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskReply {
    pub response: AskResponse,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl AskReply {
    #[must_use]
    pub fn yes() -> Self {
        Self {
            response: AskResponse::YesButtonClicked,
            text: None,
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn no() -> Self {
        Self {
            response: AskResponse::NoButtonClicked,
            text: None,
            images: Vec::new(),
        }
    }

    /// Free-text reply. Counts as a denial for approval prompts.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            response: AskResponse::MessageResponse,
            text: Some(text.into()),
            images: Vec::new(),
        }
    }

    /// Approval that carries extra context from the user.
    pub fn yes_with_feedback(text: impl Into<String>) -> Self {
        Self {
            response: AskResponse::YesButtonClicked,
            text: Some(text.into()),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.response == AskResponse::YesButtonClicked
    }

    /// Feedback text, ignoring blank replies.
    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}
