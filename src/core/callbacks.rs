//! The approval and result channel handed to every tool invocation.
//!
//! A fresh [`ToolCallbacks`] is built for each block, so "has this block
//! already produced a result" is tracked per invocation.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use serde_json::json;

use crate::logging;
use crate::tools::responses;
use crate::tools::spec::ToolError;

use super::engine::Engine;
use super::events::{AskKind, AskRequest, SayKind, SayMessage, ToolProgress};
use super::turn::ResultContent;

/// What a tool hands back to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub images: Vec<String>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::text(text)
    }
}

/// Approval, error and result callbacks for one tool block.
pub struct ToolCallbacks {
    engine: Engine,
    tool_name: String,
    description: String,
    partial: bool,
    pushed: AtomicBool,
    approval_feedback: StdMutex<Option<ToolOutput>>,
}

impl std::fmt::Debug for ToolCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallbacks")
            .field("tool_name", &self.tool_name)
            .field("partial", &self.partial)
            .field("pushed", &self.has_pushed())
            .finish()
    }
}

impl ToolCallbacks {
    pub(crate) fn new(
        engine: Engine,
        tool_name: impl Into<String>,
        description: impl Into<String>,
        partial: bool,
    ) -> Self {
        Self {
            engine,
            tool_name: tool_name.into(),
            description: description.into(),
            partial,
            pushed: AtomicBool::new(false),
            approval_feedback: StdMutex::new(None),
        }
    }

    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Label of the invocation, e.g. `[read_file for 'a.rs']`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Whether this block already produced its result.
    #[must_use]
    pub fn has_pushed(&self) -> bool {
        self.pushed.load(Ordering::SeqCst)
    }

    // === Approval ===

    /// Ask the user to approve the tool. On denial the denied result is
    /// pushed and the rest of the turn is skipped.
    pub async fn ask_approval(
        &self,
        kind: AskKind,
        message: Option<String>,
        progress: Option<ToolProgress>,
        force_protected: bool,
    ) -> Result<bool, ToolError> {
        let request = AskRequest::new(kind, message)
            .progress(progress)
            .protected(force_protected);
        let reply = self.engine.host().ask(request).await?;
        let feedback = reply.feedback().map(str::to_string);

        if !reply.is_approved() {
            let output = match &feedback {
                Some(text) => {
                    self.say_feedback(text, &reply.images).await;
                    ToolOutput::text(responses::tool_denied_with_feedback(text))
                        .with_images(reply.images.clone())
                }
                None => ToolOutput::text(responses::tool_denied()),
            };
            self.push_result(output);
            self.engine.mark_rejected();
            tracing::info!(tool = %self.tool_name, "tool denied by user");
            return Ok(false);
        }

        if let Some(text) = feedback {
            self.say_feedback(&text, &reply.images).await;
            let notice = ToolOutput::text(responses::tool_approved_with_feedback(&text))
                .with_images(reply.images);
            *lock(&self.approval_feedback) = Some(notice);
        }
        Ok(true)
    }

    /// Show a non-blocking "still typing" prompt for a partial block.
    pub async fn show_partial(&self, kind: AskKind, message: impl Into<String>) {
        let request = AskRequest::new(kind, Some(message.into())).partial(true);
        if let Err(err) = self.engine.host().ask(request).await {
            tracing::debug!(tool = %self.tool_name, error = %err, "partial ask failed");
        }
    }

    async fn say_feedback(&self, text: &str, images: &[String]) {
        let message = SayMessage::new(SayKind::UserFeedback, text).with_images(images.to_vec());
        if let Err(err) = self.engine.host().say(message).await {
            logging::warn(format!("Failed to display user feedback: {err}"));
        }
    }

    // === Results ===

    /// Push the single result of this block and mark the turn's tool as used.
    ///
    /// A second call for the same block is a handler bug; it is logged and
    /// ignored.
    pub fn push_result(&self, output: impl Into<ToolOutput>) {
        let output = output.into();
        if self.partial {
            tracing::debug!(tool = %self.tool_name, "ignoring result pushed for a partial block");
            return;
        }
        if self.pushed.swap(true, Ordering::SeqCst) {
            logging::error(format!(
                "Tool {} pushed more than one result; extra result dropped",
                self.tool_name
            ));
            return;
        }

        let mut text = if output.is_empty() {
            responses::NO_OUTPUT.to_string()
        } else {
            output.text
        };
        let mut images = output.images;
        if let Some(notice) = lock(&self.approval_feedback).take() {
            text = format!("{}\n\n{text}", notice.text);
            images.splice(0..0, notice.images);
        }

        let mut content = Vec::with_capacity(2 + images.len());
        content.push(ResultContent::text(responses::result_header(&self.description)));
        content.push(ResultContent::text(text));
        content.extend(images.into_iter().map(|data| ResultContent::Image { data }));
        self.engine.push_tool_result(content);
    }

    /// Report a failure to the user and push it as the block's result.
    pub async fn handle_error(&self, action: &str, error: &ToolError) {
        let message = error.to_string();
        let display = SayMessage::new(SayKind::Error, format!("Error {action}:\n{message}"));
        if let Err(err) = self.engine.host().say(display).await {
            logging::warn(format!("Failed to display tool error: {err}"));
        }
        self.engine.host().record_tool_error(&self.tool_name, &message);
        tracing::warn!(tool = %self.tool_name, kind = error.kind(), "{action} failed: {message}");

        let serialized = json!({ "name": error.kind(), "message": message });
        self.push_result(responses::tool_error(&format!("Error {action}: {serialized}")));
    }

    /// Strip a trailing, possibly incomplete `</tag>` from streamed text.
    /// Complete blocks are returned unchanged.
    #[must_use]
    pub fn remove_closing_tag(&self, tag: &str, text: &str) -> String {
        if !self.partial {
            return text.to_string();
        }
        strip_partial_closing_tag(tag, text)
    }
}

pub(crate) fn strip_partial_closing_tag(tag: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let optional_chars: String = tag
        .chars()
        .map(|ch| format!("(?:{})?", regex::escape(&ch.to_string())))
        .collect();
    match Regex::new(&format!(r"\s?</?{optional_chars}$")) {
        Ok(pattern) => pattern.replace(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_any_prefix_of_the_closing_tag() {
        assert_eq!(strip_partial_closing_tag("path", "src/main.rs</pa"), "src/main.rs");
        assert_eq!(strip_partial_closing_tag("path", "src/main.rs <"), "src/main.rs");
        assert_eq!(strip_partial_closing_tag("path", "src/main.rs</path"), "src/main.rs");
        assert_eq!(strip_partial_closing_tag("path", "a < b"), "a < b");
        assert_eq!(strip_partial_closing_tag("path", ""), "");
    }

    #[test]
    fn tool_output_conversions() {
        assert_eq!(ToolOutput::from("ok").text, "ok");
        assert!(ToolOutput::default().is_empty());
        assert!(!ToolOutput::text("").with_images(vec!["img".into()]).is_empty());
    }
}
