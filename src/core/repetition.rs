//! Detection of identical tool calls repeated back to back.
//!
//! Models sometimes retry the exact same failing call forever. After
//! `limit` consecutive identical calls the detector blocks execution and the
//! engine asks the user before the call may run again.

use crate::tools::catalog::BROWSER_ACTION;

use super::block::{ToolParams, ToolUse};

/// Number of consecutive identical calls (including the current one) that
/// trips the detector.
pub const DEFAULT_REPETITION_LIMIT: u32 = 3;

/// Outcome of [`RepetitionDetector::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionCheck {
    pub allow_execution: bool,
    pub ask_user: Option<RepetitionPrompt>,
}

/// What to show the user when the detector trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionPrompt {
    pub tool_name: String,
    pub message_detail: String,
}

impl RepetitionCheck {
    fn allowed() -> Self {
        Self {
            allow_execution: true,
            ask_user: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CallSignature {
    name: String,
    params: ToolParams,
}

/// Tracks the previous call signature and how many times it repeated.
#[derive(Debug, Clone)]
pub struct RepetitionDetector {
    limit: u32,
    previous: Option<CallSignature>,
    consecutive: u32,
}

impl Default for RepetitionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REPETITION_LIMIT)
    }
}

impl RepetitionDetector {
    /// A limit of zero disables detection.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            previous: None,
            consecutive: 0,
        }
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Record `call` and decide whether it may run.
    pub fn check(&mut self, call: &ToolUse) -> RepetitionCheck {
        if is_browser_scroll(call) {
            return RepetitionCheck::allowed();
        }

        let signature = CallSignature {
            name: call.name.clone(),
            params: call.params.clone(),
        };
        if self.previous.as_ref() == Some(&signature) {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.previous = Some(signature);
            self.consecutive = 1;
        }

        if self.limit > 0 && self.consecutive >= self.limit {
            let count = self.consecutive;
            self.reset();
            return RepetitionCheck {
                allow_execution: false,
                ask_user: Some(RepetitionPrompt {
                    tool_name: call.name.clone(),
                    message_detail: format!(
                        "The model called '{}' with identical parameters {count} times in a row. \
                         This may indicate it is stuck in a loop.",
                        call.name
                    ),
                }),
            };
        }

        RepetitionCheck::allowed()
    }

    /// Forget the tracked signature.
    pub fn reset(&mut self) {
        self.previous = None;
        self.consecutive = 0;
    }
}

// Scrolling the same page repeatedly is legitimate.
fn is_browser_scroll(call: &ToolUse) -> bool {
    call.name == BROWSER_ACTION
        && matches!(call.param("action"), Some("scroll_down" | "scroll_up"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ls() -> ToolUse {
        ToolUse::new("execute_command").with_param("command", "ls")
    }

    #[test]
    fn trips_on_third_identical_call() {
        let mut detector = RepetitionDetector::new(3);
        assert!(detector.check(&ls()).allow_execution);
        assert!(detector.check(&ls()).allow_execution);
        let third = detector.check(&ls());
        assert!(!third.allow_execution);
        let prompt = third.ask_user.expect("prompt");
        assert_eq!(prompt.tool_name, "execute_command");
        assert!(prompt.message_detail.contains("3 times"));
    }

    #[test]
    fn allows_call_again_after_trip() {
        let mut detector = RepetitionDetector::new(3);
        for _ in 0..3 {
            detector.check(&ls());
        }
        assert!(detector.check(&ls()).allow_execution);
    }

    #[test]
    fn different_params_reset_the_count() {
        let mut detector = RepetitionDetector::new(2);
        assert!(detector.check(&ls()).allow_execution);
        let other = ToolUse::new("execute_command").with_param("command", "pwd");
        assert!(detector.check(&other).allow_execution);
        assert!(detector.check(&ls()).allow_execution);
        assert!(!detector.check(&ls()).allow_execution);
    }

    #[test]
    fn param_order_does_not_matter() {
        let mut detector = RepetitionDetector::new(2);
        let a = ToolUse::new("search_files")
            .with_param("path", "src")
            .with_param("regex", "fn");
        let b = ToolUse::new("search_files")
            .with_param("regex", "fn")
            .with_param("path", "src");
        assert!(detector.check(&a).allow_execution);
        assert!(!detector.check(&b).allow_execution);
    }

    #[test]
    fn zero_limit_disables_detection() {
        let mut detector = RepetitionDetector::new(0);
        for _ in 0..10 {
            assert!(detector.check(&ls()).allow_execution);
        }
    }

    #[test]
    fn browser_scroll_is_exempt() {
        let mut detector = RepetitionDetector::new(2);
        let scroll = ToolUse::new(BROWSER_ACTION).with_param("action", "scroll_down");
        for _ in 0..5 {
            assert!(detector.check(&scroll).allow_execution);
        }
    }
}
