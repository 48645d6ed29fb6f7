//! Presentation engine for streamed assistant turns.
//!
//! The model stream appends blocks through a [`StreamWriter`] and calls
//! [`Engine::present`] after every change. Presentation is strictly serial:
//! a call arriving while another pass is running only flags a follow-up pass,
//! and the running pass drains every block already buffered before it
//! releases the lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::logging;
use crate::tools::registry::ToolRegistry;
use crate::tools::validation::{DEFAULT_MODE, ToolValidator};

use super::block::{ContentBlock, TextBlock};
use super::dispatch;
use super::events::{SayKind, SayMessage};
use super::host::TaskHost;
use super::repetition::{DEFAULT_REPETITION_LIMIT, RepetitionDetector};
use super::text::sanitize_assistant_text;
use super::turn::{ResultContent, StreamWriter, TurnState};

pub const DEFAULT_CONSECUTIVE_MISTAKE_LIMIT: u32 = 3;

// === Types ===

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Slug of the mode the conversation starts in.
    pub mode: String,
    /// Consecutive identical calls that trip the repetition detector; 0 disables it.
    pub repetition_limit: u32,
    /// Mistakes in a row after which the host should intervene; 0 disables it.
    pub consecutive_mistake_limit: u32,
    /// Take a checkpoint before mutating tools.
    pub checkpoints: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.to_string(),
            repetition_limit: DEFAULT_REPETITION_LIMIT,
            consecutive_mistake_limit: DEFAULT_CONSECUTIVE_MISTAKE_LIMIT,
            checkpoints: true,
        }
    }
}

/// Attempts and failures of one tool (or family) across the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub attempts: u32,
    pub failures: u32,
}

/// State behind the engine lock. Never held across an await.
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) turn: TurnState,
    pub(crate) mode: String,
    pub(crate) consecutive_mistakes: u32,
    pub(crate) repetition: RepetitionDetector,
    pub(crate) usage: BTreeMap<String, ToolUsage>,
}

struct EngineInner {
    config: EngineConfig,
    registry: ToolRegistry,
    validator: Arc<dyn ToolValidator>,
    host: Arc<dyn TaskHost>,
    state: StdMutex<EngineState>,
    ready: Notify,
    cancel_token: CancellationToken,
}

/// Cheaply clonable handle to one conversation's presentation engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("tools", &self.inner.registry.len())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        registry: ToolRegistry,
        validator: Arc<dyn ToolValidator>,
        host: Arc<dyn TaskHost>,
    ) -> Self {
        let state = EngineState {
            turn: TurnState::new(),
            mode: config.mode.clone(),
            consecutive_mistakes: 0,
            repetition: RepetitionDetector::new(config.repetition_limit),
            usage: BTreeMap::new(),
        };
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                validator,
                host,
                state: StdMutex::new(state),
                ready: Notify::new(),
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    /// Write handle for the model stream.
    #[must_use]
    pub fn writer(&self) -> StreamWriter {
        StreamWriter::new(self.clone())
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.inner.registry
    }

    pub(crate) fn validator(&self) -> &dyn ToolValidator {
        self.inner.validator.as_ref()
    }

    #[must_use]
    pub fn host(&self) -> &dyn TaskHost {
        self.inner.host.as_ref()
    }

    // === Cancellation ===

    /// Stop presenting. Handlers already running are not interrupted.
    pub fn abort(&self) {
        self.inner.cancel_token.cancel();
        self.inner.ready.notify_waiters();
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.cancel_token.is_cancelled()
    }

    /// Token handlers can watch for cooperative cancellation.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel_token.clone()
    }

    // === Turn lifecycle ===

    /// Start a new turn. Conversation-scoped state (mistakes, repetition
    /// history, usage) carries over.
    pub fn begin_turn(&self) {
        let mut state = self.lock_state();
        if state.turn.locked {
            logging::warn("Starting a new turn while the previous one is still presenting");
        }
        state.turn = TurnState::new();
        tracing::debug!(turn_id = %state.turn.turn_id, "turn started");
    }

    /// Present every buffered block that can be presented now.
    pub async fn present(&self) {
        if self.is_aborted() {
            return;
        }
        {
            let mut state = self.lock_state();
            if state.turn.locked {
                state.turn.pending_update = true;
                return;
            }
            state.turn.locked = true;
        }

        loop {
            if self.is_aborted() {
                self.lock_state().turn.locked = false;
                break;
            }

            let (index, block) = {
                let mut state = self.lock_state();
                let turn = &mut state.turn;
                turn.pending_update = false;
                if turn.cursor >= turn.blocks.len() {
                    if turn.stream_complete {
                        turn.ready_for_next_turn = true;
                    }
                    turn.locked = false;
                    break;
                }
                let index = turn.cursor;
                turn.enter_block(index);
                (index, turn.blocks[index].clone())
            };

            match &block {
                ContentBlock::Text(text) => self.present_text(text).await,
                ContentBlock::ToolUse(tool) => dispatch::dispatch_tool(self, tool.clone()).await,
            }

            let (again, turn_log) = {
                let mut state = self.lock_state();
                let turn = &mut state.turn;
                let mut drain = false;
                let mut turn_log = None;
                if !block.is_partial() || turn.rejected_tool || turn.tool_already_used {
                    if index + 1 == turn.blocks.len() {
                        turn_log = Some((turn.turn_id, turn.blocks.clone()));
                        turn.ready_for_next_turn = true;
                    }
                    turn.cursor = index + 1;
                    drain = turn.cursor < turn.blocks.len();
                }
                let again = drain || turn.pending_update;
                if !again {
                    turn.locked = false;
                }
                (again, turn_log)
            };

            if let Some((turn_id, blocks)) = turn_log {
                self.host().log_turn(turn_id, &blocks);
            }
            if !again {
                break;
            }
        }

        self.notify_ready();
    }

    async fn present_text(&self, text: &TextBlock) {
        {
            let state = self.lock_state();
            if state.turn.rejected_tool || state.turn.tool_already_used {
                return;
            }
        }
        let content = sanitize_assistant_text(&text.content);
        let message = SayMessage::new(SayKind::Text, content).partial(text.partial);
        if let Err(err) = self.host().say(message).await {
            logging::warn(format!("Failed to display assistant text: {err}"));
        }
    }

    pub(crate) fn notify_ready(&self) {
        self.inner.ready.notify_waiters();
    }

    /// Resolve once the stream is complete and fully presented, or the engine
    /// is aborted.
    pub async fn wait_until_ready(&self) {
        loop {
            let notified = self.inner.ready.notified();
            if self.is_aborted() || self.lock_state().turn.is_drained() {
                return;
            }
            notified.await;
        }
    }

    // === Turn flags and results ===

    pub(crate) fn mark_rejected(&self) {
        self.lock_state().turn.rejected_tool = true;
    }

    /// Append a tool's result; the turn may run no further tools.
    pub(crate) fn push_tool_result(&self, content: Vec<ResultContent>) {
        let mut state = self.lock_state();
        state.turn.results.extend(content);
        state.turn.tool_already_used = true;
    }

    /// Append text to the result buffer without consuming the turn's tool.
    pub(crate) fn push_notice(&self, text: impl Into<String>) {
        self.lock_state().turn.results.push(ResultContent::text(text));
    }

    pub(crate) fn push_result_content(&self, content: impl IntoIterator<Item = ResultContent>) {
        self.lock_state().turn.results.extend(content);
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.lock_state().turn.cursor
    }

    #[must_use]
    pub fn turn_id(&self) -> Uuid {
        self.lock_state().turn.turn_id
    }

    /// Copy of every block received this turn.
    #[must_use]
    pub fn blocks(&self) -> Vec<ContentBlock> {
        self.lock_state().turn.blocks.clone()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_state().turn.locked
    }

    #[must_use]
    pub fn stream_complete(&self) -> bool {
        self.lock_state().turn.stream_complete
    }

    #[must_use]
    pub fn ready_for_next_turn(&self) -> bool {
        self.lock_state().turn.ready_for_next_turn
    }

    #[must_use]
    pub fn rejected_tool(&self) -> bool {
        self.lock_state().turn.rejected_tool
    }

    #[must_use]
    pub fn tool_already_used(&self) -> bool {
        self.lock_state().turn.tool_already_used
    }

    #[must_use]
    pub fn checkpoint_taken_this_block(&self) -> bool {
        self.lock_state().turn.checkpoint_taken_this_block
    }

    /// Result buffer for the next model request.
    #[must_use]
    pub fn results(&self) -> Vec<ResultContent> {
        self.lock_state().turn.results.clone()
    }

    pub fn take_results(&self) -> Vec<ResultContent> {
        std::mem::take(&mut self.lock_state().turn.results)
    }

    // === Conversation state ===

    #[must_use]
    pub fn mode(&self) -> String {
        self.lock_state().mode.clone()
    }

    pub fn set_mode(&self, mode: impl Into<String>) {
        let mode = mode.into();
        logging::info(format!("Switching to {mode} mode"));
        self.lock_state().mode = mode;
    }

    #[must_use]
    pub fn consecutive_mistakes(&self) -> u32 {
        self.lock_state().consecutive_mistakes
    }

    /// Whether the host should step in before the next model request.
    #[must_use]
    pub fn mistake_limit_reached(&self) -> bool {
        let limit = self.inner.config.consecutive_mistake_limit;
        limit > 0 && self.consecutive_mistakes() >= limit
    }

    /// Count one malformed-input mistake.
    pub fn record_mistake(&self) {
        let count = {
            let mut state = self.lock_state();
            state.consecutive_mistakes = state.consecutive_mistakes.saturating_add(1);
            state.consecutive_mistakes
        };
        tracing::debug!(count, "consecutive mistake recorded");
        self.host().capture_consecutive_mistake();
    }

    pub(crate) fn reset_mistakes(&self) {
        self.lock_state().consecutive_mistakes = 0;
    }

    pub(crate) fn record_attempt(&self, usage_name: &str) {
        let mut state = self.lock_state();
        let entry = state.usage.entry(usage_name.to_string()).or_default();
        entry.attempts = entry.attempts.saturating_add(1);
    }

    pub(crate) fn record_failure(&self, usage_name: &str) {
        let mut state = self.lock_state();
        let entry = state.usage.entry(usage_name.to_string()).or_default();
        entry.failures = entry.failures.saturating_add(1);
    }

    /// Per-tool usage, family leaves aggregated under the family name.
    #[must_use]
    pub fn tool_usage(&self) -> BTreeMap<String, ToolUsage> {
        self.lock_state().usage.clone()
    }
}
