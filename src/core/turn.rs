//! Per-turn streaming state and the writer the model stream uses to feed it.
//!
//! The stream reader only appends blocks and mutates the newest partial one;
//! the presentation loop alone advances the cursor and flips the turn flags.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::block::ContentBlock;
use super::engine::Engine;

/// One element of the result buffer sent back to the model next turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultContent {
    Text { text: String },
    Image { data: String },
}

impl ResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        ResultContent::Text { text: text.into() }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResultContent::Text { text } => Some(text),
            ResultContent::Image { .. } => None,
        }
    }
}

/// Misuse of [`StreamWriter`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("no block at index {index} (turn has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("block {index} is complete and can no longer change")]
    BlockFinalized { index: usize },
    #[error("block {index} cannot change from {from} to {to}")]
    KindChanged {
        index: usize,
        from: String,
        to: String,
    },
}

// === Turn state ===

/// Everything scoped to one assistant turn.
#[derive(Debug, Clone)]
pub struct TurnState {
    pub(crate) turn_id: Uuid,
    pub(crate) blocks: Vec<ContentBlock>,
    pub(crate) cursor: usize,
    pub(crate) stream_complete: bool,
    pub(crate) locked: bool,
    pub(crate) pending_update: bool,
    pub(crate) ready_for_next_turn: bool,
    pub(crate) rejected_tool: bool,
    pub(crate) tool_already_used: bool,
    pub(crate) checkpoint_taken_this_block: bool,
    checkpoint_block: Option<usize>,
    pub(crate) results: Vec<ResultContent>,
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            blocks: Vec::new(),
            cursor: 0,
            stream_complete: false,
            locked: false,
            pending_update: false,
            ready_for_next_turn: false,
            rejected_tool: false,
            tool_already_used: false,
            checkpoint_taken_this_block: false,
            checkpoint_block: None,
            results: Vec::new(),
        }
    }

    pub(crate) fn push_block(&mut self, block: ContentBlock) -> usize {
        self.blocks.push(block);
        self.ready_for_next_turn = false;
        self.blocks.len() - 1
    }

    pub(crate) fn update_block(
        &mut self,
        index: usize,
        block: ContentBlock,
    ) -> Result<(), StreamError> {
        let len = self.blocks.len();
        let Some(current) = self.blocks.get_mut(index) else {
            return Err(StreamError::IndexOutOfRange { index, len });
        };
        if !current.is_partial() {
            return Err(StreamError::BlockFinalized { index });
        }
        let same_shape = match (&*current, &block) {
            (ContentBlock::Text(_), ContentBlock::Text(_)) => true,
            (ContentBlock::ToolUse(old), ContentBlock::ToolUse(new)) => old.name == new.name,
            _ => false,
        };
        if !same_shape {
            return Err(StreamError::KindChanged {
                index,
                from: shape_label(current),
                to: shape_label(&block),
            });
        }
        *current = block;
        Ok(())
    }

    pub(crate) fn finish_stream(&mut self) {
        for block in &mut self.blocks {
            block.mark_complete();
        }
        self.stream_complete = true;
    }

    /// Reset the checkpoint marker when the loop reaches a block it has not
    /// presented before. Re-presenting the same partial block keeps it.
    pub(crate) fn enter_block(&mut self, index: usize) {
        if self.checkpoint_block != Some(index) {
            self.checkpoint_block = Some(index);
            self.checkpoint_taken_this_block = false;
        }
    }

    #[must_use]
    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    #[must_use]
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.stream_complete && self.ready_for_next_turn
    }
}

fn shape_label(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text(_) => "text".to_string(),
        ContentBlock::ToolUse(tool) => format!("tool_use({})", tool.name),
    }
}

// === Writer ===

/// Write side of a turn, held by the model stream reader.
///
/// Writing never presents; call [`Engine::present`] after each change.
#[derive(Clone)]
pub struct StreamWriter {
    engine: Engine,
}

impl StreamWriter {
    pub(crate) fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Append a block and return its index.
    pub fn push(&self, block: ContentBlock) -> usize {
        let index = self.engine.lock_state().turn.push_block(block);
        tracing::trace!(index, "block appended");
        index
    }

    /// Replace a still-partial block with a newer version of itself.
    pub fn update(&self, index: usize, block: ContentBlock) -> Result<(), StreamError> {
        self.engine.lock_state().turn.update_block(index, block)
    }

    /// No more blocks will arrive. Every remaining partial block is final.
    pub fn finish(&self) {
        self.engine.lock_state().turn.finish_stream();
        self.engine.notify_ready();
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_clears_ready_flag() {
        let mut turn = TurnState::new();
        turn.ready_for_next_turn = true;
        assert_eq!(turn.push_block(ContentBlock::text("a", true)), 0);
        assert!(!turn.ready_for_next_turn);
    }

    #[test]
    fn complete_blocks_are_frozen() {
        let mut turn = TurnState::new();
        turn.push_block(ContentBlock::text("a", false));
        assert_eq!(
            turn.update_block(0, ContentBlock::text("ab", false)),
            Err(StreamError::BlockFinalized { index: 0 })
        );
        assert_eq!(
            turn.update_block(3, ContentBlock::text("x", true)),
            Err(StreamError::IndexOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn partial_blocks_keep_their_shape() {
        let mut turn = TurnState::new();
        turn.push_block(ContentBlock::tool_use("read_file", [("path", "sr")], true));
        turn.update_block(0, ContentBlock::tool_use("read_file", [("path", "src")], true))
            .unwrap();
        let err = turn
            .update_block(0, ContentBlock::tool_use("write_to_file", [("path", "src")], true))
            .unwrap_err();
        assert!(matches!(err, StreamError::KindChanged { index: 0, .. }));
        assert!(
            turn.update_block(0, ContentBlock::text("x", true))
                .is_err()
        );
    }

    #[test]
    fn finish_marks_everything_complete() {
        let mut turn = TurnState::new();
        turn.push_block(ContentBlock::text("a", true));
        turn.finish_stream();
        assert!(!turn.blocks()[0].is_partial());
        assert!(turn.stream_complete);
    }

    #[test]
    fn checkpoint_marker_resets_on_new_block_only() {
        let mut turn = TurnState::new();
        turn.enter_block(0);
        turn.checkpoint_taken_this_block = true;
        turn.enter_block(0);
        assert!(turn.checkpoint_taken_this_block);
        turn.enter_block(1);
        assert!(!turn.checkpoint_taken_this_block);
    }
}
