//! At most one workspace checkpoint per presented block.

use crate::logging;

use super::engine::Engine;

/// What [`Engine::checkpoint_gate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Saved,
    AlreadyTaken,
    Disabled,
    /// The save failed; the tool still runs and a later call may retry.
    Failed,
}

impl Engine {
    /// Save a checkpoint unless this block already has one.
    ///
    /// The marker is claimed before the save so concurrent callers within
    /// one block cannot both reach the host.
    pub async fn checkpoint_gate(&self) -> CheckpointOutcome {
        if !self.config().checkpoints {
            return CheckpointOutcome::Disabled;
        }
        {
            let mut state = self.lock_state();
            if state.turn.checkpoint_taken_this_block {
                return CheckpointOutcome::AlreadyTaken;
            }
            state.turn.checkpoint_taken_this_block = true;
        }

        match self.host().checkpoint_save(true).await {
            Ok(()) => {
                tracing::debug!("checkpoint saved");
                CheckpointOutcome::Saved
            }
            Err(err) => {
                self.lock_state().turn.checkpoint_taken_this_block = false;
                logging::warn(format!("Checkpoint save failed, continuing without it: {err}"));
                CheckpointOutcome::Failed
            }
        }
    }
}
