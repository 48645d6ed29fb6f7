//! Append-only JSONL log of presented turns.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::core::block::ContentBlock;

/// Append one turn's blocks to `path`.
///
/// Best-effort: failures are logged and never interrupt the conversation.
pub fn log_turn_blocks(path: &Path, turn_id: Uuid, blocks: &[ContentBlock]) {
    if let Err(err) = append_turn(path, turn_id, blocks) {
        crate::logging::warn(format!("turn log write failed: {err}"));
    }
}

fn append_turn(path: &Path, turn_id: Uuid, blocks: &[ContentBlock]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let tools: Vec<&str> = blocks
        .iter()
        .filter_map(|block| block.as_tool_use().map(|tool| tool.name.as_str()))
        .collect();
    let record = json!({
        "ts": Utc::now().to_rfc3339(),
        "turn_id": turn_id.to_string(),
        "block_count": blocks.len(),
        "tools": tools,
        "blocks": blocks,
    });
    writeln!(file, "{}", serde_json::to_string(&record)?)?;
    Ok(())
}

/// `~/.zentara/turns.jsonl`.
#[must_use]
pub fn default_turn_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".zentara").join("turns.jsonl"))
}
