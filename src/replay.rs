//! Offline replay of a recorded model turn through the presentation engine.
//!
//! A scenario is the list of stream events the model produced (block pushes,
//! in-place updates, end of stream) plus the output each tool should return.
//! Tools are stand-ins that ask for approval like the real ones and push the
//! recorded output, so a turn can be re-run without a model or a workspace.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::audit;
use crate::config::Config;
use crate::core::block::{ContentBlock, JSON_PAYLOAD_PARAM, ToolUse};
use crate::core::callbacks::ToolCallbacks;
use crate::core::engine::{Engine, EngineConfig, ToolUsage};
use crate::core::events::{AskKind, AskReply, AskRequest, SayMessage};
use crate::core::host::{HostError, TaskHost};
use crate::core::turn::ResultContent;
use crate::tools::catalog::{self, BUILTIN_TOOL_DOCS, FETCH_TOOL_DESCRIPTION, ToolDoc};
use crate::tools::families::{debug_family, lsp_family};
use crate::tools::fetch_description::DEFAULT_PAGE_SIZE;
use crate::tools::registry::ToolRegistry;
use crate::tools::spec::{ToolCapability, ToolContext, ToolError, ToolHandler, required_param};
use crate::tools::validation::{ModeConfig, ModeToolValidator, ToolValidator};

// === Scenario ===

/// One event of the model stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Push { block: ContentBlock },
    Update { index: usize, block: ContentBlock },
    Finish,
}

/// A recorded turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScenario {
    #[serde(default)]
    pub name: String,
    /// Mode to switch to before the turn starts.
    #[serde(default)]
    pub mode: Option<String>,
    pub events: Vec<StreamEvent>,
    /// Output per tool name. Family operations are looked up as the leaf name
    /// first (`debug_launch`), then the family name.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Answers for [`ScriptedHost`], in prompt order.
    #[serde(default)]
    pub replies: Vec<AskReply>,
}

impl ReplayScenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let mut scenario: ReplayScenario = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))?;
        if scenario.name.trim().is_empty() {
            scenario.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "replay".to_string());
        }
        Ok(scenario)
    }
}

// === Stand-in tools ===

/// Replays recorded output for one built-in tool or one family.
#[derive(Debug, Clone)]
pub struct ReplayTool {
    name: String,
    doc: String,
    required: Vec<&'static str>,
    family: bool,
    outputs: Arc<BTreeMap<String, String>>,
}

impl ReplayTool {
    #[must_use]
    pub fn builtin(doc: &ToolDoc, outputs: Arc<BTreeMap<String, String>>) -> Self {
        Self {
            name: doc.name.to_string(),
            doc: doc.render(),
            required: doc
                .params
                .iter()
                .filter(|param| param.required)
                .map(|param| param.name)
                .collect(),
            family: false,
            outputs,
        }
    }

    /// Handler shared by every leaf of a family. Arguments are already
    /// validated by the family validator.
    pub fn family(name: &str, outputs: Arc<BTreeMap<String, String>>) -> Self {
        Self {
            name: name.to_string(),
            doc: format!("{name} family handler"),
            required: Vec::new(),
            family: true,
            outputs,
        }
    }

    fn ask_kind(&self) -> AskKind {
        match self.name.as_str() {
            catalog::EXECUTE_COMMAND => AskKind::Command,
            catalog::BROWSER_ACTION => AskKind::BrowserActionLaunch,
            catalog::USE_MCP_TOOL | catalog::ACCESS_MCP_RESOURCE => AskKind::UseMcpServer,
            catalog::ASK_FOLLOWUP_QUESTION => AskKind::Followup,
            _ => AskKind::Tool,
        }
    }

    fn output_key(&self, block: &ToolUse) -> String {
        if !self.family {
            return self.name.clone();
        }
        match block.param(&format!("{}_operation", self.name)) {
            Some(operation) => format!("{}_{operation}", self.name),
            None => self.name.clone(),
        }
    }

    fn prompt(&self, block: &ToolUse, callbacks: &ToolCallbacks) -> String {
        let mut fields = Map::new();
        fields.insert("tool".to_string(), Value::String(self.output_key(block)));
        for (key, value) in &block.params {
            if key == JSON_PAYLOAD_PARAM || key.ends_with("_operation") {
                continue;
            }
            fields.insert(key.clone(), Value::String(callbacks.remove_closing_tag(key, value)));
        }
        if let Some(payload) = block.param(JSON_PAYLOAD_PARAM)
            && let Ok(args) = serde_json::from_str::<Value>(payload)
        {
            fields.insert("args".to_string(), args);
        }
        Value::Object(fields).to_string()
    }
}

#[async_trait]
impl ToolHandler for ReplayTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.doc.clone()
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        match self.name.as_str() {
            catalog::EXECUTE_COMMAND => vec![ToolCapability::ExecutesCode],
            catalog::BROWSER_ACTION => vec![ToolCapability::Browser],
            name if catalog::is_mutating_tool(name) => vec![ToolCapability::WritesFiles],
            _ => vec![ToolCapability::ReadOnly],
        }
    }

    fn supports_partial(&self) -> bool {
        true
    }

    async fn handle(
        &self,
        _cx: &ToolContext,
        block: &ToolUse,
        callbacks: &ToolCallbacks,
    ) -> Result<(), ToolError> {
        if block.partial {
            callbacks
                .show_partial(self.ask_kind(), self.prompt(block, callbacks))
                .await;
            return Ok(());
        }
        for param in &self.required {
            required_param(block, param)?;
        }

        let approved = callbacks
            .ask_approval(self.ask_kind(), Some(self.prompt(block, callbacks)), None, false)
            .await?;
        if !approved {
            return Ok(());
        }

        let key = self.output_key(block);
        let output = self
            .outputs
            .get(&key)
            .or_else(|| self.outputs.get(&self.name))
            .ok_or_else(|| ToolError::execution_failed(format!("no recorded output for {key}")))?;
        callbacks.push_result(output.as_str());
        Ok(())
    }
}

/// Registry with a stand-in for every built-in tool plus the debug and lsp
/// families.
#[must_use]
pub fn replay_registry(outputs: &BTreeMap<String, String>, page_size: usize) -> ToolRegistry {
    let outputs = Arc::new(outputs.clone());
    let builder = BUILTIN_TOOL_DOCS
        .iter()
        .filter(|doc| doc.name != FETCH_TOOL_DESCRIPTION)
        .fold(ToolRegistry::builder(), |builder, doc| {
            builder.register(ReplayTool::builtin(doc, outputs.clone()))
        });
    let debug = Arc::new(ReplayTool::family("debug", outputs.clone()));
    let lsp = Arc::new(ReplayTool::family("lsp", outputs));
    builder
        .register_family(debug_family(debug))
        .register_family(lsp_family(lsp))
        .tool_list_page_size(page_size)
        .build()
}

// === Harness ===

/// Settings for a replay run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub engine: EngineConfig,
    pub tool_list_page_size: usize,
    pub disabled_tools: Vec<String>,
    pub custom_modes: Vec<ModeConfig>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            tool_list_page_size: DEFAULT_PAGE_SIZE,
            disabled_tools: Vec::new(),
            custom_modes: Vec::new(),
        }
    }
}

impl From<&Config> for ReplayConfig {
    fn from(config: &Config) -> Self {
        Self {
            engine: config.engine_config(),
            tool_list_page_size: config.tool_list_page_size(),
            disabled_tools: config.disabled_tools().to_vec(),
            custom_modes: config.custom_modes().to_vec(),
        }
    }
}

/// Feeds a scenario through a fresh engine.
#[derive(Debug, Clone, Default)]
pub struct ReplayHarness {
    config: ReplayConfig,
}

impl ReplayHarness {
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, scenario: &ReplayScenario, host: Arc<dyn TaskHost>) -> Result<ReplayRun> {
        let registry = replay_registry(&scenario.outputs, self.config.tool_list_page_size);
        let validator: Arc<dyn ToolValidator> = Arc::new(
            ModeToolValidator::new(self.config.custom_modes.clone())
                .context("Invalid file_regex in custom_modes")?
                .with_disabled_tools(self.config.disabled_tools.iter().cloned()),
        );
        let engine = Engine::new(self.config.engine.clone(), registry, validator, host);
        if let Some(mode) = scenario.mode.as_deref() {
            engine.set_mode(mode);
        }

        let started_at = Instant::now();
        let writer = engine.writer();
        let mut finished = false;
        for (position, event) in scenario.events.iter().enumerate() {
            match event {
                StreamEvent::Push { block } => {
                    writer.push(block.clone());
                }
                StreamEvent::Update { index, block } => writer
                    .update(*index, block.clone())
                    .with_context(|| format!("Invalid update at event {position}"))?,
                StreamEvent::Finish => {
                    writer.finish();
                    finished = true;
                }
            }
            engine.present().await;
        }
        if !finished {
            tracing::debug!(scenario = %scenario.name, "scenario has no finish event; finishing stream");
            writer.finish();
            engine.present().await;
        }
        engine.wait_until_ready().await;

        Ok(ReplayRun {
            scenario_name: scenario.name.clone(),
            turn_id: engine.turn_id(),
            duration: started_at.elapsed(),
            blocks: engine.blocks().len(),
            results: engine.results(),
            usage: engine.tool_usage(),
            consecutive_mistakes: engine.consecutive_mistakes(),
            mistake_limit_reached: engine.mistake_limit_reached(),
            rejected_tool: engine.rejected_tool(),
        })
    }
}

/// Outcome of one replayed turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRun {
    pub scenario_name: String,
    pub turn_id: Uuid,
    pub duration: Duration,
    pub blocks: usize,
    pub results: Vec<ResultContent>,
    pub usage: BTreeMap<String, ToolUsage>,
    pub consecutive_mistakes: u32,
    pub mistake_limit_reached: bool,
    pub rejected_tool: bool,
}

impl ReplayRun {
    /// No tool failed and the user denied nothing.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.rejected_tool && self.usage.values().all(|usage| usage.failures == 0)
    }

    #[must_use]
    pub fn tool_errors(&self) -> u32 {
        self.usage.values().map(|usage| usage.failures).sum()
    }

    /// Text parts of the result buffer joined the way the next request sees them.
    #[must_use]
    pub fn result_text(&self) -> String {
        self.results
            .iter()
            .filter_map(ResultContent::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// === Scripted host ===

/// Host that answers prompts from a queue and records what it was shown.
///
/// Partial prompts never consume an answer. When the queue is empty every
/// prompt is approved.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    replies: StdMutex<VecDeque<AskReply>>,
    says: StdMutex<Vec<SayMessage>>,
    asks: StdMutex<Vec<AskRequest>>,
    checkpoints: StdMutex<u32>,
    turn_log_path: Option<PathBuf>,
}

impl ScriptedHost {
    pub fn new(replies: impl IntoIterator<Item = AskReply>) -> Self {
        Self {
            replies: StdMutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_turn_log(mut self, path: Option<PathBuf>) -> Self {
        self.turn_log_path = path;
        self
    }

    #[must_use]
    pub fn says(&self) -> Vec<SayMessage> {
        lock(&self.says).clone()
    }

    /// Every complete prompt, in order.
    #[must_use]
    pub fn asks(&self) -> Vec<AskRequest> {
        lock(&self.asks).clone()
    }

    #[must_use]
    pub fn checkpoints(&self) -> u32 {
        *lock(&self.checkpoints)
    }
}

#[async_trait]
impl TaskHost for ScriptedHost {
    async fn say(&self, message: SayMessage) -> Result<(), HostError> {
        lock(&self.says).push(message);
        Ok(())
    }

    async fn ask(&self, request: AskRequest) -> Result<AskReply, HostError> {
        if request.partial {
            return Ok(AskReply::yes());
        }
        lock(&self.asks).push(request);
        Ok(lock(&self.replies).pop_front().unwrap_or_else(AskReply::yes))
    }

    async fn checkpoint_save(&self, _force: bool) -> Result<(), HostError> {
        *lock(&self.checkpoints) += 1;
        Ok(())
    }

    fn log_turn(&self, turn_id: Uuid, blocks: &[ContentBlock]) {
        if let Some(path) = &self.turn_log_path {
            audit::log_turn_blocks(path, turn_id, blocks);
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Report shape printed by `zentara replay --json`.
#[must_use]
pub fn report_json(run: &ReplayRun) -> Value {
    json!({
        "scenario": run.scenario_name,
        "turn_id": run.turn_id.to_string(),
        "success": run.success(),
        "tool_errors": run.tool_errors(),
        "blocks": run.blocks,
        "duration_ms": run.duration.as_millis(),
        "rejected_tool": run.rejected_tool,
        "consecutive_mistakes": run.consecutive_mistakes,
        "usage": run.usage,
        "results": run.results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scenario(events: serde_json::Value, outputs: &[(&str, &str)]) -> ReplayScenario {
        ReplayScenario {
            name: "test".to_string(),
            events: serde_json::from_value(events).unwrap(),
            outputs: outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..ReplayScenario::default()
        }
    }

    #[tokio::test]
    async fn replays_text_then_tool() {
        let scenario = scenario(
            json!([
                {"event": "push", "block": {"type": "text", "content": "Reading", "partial": true}},
                {"event": "update", "index": 0, "block": {"type": "text", "content": "Reading the file.", "partial": false}},
                {"event": "push", "block": {"type": "tool_use", "name": "read_file", "params": {"path": "src/lib.rs"}, "partial": false}},
                {"event": "finish"}
            ]),
            &[("read_file", "1 | pub mod core;")],
        );
        let host = Arc::new(ScriptedHost::default());
        let run = ReplayHarness::default()
            .run(&scenario, host.clone())
            .await
            .unwrap();

        assert!(run.success());
        assert_eq!(run.blocks, 2);
        assert_eq!(
            run.result_text(),
            "[read_file for 'src/lib.rs'] Result:\n1 | pub mod core;"
        );
        assert_eq!(run.usage["read_file"], ToolUsage { attempts: 1, failures: 0 });
        assert_eq!(host.asks().len(), 1);
    }

    #[tokio::test]
    async fn denial_skips_the_rest_of_the_turn() {
        let mut scenario = scenario(
            json!([
                {"event": "push", "block": {"type": "tool_use", "name": "execute_command", "params": {"command": "rm -rf build"}}},
                {"event": "push", "block": {"type": "tool_use", "name": "list_files", "params": {"path": "."}}},
                {"event": "finish"}
            ]),
            &[("execute_command", "done"), ("list_files", "a.rs")],
        );
        scenario.replies = vec![AskReply::no()];
        let host = Arc::new(ScriptedHost::new(scenario.replies.clone()));
        let run = ReplayHarness::default().run(&scenario, host).await.unwrap();

        assert!(run.rejected_tool);
        assert!(!run.success());
        let text = run.result_text();
        assert!(text.contains("The user denied this operation."));
        assert!(text.contains("Skipping tool [list_files for '.']"));
        assert!(!run.usage.contains_key("list_files"));
    }

    #[tokio::test]
    async fn family_leaf_uses_leaf_output_and_family_usage() {
        let scenario = scenario(
            json!([
                {"event": "push", "block": {"type": "tool_use", "name": "debug_set_breakpoint", "params": {"path": "app.py", "line": "12"}}}
            ]),
            &[("debug_set_breakpoint", "Breakpoint set at app.py:12")],
        );
        let run = ReplayHarness::default()
            .run(&scenario, Arc::new(ScriptedHost::default()))
            .await
            .unwrap();

        assert!(run.success());
        assert!(run.result_text().contains("Breakpoint set at app.py:12"));
        assert_eq!(run.usage["debug"], ToolUsage { attempts: 1, failures: 0 });
    }

    #[tokio::test]
    async fn missing_output_is_reported_as_tool_error() {
        let scenario = scenario(
            json!([
                {"event": "push", "block": {"type": "tool_use", "name": "search_files", "params": {"path": ".", "regex": "fn main"}}}
            ]),
            &[],
        );
        let run = ReplayHarness::default()
            .run(&scenario, Arc::new(ScriptedHost::default()))
            .await
            .unwrap();

        assert_eq!(run.tool_errors(), 1);
        assert!(run.result_text().contains("no recorded output for search_files"));
    }

    #[tokio::test]
    async fn writes_turn_log_when_configured() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");
        let scenario = scenario(
            json!([{"event": "push", "block": {"type": "text", "content": "Done."}}]),
            &[],
        );
        let host = Arc::new(ScriptedHost::default().with_turn_log(Some(path.clone())));
        ReplayHarness::default().run(&scenario, host).await.unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn load_defaults_name_to_file_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("read-then-edit.json");
        fs::write(&path, r#"{"events": [{"event": "finish"}]}"#).unwrap();
        let scenario = ReplayScenario::load(&path).unwrap();
        assert_eq!(scenario.name, "read-then-edit");
        assert_eq!(scenario.events, vec![StreamEvent::Finish]);
    }

    #[tokio::test]
    async fn bundled_demo_runs_one_tool() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/read_then_breakpoint.json");
        let scenario = ReplayScenario::load(&path).unwrap();
        let host = Arc::new(ScriptedHost::new(scenario.replies.clone()));
        let run = ReplayHarness::default()
            .run(&scenario, host.clone())
            .await
            .unwrap();

        assert_eq!(run.blocks, 3);
        assert!(run.result_text().contains("def test_app()"));
        assert!(!run.usage.contains_key("debug"));
        assert_eq!(host.says()[0].text, "Let me");
    }
}
