//! Terminal host for `zentara replay`: prints messages and reads approvals
//! from stdin.

use std::path::PathBuf;

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use zentara_agent::audit;
use zentara_agent::core::block::ContentBlock;
use zentara_agent::core::events::{AskKind, AskReply, AskRequest, SayKind, SayMessage};
use zentara_agent::core::host::{HostError, TaskHost};

pub struct ConsoleHost {
    auto_approve: bool,
    turn_log_path: Option<PathBuf>,
    stdin: Mutex<BufReader<tokio::io::Stdin>>,
}

impl ConsoleHost {
    pub fn new(auto_approve: bool, turn_log_path: Option<PathBuf>) -> Self {
        Self {
            auto_approve,
            turn_log_path,
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn read_line(&self) -> Result<Option<String>, HostError> {
        let mut line = String::new();
        let read = self
            .stdin
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|err| HostError::message(format!("stdin: {err}")))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn ask_label(kind: AskKind) -> &'static str {
    match kind {
        AskKind::Tool => "tool",
        AskKind::Command => "command",
        AskKind::BrowserActionLaunch => "browser",
        AskKind::UseMcpServer => "mcp",
        AskKind::Followup => "question",
        AskKind::MistakeLimitReached => "repetition",
    }
}

#[async_trait]
impl TaskHost for ConsoleHost {
    async fn say(&self, message: SayMessage) -> Result<(), HostError> {
        if message.partial {
            return Ok(());
        }
        match message.kind {
            SayKind::Text => println!("{}", message.text),
            SayKind::Error => println!("{} {}", "error:".red().bold(), message.text),
            SayKind::UserFeedback => println!("{} {}", "you:".cyan(), message.text),
            SayKind::ToolOutput => println!("{}", message.text.dimmed()),
        }
        if !message.images.is_empty() {
            println!("{}", format!("  ({} image(s) attached)", message.images.len()).dimmed());
        }
        Ok(())
    }

    async fn ask(&self, request: AskRequest) -> Result<AskReply, HostError> {
        if request.partial {
            return Ok(AskReply::yes());
        }
        let label = ask_label(request.kind);
        let text = request.text.unwrap_or_default();
        if self.auto_approve && !request.force_protected && request.kind != AskKind::MistakeLimitReached
        {
            println!("{} {} {}", "✓".green(), label.bold(), text.dimmed());
            return Ok(AskReply::yes());
        }

        println!("{} {} {}", "?".yellow().bold(), label.bold(), text);
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(b"  [y]es / [n]o / or type feedback: ")
            .await
            .map_err(|err| HostError::message(format!("stdout: {err}")))?;
        stdout
            .flush()
            .await
            .map_err(|err| HostError::message(format!("stdout: {err}")))?;

        let Some(answer) = self.read_line().await? else {
            return Err(HostError::Closed);
        };
        Ok(match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => AskReply::yes(),
            "" | "n" | "no" => AskReply::no(),
            _ => AskReply::message(answer),
        })
    }

    async fn checkpoint_save(&self, _force: bool) -> Result<(), HostError> {
        println!("{}", "  checkpoint saved".dimmed());
        Ok(())
    }

    fn record_tool_error(&self, tool: &str, message: &str) {
        tracing::debug!(tool, "tool error: {message}");
    }

    fn log_turn(&self, turn_id: Uuid, blocks: &[ContentBlock]) {
        if let Some(path) = &self.turn_log_path {
            audit::log_turn_blocks(path, turn_id, blocks);
        }
    }
}
