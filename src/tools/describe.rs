//! Short human-readable labels for tool invocations.
//!
//! Runs on untrusted and possibly half-streamed model output, so every
//! branch tolerates missing parameters.

use crate::core::block::ToolUse;

use super::catalog::*;
use super::families::{DEBUG_FAMILY, LSP_FAMILY};
use super::validation::DEFAULT_MODE;

/// Parameters naming the target of a family operation, in order of preference.
const FAMILY_TARGETS: &[(&str, &[&str])] = &[
    (DEBUG_FAMILY, &["path", "program", "expression"]),
    (LSP_FAMILY, &["uri", "path", "query"]),
];

/// Label shown in approval prompts and result headers, e.g.
/// `[read_file for 'src/main.rs']`.
#[must_use]
pub fn describe(block: &ToolUse) -> String {
    let name = block.name.as_str();
    match name {
        EXECUTE_COMMAND => for_param(name, block.non_empty_param("command")),
        READ_FILE | WRITE_TO_FILE | APPLY_DIFF | INSERT_CONTENT | SEARCH_AND_REPLACE
        | LIST_FILES | LIST_CODE_DEFINITION_NAMES => for_param(name, block.non_empty_param("path")),
        FETCH_INSTRUCTIONS => for_param(name, block.non_empty_param("task")),
        SEARCH_FILES => match (
            block.non_empty_param("regex"),
            block.non_empty_param("file_pattern"),
        ) {
            (Some(regex), Some(pattern)) => format!("[{name} for '{regex}' in '{pattern}']"),
            (regex, _) => for_param(name, regex),
        },
        GLOB => match (block.non_empty_param("pattern"), block.non_empty_param("path")) {
            (Some(pattern), Some(path)) => format!("[{name} for '{pattern}' in '{path}']"),
            (pattern, _) => for_param(name, pattern),
        },
        CODEBASE_SEARCH => for_param(name, block.non_empty_param("query")),
        BROWSER_ACTION => for_param(name, block.non_empty_param("action")),
        USE_MCP_TOOL | ACCESS_MCP_RESOURCE => for_param(name, block.non_empty_param("server_name")),
        ASK_FOLLOWUP_QUESTION => for_param(name, block.non_empty_param("question")),
        FETCH_TOOL_DESCRIPTION => for_param(name, block.non_empty_param("tool_name")),
        ATTEMPT_COMPLETION | UPDATE_TODO_LIST => format!("[{name}]"),
        SWITCH_MODE => {
            let target = block.non_empty_param("mode_slug").unwrap_or("");
            match block.non_empty_param("reason") {
                Some(reason) => format!("[{name} to '{target}' because: {reason}]"),
                None => format!("[{name} to '{target}']"),
            }
        }
        NEW_TASK => {
            let mode = block.non_empty_param("mode").unwrap_or(DEFAULT_MODE);
            let message = block.non_empty_param("message").unwrap_or("(no message)");
            format!("[{name} in {mode} mode: '{message}']")
        }
        _ => describe_family_or_generic(block),
    }
}

fn describe_family_or_generic(block: &ToolUse) -> String {
    let name = block.name.as_str();
    let targets = FAMILY_TARGETS
        .iter()
        .find(|(family, _)| is_family_name(name, family))
        .map(|(_, targets)| *targets);
    match targets {
        Some(targets) => {
            let target = targets.iter().find_map(|key| block.non_empty_param(key));
            for_param(name, target)
        }
        None => format!("[{name}]"),
    }
}

// The meta-tool itself or one of its `{family}_{operation}` leaves.
fn is_family_name(name: &str, family: &str) -> bool {
    match name.strip_prefix(family) {
        Some("") => true,
        Some(rest) => rest.strip_prefix('_').is_some_and(|op| !op.is_empty()),
        None => false,
    }
}

fn for_param(name: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("[{name} for '{value}']"),
        None => format!("[{name}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_common_tools() {
        let block = ToolUse::new(EXECUTE_COMMAND).with_param("command", "cargo test");
        assert_eq!(describe(&block), "[execute_command for 'cargo test']");

        let block = ToolUse::new(SEARCH_FILES)
            .with_param("regex", "fn main")
            .with_param("file_pattern", "*.rs");
        assert_eq!(describe(&block), "[search_files for 'fn main' in '*.rs']");

        let block = ToolUse::new(GLOB).with_param("pattern", "*.ts");
        assert_eq!(describe(&block), "[glob for '*.ts']");
    }

    #[test]
    fn describes_mode_tools() {
        let block = ToolUse::new(SWITCH_MODE)
            .with_param("mode_slug", "debug")
            .with_param("reason", "tests fail");
        assert_eq!(describe(&block), "[switch_mode to 'debug' because: tests fail]");

        let block = ToolUse::new(NEW_TASK);
        assert_eq!(describe(&block), "[new_task in code mode: '(no message)']");
    }

    #[test]
    fn describes_family_leaves() {
        let block = ToolUse::new("debug_set_breakpoint").with_param("path", "a.py");
        assert_eq!(describe(&block), "[debug_set_breakpoint for 'a.py']");
        let block = ToolUse::new("lsp_get_document_symbols");
        assert_eq!(describe(&block), "[lsp_get_document_symbols]");
        let block = ToolUse::new("lsp_get_workspace_symbols").with_param("query", "Engine");
        assert_eq!(describe(&block), "[lsp_get_workspace_symbols for 'Engine']");
        let block = ToolUse::new("debug")
            .with_param("debug_operation", "launch")
            .with_param("program", "app.py");
        assert_eq!(describe(&block), "[debug for 'app.py']");
    }

    #[test]
    fn family_prefix_needs_an_operation() {
        let block = ToolUse::new("debugger").with_param("path", "a.py");
        assert_eq!(describe(&block), "[debugger]");
        let block = ToolUse::new("lsp_").with_param("uri", "a.rs");
        assert_eq!(describe(&block), "[lsp_]");
    }

    #[test]
    fn degrades_for_unknown_or_incomplete_blocks() {
        assert_eq!(describe(&ToolUse::new("mystery")), "[mystery]");
        assert_eq!(describe(&ToolUse::new(READ_FILE)), "[read_file]");
        assert_eq!(describe(&ToolUse::new("")), "[]");
    }
}
