//! Names, groups and documentation of the built-in tools.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

// === Tool names ===

pub const EXECUTE_COMMAND: &str = "execute_command";
pub const READ_FILE: &str = "read_file";
pub const FETCH_INSTRUCTIONS: &str = "fetch_instructions";
pub const WRITE_TO_FILE: &str = "write_to_file";
pub const APPLY_DIFF: &str = "apply_diff";
pub const INSERT_CONTENT: &str = "insert_content";
pub const SEARCH_AND_REPLACE: &str = "search_and_replace";
pub const SEARCH_FILES: &str = "search_files";
pub const LIST_FILES: &str = "list_files";
pub const LIST_CODE_DEFINITION_NAMES: &str = "list_code_definition_names";
pub const CODEBASE_SEARCH: &str = "codebase_search";
pub const GLOB: &str = "glob";
pub const BROWSER_ACTION: &str = "browser_action";
pub const USE_MCP_TOOL: &str = "use_mcp_tool";
pub const ACCESS_MCP_RESOURCE: &str = "access_mcp_resource";
pub const ASK_FOLLOWUP_QUESTION: &str = "ask_followup_question";
pub const ATTEMPT_COMPLETION: &str = "attempt_completion";
pub const SWITCH_MODE: &str = "switch_mode";
pub const NEW_TASK: &str = "new_task";
pub const UPDATE_TODO_LIST: &str = "update_todo_list";
pub const FETCH_TOOL_DESCRIPTION: &str = "fetch_tool_description";

/// Tools every mode may use.
pub const ALWAYS_AVAILABLE_TOOLS: &[&str] = &[
    ASK_FOLLOWUP_QUESTION,
    ATTEMPT_COMPLETION,
    SWITCH_MODE,
    NEW_TASK,
    UPDATE_TODO_LIST,
    FETCH_TOOL_DESCRIPTION,
];

/// Tools that write to the workspace and therefore get a checkpoint first.
pub const MUTATING_TOOLS: &[&str] = &[
    WRITE_TO_FILE,
    APPLY_DIFF,
    INSERT_CONTENT,
    SEARCH_AND_REPLACE,
];

#[must_use]
pub fn is_mutating_tool(name: &str) -> bool {
    MUTATING_TOOLS.contains(&name)
}

#[must_use]
pub fn is_always_available(name: &str) -> bool {
    ALWAYS_AVAILABLE_TOOLS.contains(&name)
}

// === Groups ===

/// Capability groups a mode can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Read,
    Edit,
    Browser,
    Command,
    Mcp,
    Modes,
    Debug,
    Lsp,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 8] = [
        ToolGroup::Read,
        ToolGroup::Edit,
        ToolGroup::Browser,
        ToolGroup::Command,
        ToolGroup::Mcp,
        ToolGroup::Modes,
        ToolGroup::Debug,
        ToolGroup::Lsp,
    ];

    /// Conventional tools in this group. Families are matched by prefix.
    #[must_use]
    pub fn tools(self) -> &'static [&'static str] {
        match self {
            ToolGroup::Read => &[
                READ_FILE,
                FETCH_INSTRUCTIONS,
                SEARCH_FILES,
                LIST_FILES,
                LIST_CODE_DEFINITION_NAMES,
                CODEBASE_SEARCH,
                GLOB,
            ],
            ToolGroup::Edit => MUTATING_TOOLS,
            ToolGroup::Browser => &[BROWSER_ACTION],
            ToolGroup::Command => &[EXECUTE_COMMAND],
            ToolGroup::Mcp => &[USE_MCP_TOOL, ACCESS_MCP_RESOURCE],
            ToolGroup::Modes => &[SWITCH_MODE, NEW_TASK],
            ToolGroup::Debug | ToolGroup::Lsp => &[],
        }
    }

    /// Family prefix owned by this group, if any.
    #[must_use]
    pub fn family_prefix(self) -> Option<&'static str> {
        match self {
            ToolGroup::Debug => Some("debug_"),
            ToolGroup::Lsp => Some("lsp_"),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(self, tool: &str) -> bool {
        self.tools().contains(&tool)
            || self
                .family_prefix()
                .is_some_and(|prefix| tool.starts_with(prefix))
    }
}

/// Group that grants `tool`, if any.
#[must_use]
pub fn group_for_tool(tool: &str) -> Option<ToolGroup> {
    ToolGroup::ALL.into_iter().find(|group| group.contains(tool))
}

// === Documentation ===

/// JSON type a family argument is converted to before validation.
/// Everything is text unless the operation table says otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamKind {
    #[default]
    Text,
    Integer,
    Boolean,
}

/// One documented parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDoc {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
    pub kind: ParamKind,
}

/// Model-facing documentation of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDoc {
    pub name: &'static str,
    pub summary: &'static str,
    pub params: &'static [ParamDoc],
}

pub(crate) const fn required(name: &'static str, description: &'static str) -> ParamDoc {
    ParamDoc {
        name,
        required: true,
        description,
        kind: ParamKind::Text,
    }
}

pub(crate) const fn optional(name: &'static str, description: &'static str) -> ParamDoc {
    ParamDoc {
        name,
        required: false,
        description,
        kind: ParamKind::Text,
    }
}

impl ParamDoc {
    #[must_use]
    pub const fn integer(self) -> Self {
        Self {
            kind: ParamKind::Integer,
            ..self
        }
    }

    #[must_use]
    pub const fn boolean(self) -> Self {
        Self {
            kind: ParamKind::Boolean,
            ..self
        }
    }
}

impl ToolDoc {
    /// Full documentation text with a usage example.
    #[must_use]
    pub fn render(&self) -> String {
        render_doc(self.name, self.summary, self.params)
    }
}

/// Render documentation for any tool name, summary and parameter list.
#[must_use]
pub fn render_doc(name: &str, summary: &str, params: &[ParamDoc]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {name}");
    let _ = writeln!(out, "Description: {summary}");
    if params.is_empty() {
        let _ = writeln!(out, "Parameters: none");
    } else {
        let _ = writeln!(out, "Parameters:");
        for param in params {
            let flag = if param.required { "required" } else { "optional" };
            let _ = writeln!(out, "- {}: ({flag}) {}", param.name, param.description);
        }
    }
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "<{name}>");
    for param in params {
        let _ = writeln!(out, "<{0}>{0} here</{0}>", param.name);
    }
    let _ = write!(out, "</{name}>");
    out
}

pub const BUILTIN_TOOL_DOCS: &[ToolDoc] = &[
    ToolDoc {
        name: EXECUTE_COMMAND,
        summary: "Run a CLI command in the workspace terminal.",
        params: &[
            required("command", "The command line to execute."),
            optional("cwd", "Working directory, relative to the workspace."),
        ],
    },
    ToolDoc {
        name: READ_FILE,
        summary: "Read the contents of a file, optionally a line range.",
        params: &[
            required("path", "File path relative to the workspace."),
            optional("start_line", "First line to read (1-based)."),
            optional("end_line", "Last line to read (inclusive)."),
        ],
    },
    ToolDoc {
        name: FETCH_INSTRUCTIONS,
        summary: "Fetch detailed instructions for a task such as creating an MCP server.",
        params: &[required("task", "The task to get instructions for.")],
    },
    ToolDoc {
        name: WRITE_TO_FILE,
        summary: "Write complete content to a file, creating it if needed.",
        params: &[
            required("path", "File path relative to the workspace."),
            required("content", "The full file content."),
            required("line_count", "Number of lines in the content."),
        ],
    },
    ToolDoc {
        name: APPLY_DIFF,
        summary: "Apply search/replace diff hunks to an existing file.",
        params: &[
            required("path", "File path relative to the workspace."),
            required("diff", "One or more SEARCH/REPLACE blocks."),
        ],
    },
    ToolDoc {
        name: INSERT_CONTENT,
        summary: "Insert lines into a file at a given line without touching the rest.",
        params: &[
            required("path", "File path relative to the workspace."),
            required("line", "Line number to insert before; 0 appends."),
            required("content", "The lines to insert."),
        ],
    },
    ToolDoc {
        name: SEARCH_AND_REPLACE,
        summary: "Replace literal text or regex matches in a file.",
        params: &[
            required("path", "File path relative to the workspace."),
            required("search", "Text or pattern to find."),
            required("replace", "Replacement text."),
            optional("use_regex", "Treat search as a regular expression."),
            optional("ignore_case", "Match case-insensitively."),
        ],
    },
    ToolDoc {
        name: SEARCH_FILES,
        summary: "Regex search across files in a directory, with context.",
        params: &[
            required("path", "Directory to search recursively."),
            required("regex", "Rust-flavoured regular expression."),
            optional("file_pattern", "Glob restricting which files are searched."),
        ],
    },
    ToolDoc {
        name: LIST_FILES,
        summary: "List files and directories in a directory.",
        params: &[
            required("path", "Directory relative to the workspace."),
            optional("recursive", "List recursively when true."),
        ],
    },
    ToolDoc {
        name: LIST_CODE_DEFINITION_NAMES,
        summary: "List top-level definitions (classes, functions) in a file or directory.",
        params: &[required("path", "File or directory relative to the workspace.")],
    },
    ToolDoc {
        name: CODEBASE_SEARCH,
        summary: "Semantic search over the indexed codebase.",
        params: &[
            required("query", "Natural-language search query."),
            optional("path", "Restrict the search to this directory."),
        ],
    },
    ToolDoc {
        name: GLOB,
        summary: "Find files whose paths match a glob pattern.",
        params: &[
            required("pattern", "Glob pattern such as **/*.ts."),
            optional("path", "Directory to search from."),
        ],
    },
    ToolDoc {
        name: BROWSER_ACTION,
        summary: "Drive a headless browser: launch, click, type, scroll, close.",
        params: &[
            required("action", "launch, click, hover, type, scroll_down, scroll_up, resize or close."),
            optional("url", "URL to open with launch."),
            optional("coordinate", "x,y position for click and hover."),
            optional("text", "Text for the type action."),
        ],
    },
    ToolDoc {
        name: USE_MCP_TOOL,
        summary: "Call a tool exposed by a connected MCP server.",
        params: &[
            required("server_name", "Name of the MCP server."),
            required("tool_name", "Name of the tool on that server."),
            optional("arguments", "JSON object with the tool arguments."),
        ],
    },
    ToolDoc {
        name: ACCESS_MCP_RESOURCE,
        summary: "Read a resource exposed by a connected MCP server.",
        params: &[
            required("server_name", "Name of the MCP server."),
            required("uri", "Resource URI."),
        ],
    },
    ToolDoc {
        name: ASK_FOLLOWUP_QUESTION,
        summary: "Ask the user a clarifying question.",
        params: &[
            required("question", "The question to ask."),
            optional("follow_up", "Suggested answers, one per <suggest> tag."),
        ],
    },
    ToolDoc {
        name: ATTEMPT_COMPLETION,
        summary: "Present the final result of the task to the user.",
        params: &[required("result", "Description of the completed work.")],
    },
    ToolDoc {
        name: SWITCH_MODE,
        summary: "Request a switch to another mode.",
        params: &[
            required("mode_slug", "Slug of the target mode."),
            optional("reason", "Why the switch is needed."),
        ],
    },
    ToolDoc {
        name: NEW_TASK,
        summary: "Start a subtask in a given mode.",
        params: &[
            required("mode", "Slug of the mode for the subtask."),
            required("message", "Instructions for the subtask."),
        ],
    },
    ToolDoc {
        name: UPDATE_TODO_LIST,
        summary: "Replace the task's todo checklist.",
        params: &[required("todos", "Markdown checklist, one item per line.")],
    },
    ToolDoc {
        name: FETCH_TOOL_DESCRIPTION,
        summary: "Fetch full documentation for a tool, or list every available tool with \
                  tool_name set to \"list\".",
        params: &[
            required("tool_name", "Tool to describe, or \"list\"."),
            optional("page", "Page of the listing to return (1-based)."),
        ],
    },
];

/// Documentation of a built-in tool.
#[must_use]
pub fn builtin_doc(name: &str) -> Option<&'static ToolDoc> {
    BUILTIN_TOOL_DOCS.iter().find(|doc| doc.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_resolve_family_prefixes() {
        assert_eq!(group_for_tool("debug_launch"), Some(ToolGroup::Debug));
        assert_eq!(group_for_tool("lsp_find_usages"), Some(ToolGroup::Lsp));
        assert_eq!(group_for_tool(APPLY_DIFF), Some(ToolGroup::Edit));
        assert_eq!(group_for_tool(ATTEMPT_COMPLETION), None);
    }

    #[test]
    fn every_builtin_has_docs() {
        for group in ToolGroup::ALL {
            for tool in group.tools() {
                assert!(builtin_doc(tool).is_some(), "missing docs for {tool}");
            }
        }
        for tool in ALWAYS_AVAILABLE_TOOLS {
            assert!(builtin_doc(tool).is_some(), "missing docs for {tool}");
        }
    }

    #[test]
    fn rendered_doc_lists_params_and_usage() {
        let text = builtin_doc(SEARCH_FILES).unwrap().render();
        assert!(text.starts_with("## search_files"));
        assert!(text.contains("- regex: (required)"));
        assert!(text.contains("- file_pattern: (optional)"));
        assert!(text.ends_with("</search_files>"));
    }
}
