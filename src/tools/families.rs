//! Operation tables for the built-in tool families.

use std::sync::Arc;

use super::catalog::{ParamDoc, optional, required};
use super::family::{OperationSpec, ToolFamily};
use super::spec::ToolHandler;

pub const DEBUG_FAMILY: &str = "debug";
pub const LSP_FAMILY: &str = "lsp";

const fn op(
    name: &'static str,
    summary: &'static str,
    params: &'static [ParamDoc],
) -> OperationSpec {
    OperationSpec {
        name,
        summary,
        params,
        mutating: false,
    }
}

/// An operation that edits source files.
const fn edit_op(
    name: &'static str,
    summary: &'static str,
    params: &'static [ParamDoc],
) -> OperationSpec {
    OperationSpec {
        mutating: true,
        ..op(name, summary, params)
    }
}

const PATH: ParamDoc = required("path", "Source file path.");
const LINE: ParamDoc = required("line", "1-based line number.").integer();
const FRAME: ParamDoc = optional("frameId", "Stack frame id; defaults to the top frame.").integer();

pub const DEBUG_OPERATIONS: &[OperationSpec] = &[
    op(
        "launch",
        "Start a debug session for a program or test file.",
        &[
            required("program", "Program or test file to debug."),
            optional("args", "Command-line arguments as a JSON array."),
            optional("mode", "Launch mode, e.g. pytest."),
            optional("stopOnEntry", "Pause on the first line.").boolean(),
        ],
    ),
    op("restart", "Restart the active debug session.", &[]),
    op("quit", "Terminate the active debug session.", &[]),
    op("continue", "Resume execution until the next breakpoint.", &[]),
    op("next", "Step over the current line.", &[]),
    op("step_in", "Step into the call on the current line.", &[]),
    op("step_out", "Run until the current function returns.", &[]),
    op(
        "jump",
        "Move execution to another line in the current frame.",
        &[LINE, FRAME],
    ),
    op(
        "until",
        "Continue until a line greater than the current one is reached.",
        &[LINE],
    ),
    op(
        "set_breakpoint",
        "Set a breakpoint at a line.",
        &[
            PATH,
            LINE,
            optional("condition", "Expression that must be true to break."),
        ],
    ),
    op(
        "set_temp_breakpoint",
        "Set a breakpoint removed after its first hit.",
        &[PATH, LINE],
    ),
    op("remove_breakpoint", "Remove the breakpoint at a line.", &[PATH, LINE]),
    op(
        "remove_all_breakpoints_in_file",
        "Remove every breakpoint in a file.",
        &[PATH],
    ),
    op("disable_breakpoint", "Disable the breakpoint at a line.", &[PATH, LINE]),
    op("enable_breakpoint", "Enable the breakpoint at a line.", &[PATH, LINE]),
    op(
        "ignore_breakpoint",
        "Skip a breakpoint for a number of hits.",
        &[
            PATH,
            LINE,
            required("ignoreCount", "Number of hits to ignore.").integer(),
        ],
    ),
    op(
        "set_breakpoint_condition",
        "Change the condition of an existing breakpoint.",
        &[PATH, LINE, required("condition", "New break condition.")],
    ),
    op("get_active_breakpoints", "List all breakpoints.", &[]),
    op("stack_trace", "Show the call stack of the paused thread.", &[]),
    op(
        "list_source",
        "Show source around the current line.",
        &[optional("linesAround", "Context lines on each side.").integer()],
    ),
    op("up", "Move one frame up the stack.", &[]),
    op("down", "Move one frame down the stack.", &[]),
    op(
        "goto_frame",
        "Select a stack frame.",
        &[required("frameId", "Stack frame id.").integer()],
    ),
    op(
        "get_source",
        "Show the source of a function or object.",
        &[required("expression", "Expression naming the object.")],
    ),
    op("get_stack_frame_variables", "List variables in a frame.", &[FRAME]),
    op("get_args", "Show the arguments of the current function.", &[FRAME]),
    op(
        "evaluate",
        "Evaluate an expression in the paused frame.",
        &[required("expression", "Expression to evaluate."), FRAME],
    ),
    op(
        "pretty_print",
        "Pretty-print the value of an expression.",
        &[required("expression", "Expression to print."), FRAME],
    ),
    op(
        "whatis",
        "Show the type of an expression.",
        &[required("expression", "Expression to inspect."), FRAME],
    ),
    op(
        "execute_statement",
        "Execute a statement in the paused frame.",
        &[required("statement", "Statement to execute."), FRAME],
    ),
    op("get_last_stop_info", "Explain why execution last stopped.", &[]),
];

const URI: ParamDoc = required("uri", "Document URI or workspace-relative path.");
const POS_LINE: ParamDoc = required("line", "0-based line of the position.").integer();
const POS_CHAR: ParamDoc = required("character", "0-based character of the position.").integer();
const SYMBOL: ParamDoc = required("symbolName", "Name path of the symbol, e.g. Foo/bar.");
const POSITION: &[ParamDoc] = &[URI, POS_LINE, POS_CHAR];

pub const LSP_OPERATIONS: &[OperationSpec] = &[
    op(
        "find_usages",
        "Find all references to the symbol at a position.",
        POSITION,
    ),
    op(
        "go_to_definition",
        "Locate the definition of the symbol at a position.",
        POSITION,
    ),
    op(
        "find_implementations",
        "Find implementations of an interface or method.",
        POSITION,
    ),
    op("get_hover_info", "Hover information at a position.", POSITION),
    op("get_document_symbols", "Outline of all symbols in a document.", &[URI]),
    op("get_completions", "Completion items at a position.", POSITION),
    op("get_signature_help", "Signature help at a call position.", POSITION),
    edit_op(
        "rename",
        "Rename the symbol at a position across the workspace.",
        &[
            URI,
            POS_LINE,
            POS_CHAR,
            required("newName", "The new symbol name."),
        ],
    ),
    op(
        "get_code_actions",
        "Quick fixes and refactorings for a position.",
        POSITION,
    ),
    op("get_code_lens", "Code lenses of a document.", &[URI]),
    op(
        "get_selection_range",
        "Semantic selection ranges at a position.",
        POSITION,
    ),
    op(
        "get_type_definition",
        "Locate the type definition at a position.",
        POSITION,
    ),
    op("get_declaration", "Locate the declaration at a position.", POSITION),
    op(
        "get_document_highlights",
        "Occurrences of the symbol in the document.",
        POSITION,
    ),
    op(
        "get_workspace_symbols",
        "Search symbols across the workspace.",
        &[required("query", "Symbol search query.")],
    ),
    op(
        "get_call_hierarchy",
        "Callers and callees of the function at a position.",
        POSITION,
    ),
    op(
        "get_type_hierarchy",
        "Super- and subtypes of the type at a position.",
        POSITION,
    ),
    op("get_symbol_children", "Members of a named symbol.", &[URI, SYMBOL]),
    op(
        "get_symbols_overview",
        "Top-level symbols of a file or directory.",
        &[required("path", "File or directory.")],
    ),
    op(
        "get_symbol_code_snippet",
        "Source code of a named symbol.",
        &[URI, SYMBOL],
    ),
    edit_op(
        "insert_after_symbol",
        "Insert code after a named symbol.",
        &[URI, SYMBOL, required("content", "Code to insert.")],
    ),
    edit_op(
        "insert_before_symbol",
        "Insert code before a named symbol.",
        &[URI, SYMBOL, required("content", "Code to insert.")],
    ),
    edit_op(
        "replace_symbol_body",
        "Replace the body of a named symbol.",
        &[URI, SYMBOL, required("replacement", "New body.")],
    ),
    op(
        "get_symbols",
        "Find symbols by name pattern.",
        &[required("name_path", "Name or name path to match.")],
    ),
];

/// The debugger family, backed by `handler`.
pub fn debug_family(handler: Arc<dyn ToolHandler>) -> ToolFamily {
    ToolFamily::with_table_validator(
        DEBUG_FAMILY,
        "Interactive debugger operations",
        DEBUG_OPERATIONS.to_vec(),
        handler,
    )
}

/// The language-server family, backed by `handler`.
pub fn lsp_family(handler: Arc<dyn ToolHandler>) -> ToolFamily {
    ToolFamily::with_table_validator(
        LSP_FAMILY,
        "Language server queries and symbol edits",
        LSP_OPERATIONS.to_vec(),
        handler,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn operation_names_are_unique() {
        for table in [DEBUG_OPERATIONS, LSP_OPERATIONS] {
            let mut seen = HashSet::new();
            for spec in table {
                assert!(seen.insert(spec.name), "duplicate operation {}", spec.name);
            }
        }
    }

    #[test]
    fn set_breakpoint_requires_path_and_line() {
        let spec = DEBUG_OPERATIONS
            .iter()
            .find(|spec| spec.name == "set_breakpoint")
            .unwrap();
        let required: Vec<_> = spec
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        assert_eq!(required, vec!["path", "line"]);
    }

    #[test]
    fn only_symbol_edits_mutate() {
        let mutating: Vec<_> = DEBUG_OPERATIONS
            .iter()
            .chain(LSP_OPERATIONS)
            .filter(|spec| spec.mutating)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(
            mutating,
            vec![
                "rename",
                "insert_after_symbol",
                "insert_before_symbol",
                "replace_symbol_body"
            ]
        );
    }
}
