//! Text the engine hands back to the model in place of, or around, tool output.

pub const NO_OUTPUT: &str = "(tool did not return anything)";

#[must_use]
pub fn tool_denied() -> String {
    "The user denied this operation.".to_string()
}

#[must_use]
pub fn tool_denied_with_feedback(feedback: &str) -> String {
    format!(
        "The user denied this operation and provided the following feedback:\n<feedback>\n{feedback}\n</feedback>"
    )
}

#[must_use]
pub fn tool_approved_with_feedback(feedback: &str) -> String {
    format!(
        "The user approved this operation and provided the following context:\n<feedback>\n{feedback}\n</feedback>"
    )
}

#[must_use]
pub fn tool_error(error: &str) -> String {
    format!("The tool execution failed with the following error:\n<error>\n{error}\n</error>")
}

#[must_use]
pub fn missing_param_error(param: &str) -> String {
    format!(
        "Missing value for required parameter '{param}'. Please retry with complete response."
    )
}

/// Label preceding each tool result.
#[must_use]
pub fn result_header(description: &str) -> String {
    format!("{description} Result:")
}

#[must_use]
pub fn tool_skipped(description: &str) -> String {
    format!("Skipping tool {description} due to user rejecting a previous tool.")
}

#[must_use]
pub fn tool_interrupted(description: &str) -> String {
    format!(
        "Tool {description} was interrupted and not executed due to user rejecting a previous tool."
    )
}

#[must_use]
pub fn tool_already_used(tool_name: &str) -> String {
    format!(
        "Tool [{tool_name}] was not executed because a tool has already been used in this message. \
         Only one tool may be used per message. You must assess the first tool's result before \
         proceeding to use the next tool."
    )
}

#[must_use]
pub fn repetition_limit_reached(tool_name: &str) -> String {
    format!(
        "Tool call repetition limit reached for {tool_name}. Please try a different approach."
    )
}

#[must_use]
pub fn repetition_feedback(feedback: &str) -> String {
    format!("Tool repetition limit reached. User feedback: {feedback}")
}

#[must_use]
pub fn unknown_tool(tool_name: &str) -> String {
    format!(
        "Unknown tool '{tool_name}'. Use fetch_tool_description with tool_name \"list\" to see \
         the available tools."
    )
}

#[must_use]
pub fn no_result(tool_name: &str) -> String {
    format!("Tool [{tool_name}] finished without producing a result.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_is_wrapped_in_tags() {
        let text = tool_denied_with_feedback("use rg instead");
        assert!(text.contains("<feedback>\nuse rg instead\n</feedback>"));
    }

    #[test]
    fn already_used_names_the_tool() {
        assert!(tool_already_used("read_file").starts_with("Tool [read_file] was not executed"));
    }
}
