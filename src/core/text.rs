//! Cleanup applied to assistant prose before it is displayed.

use std::sync::OnceLock;

use regex::Regex;

const THINKING_OPEN: &str = "<thinking>";

fn thinking_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>\s*").expect("thinking regex should compile")
    })
}

fn tag_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_]+$").expect("tag name regex should compile"))
}

/// Strip reasoning markup and any half-written trailing tag.
#[must_use]
pub fn sanitize_assistant_text(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let without_thinking = strip_thinking(content);
    strip_partial_trailing_tag(&without_thinking)
}

/// Remove closed `<thinking>` sections, and an unterminated one at the end
/// (the model is still streaming its reasoning).
fn strip_thinking(content: &str) -> String {
    let mut cleaned = thinking_regex().replace_all(content, "").into_owned();
    if let Some(idx) = cleaned.find(THINKING_OPEN) {
        cleaned.truncate(idx);
    }
    cleaned.replace("</thinking>", "")
}

/// Drop a trailing `<tag` or `</tag` fragment so the UI never flashes it.
fn strip_partial_trailing_tag(content: &str) -> String {
    let Some(idx) = content.rfind('<') else {
        return content.to_string();
    };
    let possible_tag = &content[idx..];
    if possible_tag.contains('>') {
        return content.to_string();
    }
    let tag_content = possible_tag
        .strip_prefix("</")
        .or_else(|| possible_tag.strip_prefix('<'))
        .unwrap_or(possible_tag)
        .trim();
    let is_bare_bracket = possible_tag == "<" || possible_tag == "</";
    if is_bare_bracket || tag_name_regex().is_match(tag_content) {
        content[..idx].trim().to_string()
    } else {
        content.to_string()
    }
}
