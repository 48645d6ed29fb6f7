//! Assistant content blocks as they arrive from the model stream.
//!
//! A block is either plain text or a tool invocation. While the model is still
//! producing a block it is `partial`; the stream reader may keep mutating it in
//! place until it flips to complete, after which it is frozen.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool parameters exactly as the model wrote them. Values are never coerced;
/// each handler parses what it needs.
pub type ToolParams = BTreeMap<String, String>;

/// Reserved parameter key carrying a raw JSON payload for tools whose arguments
/// are written as a single JSON document inside the tool tag.
pub const JSON_PAYLOAD_PARAM: &str = "_json";

/// One unit of assistant output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    ToolUse(ToolUse),
}

/// Assistant prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub content: String,
    #[serde(default)]
    pub partial: bool,
}

/// A tool invocation, possibly still streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUse {
    pub name: String,
    #[serde(default)]
    pub params: ToolParams,
    #[serde(default)]
    pub partial: bool,
}

impl ContentBlock {
    /// Build a text block.
    pub fn text(content: impl Into<String>, partial: bool) -> Self {
        ContentBlock::Text(TextBlock {
            content: content.into(),
            partial,
        })
    }

    /// Build a tool-use block from `(key, value)` pairs.
    pub fn tool_use<K, V>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
        partial: bool,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        ContentBlock::ToolUse(ToolUse {
            name: name.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            partial,
        })
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        match self {
            ContentBlock::Text(text) => text.partial,
            ContentBlock::ToolUse(tool) => tool.partial,
        }
    }

    /// Flip the block to complete. Never goes back to partial.
    pub fn mark_complete(&mut self) {
        match self {
            ContentBlock::Text(text) => text.partial = false,
            ContentBlock::ToolUse(tool) => tool.partial = false,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text(_) => "text",
            ContentBlock::ToolUse(_) => "tool_use",
        }
    }

    #[must_use]
    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            ContentBlock::ToolUse(tool) => Some(tool),
            ContentBlock::Text(_) => None,
        }
    }
}

impl ToolUse {
    /// Create a complete tool invocation without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ToolParams::new(),
            partial: false,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Parameter value, if the model supplied one.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parameter value that is present and not blank.
    #[must_use]
    pub fn non_empty_param(&self, key: &str) -> Option<&str> {
        self.param(key).filter(|value| !value.trim().is_empty())
    }

    /// Arguments as a JSON object: the reserved payload if present, otherwise the
    /// flat string parameters lifted into an object.
    pub fn json_arguments(&self) -> Result<Value, serde_json::Error> {
        if let Some(raw) = self.param(JSON_PAYLOAD_PARAM) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return serde_json::from_str(trimmed);
        }
        let object = self
            .params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        Ok(Value::Object(object))
    }
}

impl From<ToolUse> for ContentBlock {
    fn from(tool: ToolUse) -> Self {
        ContentBlock::ToolUse(tool)
    }
}

impl From<TextBlock> for ContentBlock {
    fn from(text: TextBlock) -> Self {
        ContentBlock::Text(text)
    }
}
