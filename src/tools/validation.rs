//! Mode-aware validation for conventional tools.
//!
//! Every mode grants a set of tool groups. A group may be restricted to file
//! paths matching a regex, which is how the architect mode can only write
//! Markdown. Tool families carry their own validator and skip this one.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::block::ToolParams;

use super::catalog::{ToolGroup, group_for_tool, is_always_available};
use super::spec::ToolError;

pub const DEFAULT_MODE: &str = "code";
pub const BUILTIN_MODE_SLUGS: &[&str] = &["code", "architect", "ask", "debug", "orchestrator"];

/// Static check run before a conventional tool is dispatched.
pub trait ToolValidator: Send + Sync {
    fn validate(&self, tool: &str, mode: &str, params: &ToolParams) -> Result<(), ToolError>;
}

// === Mode configuration ===

/// A mode definition, built in or loaded from `[[custom_modes]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

/// A granted group, optionally limited to matching file paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    Name(ToolGroup),
    Restricted {
        group: ToolGroup,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_regex: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl GroupEntry {
    #[must_use]
    pub fn group(&self) -> ToolGroup {
        match self {
            GroupEntry::Name(group) | GroupEntry::Restricted { group, .. } => *group,
        }
    }

    #[must_use]
    pub fn file_regex(&self) -> Option<&str> {
        match self {
            GroupEntry::Name(_) => None,
            GroupEntry::Restricted { file_regex, .. } => file_regex.as_deref(),
        }
    }
}

impl ModeConfig {
    fn new(slug: &str, name: &str, groups: Vec<GroupEntry>) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            groups,
        }
    }
}

/// Built-in modes.
#[must_use]
pub fn builtin_modes() -> Vec<ModeConfig> {
    use GroupEntry::Name;
    vec![
        ModeConfig::new(
            "code",
            "Code",
            ToolGroup::ALL.into_iter().map(Name).collect(),
        ),
        ModeConfig::new(
            "architect",
            "Architect",
            vec![
                Name(ToolGroup::Read),
                Name(ToolGroup::Browser),
                Name(ToolGroup::Mcp),
                GroupEntry::Restricted {
                    group: ToolGroup::Edit,
                    file_regex: Some(r"\.md$".to_string()),
                    description: Some("Markdown files only".to_string()),
                },
            ],
        ),
        ModeConfig::new(
            "ask",
            "Ask",
            vec![
                Name(ToolGroup::Read),
                Name(ToolGroup::Browser),
                Name(ToolGroup::Mcp),
            ],
        ),
        ModeConfig::new(
            "debug",
            "Debug",
            ToolGroup::ALL.into_iter().map(Name).collect(),
        ),
        ModeConfig::new("orchestrator", "Orchestrator", Vec::new()),
    ]
}

/// Whether `slug` names a built-in or one of the given custom modes.
#[must_use]
pub fn is_known_mode(slug: &str, custom_modes: &[ModeConfig]) -> bool {
    BUILTIN_MODE_SLUGS.contains(&slug) || custom_modes.iter().any(|mode| mode.slug == slug)
}

// === Validator ===

#[derive(Debug, Clone)]
struct CompiledGroup {
    group: ToolGroup,
    file_regex: Option<Regex>,
}

#[derive(Debug, Clone)]
struct CompiledMode {
    slug: String,
    name: String,
    groups: Vec<CompiledGroup>,
}

impl CompiledMode {
    fn compile(mode: &ModeConfig) -> Result<Self, regex::Error> {
        let groups = mode
            .groups
            .iter()
            .map(|entry| {
                Ok(CompiledGroup {
                    group: entry.group(),
                    file_regex: entry.file_regex().map(Regex::new).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self {
            slug: mode.slug.clone(),
            name: mode.name.clone(),
            groups,
        })
    }
}

/// Validator over built-in plus custom modes and disabled tools.
///
/// Tools outside every group and not always available are host-registered
/// extensions and are permitted in every mode.
#[derive(Debug, Clone)]
pub struct ModeToolValidator {
    modes: Vec<CompiledMode>,
    disabled_tools: BTreeSet<String>,
}

impl Default for ModeToolValidator {
    fn default() -> Self {
        Self::new(Vec::new()).expect("built-in mode patterns should compile")
    }
}

impl ModeToolValidator {
    /// Custom modes shadow built-in modes with the same slug.
    pub fn new(custom_modes: Vec<ModeConfig>) -> Result<Self, regex::Error> {
        let mut modes = custom_modes
            .iter()
            .map(CompiledMode::compile)
            .collect::<Result<Vec<_>, _>>()?;
        for builtin in builtin_modes() {
            if !modes.iter().any(|mode| mode.slug == builtin.slug) {
                modes.push(CompiledMode::compile(&builtin)?);
            }
        }
        Ok(Self {
            modes,
            disabled_tools: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn with_disabled_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    fn mode(&self, slug: &str) -> Option<&CompiledMode> {
        self.modes.iter().find(|mode| mode.slug == slug)
    }
}

impl ToolValidator for ModeToolValidator {
    fn validate(&self, tool: &str, mode: &str, params: &ToolParams) -> Result<(), ToolError> {
        if self.disabled_tools.contains(tool) {
            return Err(ToolError::not_available(format!(
                "Tool \"{tool}\" is disabled."
            )));
        }
        if is_always_available(tool) {
            return Ok(());
        }
        let Some(required_group) = group_for_tool(tool) else {
            return Ok(());
        };
        let Some(active) = self.mode(mode) else {
            return Err(ToolError::not_available(format!("Unknown mode '{mode}'.")));
        };
        let Some(granted) = active
            .groups
            .iter()
            .find(|granted| granted.group == required_group)
        else {
            return Err(ToolError::permission_denied(format!(
                "Tool \"{tool}\" is not allowed in {} mode.",
                active.slug
            )));
        };

        if let Some(pattern) = &granted.file_regex
            && let Some(path) = params.get("path").filter(|path| !path.trim().is_empty())
            && !pattern.is_match(path)
        {
            return Err(ToolError::permission_denied(format!(
                "This mode ({}) can only edit files matching pattern: {}. Got: {path}",
                active.name,
                pattern.as_str()
            )));
        }
        Ok(())
    }
}
