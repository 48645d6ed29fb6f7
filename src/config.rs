//! Configuration loading and defaults for the zentara agent.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::engine::{DEFAULT_CONSECUTIVE_MISTAKE_LIMIT, EngineConfig};
use crate::core::repetition::DEFAULT_REPETITION_LIMIT;
use crate::tools::fetch_description::DEFAULT_PAGE_SIZE;
use crate::tools::validation::{DEFAULT_MODE, ModeConfig, ModeToolValidator, is_known_mode};

pub const CONFIG_PATH_ENV: &str = "ZENTARA_CONFIG_PATH";

// === Types ===

/// Raw configuration as written in `config.toml`; unset keys fall back to
/// defaults in the accessors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub mode: Option<String>,
    pub repetition_limit: Option<u32>,
    pub consecutive_mistake_limit: Option<u32>,
    pub enable_checkpoints: Option<bool>,
    /// Approve every prompt without asking. Only honored by the CLI host.
    pub auto_approve: Option<bool>,
    pub tool_list_page_size: Option<usize>,
    pub disabled_tools: Option<Vec<String>>,
    pub turn_log_path: Option<String>,
    pub custom_modes: Option<Vec<ModeConfig>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(flatten)]
    base: Config,
    profiles: Option<HashMap<String, Config>>,
}

// === Config Loading ===

impl Config {
    /// Load configuration from disk and merge with environment overrides.
    pub fn load(path: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
        let path = resolve_load_config_path(path);
        let mut config = match path.as_ref() {
            Some(path) if path.exists() => Self::load_file(path, profile)?,
            _ => Config::default(),
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse one config file and apply `profile`, without environment overrides.
    pub fn load_file(path: &Path, profile: Option<&str>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let parsed: ConfigFile = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        apply_profile(parsed, profile)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Some(mode) = self.mode.as_deref() {
            if mode.trim().is_empty() {
                anyhow::bail!("mode cannot be empty string");
            }
            if !is_known_mode(mode, self.custom_modes()) {
                anyhow::bail!(
                    "Unknown mode '{mode}': expected a built-in mode or one of custom_modes."
                );
            }
        }
        if self.tool_list_page_size == Some(0) {
            anyhow::bail!("tool_list_page_size must be at least 1");
        }
        for mode in self.custom_modes() {
            if mode.slug.trim().is_empty() {
                anyhow::bail!("custom mode '{}' has an empty slug", mode.name);
            }
            for group in &mode.groups {
                if let Some(pattern) = group.file_regex() {
                    Regex::new(pattern).with_context(|| {
                        format!("Invalid file_regex '{pattern}' in custom mode '{}'", mode.slug)
                    })?;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(DEFAULT_MODE)
    }

    #[must_use]
    pub fn repetition_limit(&self) -> u32 {
        self.repetition_limit.unwrap_or(DEFAULT_REPETITION_LIMIT)
    }

    #[must_use]
    pub fn consecutive_mistake_limit(&self) -> u32 {
        self.consecutive_mistake_limit
            .unwrap_or(DEFAULT_CONSECUTIVE_MISTAKE_LIMIT)
    }

    #[must_use]
    pub fn enable_checkpoints(&self) -> bool {
        self.enable_checkpoints.unwrap_or(true)
    }

    #[must_use]
    pub fn auto_approve(&self) -> bool {
        self.auto_approve.unwrap_or(false)
    }

    #[must_use]
    pub fn tool_list_page_size(&self) -> usize {
        self.tool_list_page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    #[must_use]
    pub fn disabled_tools(&self) -> &[String] {
        self.disabled_tools.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn custom_modes(&self) -> &[ModeConfig] {
        self.custom_modes.as_deref().unwrap_or_default()
    }

    /// Resolve the turn log path, if turn logging is enabled.
    #[must_use]
    pub fn turn_log_path(&self) -> Option<PathBuf> {
        self.turn_log_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(expand_path)
    }

    /// Settings consumed by the presentation engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.mode().to_string(),
            repetition_limit: self.repetition_limit(),
            consecutive_mistake_limit: self.consecutive_mistake_limit(),
            checkpoints: self.enable_checkpoints(),
        }
    }

    /// Mode validator for the configured custom modes and disabled tools.
    pub fn tool_validator(&self) -> Result<ModeToolValidator> {
        let validator = ModeToolValidator::new(self.custom_modes().to_vec())
            .context("Invalid file_regex in custom_modes")?;
        Ok(validator.with_disabled_tools(self.disabled_tools().iter().cloned()))
    }
}

// === Defaults ===

fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".zentara").join("config.toml"))
}

fn env_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(expand_path(trimmed));
        }
    }
    None
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    if let Some(raw) = path.to_str() {
        return expand_path(raw);
    }
    path
}

fn resolve_load_config_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(expand_pathbuf(path));
    }
    env_config_path().or_else(home_config_path)
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

// === Environment Overrides ===

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(value) = var("ZENTARA_MODE")
        && !value.trim().is_empty()
    {
        config.mode = Some(value.trim().to_string());
    }
    if let Some(value) = var("ZENTARA_REPETITION_LIMIT")
        && let Ok(parsed) = value.trim().parse::<u32>()
    {
        config.repetition_limit = Some(parsed);
    }
    if let Some(value) = var("ZENTARA_ENABLE_CHECKPOINTS") {
        config.enable_checkpoints = Some(parse_flag(&value));
    }
    if let Some(value) = var("ZENTARA_AUTO_APPROVE") {
        config.auto_approve = Some(parse_flag(&value));
    }
    if let Some(value) = var("ZENTARA_TURN_LOG") {
        config.turn_log_path = Some(value);
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn apply_profile(config: ConfigFile, profile: Option<&str>) -> Result<Config> {
    let Some(profile_name) = profile else {
        return Ok(config.base);
    };
    let profiles = config.profiles.as_ref();
    match profiles.and_then(|profiles| profiles.get(profile_name)) {
        Some(override_cfg) => Ok(merge_config(config.base, override_cfg.clone())),
        None => {
            let available = profiles
                .map(|profiles| {
                    let mut keys = profiles.keys().cloned().collect::<Vec<_>>();
                    keys.sort();
                    if keys.is_empty() {
                        "none".to_string()
                    } else {
                        keys.join(", ")
                    }
                })
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!("Profile '{profile_name}' not found. Available profiles: {available}")
        }
    }
}

fn merge_config(base: Config, override_cfg: Config) -> Config {
    Config {
        mode: override_cfg.mode.or(base.mode),
        repetition_limit: override_cfg.repetition_limit.or(base.repetition_limit),
        consecutive_mistake_limit: override_cfg
            .consecutive_mistake_limit
            .or(base.consecutive_mistake_limit),
        enable_checkpoints: override_cfg.enable_checkpoints.or(base.enable_checkpoints),
        auto_approve: override_cfg.auto_approve.or(base.auto_approve),
        tool_list_page_size: override_cfg.tool_list_page_size.or(base.tool_list_page_size),
        disabled_tools: override_cfg.disabled_tools.or(base.disabled_tools),
        turn_log_path: override_cfg.turn_log_path.or(base.turn_log_path),
        custom_modes: merge_custom_modes(base.custom_modes, override_cfg.custom_modes),
    }
}

// Profile modes replace base modes with the same slug and add the rest.
fn merge_custom_modes(
    base: Option<Vec<ModeConfig>>,
    override_modes: Option<Vec<ModeConfig>>,
) -> Option<Vec<ModeConfig>> {
    match (base, override_modes) {
        (None, None) => None,
        (Some(base), None) => Some(base),
        (None, Some(extra)) => Some(extra),
        (Some(mut base), Some(extra)) => {
            for mode in extra {
                match base.iter_mut().find(|existing| existing.slug == mode.slug) {
                    Some(existing) => *existing = mode,
                    None => base.push(mode),
                }
            }
            Some(base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::default();
        assert_eq!(config.mode(), "code");
        assert_eq!(config.repetition_limit(), 3);
        assert!(config.enable_checkpoints());
        assert!(!config.auto_approve());
        assert_eq!(config.tool_list_page_size(), 50);
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn loads_custom_modes_and_profiles() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_config(
            &dir,
            r#"
mode = "architect"
repetition_limit = 5
disabled_tools = ["browser_action"]

[[custom_modes]]
slug = "docs"
name = "Docs"
groups = ["read", { group = "edit", file_regex = "\\.md$" }]

[profiles.strict]
repetition_limit = 2
enable_checkpoints = false
"#,
        );

        let base = Config::load_file(&path, None)?;
        base.validate()?;
        assert_eq!(base.mode(), "architect");
        assert_eq!(base.repetition_limit(), 5);
        assert_eq!(base.custom_modes().len(), 1);
        assert_eq!(base.custom_modes()[0].groups[1].file_regex(), Some(r"\.md$"));

        let strict = Config::load_file(&path, Some("strict"))?;
        assert_eq!(strict.repetition_limit(), 2);
        assert!(!strict.enable_checkpoints());
        assert_eq!(strict.mode(), "architect");
        assert_eq!(strict.disabled_tools(), ["browser_action".to_string()]);
        Ok(())
    }

    #[test]
    fn explicit_path_is_loaded_and_validated() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_config(&dir, "mode = \"ask\"\ntool_list_page_size = 10\n");
        let config = Config::load(Some(path), None)?;
        assert_eq!(config.tool_list_page_size(), 10);
        Ok(())
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ZENTARA_MODE", "debug"),
            ("ZENTARA_REPETITION_LIMIT", "0"),
            ("ZENTARA_ENABLE_CHECKPOINTS", "false"),
            ("ZENTARA_AUTO_APPROVE", "1"),
            ("ZENTARA_TURN_LOG", "~/turns.jsonl"),
        ]);
        let mut config = Config {
            mode: Some("ask".to_string()),
            ..Default::default()
        };
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mode(), "debug");
        assert_eq!(config.repetition_limit(), 0);
        assert!(!config.enable_checkpoints());
        assert!(config.auto_approve());
        let log = config.turn_log_path().expect("turn log path");
        assert!(log.ends_with("turns.jsonl"));
        assert!(!log.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let empty_mode = Config {
            mode: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(empty_mode.validate().is_err());

        let unknown_mode = Config {
            mode: Some("poet".to_string()),
            ..Default::default()
        };
        assert!(unknown_mode.validate().is_err());

        let zero_page = Config {
            tool_list_page_size: Some(0),
            ..Default::default()
        };
        assert!(zero_page.validate().is_err());
    }

    #[test]
    fn bad_file_regex_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_config(
            &dir,
            r#"
[[custom_modes]]
slug = "broken"
name = "Broken"
groups = [{ group = "edit", file_regex = "([" }]
"#,
        );
        let config = Config::load_file(&path, None)?;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("Invalid file_regex"));
        Ok(())
    }

    #[test]
    fn test_nonexistent_profile_error() {
        let mut profiles = HashMap::new();
        profiles.insert("work".to_string(), Config::default());
        let config = ConfigFile {
            base: Config::default(),
            profiles: Some(profiles),
        };

        let err = apply_profile(config, Some("nonexistent")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Profile 'nonexistent' not found"));
        assert!(message.contains("work"));
    }

    #[test]
    fn test_profile_with_no_profiles_section() {
        let config = ConfigFile {
            base: Config::default(),
            profiles: None,
        };

        let err = apply_profile(config, Some("missing")).unwrap_err();
        assert!(err.to_string().contains("Available profiles: none"));
    }

    #[test]
    fn profile_modes_replace_by_slug() {
        let mode = |slug: &str, name: &str| ModeConfig {
            slug: slug.to_string(),
            name: name.to_string(),
            groups: Vec::new(),
        };
        let merged = merge_custom_modes(
            Some(vec![mode("docs", "Docs"), mode("qa", "QA")]),
            Some(vec![mode("docs", "Docs v2")]),
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Docs v2");
    }
}
