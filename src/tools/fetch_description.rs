//! `fetch_tool_description`: documentation lookup for every registered tool.
//!
//! Read-only and always available. It is the one tool that never asks for
//! approval.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::block::ToolUse;
use crate::core::callbacks::ToolCallbacks;

use super::catalog::{self, FETCH_TOOL_DESCRIPTION};
use super::spec::{ToolContext, ToolError, ToolHandler, optional_u64, required_param};

pub const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_SUGGESTIONS: usize = 5;
const LIST_KEYWORDS: &[&str] = &["list", "all"];

/// Documentation snapshot of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub summary: String,
    pub doc: String,
}

/// Name-ordered documentation of every registered tool, including family
/// leaves. Built once when the registry is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ToolCatalog {
    pub fn insert(&mut self, name: impl Into<String>, doc: impl Into<String>) {
        let doc = doc.into();
        let summary = summarize(&doc);
        self.entries.insert(name.into(), CatalogEntry { summary, doc });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn find_ignore_case(&self, name: &str) -> Option<(&str, &CatalogEntry)> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(candidate, entry)| (candidate.as_str(), entry))
    }

    /// Up to five names containing `query`, case-insensitively.
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.names()
            .filter(|name| name.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    /// One page of the tool listing. Pages are 1-based.
    pub fn render_page(&self, page: usize, page_size: usize) -> Result<String, ToolError> {
        let page_size = page_size.max(1);
        let total = self.len();
        let pages = total.div_ceil(page_size).max(1);
        if page == 0 || page > pages {
            return Err(ToolError::invalid_input(format!(
                "Page {page} is out of range; the tool list has {pages} page(s)."
            )));
        }

        let mut out = String::new();
        let _ = writeln!(out, "Available Tools ({total}):");
        for (name, entry) in self.entries.iter().skip((page - 1) * page_size).take(page_size) {
            let _ = writeln!(out, "- {name}: {}", entry.summary);
        }
        if pages > 1 {
            let _ = write!(out, "\nPage {page} of {pages}.");
            if page < pages {
                let _ = write!(
                    out,
                    " Call {FETCH_TOOL_DESCRIPTION} with tool_name \"list\" and page \"{}\" for more.",
                    page + 1
                );
            }
        }
        Ok(out.trim_end().to_string())
    }
}

fn summarize(doc: &str) -> String {
    doc.lines()
        .find_map(|line| line.strip_prefix("Description:"))
        .or_else(|| {
            doc.lines()
                .map(str::trim)
                .find(|line| !line.is_empty() && !line.starts_with('#'))
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

// === Tool ===

/// Handler for `fetch_tool_description`.
#[derive(Debug, Clone)]
pub struct FetchToolDescriptionTool {
    catalog: Arc<ToolCatalog>,
    page_size: usize,
}

impl FetchToolDescriptionTool {
    #[must_use]
    pub fn new(catalog: Arc<ToolCatalog>, page_size: usize) -> Self {
        Self {
            catalog,
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// The text returned for a `tool_name` and optional page.
    pub fn lookup(&self, tool_name: &str, page: Option<u64>) -> Result<String, ToolError> {
        let query = tool_name.trim();
        if LIST_KEYWORDS.contains(&query.to_lowercase().as_str()) {
            let page = usize::try_from(page.unwrap_or(1)).unwrap_or(usize::MAX);
            return self.catalog.render_page(page, self.page_size);
        }
        if let Some(entry) = self.catalog.get(query) {
            return Ok(entry.doc.clone());
        }
        if let Some((_, entry)) = self.catalog.find_ignore_case(query) {
            return Ok(entry.doc.clone());
        }

        let suggestions = self.catalog.suggestions(query);
        if suggestions.is_empty() {
            return Ok(format!(
                "Tool '{query}' not found. Use tool_name \"list\" to see all available tools."
            ));
        }
        let mut out = format!("Tool '{query}' not found. Did you mean:");
        for name in suggestions {
            let _ = write!(out, "\n- {name}");
        }
        Ok(out)
    }
}

#[async_trait]
impl ToolHandler for FetchToolDescriptionTool {
    fn name(&self) -> &str {
        FETCH_TOOL_DESCRIPTION
    }

    fn description(&self) -> String {
        catalog::builtin_doc(FETCH_TOOL_DESCRIPTION)
            .map(|doc| doc.render())
            .unwrap_or_default()
    }

    async fn handle(
        &self,
        _cx: &ToolContext,
        block: &ToolUse,
        callbacks: &ToolCallbacks,
    ) -> Result<(), ToolError> {
        if block.partial {
            return Ok(());
        }
        let tool_name = required_param(block, "tool_name")?;
        let page = optional_u64(block, "page")?;
        let text = self.lookup(tool_name, page)?;
        callbacks.push_result(text);
        Ok(())
    }
}
