//! Name to handler routing, built once at startup.
//!
//! Conventional tools and every family leaf (`debug_launch`, `lsp_rename`, ...)
//! land in one lookup table. A name carrying a family prefix but naming no
//! known operation still routes to the family so its validator can reject it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::logging;

use super::catalog::{FETCH_TOOL_DESCRIPTION, builtin_doc};
use super::fetch_description::{DEFAULT_PAGE_SIZE, FetchToolDescriptionTool, ToolCatalog};
use super::family::ToolFamily;
use super::spec::ToolHandler;

/// Where a tool name is dispatched.
#[derive(Clone)]
pub enum Route {
    Tool(Arc<dyn ToolHandler>),
    Family {
        family: Arc<ToolFamily>,
        operation: String,
    },
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Tool(handler) => f.debug_tuple("Tool").field(&handler.name()).finish(),
            Route::Family { family, operation } => f
                .debug_struct("Family")
                .field("family", &family.name())
                .field("operation", operation)
                .finish(),
        }
    }
}

/// Immutable dispatch table.
#[derive(Clone)]
pub struct ToolRegistry {
    routes: HashMap<String, Route>,
    families: Vec<Arc<ToolFamily>>,
    catalog: Arc<ToolCatalog>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.routes.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("families", &self.families.len())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Route for `name`, falling back to a family prefix match.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Route> {
        if let Some(route) = self.routes.get(name) {
            return Some(route.clone());
        }
        self.families.iter().find_map(|family| {
            family.operation_of(name).map(|operation| Route::Family {
                family: Arc::clone(family),
                operation: operation.to_string(),
            })
        })
    }

    /// Name under which usage of `name` is aggregated: the family for leaves.
    #[must_use]
    pub fn usage_name(&self, name: &str) -> String {
        match self.resolve(name) {
            Some(Route::Family { family, .. }) => family.name().to_string(),
            _ => name.to_string(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Number of model-facing tool names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Sorted model-facing tool names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn families(&self) -> &[Arc<ToolFamily>] {
        &self.families
    }

    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Full documentation for a tool name.
    #[must_use]
    pub fn doc_for(&self, name: &str) -> Option<&str> {
        self.catalog.get(name).map(|entry| entry.doc.as_str())
    }
}

/// Collects handlers and families, then freezes them into a [`ToolRegistry`].
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn ToolHandler>>,
    families: Vec<ToolFamily>,
    page_size: usize,
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            families: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Register a handler. A later registration with the same name wins.
    #[must_use]
    pub fn register(self, handler: impl ToolHandler + 'static) -> Self {
        self.register_shared(Arc::new(handler))
    }

    #[must_use]
    pub fn register_shared(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(handler);
        self
    }

    #[must_use]
    pub fn register_family(mut self, family: ToolFamily) -> Self {
        self.families.push(family);
        self
    }

    /// Page size of the `fetch_tool_description` listing.
    #[must_use]
    pub fn tool_list_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Freeze the table. `fetch_tool_description` is always added and
    /// documents every other entry.
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        let mut routes: HashMap<String, Route> = HashMap::new();
        let mut catalog = ToolCatalog::default();

        for handler in self.tools {
            let name = handler.name().to_string();
            if name == FETCH_TOOL_DESCRIPTION {
                logging::warn(format!(
                    "Ignoring custom {FETCH_TOOL_DESCRIPTION} handler; the built-in one is always used"
                ));
                continue;
            }
            if routes.contains_key(&name) {
                logging::warn(format!("Tool {name} registered twice; keeping the later handler"));
            }
            catalog.insert(name.clone(), handler.description());
            routes.insert(name, Route::Tool(handler));
        }

        let families: Vec<Arc<ToolFamily>> = self.families.into_iter().map(Arc::new).collect();
        for family in &families {
            for spec in family.operations() {
                let leaf = format!("{}{}", family.prefix(), spec.name);
                if routes.contains_key(&leaf) {
                    logging::warn(format!(
                        "Family leaf {leaf} shadows a registered tool of the same name"
                    ));
                }
                if let Some(doc) = family.leaf_doc(spec.name) {
                    catalog.insert(leaf.clone(), doc);
                }
                routes.insert(
                    leaf,
                    Route::Family {
                        family: Arc::clone(family),
                        operation: spec.name.to_string(),
                    },
                );
            }
        }

        if let Some(doc) = builtin_doc(FETCH_TOOL_DESCRIPTION) {
            catalog.insert(FETCH_TOOL_DESCRIPTION, doc.render());
        }
        let catalog = Arc::new(catalog);
        let fetch = FetchToolDescriptionTool::new(Arc::clone(&catalog), self.page_size);
        routes.insert(FETCH_TOOL_DESCRIPTION.to_string(), Route::Tool(Arc::new(fetch)));

        tracing::debug!(
            tools = routes.len(),
            families = families.len(),
            "tool registry built"
        );
        ToolRegistry {
            routes,
            families,
            catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::ToolUse;
    use crate::core::callbacks::ToolCallbacks;
    use crate::tools::families::{debug_family, lsp_family};
    use crate::tools::spec::{ToolContext, ToolError};
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl ToolHandler for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> String {
            format!("## {}\nDescription: noop", self.0)
        }

        async fn handle(
            &self,
            _cx: &ToolContext,
            _block: &ToolUse,
            _callbacks: &ToolCallbacks,
        ) -> Result<(), ToolError> {
            Ok(())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register(Noop("read_file"))
            .register_family(debug_family(Arc::new(Noop("debug"))))
            .register_family(lsp_family(Arc::new(Noop("lsp"))))
            .build()
    }

    #[test]
    fn leaves_resolve_through_the_table() {
        let registry = registry();
        match registry.resolve("debug_set_breakpoint") {
            Some(Route::Family { family, operation }) => {
                assert_eq!(family.name(), "debug");
                assert_eq!(operation, "set_breakpoint");
            }
            other => panic!("unexpected route {other:?}"),
        }
        assert!(matches!(registry.resolve("read_file"), Some(Route::Tool(_))));
        assert!(registry.resolve("write_to_file").is_none());
    }

    #[test]
    fn unknown_operation_with_family_prefix_still_routes() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("lsp_teleport"),
            Some(Route::Family { ref operation, .. }) if operation == "teleport"
        ));
        assert!(registry.resolve("lsp_").is_none());
    }

    #[test]
    fn usage_aggregates_family_leaves() {
        let registry = registry();
        assert_eq!(registry.usage_name("debug_launch"), "debug");
        assert_eq!(registry.usage_name("read_file"), "read_file");
    }

    #[test]
    fn catalog_covers_every_route() {
        let registry = registry();
        assert_eq!(registry.catalog().len(), registry.len());
        assert!(registry.contains(FETCH_TOOL_DESCRIPTION));
        assert!(registry.doc_for("lsp_rename").unwrap().contains("newName"));
    }
}
