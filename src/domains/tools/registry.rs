//! Tool Registry - category bookkeeping for registered tools.
//!
//! Groups tool names under logical categories (contacts, opportunities, ...)
//! for listing and documentation. Dispatch never goes through the registry;
//! it only mirrors what was registered on the [`ToolSurface`](super::ToolSurface).

use std::collections::HashMap;

use super::surface::ToolHandler;

/// One registry entry.
#[derive(Clone)]
pub struct RegistryEntry {
    pub category: String,
    pub handler: ToolHandler,
}

/// Mapping of tool name to category, plus the reverse index.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, RegistryEntry>,
    categories: Vec<(String, Vec<String>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tool_name` under `category`.
    ///
    /// Re-registering a name moves it to the new category; the last write wins.
    pub fn register_tool(&mut self, category: &str, tool_name: &str, handler: ToolHandler) {
        if let Some(previous) = self.tools.get(tool_name) {
            let previous = previous.category.clone();
            if let Some((_, names)) = self.categories.iter_mut().find(|(c, _)| *c == previous) {
                names.retain(|n| n != tool_name);
            }
        }

        let position = self.categories.iter().position(|(c, _)| c == category);
        match position {
            Some(i) => self.categories[i].1.push(tool_name.to_string()),
            None => self
                .categories
                .push((category.to_string(), vec![tool_name.to_string()])),
        }

        self.tools.insert(
            tool_name.to_string(),
            RegistryEntry {
                category: category.to_string(),
                handler,
            },
        );
    }

    /// Tool names in `category`, in registration order.
    pub fn tools_by_category(&self, category: &str) -> Vec<&str> {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, names)| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All categories, in first-registration order.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(|(c, _)| c.as_str()).collect()
    }

    pub fn get(&self, tool_name: &str) -> Option<&RegistryEntry> {
        self.tools.get(tool_name)
    }

    /// Category of `tool_name`, if registered.
    pub fn category_of(&self, tool_name: &str) -> Option<&str> {
        self.tools.get(tool_name).map(|e| e.category.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ToolError;
    use futures::FutureExt;
    use rmcp::model::JsonObject;
    use std::sync::Arc;

    fn noop() -> ToolHandler {
        Arc::new(|_: JsonObject| async { Ok::<_, ToolError>(serde_json::Value::Null) }.boxed())
    }

    #[test]
    fn test_registry_categories() {
        let mut registry = ToolRegistry::new();
        registry.register_tool("posts", "list_posts", noop());
        registry.register_tool("posts", "search_posts", noop());
        registry.register_tool("aggregation", "get_user_stats", noop());

        assert_eq!(registry.categories(), vec!["posts", "aggregation"]);
        assert_eq!(
            registry.tools_by_category("posts"),
            vec!["list_posts", "search_posts"]
        );
        assert_eq!(registry.category_of("get_user_stats"), Some("aggregation"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_registry_unknown_category_is_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.tools_by_category("missing").is_empty());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_registry_last_write_wins() {
        let mut registry = ToolRegistry::new();
        registry.register_tool("posts", "list_posts", noop());
        registry.register_tool("archive", "list_posts", noop());

        assert_eq!(registry.category_of("list_posts"), Some("archive"));
        assert!(registry.tools_by_category("posts").is_empty());
        assert_eq!(registry.tools_by_category("archive"), vec!["list_posts"]);
        assert_eq!(registry.len(), 1);
    }
}
