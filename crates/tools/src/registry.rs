//! The tool registry — a static mapping from tool name to transport endpoint.
//!
//! Read-only after initialization. An unknown tool name at dispatch time is
//! a programming error, not a runtime condition to retry.

use std::collections::HashMap;

/// The hotel search tool: constraints in, ranked offers out.
pub const SEARCH_OFFERS: &str = "search_offers";
/// The price/availability re-check tool for a single selected offer.
pub const CHECK_OFFER: &str = "check_offer";

/// One registered tool endpoint.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    /// Path under the tools base URL (e.g. "/tools/search_offers").
    pub path: String,
    pub description: String,
}

/// Static name → endpoint mapping for all invocable tools.
pub struct ToolRegistry {
    base_url: String,
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.name.clone(), spec);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// The physical endpoint for a registered tool.
    pub fn url_for(&self, spec: &ToolSpec) -> String {
        format!("{}{}", self.base_url, spec.path)
    }

    /// All registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

/// The registry with the standard booking tools.
pub fn default_registry(base_url: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new(base_url);
    registry.register(ToolSpec {
        name: SEARCH_OFFERS.into(),
        path: "/tools/search_offers".into(),
        description: "Search bookable offers matching the merged constraints".into(),
    });
    registry.register(ToolSpec {
        name: CHECK_OFFER.into(),
        path: "/tools/check_offer".into(),
        description: "Re-verify price and availability of one offer".into(),
    });
    registry
}
