//! Ordered tool registry.
//!
//! Registration order is the order tools are offered to the model and the
//! order `resolve` falls back to when a preference list matches nothing.

use std::sync::Arc;

use ts_domain::tool::Tool;

use crate::threats::{CatalogAction, CatalogTool};

/// Outcome of resolving a tool preference list against the registry.
#[derive(Clone)]
pub struct Resolution {
    pub tools: Vec<Arc<dyn Tool>>,
    /// Requested names that matched no registered tool.
    pub unknown: Vec<String>,
    /// True when the full registry was returned because nothing matched.
    pub fell_back: bool,
}

impl Resolution {
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("tools", &self.names())
            .field("unknown", &self.unknown)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three threat-catalog tools.
    pub fn with_catalog_tools() -> Self {
        let mut registry = Self::new();
        for action in CatalogAction::ALL {
            registry.register(Arc::new(CatalogTool::new(action)));
        }
        registry
    }

    /// Append a tool. A tool whose name is already registered is ignored.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if self.get(tool.name()).is_some() {
            tracing::warn!(tool = %tool.name(), "duplicate tool registration ignored");
            return;
        }
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve requested tool names to registered tools.
    ///
    /// `None` selects every tool. Each name matches exactly first, then
    /// case-insensitively. Unknown names are logged and skipped; when no
    /// name matches, the full registry is returned. Duplicates keep their
    /// first position.
    pub fn resolve(&self, preferences: Option<&[String]>) -> Resolution {
        let Some(preferences) = preferences else {
            return Resolution {
                tools: self.all(),
                unknown: Vec::new(),
                fell_back: false,
            };
        };

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut unknown = Vec::new();

        for requested in preferences {
            let found = self.get(requested).or_else(|| {
                self.tools
                    .iter()
                    .find(|t| t.name().eq_ignore_ascii_case(requested))
            });
            match found {
                Some(tool) => {
                    if !tools.iter().any(|t| Arc::ptr_eq(t, tool)) {
                        tools.push(Arc::clone(tool));
                    }
                }
                None => unknown.push(requested.clone()),
            }
        }

        if !unknown.is_empty() {
            tracing::warn!(
                unknown = ?unknown,
                available = ?self.names(),
                "ignoring unknown tool preferences"
            );
        }

        let fell_back = tools.is_empty();
        if fell_back {
            tracing::info!("no requested tool matched; using every registered tool");
            tools = self.all();
        }

        Resolution {
            tools,
            unknown,
            fell_back,
        }
    }
}

/// Display name for a tool id: `_`/`-` become spaces, first letter upper.
pub fn friendly_name(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
