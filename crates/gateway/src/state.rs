use std::sync::Arc;

use chrono::{DateTime, Utc};

use ts_domain::config::Config;
use ts_domain::facets::{Facets, ReasoningTier};

use crate::runtime::bridge::StreamBridge;
use crate::runtime::cache::RuntimeCache;
use crate::runtime::cancel::CancelMap;
use crate::runtime::gate::AdmissionGate;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, the runtime cache (which owns the tool
///   registry and the artifact cache)
/// - **Streaming**: admission gate, event bridge, cancellation tokens
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub runtimes: Arc<RuntimeCache>,

    // ── Streaming ─────────────────────────────────────────────────────
    pub gate: Arc<AdmissionGate>,
    pub bridge: Arc<StreamBridge>,
    pub cancels: Arc<CancelMap>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<Config>, runtimes: Arc<RuntimeCache>) -> Self {
        let bridge = Arc::new(StreamBridge::new(config.agent.bridge_workers));
        Self {
            config,
            runtimes,
            gate: Arc::new(AdmissionGate::new()),
            bridge,
            cancels: Arc::new(CancelMap::new()),
            started_at: Utc::now(),
        }
    }

    pub fn default_tier(&self) -> ReasoningTier {
        ReasoningTier::new(self.config.agent.default_reasoning_tier)
    }

    /// Tier of the cached runtime, or the configured default.
    pub fn current_tier(&self) -> ReasoningTier {
        self.runtimes
            .current()
            .map(|c| c.facets.reasoning_tier)
            .unwrap_or_else(|| self.default_tier())
    }

    /// All tools, no context, no artifact, default tier.
    pub fn default_facets(&self) -> Facets {
        Facets::defaults(self.default_tier())
    }
}
