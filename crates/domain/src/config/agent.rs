use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard ceiling on model/tool steps inside a single run.
    #[serde(default = "d_50")]
    pub recursion_limit: usize,
    /// Blocking workers available to streaming bridges.
    #[serde(default = "d_2")]
    pub bridge_workers: usize,
    /// Reasoning tier used when neither the request nor the cache has one.
    #[serde(default = "d_tier")]
    pub default_reasoning_tier: u8,
    /// Number of checkpoint snapshots returned by a history readout.
    #[serde(default = "d_depth")]
    pub history_depth: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 50,
            bridge_workers: 2,
            default_reasoning_tier: 1,
            history_depth: 1,
        }
    }
}

fn d_50() -> usize {
    50
}
fn d_2() -> usize {
    2
}
fn d_tier() -> u8 {
    1
}
fn d_depth() -> usize {
    1
}
