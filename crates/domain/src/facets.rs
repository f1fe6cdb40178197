//! Configuration facets: the inputs that decide a runtime's identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reasoning budget tiers 1..=3; anything else positive uses tier 1's budget.
const TIER_BUDGETS: [u32; 3] = [8_000, 16_000, 31_999];

/// Reasoning-token budget tier.
///
/// Tier `0` disables extended reasoning. The raw level is preserved as-is
/// (it participates in runtime identity), only the budget lookup clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasoningTier(u8);

impl ReasoningTier {
    pub const DISABLED: Self = Self(0);

    pub fn new(level: u8) -> Self {
        Self(level)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn is_enabled(self) -> bool {
        self.0 > 0
    }

    /// Reasoning-token budget for this tier, `None` when disabled.
    pub fn budget_tokens(self) -> Option<u32> {
        match self.0 {
            0 => None,
            n @ 1..=3 => Some(TIER_BUDGETS[usize::from(n) - 1]),
            _ => Some(TIER_BUDGETS[0]),
        }
    }
}

impl Default for ReasoningTier {
    fn default() -> Self {
        Self(1)
    }
}

impl std::fmt::Display for ReasoningTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four independent inputs a runtime is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    /// Requested tool names; `None` means every registered tool.
    pub tool_selection: Option<Vec<String>>,
    /// Structured data injected into the system prompt.
    pub context: Option<Map<String, Value>>,
    /// Opaque path of a remote visual artifact.
    pub artifact_reference: Option<String>,
    pub reasoning_tier: ReasoningTier,
}

impl Facets {
    /// All tools, no context, no artifact.
    pub fn defaults(reasoning_tier: ReasoningTier) -> Self {
        Self {
            reasoning_tier,
            ..Self::default()
        }
    }

    /// True when `context` is absent or an empty mapping.
    pub fn context_is_empty(&self) -> bool {
        self.context.as_ref().map_or(true, Map::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_zero_disables_reasoning() {
        let tier = ReasoningTier::new(0);
        assert!(!tier.is_enabled());
        assert_eq!(tier.budget_tokens(), None);
    }

    #[test]
    fn known_tiers_map_to_budgets() {
        assert_eq!(ReasoningTier::new(1).budget_tokens(), Some(8_000));
        assert_eq!(ReasoningTier::new(2).budget_tokens(), Some(16_000));
        assert_eq!(ReasoningTier::new(3).budget_tokens(), Some(31_999));
    }

    #[test]
    fn out_of_range_tier_uses_tier_one_budget() {
        let tier = ReasoningTier::new(9);
        assert!(tier.is_enabled());
        assert_eq!(tier.level(), 9);
        assert_eq!(tier.budget_tokens(), Some(8_000));
    }

    #[test]
    fn empty_context_counts_as_absent() {
        let mut facets = Facets::defaults(ReasoningTier::default());
        assert!(facets.context_is_empty());
        facets.context = Some(Map::new());
        assert!(facets.context_is_empty());
        let mut ctx = Map::new();
        ctx.insert("title".into(), Value::String("payments".into()));
        facets.context = Some(ctx);
        assert!(!facets.context_is_empty());
    }
}
