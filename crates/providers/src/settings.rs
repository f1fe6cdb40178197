use ts_domain::config::LlmConfig;
use ts_domain::facets::ReasoningTier;

/// Beta flag that lets the model interleave reasoning between tool calls.
pub const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

/// Extended-reasoning switch attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingSettings {
    pub budget_tokens: u32,
    pub interleaved: bool,
}

/// Model configuration a runtime is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
    /// `None` when the tier disables extended reasoning.
    pub thinking: Option<ThinkingSettings>,
}

impl ModelSettings {
    /// Settings for `tier` on top of the configured model.
    pub fn for_tier(llm: &LlmConfig, tier: ReasoningTier) -> Self {
        let thinking = tier.budget_tokens().map(|budget_tokens| ThinkingSettings {
            budget_tokens,
            interleaved: true,
        });
        Self {
            model: llm.model.clone(),
            max_tokens: llm.max_tokens,
            thinking,
        }
    }
}
