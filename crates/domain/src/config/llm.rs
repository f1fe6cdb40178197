use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the model behind the agent runtime.
///
/// Only one provider is active per process; every runtime rebuild reuses
/// these settings and only varies the reasoning budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Output token ceiling sent with every request.
    #[serde(default = "d_64000")]
    pub max_tokens: u32,
    /// Read timeout for a single streamed model call.
    #[serde(default = "d_600000")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            base_url: d_base_url(),
            model: d_model(),
            auth: AuthConfig::default(),
            max_tokens: 64_000,
            timeout_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default = "d_key_env")]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env: d_key_env(),
            key: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn d_key_env() -> Option<String> {
    Some("ANTHROPIC_API_KEY".into())
}
fn d_64000() -> u32 {
    64_000
}
fn d_600000() -> u64 {
    600_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_config_defaults() {
        let cfg: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.kind, ProviderKind::Anthropic);
        assert_eq!(cfg.max_tokens, 64_000);
        assert_eq!(cfg.auth.env.as_deref(), Some("ANTHROPIC_API_KEY"));
        assert!(cfg.auth.key.is_none());
    }

    #[test]
    fn llm_config_parses_overrides() {
        let toml_str = r#"
            base_url = "http://localhost:9999/"
            model = "claude-opus-4"
            max_tokens = 32000

            [auth]
            env = "MY_KEY"
        "#;
        let cfg: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.base_url, "http://localhost:9999/");
        assert_eq!(cfg.model, "claude-opus-4");
        assert_eq!(cfg.max_tokens, 32_000);
        assert_eq!(cfg.auth.env.as_deref(), Some("MY_KEY"));
    }
}
