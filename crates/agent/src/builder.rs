use std::sync::Arc;

use ts_domain::config::LlmConfig;
use ts_domain::error::{Error, Result};
use ts_domain::runtime::{Runtime, RuntimeBuilder, RuntimeSpec};
use ts_providers::{AnthropicModel, ChatModel, ModelSettings};

use crate::checkpoint::CheckpointStore;
use crate::react::ReactAgent;

/// Builds [`ReactAgent`]s that share one model client and one checkpoint
/// store, so sessions survive every rebuild.
pub struct AgentBuilder {
    model: Arc<dyn ChatModel>,
    llm: LlmConfig,
    checkpoints: Arc<CheckpointStore>,
}

impl AgentBuilder {
    pub fn new(model: Arc<dyn ChatModel>, llm: LlmConfig) -> Self {
        Self {
            model,
            llm,
            checkpoints: Arc::new(CheckpointStore::new()),
        }
    }

    /// Builder over the configured provider.
    ///
    /// Creates a blocking HTTP client; call it outside the async executor.
    pub fn from_config(llm: &LlmConfig) -> Result<Self> {
        let model = AnthropicModel::from_config(llm)?;
        tracing::info!(
            provider = %model.provider_id(),
            base_url = %llm.base_url,
            "model client ready"
        );
        Ok(Self::new(Arc::new(model), llm.clone()))
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointStore> {
        &self.checkpoints
    }
}

#[async_trait::async_trait]
impl RuntimeBuilder for AgentBuilder {
    async fn build(&self, spec: RuntimeSpec) -> Result<Arc<dyn Runtime>> {
        if spec.tools.is_empty() {
            return Err(Error::Build("an agent needs at least one tool".into()));
        }
        let settings = ModelSettings::for_tier(&self.llm, spec.reasoning_tier);
        tracing::debug!(
            tier = %spec.reasoning_tier,
            thinking_budget = ?settings.thinking.map(|t| t.budget_tokens),
            tools = spec.tools.len(),
            "building agent"
        );
        let agent = ReactAgent::new(
            Arc::clone(&self.model),
            settings,
            spec.system_prompt,
            spec.tools,
            Arc::clone(&self.checkpoints),
        );
        Ok(Arc::new(agent))
    }
}
