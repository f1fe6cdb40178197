//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use ts_agent::AgentBuilder;
use ts_domain::config::{Config, ConfigSeverity};
use ts_domain::runtime::RuntimeBuilder;
use ts_tools::ToolRegistry;

use crate::runtime::artifacts::{fetcher_from_config, ArtifactCache, ArtifactFetch};
use crate::runtime::cache::RuntimeCache;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired,
/// warmed-up [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Model client + runtime builder ───────────────────────────────
    // The provider uses a blocking HTTP client, which must be created off
    // the async executor.
    let llm = config.llm.clone();
    let builder = tokio::task::spawn_blocking(move || AgentBuilder::from_config(&llm))
        .await
        .context("joining model client setup")?
        .context("initializing model client")?;
    tracing::info!(model = %config.llm.model, "runtime builder ready");

    // ── Artifact source ──────────────────────────────────────────────
    let fetcher = fetcher_from_config(&config.artifacts).context("initializing artifact source")?;
    tracing::info!(source = ?config.artifacts.source, "artifact source ready");

    assemble(config, Arc::new(builder), fetcher).await
}

/// Wire the caches and streaming services around the given collaborators
/// and warm the runtime cache with the default facets. A failed warm-up is
/// fatal.
pub async fn assemble(
    config: Arc<Config>,
    builder: Arc<dyn RuntimeBuilder>,
    fetcher: Arc<dyn ArtifactFetch>,
) -> anyhow::Result<AppState> {
    // ── Tool registry ────────────────────────────────────────────────
    let registry = Arc::new(ToolRegistry::with_catalog_tools());
    tracing::info!(tools = ?registry.names(), "tool registry ready");

    // ── Artifact cache ───────────────────────────────────────────────
    let mut artifacts = ArtifactCache::new(fetcher);
    if config.artifacts.spill_to_disk {
        artifacts = artifacts
            .with_spill_dir()
            .context("creating artifact spill directory")?;
    }
    let artifacts = Arc::new(artifacts);
    tracing::info!(spill = ?artifacts.spill_path(), "artifact cache ready");

    // ── Runtime cache + streaming services ───────────────────────────
    let runtimes = Arc::new(RuntimeCache::new(builder, registry, artifacts));
    let state = AppState::new(config, runtimes);
    tracing::info!(
        bridge_workers = state.config.agent.bridge_workers,
        recursion_limit = state.config.agent.recursion_limit,
        "streaming bridge ready"
    );

    // ── Warm-up ──────────────────────────────────────────────────────
    let warm = state
        .runtimes
        .resolve(&state.default_facets())
        .await
        .context("warming runtime cache")?;
    tracing::info!(
        tools = ?warm.tool_names,
        tier = %warm.facets.reasoning_tier,
        "runtime cache warmed"
    );

    Ok(state)
}

/// Best-effort release of process-lifetime resources.
pub fn shutdown(state: &AppState) {
    state.runtimes.artifacts().shutdown();
}
