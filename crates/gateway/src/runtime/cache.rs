//! Single-slot runtime cache.
//!
//! Holds at most one built runtime together with the fingerprint and the
//! facet values that produced it. A request whose fingerprint matches is
//! served by the cached instance; any difference triggers a rebuild that
//! replaces the slot. Failed builds never touch the slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ts_domain::artifact::Artifact;
use ts_domain::error::Result;
use ts_domain::facets::Facets;
use ts_domain::runtime::{Runtime, RuntimeBuilder, RuntimeSpec};
use ts_tools::ToolRegistry;

use super::artifacts::ArtifactCache;
use super::fingerprint::Fingerprint;
use super::prompt;

/// A built runtime and everything it was built from.
pub struct CachedRuntime {
    pub runtime: Arc<dyn Runtime>,
    pub fingerprint: Fingerprint,
    /// Facets exactly as requested.
    pub facets: Facets,
    /// Tool names after registry resolution.
    pub tool_names: Vec<String>,
    /// Artifact resolved for `facets.artifact_reference`, when it could be
    /// fetched.
    pub artifact: Option<Arc<Artifact>>,
    pub built_at: DateTime<Utc>,
}

impl std::fmt::Debug for CachedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRuntime")
            .field("fingerprint", &self.fingerprint)
            .field("tool_names", &self.tool_names)
            .field("artifact", &self.artifact.as_ref().map(|a| &a.media_type))
            .field("built_at", &self.built_at)
            .finish()
    }
}

pub struct RuntimeCache {
    builder: Arc<dyn RuntimeBuilder>,
    registry: Arc<ToolRegistry>,
    artifacts: Arc<ArtifactCache>,
    slot: RwLock<Option<Arc<CachedRuntime>>>,
    builds: AtomicUsize,
}

impl RuntimeCache {
    pub fn new(
        builder: Arc<dyn RuntimeBuilder>,
        registry: Arc<ToolRegistry>,
        artifacts: Arc<ArtifactCache>,
    ) -> Self {
        Self {
            builder,
            registry,
            artifacts,
            slot: RwLock::new(None),
            builds: AtomicUsize::new(0),
        }
    }

    /// The runtime for `facets`, reusing the cached one when every facet
    /// token matches.
    pub async fn resolve(&self, facets: &Facets) -> Result<Arc<CachedRuntime>> {
        let resolution = self.registry.resolve(facets.tool_selection.as_deref());
        let tool_names = resolution.names();
        let fingerprint = Fingerprint::compute(
            &tool_names,
            facets.context.as_ref(),
            facets.artifact_reference.as_deref(),
            facets.reasoning_tier,
        );

        match self.current() {
            Some(cached) => {
                let changed = cached.fingerprint.changed_facets(&fingerprint);
                if changed.is_empty() {
                    tracing::debug!(tools = ?cached.tool_names, "reusing cached runtime");
                    return Ok(cached);
                }
                tracing::info!(
                    changed = ?changed,
                    tools = ?tool_names,
                    tier = %facets.reasoning_tier,
                    "facets changed; rebuilding runtime"
                );
            }
            None => tracing::info!(
                tools = ?tool_names,
                tier = %facets.reasoning_tier,
                "building runtime"
            ),
        }

        let artifact = match facets.artifact_reference.as_deref() {
            Some(reference) => self.artifacts.resolve(reference).await,
            None => None,
        };
        let system_prompt = prompt::render(facets.context.as_ref())?;

        let spec = RuntimeSpec {
            tools: resolution.tools,
            system_prompt,
            reasoning_tier: facets.reasoning_tier,
        };
        let runtime = self.builder.build(spec).await.map_err(|e| {
            tracing::error!(error = %e, "runtime build failed; keeping previous runtime");
            e
        })?;
        self.builds.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::new(CachedRuntime {
            runtime,
            fingerprint,
            facets: facets.clone(),
            tool_names,
            artifact,
            built_at: Utc::now(),
        });
        *self.slot.write() = Some(Arc::clone(&entry));
        tracing::info!("runtime ready");
        Ok(entry)
    }

    /// The cached runtime, building one from `fallback` when the slot is
    /// empty.
    pub async fn current_or_build(&self, fallback: &Facets) -> Result<Arc<CachedRuntime>> {
        match self.current() {
            Some(cached) => Ok(cached),
            None => self.resolve(fallback).await,
        }
    }

    /// Snapshot of the slot. May be replaced at any moment.
    pub fn current(&self) -> Option<Arc<CachedRuntime>> {
        self.slot.read().clone()
    }

    /// Successful builds since startup.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};
    use ts_domain::error::Error;
    use ts_domain::facets::ReasoningTier;
    use ts_domain::runtime::{EventIter, HistorySnapshot, RunInput, RunOptions};

    use crate::runtime::artifacts::{ArtifactFetch, FetchError, FetchedObject};

    struct NullRuntime;

    impl Runtime for NullRuntime {
        fn stream(&self, _: &str, _: RunInput, _: RunOptions) -> Result<EventIter> {
            Ok(Box::new(std::iter::empty()))
        }

        fn history(&self, _: &str, _: usize) -> Vec<HistorySnapshot> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct RecordingBuilder {
        specs: Mutex<Vec<RuntimeSpec>>,
        fail: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl RuntimeBuilder for RecordingBuilder {
        async fn build(&self, spec: RuntimeSpec) -> Result<Arc<dyn Runtime>> {
            if *self.fail.lock() {
                return Err(Error::Build("model endpoint unreachable".into()));
            }
            self.specs.lock().push(spec);
            Ok(Arc::new(NullRuntime))
        }
    }

    struct PngFetcher;

    #[async_trait::async_trait]
    impl ArtifactFetch for PngFetcher {
        async fn fetch(&self, _: &str) -> std::result::Result<FetchedObject, FetchError> {
            Ok(FetchedObject {
                bytes: vec![0x89, 0x50],
                content_type: None,
            })
        }
    }

    fn setup() -> (Arc<RecordingBuilder>, RuntimeCache) {
        let builder = Arc::new(RecordingBuilder::default());
        let cache = RuntimeCache::new(
            builder.clone(),
            Arc::new(ToolRegistry::with_catalog_tools()),
            Arc::new(ArtifactCache::new(Arc::new(PngFetcher))),
        );
        (builder, cache)
    }

    fn ctx(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[tokio::test]
    async fn identical_facets_reuse_the_instance() {
        let (builder, cache) = setup();
        let facets = Facets {
            tool_selection: Some(vec!["add_threats".into()]),
            context: ctx(json!({ "app": "payments" })),
            artifact_reference: Some("arch.png".into()),
            reasoning_tier: ReasoningTier::new(2),
        };
        let a = cache.resolve(&facets).await.unwrap();
        let b = cache.resolve(&facets.clone()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.runtime, &b.runtime));
        assert_eq!(builder.specs.lock().len(), 1);
        assert_eq!(cache.artifacts().fetch_count(), 1);
    }

    #[tokio::test]
    async fn each_facet_change_rebuilds_once() {
        let (builder, cache) = setup();
        let base = Facets::defaults(ReasoningTier::new(1));
        cache.resolve(&base).await.unwrap();

        let variants = [
            Facets {
                tool_selection: Some(vec!["delete_threats".into()]),
                ..base.clone()
            },
            Facets {
                context: ctx(json!({ "app": "billing" })),
                ..base.clone()
            },
            Facets {
                artifact_reference: Some("d.png".into()),
                ..base.clone()
            },
            Facets {
                reasoning_tier: ReasoningTier::new(3),
                ..base.clone()
            },
        ];

        for (i, variant) in variants.iter().enumerate() {
            // Reset to base, then switch to the variant twice.
            cache.resolve(&base).await.unwrap();
            let before = cache.build_count();
            let entry = cache.resolve(variant).await.unwrap();
            cache.resolve(variant).await.unwrap();
            assert_eq!(cache.build_count(), before + 1, "variant {i}");
            assert_eq!(&entry.facets, variant);
        }
        assert_eq!(builder.specs.lock().len(), cache.build_count());
    }

    #[tokio::test]
    async fn case_variant_preference_resolves_to_registered_tool() {
        let (builder, cache) = setup();
        let facets = Facets {
            tool_selection: Some(vec!["ADD_THREATS".into()]),
            ..Facets::defaults(ReasoningTier::default())
        };
        let entry = cache.resolve(&facets).await.unwrap();
        assert_eq!(entry.tool_names, vec!["add_threats"]);
        let specs = builder.specs.lock();
        assert_eq!(specs[0].tools.len(), 1);
        assert_eq!(specs[0].tools[0].name(), "add_threats");
    }

    #[tokio::test]
    async fn unknown_preference_falls_back_to_every_tool() {
        let (_, cache) = setup();
        let facets = Facets {
            tool_selection: Some(vec!["not_a_real_tool".into()]),
            ..Facets::defaults(ReasoningTier::default())
        };
        let entry = cache.resolve(&facets).await.unwrap();
        assert_eq!(entry.tool_names.len(), cache.registry().len());
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_runtime() {
        let (builder, cache) = setup();
        let base = Facets::defaults(ReasoningTier::new(1));
        let first = cache.resolve(&base).await.unwrap();

        *builder.fail.lock() = true;
        let changed = Facets {
            reasoning_tier: ReasoningTier::new(0),
            ..base.clone()
        };
        assert!(matches!(cache.resolve(&changed).await, Err(Error::Build(_))));
        let current = cache.current().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.facets.reasoning_tier, ReasoningTier::new(1));

        *builder.fail.lock() = false;
        let rebuilt = cache.resolve(&changed).await.unwrap();
        assert_eq!(rebuilt.facets.reasoning_tier, ReasoningTier::new(0));
        assert_eq!(cache.build_count(), 2);
    }

    #[tokio::test]
    async fn context_reaches_system_prompt() {
        let (builder, cache) = setup();
        let facets = Facets {
            context: ctx(json!({ "system": "checkout-service" })),
            ..Facets::defaults(ReasoningTier::default())
        };
        cache.resolve(&facets).await.unwrap();
        assert!(builder.specs.lock()[0]
            .system_prompt
            .contains("checkout-service"));
    }

    #[tokio::test]
    async fn current_or_build_fills_an_empty_slot_only() {
        let (_, cache) = setup();
        let fallback = Facets::defaults(ReasoningTier::new(1));
        let first = cache.current_or_build(&fallback).await.unwrap();
        let other = Facets::defaults(ReasoningTier::new(3));
        let second = cache.current_or_build(&other).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.build_count(), 1);
    }

    #[tokio::test]
    async fn reuse_returns_previously_resolved_artifact() {
        let (_, cache) = setup();
        let facets = Facets {
            artifact_reference: Some("arch.png".into()),
            ..Facets::defaults(ReasoningTier::default())
        };
        let first = cache.resolve(&facets).await.unwrap();
        let again = cache.resolve(&facets).await.unwrap();
        let a = first.artifact.as_ref().unwrap();
        let b = again.artifact.as_ref().unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(a.media_type, "image/png");
    }
}
