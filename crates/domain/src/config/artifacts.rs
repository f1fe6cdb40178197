use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Artifact storage (architecture diagrams)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Where artifact references are resolved against.
    #[serde(default)]
    pub source: ArtifactSource,
    /// Also write every fetched payload into a process-private temp
    /// directory. The directory is removed on graceful shutdown.
    #[serde(default)]
    pub spill_to_disk: bool,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            source: ArtifactSource::default(),
            spill_to_disk: false,
            timeout_ms: 30_000,
        }
    }
}

/// Backing store for artifact references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Object store reachable over HTTP; the reference is appended to
    /// `base_url` as the object key.
    Http {
        base_url: String,
        /// Env var holding a bearer token for the store, if it needs one.
        #[serde(default)]
        token_env: Option<String>,
    },
    /// Local directory; references are relative paths beneath `root`.
    Filesystem { root: PathBuf },
}

impl Default for ArtifactSource {
    fn default() -> Self {
        ArtifactSource::Filesystem {
            root: PathBuf::from("./data/artifacts"),
        }
    }
}

fn d_30000() -> u64 {
    30_000
}
