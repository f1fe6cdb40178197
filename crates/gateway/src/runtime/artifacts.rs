//! Content-addressed cache of fetched visual artifacts.
//!
//! A reference is fetched at most once per process on success. Failed
//! fetches are never cached, so the next request retries. Stored entries
//! are immutable; a different reference string is a different key.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::{Mutex, RwLock};

use ts_domain::artifact::{Artifact, ArtifactEncoding};
use ts_domain::config::{ArtifactSource, ArtifactsConfig};
use ts_domain::error::{Error, Result};

use super::fingerprint::digest;

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fetch collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw object returned by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    /// Content type reported by the backing store, if any.
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("reference escapes the artifact root: {0}")]
    InvalidReference(String),
    #[error("transport: {0}")]
    Transport(String),
}

/// Retrieves the raw bytes behind an artifact reference.
#[async_trait::async_trait]
pub trait ArtifactFetch: Send + Sync {
    async fn fetch(&self, reference: &str) -> std::result::Result<FetchedObject, FetchError>;
}

/// Fetcher for the configured artifact source.
pub fn fetcher_from_config(cfg: &ArtifactsConfig) -> Result<Arc<dyn ArtifactFetch>> {
    match &cfg.source {
        ArtifactSource::Http {
            base_url,
            token_env,
        } => {
            let token = match token_env {
                Some(var) => Some(std::env::var(var).map_err(|_| {
                    Error::Config(format!("artifact token env var '{var}' is not set"))
                })?),
                None => None,
            };
            let fetcher = HttpArtifactFetcher::new(
                base_url.clone(),
                token,
                Duration::from_millis(cfg.timeout_ms),
            )?;
            Ok(Arc::new(fetcher))
        }
        ArtifactSource::Filesystem { root } => Ok(Arc::new(FsArtifactFetcher::new(root.clone()))),
    }
}

// ── HTTP object store ───────────────────────────────────────────────

pub struct HttpArtifactFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpArtifactFetcher {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    fn object_url(&self, reference: &str) -> String {
        format!("{}/{}", self.base_url, reference.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl ArtifactFetch for HttpArtifactFetcher {
    async fn fetch(&self, reference: &str) -> std::result::Result<FetchedObject, FetchError> {
        let mut req = self.client.get(self.object_url(reference));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(reference.to_owned()));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status}")));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(FetchedObject {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

// ── Local directory ─────────────────────────────────────────────────

pub struct FsArtifactFetcher {
    root: PathBuf,
}

impl FsArtifactFetcher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, reference: &str) -> std::result::Result<PathBuf, FetchError> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || reference.is_empty() {
            return Err(FetchError::InvalidReference(reference.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ArtifactFetch for FsArtifactFetcher {
    async fn fetch(&self, reference: &str) -> std::result::Result<FetchedObject, FetchError> {
        let path = self.object_path(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedObject {
                bytes,
                content_type: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(reference.to_owned()))
            }
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ArtifactCache {
    fetcher: Arc<dyn ArtifactFetch>,
    entries: RwLock<HashMap<String, Arc<Artifact>>>,
    /// Process-private directory holding spilled payloads, when enabled.
    spill: Mutex<Option<tempfile::TempDir>>,
    fetches: AtomicUsize,
}

impl ArtifactCache {
    pub fn new(fetcher: Arc<dyn ArtifactFetch>) -> Self {
        Self {
            fetcher,
            entries: RwLock::new(HashMap::new()),
            spill: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Also write every stored payload into a fresh temp directory.
    pub fn with_spill_dir(self) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("threatsentry-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "artifact spill directory created");
        *self.spill.lock() = Some(dir);
        Ok(self)
    }

    /// The encoded artifact for `reference`, or `None` when it cannot be
    /// fetched. Never fails the caller.
    pub async fn resolve(&self, reference: &str) -> Option<Arc<Artifact>> {
        let key = digest(reference);
        let hit = self.entries.read().get(&key).cloned();
        if let Some(hit) = hit {
            tracing::debug!(reference, "artifact cache hit");
            return Some(hit);
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let object = match self.fetcher.fetch(reference).await {
            Ok(object) if object.bytes.is_empty() => {
                tracing::warn!(reference, "artifact fetch returned an empty payload");
                return None;
            }
            Ok(object) => object,
            Err(e) => {
                tracing::warn!(reference, error = %e, "artifact fetch failed; continuing without it");
                return None;
            }
        };

        let media_type = media_type_for(reference, object.content_type.as_deref());
        let artifact = Artifact {
            encoding: ArtifactEncoding::Base64,
            data: STANDARD.encode(&object.bytes),
            media_type,
            size_bytes: object.bytes.len(),
        };
        self.spill_to_disk(&key, reference, &object.bytes).await;

        tracing::info!(
            reference,
            media_type = %artifact.media_type,
            size_bytes = artifact.size_bytes,
            "artifact cached"
        );
        let mut entries = self.entries.write();
        Some(Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(artifact))))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Calls made to the fetch collaborator so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn spill_path(&self) -> Option<PathBuf> {
        self.spill.lock().as_ref().map(|d| d.path().to_path_buf())
    }

    /// Remove spilled files. Failures are logged.
    pub fn shutdown(&self) {
        let Some(dir) = self.spill.lock().take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::info!(path = %path.display(), "artifact spill directory removed"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove artifact spill directory"
            ),
        }
    }

    async fn spill_to_disk(&self, key: &str, reference: &str, bytes: &[u8]) {
        let Some(dir) = self.spill_path() else {
            return;
        };
        let ext = Path::new(reference)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = dir.join(format!("{key}.{ext}"));
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            tracing::warn!(path = %path.display(), error = %e, "artifact spill failed");
        }
    }
}

/// Media type for a fetched object: an explicit `image/*` type wins, then
/// the reference's extension, then `image/jpeg`.
pub fn media_type_for(reference: &str, explicit: Option<&str>) -> String {
    if let Some(explicit) = explicit {
        let essence = explicit
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.starts_with("image/") {
            return essence;
        }
    }

    let ext = Path::new(reference)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let inferred = match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => DEFAULT_MEDIA_TYPE,
    };
    inferred.to_owned()
}
