/// Shared error type used across all ThreatSentry crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Runtime construction (prompt rendering or the builder itself) failed.
    #[error("runtime build failed: {0}")]
    Build(String),

    #[error("artifact {reference}: {message}")]
    Artifact { reference: String, message: String },

    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    /// The agent exceeded its per-run step ceiling.
    #[error("recursion limit of {0} steps reached without a final answer")]
    RecursionLimit(usize),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
