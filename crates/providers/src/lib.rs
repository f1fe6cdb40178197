//! Model clients used by the agent runtime.
//!
//! Clients are blocking: a model call returns an iterator of deltas that
//! is pulled from the runtime's worker thread, never from the async
//! executor.

pub mod anthropic;
pub mod settings;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use anthropic::AnthropicModel;
pub use settings::{ModelSettings, ThinkingSettings, INTERLEAVED_THINKING_BETA};
pub use traits::{ChatModel, ModelDelta, ModelRequest, ModelStream, Usage};
pub use util::resolve_api_key;
