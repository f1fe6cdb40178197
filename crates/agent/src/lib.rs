//! The concrete agent runtime: a ReAct tool loop over a blocking model
//! client, with per-session checkpoints kept in process memory.

pub mod builder;
pub mod checkpoint;
pub mod react;
mod turn;

pub use builder::AgentBuilder;
pub use checkpoint::{CheckpointStore, PendingInterrupt, SessionState};
pub use react::ReactAgent;
