//! ThreatSentry gateway: the session-runtime core and its HTTP surface.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
