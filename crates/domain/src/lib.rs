//! Shared domain types for the ThreatSentry workspace.

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod facets;
pub mod message;
pub mod runtime;
pub mod stream;
pub mod tool;
