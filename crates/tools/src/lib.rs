//! Built-in tools for ThreatSentry.
//!
//! - `registry`: the ordered tool registry and preference resolution
//! - `threats`: catalog tools (`add_threats`, `edit_threats`,
//!   `delete_threats`) that pause the run for caller confirmation

pub mod registry;
pub mod threats;

pub use registry::{friendly_name, Resolution, ToolRegistry};
pub use threats::{CatalogAction, CatalogTool, Threat};
