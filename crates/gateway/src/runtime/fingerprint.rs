//! Deterministic tokens for the four configuration facets.
//!
//! Two facet sets with equal fingerprints must be served by the same
//! runtime. Unordered inputs (tool names, mapping keys) are normalised
//! before hashing so construction order never matters.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use ts_domain::facets::ReasoningTier;

pub const NO_CONTEXT: &str = "no_context";
pub const NO_DIAGRAM: &str = "no_diagram";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub tools: String,
    pub context: String,
    pub artifact: String,
    pub tier: ReasoningTier,
}

impl Fingerprint {
    /// `tool_names` must already be resolved against the registry.
    pub fn compute(
        tool_names: &[String],
        context: Option<&Map<String, Value>>,
        artifact_reference: Option<&str>,
        tier: ReasoningTier,
    ) -> Self {
        Self {
            tools: tools_token(tool_names),
            context: context_token(context),
            artifact: artifact_token(artifact_reference),
            tier,
        }
    }

    /// Names of the facets whose tokens differ between `self` and `other`.
    pub fn changed_facets(&self, other: &Fingerprint) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.tools != other.tools {
            changed.push("tools");
        }
        if self.context != other.context {
            changed.push("context");
        }
        if self.artifact != other.artifact {
            changed.push("artifact");
        }
        if self.tier != other.tier {
            changed.push("tier");
        }
        changed
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

fn tools_token(names: &[String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    digest(sorted.join("\n"))
}

fn context_token(context: Option<&Map<String, Value>>) -> String {
    match context {
        Some(map) if !map.is_empty() => {
            let mut canonical = String::new();
            write_object(map, &mut canonical);
            digest(canonical)
        }
        _ => NO_CONTEXT.to_owned(),
    }
}

fn artifact_token(reference: Option<&str>) -> String {
    match reference {
        Some(r) => digest(r),
        None => NO_DIAGRAM.to_owned(),
    }
}

// ── canonical JSON ──────────────────────────────────────────────────

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}
