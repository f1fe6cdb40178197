//! Reading facets and run inputs out of an invocation's `input` object.

use serde_json::{Map, Value};

use ts_domain::facets::{Facets, ReasoningTier};
use ts_domain::tool::ResumeOutcome;

const FACET_KEYS: [&str; 4] = ["tool_preferences", "context", "diagram", "budget_level"];

pub const DEFAULT_PROMPT: &str = "No prompt found in input";

/// True when the input names at least one facet.
pub fn has_facets(input: &Map<String, Value>) -> bool {
    FACET_KEYS
        .iter()
        .any(|k| input.get(*k).is_some_and(|v| !v.is_null()))
}

/// Facets carried by `input`; an absent budget level falls back to
/// `fallback_tier`.
pub fn extract_facets(input: &Map<String, Value>, fallback_tier: ReasoningTier) -> Facets {
    Facets {
        tool_selection: tool_preferences(input),
        context: context(input),
        artifact_reference: diagram(input),
        reasoning_tier: budget_level(input).unwrap_or(fallback_tier),
    }
}

/// Facets for a streaming request: every facet the input names replaces
/// the one in `base`; the rest carry over unchanged.
pub fn overlay_facets(input: &Map<String, Value>, base: &Facets) -> Facets {
    let named = |key: &str| input.get(key).is_some_and(|v| !v.is_null());
    Facets {
        tool_selection: if named("tool_preferences") {
            tool_preferences(input)
        } else {
            base.tool_selection.clone()
        },
        context: if named("context") {
            context(input)
        } else {
            base.context.clone()
        },
        artifact_reference: if named("diagram") {
            diagram(input)
        } else {
            base.artifact_reference.clone()
        },
        reasoning_tier: budget_level(input).unwrap_or(base.reasoning_tier),
    }
}

/// Accepts a list of names or a comma-separated string. Blank entries are
/// dropped; nothing left means no preference.
pub fn tool_preferences(input: &Map<String, Value>) -> Option<Vec<String>> {
    let names: Vec<String> = match input.get("tool_preferences")? {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        other => {
            tracing::warn!(value = %other, "ignoring tool_preferences of unsupported shape");
            return None;
        }
    };
    (!names.is_empty()).then_some(names)
}

pub fn context(input: &Map<String, Value>) -> Option<Map<String, Value>> {
    match input.get("context")? {
        Value::Object(map) => Some(map.clone()),
        Value::Null => None,
        other => {
            tracing::warn!(kind = %json_kind(other), "ignoring non-object context");
            None
        }
    }
}

/// The reference is kept verbatim; a blank one means no diagram.
pub fn diagram(input: &Map<String, Value>) -> Option<String> {
    input
        .get("diagram")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

/// Integer or numeric string; anything else counts as absent.
pub fn budget_level(input: &Map<String, Value>) -> Option<ReasoningTier> {
    let raw = input.get("budget_level")?;
    let level = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match level {
        Some(level) => Some(ReasoningTier::new(
            u8::try_from(level).unwrap_or(u8::MAX),
        )),
        None => {
            if !raw.is_null() {
                tracing::warn!(value = %raw, "ignoring invalid budget_level");
            }
            None
        }
    }
}

pub fn prompt_text(input: &Map<String, Value>) -> String {
    input
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROMPT)
        .to_owned()
}

/// Resume outcome from `input.prompt`: either the confirmed action name as
/// a string or a full `{type, payload?, error?}` object.
pub fn resume_outcome(input: &Map<String, Value>) -> Result<ResumeOutcome, String> {
    match input.get("prompt") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => {
            Ok(ResumeOutcome::accepted(kind.trim()))
        }
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| format!("invalid resume outcome: {e}")),
        _ => Err("resume_interrupt requires a prompt naming the confirmed action".into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
