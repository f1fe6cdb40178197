//! System prompt rendering.

use serde_json::{Map, Value};

use ts_domain::error::{Error, Result};

const BASE_PROMPT: &str = "\
You are ThreatSentry, an assistant for threat modeling software architectures.

Work with the user on the threat catalog of the system described below. Use the \
STRIDE categories (Spoofing, Tampering, Repudiation, Information Disclosure, \
Denial of Service, Elevation of Privilege) when classifying threats.

Catalog changes go through the catalog tools. Every change is shown to the user \
for confirmation before it is applied; when a change is rejected, acknowledge it \
and do not retry it unprompted.

When an architecture diagram is attached, ground your analysis in the components \
and data flows it shows.";

/// Render the system prompt for `context`. An absent or empty context
/// yields the base prompt.
pub fn render(context: Option<&Map<String, Value>>) -> Result<String> {
    let Some(context) = context.filter(|c| !c.is_empty()) else {
        return Ok(BASE_PROMPT.to_owned());
    };
    let rendered = serde_json::to_string_pretty(context)
        .map_err(|e| Error::Build(format!("render prompt context: {e}")))?;
    Ok(format!(
        "{BASE_PROMPT}\n\n<threat_model_context>\n{rendered}\n</threat_model_context>"
    ))
}
