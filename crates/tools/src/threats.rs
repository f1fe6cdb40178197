//! Threat-catalog tools.
//!
//! The catalog itself lives with the caller. Each tool validates the
//! threats the model proposed, then pauses the run with
//! `{"payload": [threats], "tool_name": name}` so the caller can apply
//! the change and confirm. On resume the tool completes if the caller
//! confirmed this action without error, and reports a tool error
//! otherwise.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ts_domain::tool::{ResumeOutcome, Tool, ToolInvocation, ToolOutcome};

const MIN_MITIGATIONS: usize = 2;
const MAX_MITIGATIONS: usize = 5;

const STRIDE_CATEGORIES: [&str; 6] = [
    "Spoofing",
    "Tampering",
    "Repudiation",
    "Information Disclosure",
    "Denial of Service",
    "Elevation of Privilege",
];

/// One entry of the threat catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub name: String,
    pub stride_category: String,
    pub description: String,
    pub target: String,
    pub impact: String,
    pub likelihood: String,
    pub mitigations: Vec<String>,
}

impl Threat {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("threat name must not be empty".into());
        }
        if !STRIDE_CATEGORIES.contains(&self.stride_category.as_str()) {
            return Err(format!(
                "threat '{}': unknown STRIDE category '{}'",
                self.name, self.stride_category
            ));
        }
        let n = self.mitigations.len();
        if !(MIN_MITIGATIONS..=MAX_MITIGATIONS).contains(&n) {
            return Err(format!(
                "threat '{}': expected {MIN_MITIGATIONS}-{MAX_MITIGATIONS} mitigations, got {n}",
                self.name
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CatalogArgs {
    threats: Vec<Threat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogAction {
    Add,
    Edit,
    Delete,
}

impl CatalogAction {
    pub const ALL: [CatalogAction; 3] = [Self::Add, Self::Edit, Self::Delete];

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Add => "add_threats",
            Self::Edit => "edit_threats",
            Self::Delete => "delete_threats",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Add => "Used to add new threats to the existing catalog",
            Self::Edit => "Used to update threats in the existing catalog",
            Self::Delete => "Used to delete threats from the existing catalog",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Add => "added to",
            Self::Edit => "updated in",
            Self::Delete => "deleted from",
        }
    }
}

/// A catalog mutation that requires caller confirmation.
#[derive(Debug, Clone)]
pub struct CatalogTool {
    action: CatalogAction,
}

impl CatalogTool {
    pub fn new(action: CatalogAction) -> Self {
        Self { action }
    }

    fn parse_threats(&self, arguments: &Value) -> Result<Vec<Threat>, String> {
        let args: CatalogArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| format!("invalid arguments: {e}"))?;
        if args.threats.is_empty() {
            return Err("at least one threat is required".into());
        }
        for threat in &args.threats {
            threat.validate()?;
        }
        Ok(args.threats)
    }

    fn finish(&self, outcome: &ResumeOutcome, count: usize) -> ToolOutcome {
        let name = self.action.tool_name();
        if let Some(error) = outcome.error.as_deref().filter(|e| !e.is_empty()) {
            return ToolOutcome::Failed(error.to_string());
        }
        if outcome.kind != name {
            return ToolOutcome::Failed(format!(
                "confirmation '{}' does not match pending action '{name}'",
                outcome.kind
            ));
        }
        ToolOutcome::Complete(json!({
            "response": format!("{count} threat(s) {} the catalog", self.action.past_tense()),
        }))
    }
}

impl Tool for CatalogTool {
    fn name(&self) -> &str {
        self.action.tool_name()
    }

    fn description(&self) -> &str {
        self.action.description()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "threats": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "The name of the threat" },
                            "stride_category": {
                                "type": "string",
                                "enum": STRIDE_CATEGORIES,
                                "description": "The STRIDE category of the threat"
                            },
                            "description": {
                                "type": "string",
                                "description": "Description of the threat, 35 to 50 words, following threat grammar"
                            },
                            "target": { "type": "string", "description": "The target of the threat" },
                            "impact": { "type": "string", "description": "The impact of the threat" },
                            "likelihood": { "type": "string", "description": "The likelihood of the threat" },
                            "mitigations": {
                                "type": "array",
                                "items": { "type": "string" },
                                "minItems": MIN_MITIGATIONS,
                                "maxItems": MAX_MITIGATIONS
                            }
                        },
                        "required": [
                            "name", "stride_category", "description",
                            "target", "impact", "likelihood", "mitigations"
                        ]
                    }
                }
            },
            "required": ["threats"]
        })
    }

    fn invoke(&self, call: ToolInvocation<'_>) -> ToolOutcome {
        let threats = match self.parse_threats(call.arguments) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(tool = %self.name(), call_id = %call.call_id, error = %e, "rejected tool arguments");
                return ToolOutcome::Failed(e);
            }
        };

        match call.resume {
            None => ToolOutcome::Interrupt(json!({
                "payload": threats,
                "tool_name": self.name(),
            })),
            Some(outcome) => self.finish(outcome, threats.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threat(name: &str) -> Value {
        json!({
            "name": name,
            "stride_category": "Tampering",
            "description": "An attacker modifies requests in transit.",
            "target": "API gateway",
            "impact": "High",
            "likelihood": "Medium",
            "mitigations": ["TLS everywhere", "Request signing"]
        })
    }

    fn invoke(tool: &CatalogTool, args: &Value, resume: Option<&ResumeOutcome>) -> ToolOutcome {
        tool.invoke(ToolInvocation {
            call_id: "tu_1",
            arguments: args,
            resume,
        })
    }

    #[test]
    fn first_invocation_pauses_with_payload() {
        let tool = CatalogTool::new(CatalogAction::Add);
        let args = json!({ "threats": [threat("Request tampering")] });
        match invoke(&tool, &args, None) {
            ToolOutcome::Interrupt(value) => {
                assert_eq!(value["tool_name"], "add_threats");
                assert_eq!(value["payload"][0]["name"], "Request tampering");
            }
            other => panic!("expected interrupt, got {other:?}"),
        }
    }

    #[test]
    fn matching_confirmation_completes() {
        let tool = CatalogTool::new(CatalogAction::Edit);
        let args = json!({ "threats": [threat("a"), threat("b")] });
        let outcome = ResumeOutcome::accepted("edit_threats");
        match invoke(&tool, &args, Some(&outcome)) {
            ToolOutcome::Complete(value) => {
                assert_eq!(value["response"], "2 threat(s) updated in the catalog");
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn caller_error_fails_the_tool() {
        let tool = CatalogTool::new(CatalogAction::Delete);
        let args = json!({ "threats": [threat("a")] });
        let outcome = ResumeOutcome::rejected("delete_threats", "user declined");
        assert_eq!(
            invoke(&tool, &args, Some(&outcome)),
            ToolOutcome::Failed("user declined".into())
        );
    }

    #[test]
    fn mismatched_confirmation_type_fails_the_tool() {
        let tool = CatalogTool::new(CatalogAction::Add);
        let args = json!({ "threats": [threat("a")] });
        let outcome = ResumeOutcome::accepted("delete_threats");
        assert!(matches!(
            invoke(&tool, &args, Some(&outcome)),
            ToolOutcome::Failed(_)
        ));
    }

    #[test]
    fn too_few_mitigations_are_rejected() {
        let tool = CatalogTool::new(CatalogAction::Add);
        let mut t = threat("a");
        t["mitigations"] = json!(["only one"]);
        let args = json!({ "threats": [t] });
        match invoke(&tool, &args, None) {
            ToolOutcome::Failed(msg) => assert!(msg.contains("mitigations")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stride_category_is_rejected() {
        let tool = CatalogTool::new(CatalogAction::Add);
        let mut t = threat("a");
        t["stride_category"] = json!("Phishing");
        let args = json!({ "threats": [t] });
        assert!(matches!(invoke(&tool, &args, None), ToolOutcome::Failed(_)));
    }
}
