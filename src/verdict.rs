// Structured compliance verdict and strict parsing of model output
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single reported violation. Every field is required: a model
/// response missing any of them is a parse failure, not a partial
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Violation {
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub evidence: String,
    pub rule_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditVerdict {
    pub violations: Vec<Violation>,
    pub overall_compliant: bool,
}

/// Schema descriptor sent alongside the completion request. The model
/// does not guarantee conformance; `parse_verdict` is the gate.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "violations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "category": { "type": "string" },
                        "description": { "type": "string" },
                        "severity": { "type": "string", "enum": ["low", "medium", "high"] },
                        "evidence": { "type": "string" },
                        "rule_reference": { "type": "string" }
                    },
                    "required": ["category", "description", "severity", "evidence", "rule_reference"]
                }
            },
            "overall_compliant": { "type": "boolean" }
        },
        "required": ["violations", "overall_compliant"]
    })
}

lazy_static! {
    // Models routinely wrap JSON in a markdown fence despite being told not to
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap();
}

fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
}

/// Validate raw model output against the verdict schema. Unknown
/// fields, missing fields, and malformed enum values are all
/// rejected - the caller treats any failure here as non-recoverable.
pub fn parse_verdict(raw: &str) -> Result<AuditVerdict, String> {
    let cleaned = strip_code_fence(raw.trim());
    serde_json::from_str::<AuditVerdict>(cleaned)
        .map_err(|e| format!("response is not a valid verdict: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_verdict() {
        let raw = r#"{
            "violations": [{
                "category": "health_claim",
                "description": "Unsubstantiated cure claim",
                "severity": "high",
                "evidence": "This product cures all diseases",
                "rule_reference": "rulebook.pdf#12"
            }],
            "overall_compliant": false
        }"#;

        let verdict = parse_verdict(raw).expect("valid verdict");
        assert!(!verdict.overall_compliant);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].severity, Severity::High);
        assert_eq!(verdict.violations[0].category, "health_claim");
    }

    #[test]
    fn strips_markdown_fence() {
        let raw = "```json\n{\"violations\": [], \"overall_compliant\": true}\n```";
        let verdict = parse_verdict(raw).expect("fenced verdict");
        assert!(verdict.overall_compliant);
    }

    #[test]
    fn missing_overall_compliant_is_rejected() {
        let raw = r#"{"violations": []}"#;
        assert!(parse_verdict(raw).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"violations": [], "overall_compliant": true, "confidence": 0.9}"#;
        assert!(parse_verdict(raw).is_err());
    }

    #[test]
    fn missing_violation_field_is_rejected() {
        // no evidence field
        let raw = r#"{
            "violations": [{
                "category": "health_claim",
                "description": "claim",
                "severity": "high",
                "rule_reference": "r1"
            }],
            "overall_compliant": false
        }"#;
        assert!(parse_verdict(raw).is_err());
    }

    #[test]
    fn invalid_severity_is_rejected() {
        let raw = r#"{
            "violations": [{
                "category": "health_claim",
                "description": "claim",
                "severity": "critical",
                "evidence": "x",
                "rule_reference": "r1"
            }],
            "overall_compliant": false
        }"#;
        assert!(parse_verdict(raw).is_err());
    }
}
