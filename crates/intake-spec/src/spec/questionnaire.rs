use std::collections::BTreeSet;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::RiskRules;
use crate::spec::field::FieldType;
use crate::spec::section::SectionSpec;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse questionnaire: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("questionnaire '{0}' defines no sections")]
    Empty(String),
    #[error("duplicate section id '{0}'")]
    DuplicateSection(String),
    #[error("duplicate field id '{field_id}' in section '{section_id}'")]
    DuplicateField {
        section_id: String,
        field_id: String,
    },
    #[error("choice field '{field_id}' in section '{section_id}' has no choices")]
    MissingChoices {
        section_id: String,
        field_id: String,
    },
    #[error("field '{field_id}' in section '{section_id}' refers to unknown field '{reference}'")]
    UnknownReference {
        section_id: String,
        field_id: String,
        reference: String,
    },
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("risk rule '{0}' has no keywords")]
    EmptyRule(String),
}

/// Top-level questionnaire definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionnaireSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sections: Vec<SectionSpec>,
    /// Keyword table used by the risk aggregator; the built-in dental table when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_rules: Option<RiskRules>,
}

impl QuestionnaireSpec {
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        let spec: QuestionnaireSpec = serde_json::from_str(json)?;
        spec.check()?;
        Ok(spec)
    }

    pub fn section(&self, section_id: &str) -> Option<&SectionSpec> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.id == section_id)
    }

    /// JSON schema describing questionnaire documents.
    pub fn json_schema() -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(schemars::schema_for!(QuestionnaireSpec))
    }

    pub fn risk_rules(&self) -> RiskRules {
        self.risk_rules
            .clone()
            .unwrap_or_else(RiskRules::dental_defaults)
    }

    /// Structural checks: unique ids, choices present, conditions resolvable, patterns compile.
    pub fn check(&self) -> Result<(), SpecError> {
        if self.sections.is_empty() {
            return Err(SpecError::Empty(self.id.clone()));
        }

        let mut section_ids = BTreeSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(SpecError::DuplicateSection(section.id.clone()));
            }
            check_section(section)?;
        }

        if let Some(rules) = &self.risk_rules {
            rules.check()?;
        }
        Ok(())
    }
}

fn check_section(section: &SectionSpec) -> Result<(), SpecError> {
    let mut field_ids = BTreeSet::new();
    for field in &section.fields {
        if !field_ids.insert(field.id.as_str()) {
            return Err(SpecError::DuplicateField {
                section_id: section.id.clone(),
                field_id: field.id.clone(),
            });
        }
    }

    for field in &section.fields {
        if matches!(field.kind, FieldType::Choice)
            && field
                .choices
                .as_ref()
                .map(|choices| choices.is_empty())
                .unwrap_or(true)
        {
            return Err(SpecError::MissingChoices {
                section_id: section.id.clone(),
                field_id: field.id.clone(),
            });
        }

        if let Some(condition) = &field.visible_if {
            for reference in condition.references() {
                if !field_ids.contains(reference) {
                    return Err(SpecError::UnknownReference {
                        section_id: section.id.clone(),
                        field_id: field.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        if let Some(pattern) = field
            .constraint
            .as_ref()
            .and_then(|constraint| constraint.pattern.as_ref())
            && let Err(err) = Regex::new(pattern)
        {
            return Err(SpecError::Pattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Result<QuestionnaireSpec, SpecError> {
        QuestionnaireSpec::from_json(&value.to_string())
    }

    #[test]
    fn rejects_duplicate_sections() {
        let err = parse(json!({
            "id": "dup",
            "title": "Dup",
            "version": "1",
            "sections": [
                { "id": "a", "title": "A" },
                { "id": "a", "title": "A again" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::DuplicateSection(id) if id == "a"));
    }

    #[test]
    fn rejects_choice_without_choices() {
        let err = parse(json!({
            "id": "choices",
            "title": "Choices",
            "version": "1",
            "sections": [
                { "id": "a", "title": "A", "fields": [
                    { "id": "reason", "type": "choice", "label": "Reason" }
                ]}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::MissingChoices { .. }));
    }

    #[test]
    fn rejects_condition_on_unknown_field() {
        let err = parse(json!({
            "id": "cond",
            "title": "Cond",
            "version": "1",
            "sections": [
                { "id": "a", "title": "A", "fields": [
                    { "id": "details", "type": "text", "label": "Details",
                      "visible_if": { "op": "is_true", "field": "ghost" } }
                ]}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::UnknownReference { reference, .. } if reference == "ghost"));
    }

    #[test]
    fn rejects_broken_pattern() {
        let err = parse(json!({
            "id": "pattern",
            "title": "Pattern",
            "version": "1",
            "sections": [
                { "id": "a", "title": "A", "fields": [
                    { "id": "weeks", "type": "text", "label": "Weeks",
                      "constraint": { "pattern": "([0-9" } }
                ]}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::Pattern { .. }));
    }

    #[test]
    fn missing_rules_fall_back_to_dental_table() {
        let spec = parse(json!({
            "id": "rules",
            "title": "Rules",
            "version": "1",
            "sections": [{ "id": "a", "title": "A" }]
        }))
        .expect("valid spec");
        assert_eq!(spec.risk_rules(), RiskRules::dental_defaults());
    }
}
