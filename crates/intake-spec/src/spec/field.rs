use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::risk::RiskTier;

/// Supported field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Cnp,
    Date,
    Choice,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Cnp => "cnp",
            FieldType::Date => "date",
            FieldType::Choice => "choice",
            FieldType::Boolean => "boolean",
        }
    }

    /// Boolean fields store flags; every other kind stores text.
    pub fn expects_flag(&self) -> bool {
        matches!(self, FieldType::Boolean)
    }
}

/// Extra checks applied after the kind-specific validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    /// Dates after the session date are rejected.
    #[serde(default)]
    pub not_future: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub not_before: Option<NaiveDate>,
    /// CNP control digit must match.
    #[serde(default)]
    pub checksum: bool,
    /// Boolean must be answered with `true` (consents).
    #[serde(default)]
    pub must_accept: bool,
}

/// One question inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Free-text answers are scanned for risk keywords.
    #[serde(default)]
    pub risk_scan: bool,
    /// Tier contributed when a boolean answer is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_if_true: Option<RiskTier>,
}

impl FieldSpec {
    pub fn new(id: &str, kind: FieldType, label: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            description: None,
            required: false,
            choices: None,
            visible_if: None,
            constraint: None,
            risk_scan: false,
            risk_if_true: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|choice| choice.to_string()).collect());
        self
    }

    pub fn visible_if(mut self, condition: Condition) -> Self {
        self.visible_if = Some(condition);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn scanned_for_risk(mut self) -> Self {
        self.risk_scan = true;
        self
    }

    pub fn risk_if_true(mut self, tier: RiskTier) -> Self {
        self.risk_if_true = Some(tier);
        self
    }
}
