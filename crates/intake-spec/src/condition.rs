use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{FieldValue, SectionAnswers};

/// Lightweight expression AST used for `visible_if` on fields.
///
/// Field references are resolved against the answers of the same section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Answered { field: String },
    Equals { field: String, value: FieldValue },
    IsTrue { field: String },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn is_true(field: &str) -> Self {
        Condition::IsTrue {
            field: field.to_string(),
        }
    }

    pub fn equals(field: &str, value: impl Into<FieldValue>) -> Self {
        Condition::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    fn get_value<'a>(answers: &'a SectionAnswers, field: &str) -> Option<&'a FieldValue> {
        answers.get(field).filter(|value| !value.is_blank())
    }

    /// Evaluates the condition; `None` when a referenced answer is still missing.
    pub fn evaluate(&self, answers: &SectionAnswers) -> Option<bool> {
        match self {
            Condition::Answered { field } => Some(Self::get_value(answers, field).is_some()),
            Condition::Equals { field, value } => {
                let current = Self::get_value(answers, field)?;
                Some(current == value)
            }
            Condition::IsTrue { field } => {
                Self::get_value(answers, field).map(|value| value.as_bool() == Some(true))
            }
            Condition::All { conditions } => {
                for condition in conditions {
                    match condition.evaluate(answers) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            Condition::Any { conditions } => {
                for condition in conditions {
                    if let Some(true) = condition.evaluate(answers) {
                        return Some(true);
                    }
                }
                Some(false)
            }
            Condition::Not { condition } => condition.evaluate(answers).map(|value| !value),
        }
    }

    /// Field ids the condition reads.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Condition::Answered { field }
            | Condition::Equals { field, .. }
            | Condition::IsTrue { field } => refs.push(field),
            Condition::All { conditions } | Condition::Any { conditions } => {
                for condition in conditions {
                    condition.collect_references(refs);
                }
            }
            Condition::Not { condition } => condition.collect_references(refs),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn answers(value: serde_json::Value) -> SectionAnswers {
        serde_json::from_value(value).expect("answers")
    }

    #[test]
    fn is_true_is_undetermined_until_answered() {
        let condition = Condition::is_true("has_allergies");
        assert_eq!(condition.evaluate(&answers(json!({}))), None);
        assert_eq!(
            condition.evaluate(&answers(json!({ "has_allergies": true }))),
            Some(true)
        );
        assert_eq!(
            condition.evaluate(&answers(json!({ "has_allergies": false }))),
            Some(false)
        );
    }

    #[test]
    fn equals_compares_choice_text() {
        let condition = Condition::equals("reason", "pain");
        assert_eq!(
            condition.evaluate(&answers(json!({ "reason": "pain" }))),
            Some(true)
        );
        assert_eq!(
            condition.evaluate(&answers(json!({ "reason": "checkup" }))),
            Some(false)
        );
    }

    #[test]
    fn parses_tagged_json() {
        let condition: Condition = serde_json::from_value(json!({
            "op": "any",
            "conditions": [
                { "op": "is_true", "field": "a" },
                { "op": "not", "condition": { "op": "answered", "field": "b" } }
            ]
        }))
        .expect("condition");
        assert_eq!(condition.references(), vec!["a", "b"]);
        assert_eq!(condition.evaluate(&answers(json!({}))), Some(true));
    }
}
