use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Value recorded for one field: free text, a choice (stored as its text) or a flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(flag) => Some(*flag),
            FieldValue::Text(_) => None,
        }
    }

    /// Whitespace-only text counts as not answered.
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(text) if text.trim().is_empty())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => f.write_str("yes"),
            FieldValue::Bool(false) => f.write_str("no"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Answers of a single section keyed by field id.
pub type SectionAnswers = BTreeMap<String, FieldValue>;

/// Committed answers of every section reached so far, keyed by section id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    sections: BTreeMap<String, SectionAnswers>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored answers of `section_id`.
    pub fn insert_section(&mut self, section_id: impl Into<String>, answers: SectionAnswers) {
        self.sections.insert(section_id.into(), answers);
    }

    /// Builder-style variant of [`FormState::insert_section`].
    pub fn with_section<I, K, V>(mut self, section_id: &str, answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let answers = answers
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.insert_section(section_id, answers);
        self
    }

    pub fn section(&self, section_id: &str) -> Option<&SectionAnswers> {
        self.sections.get(section_id)
    }

    pub fn value(&self, section_id: &str, field_id: &str) -> Option<&FieldValue> {
        self.sections.get(section_id)?.get(field_id)
    }

    pub fn contains_section(&self, section_id: &str) -> bool {
        self.sections.contains_key(section_id)
    }

    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionAnswers)> {
        self.sections.iter().map(|(id, answers)| (id.as_str(), answers))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// One reportable validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field_id: Option<&str>, code: &str, message: impl Into<String>) -> Self {
        Self {
            field_id: field_id.map(str::to_string),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field_id {
            Some(field_id) => write!(f, "{}: {}", field_id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a field or section check. Errors keep the order they were found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationResult) {
        for error in other.errors {
            self.push(error);
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Field ids reported with the `required` code.
    pub fn missing_required(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|error| error.code == "required")
            .filter_map(|error| error.field_id.as_deref())
            .collect()
    }

    pub fn errors_for<'a>(&'a self, field_id: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors
            .iter()
            .filter(move |error| error.field_id.as_deref() == Some(field_id))
    }
}
