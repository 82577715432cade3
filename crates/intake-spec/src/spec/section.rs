use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::applicability::Applicability;
use crate::error::WizardError;
use crate::patient::Patient;
use crate::spec::field::FieldSpec;

/// One page of the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    /// Handlebars template rendered with the patient as context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Applicability::is_always")]
    pub applies_if: Applicability,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl SectionSpec {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            applies_if: Applicability::Always,
            fields: Vec::new(),
        }
    }

    pub fn applies_if(mut self, predicate: Applicability) -> Self {
        self.applies_if = predicate;
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == field_id)
    }

    /// Fails with [`WizardError::NotApplicableSection`] when the predicate rejects the patient.
    pub fn check_applicable(&self, patient: &Patient, today: NaiveDate) -> Result<(), WizardError> {
        if self.applies_if.applies(patient, today) {
            Ok(())
        } else {
            Err(WizardError::NotApplicableSection {
                section_id: self.id.clone(),
            })
        }
    }
}
