use thiserror::Error;

use crate::answers::ValidationResult;
use crate::completion::SubmissionError;
use crate::spec::questionnaire::SpecError;
use crate::store::StoreError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("section '{section_id}' has {} invalid answer(s)", .result.errors.len())]
    Validation {
        section_id: String,
        result: ValidationResult,
    },
    /// Raised while sequencing and turned into a skip; never returned by the session.
    #[error("section '{section_id}' does not apply to this patient")]
    NotApplicableSection { section_id: String },
    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),
    #[error("patient '{0}' not found")]
    PatientNotFound(String),
    #[error("patient store error: {0}")]
    Store(StoreError),
    #[error("invalid questionnaire: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error("field '{field_id}' is not part of section '{section_id}'")]
    UnknownField {
        section_id: String,
        field_id: String,
    },
    #[error("no section of questionnaire '{0}' applies to this patient")]
    NoApplicableSections(String),
    #[error("already at the first section")]
    NoPreviousSection,
    #[error("questionnaire is complete")]
    Completed,
    #[error("questionnaire is not complete yet")]
    NotComplete,
    #[error("questionnaire was already submitted")]
    AlreadySubmitted,
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

impl From<StoreError> for WizardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WizardError::PatientNotFound(id),
            other => WizardError::Store(other),
        }
    }
}

impl WizardError {
    /// Field-level report when the error is a validation failure.
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            WizardError::Validation { result, .. } => Some(result),
            _ => None,
        }
    }
}
