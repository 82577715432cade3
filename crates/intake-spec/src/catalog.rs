use crate::spec::questionnaire::{QuestionnaireSpec, SpecError};

/// Source of the built-in dental intake questionnaire.
pub const DENTAL_INTAKE_JSON: &str = include_str!("../forms/dental_intake.json");

/// The eight-section dental intake questionnaire; the pregnancy section only
/// applies to female patients aged 12 or more.
pub fn dental_intake() -> Result<QuestionnaireSpec, SpecError> {
    QuestionnaireSpec::from_json(DENTAL_INTAKE_JSON)
}
