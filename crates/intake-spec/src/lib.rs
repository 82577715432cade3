#![allow(missing_docs)]

pub mod answers;
pub mod applicability;
pub mod catalog;
pub mod cnp;
pub mod completion;
pub mod condition;
pub mod error;
pub mod patient;
pub mod render;
pub mod risk;
pub mod spec;
pub mod store;
pub mod template;
pub mod validate;
pub mod visibility;
pub mod wizard;

pub use answers::{FieldValue, FormState, SectionAnswers, ValidationError, ValidationResult};
pub use applicability::Applicability;
pub use catalog::dental_intake;
pub use cnp::{Cnp, CnpError};
pub use completion::{Ack, CompletionPayload, MemorySink, SubmissionError, SubmissionSink};
pub use condition::Condition;
pub use error::WizardError;
pub use patient::{Address, Gender, Patient};
pub use render::{
    RenderField, RenderPayload, RenderProgress, RenderSection, RenderStatus, build_render_payload,
    render_json_ui, render_text,
};
pub use risk::{RiskAggregator, RiskFinding, RiskProfile, RiskRule, RiskRules, RiskTier};
pub use spec::{Constraint, FieldSpec, FieldType, QuestionnaireSpec, SectionSpec, SpecError};
pub use store::{InMemoryPatientStore, PatientStore, StoreError};
pub use template::{IntroRenderer, TemplateError};
pub use validate::{
    ValidationContext, validate_cnp, validate_cnp_strict, validate_date, validate_email,
    validate_field, validate_non_empty, validate_phone, validate_section,
};
pub use visibility::{VisibilityMap, VisibilityMode, prune_hidden, resolve_visibility};
pub use wizard::{Position, WizardSession};
