pub mod field;
pub mod questionnaire;
pub mod section;

pub use field::{Constraint, FieldSpec, FieldType};
pub use questionnaire::{QuestionnaireSpec, SpecError};
pub use section::SectionSpec;
