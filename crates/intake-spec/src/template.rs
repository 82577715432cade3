use chrono::NaiveDate;
use handlebars::Handlebars;
use serde_json::{Value, json};
use thiserror::Error;

use crate::patient::{Address, Patient};
use crate::spec::section::SectionSpec;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render section '{section_id}': {message}")]
    Render { section_id: String, message: String },
}

/// Renders section descriptions with the patient as context.
///
/// Strict mode is on, so a typo such as `{{patient.frist_name}}` fails instead
/// of silently rendering an empty string.
pub struct IntroRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for IntroRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl IntroRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// `Ok(None)` when the section has no description.
    pub fn render(
        &self,
        section: &SectionSpec,
        patient: &Patient,
        today: NaiveDate,
    ) -> Result<Option<String>, TemplateError> {
        let Some(template) = &section.description else {
            return Ok(None);
        };
        let ctx = template_context(section, patient, today);
        self.handlebars
            .render_template(template, &ctx)
            .map(Some)
            .map_err(|err| TemplateError::Render {
                section_id: section.id.clone(),
                message: err.to_string(),
            })
    }
}

fn template_context(section: &SectionSpec, patient: &Patient, today: NaiveDate) -> Value {
    json!({
        "patient": {
            "id": patient.id,
            "first_name": patient.first_name,
            "last_name": patient.last_name,
            "full_name": patient.full_name(),
            "gender": patient.gender.as_str(),
            "age": patient.age_on(today),
            "birth_date": patient.birth_date.to_string(),
            "cnp": patient.cnp,
            "email": patient.email.as_deref().unwrap_or_default(),
            "phone": patient.phone.as_deref().unwrap_or_default(),
            "address": address_context(patient.address.as_ref()),
        },
        "section": {
            "id": section.id,
            "title": section.title,
        },
        "today": today.to_string(),
    })
}

/// Absent contact details render as empty strings so strict mode only trips on typos.
fn address_context(address: Option<&Address>) -> Value {
    json!({
        "street": address.map(|address| address.street.as_str()).unwrap_or_default(),
        "city": address.map(|address| address.city.as_str()).unwrap_or_default(),
        "county": address.and_then(|address| address.county.as_deref()).unwrap_or_default(),
        "postal_code": address
            .and_then(|address| address.postal_code.as_deref())
            .unwrap_or_default(),
    })
}
