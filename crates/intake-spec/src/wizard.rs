//! Section sequencer for a single patient's questionnaire session.
//!
//! The session walks the sections that apply to the patient, keeps an editable
//! draft per reached section and commits a draft into the [`FormState`] only
//! when `advance` validates it. Reaching the end seals a [`CompletionPayload`]
//! and hands it to the injected sink.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::answers::{FieldValue, FormState, SectionAnswers};
use crate::completion::{Ack, CompletionEmitter, CompletionPayload, EmitError, SubmissionSink};
use crate::error::WizardError;
use crate::patient::Patient;
use crate::risk::{RiskAggregator, RiskProfile};
use crate::spec::questionnaire::QuestionnaireSpec;
use crate::spec::section::SectionSpec;
use crate::store::PatientStore;
use crate::template::IntroRenderer;
use crate::validate::{ValidationContext, validate_section};
use crate::visibility::prune_hidden;

/// Where the session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Index into the questionnaire's section list.
    Section(usize),
    Complete,
}

pub struct WizardSession<S> {
    spec: QuestionnaireSpec,
    patient: Patient,
    today: NaiveDate,
    /// Indices of the sections that apply to the patient, in questionnaire order.
    applicable: Vec<usize>,
    /// Cursor into `applicable`; `None` once complete.
    cursor: Option<usize>,
    furthest: usize,
    drafts: BTreeMap<String, SectionAnswers>,
    state: FormState,
    aggregator: RiskAggregator,
    intro: IntroRenderer,
    emitter: CompletionEmitter,
    sink: S,
}

impl<S: SubmissionSink> WizardSession<S> {
    /// Starts a session dated today.
    pub fn start<P: PatientStore>(
        spec: QuestionnaireSpec,
        patients: &P,
        patient_id: &str,
        sink: S,
    ) -> Result<Self, WizardError> {
        Self::start_on(spec, patients, patient_id, sink, Local::now().date_naive())
    }

    /// Starts a session with an explicit session date, used for age predicates and date limits.
    pub fn start_on<P: PatientStore>(
        spec: QuestionnaireSpec,
        patients: &P,
        patient_id: &str,
        sink: S,
        today: NaiveDate,
    ) -> Result<Self, WizardError> {
        spec.check()?;
        let patient = patients.find_patient_by_id(patient_id)?;
        let aggregator = RiskAggregator::from_spec(&spec)?;

        let applicable = applicable_sections(&spec, &patient, today);
        let Some(&first) = applicable.first() else {
            return Err(WizardError::NoApplicableSections(spec.id.clone()));
        };

        let mut drafts = BTreeMap::new();
        drafts.insert(spec.sections[first].id.clone(), SectionAnswers::new());

        info!(
            questionnaire = %spec.id,
            patient = %patient.id,
            sections = applicable.len(),
            "wizard session started"
        );

        Ok(Self {
            spec,
            patient,
            today,
            applicable,
            cursor: Some(0),
            furthest: 0,
            drafts,
            state: FormState::new(),
            aggregator,
            intro: IntroRenderer::new(),
            emitter: CompletionEmitter::default(),
            sink,
        })
    }

    pub fn position(&self) -> Position {
        match self.cursor {
            Some(cursor) => Position::Section(self.applicable[cursor]),
            None => Position::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_none()
    }

    /// `None` once the session is complete.
    pub fn current_section(&self) -> Option<&SectionSpec> {
        self.cursor
            .map(|cursor| &self.spec.sections[self.applicable[cursor]])
    }

    /// Rendered description of the current section.
    pub fn current_intro(&self) -> Result<Option<String>, WizardError> {
        match self.current_section() {
            Some(section) => Ok(self.intro.render(section, &self.patient, self.today)?),
            None => Ok(None),
        }
    }

    /// Records an answer on the current section. Nothing is validated until `advance`.
    pub fn answer(
        &mut self,
        field_id: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), WizardError> {
        let section_id = self.editable_field(field_id)?;
        self.drafts
            .entry(section_id)
            .or_default()
            .insert(field_id.to_string(), value.into());
        Ok(())
    }

    pub fn clear(&mut self, field_id: &str) -> Result<(), WizardError> {
        let section_id = self.editable_field(field_id)?;
        if let Some(draft) = self.drafts.get_mut(&section_id) {
            draft.remove(field_id);
        }
        Ok(())
    }

    fn editable_field(&self, field_id: &str) -> Result<String, WizardError> {
        let section = self.current_section().ok_or(WizardError::Completed)?;
        if section.field(field_id).is_none() {
            return Err(WizardError::UnknownField {
                section_id: section.id.clone(),
                field_id: field_id.to_string(),
            });
        }
        Ok(section.id.clone())
    }

    /// Answers of a section the session has reached; `None` for sections not reached yet.
    pub fn answers(&self, section_id: &str) -> Option<&SectionAnswers> {
        let index = self.spec.section_index(section_id)?;
        let reached = self.applicable[..=self.furthest].contains(&index);
        if !reached {
            return None;
        }
        self.drafts
            .get(section_id)
            .or_else(|| self.state.section(section_id))
    }

    /// Validates and commits the current section, then moves to the next
    /// applicable one. Completing the last section seals the payload and
    /// submits it; a failed submission leaves the session complete so only
    /// [`WizardSession::retry_submission`] remains.
    pub fn advance(&mut self) -> Result<Position, WizardError> {
        let cursor = self.cursor.ok_or(WizardError::Completed)?;
        let section = &self.spec.sections[self.applicable[cursor]];
        let draft = self.drafts.get(&section.id).cloned().unwrap_or_default();

        let result = validate_section(section, &draft, &ValidationContext::on(self.today));
        if !result.valid {
            debug!(
                section = %section.id,
                errors = result.errors.len(),
                "section rejected"
            );
            return Err(WizardError::Validation {
                section_id: section.id.clone(),
                result,
            });
        }

        let stored = prune_hidden(section, &draft);
        self.drafts.insert(section.id.clone(), stored.clone());
        self.state.insert_section(section.id.clone(), stored);

        let next = cursor + 1;
        if next < self.applicable.len() {
            let next_id = self.spec.sections[self.applicable[next]].id.clone();
            debug!(from = %section.id, to = %next_id, "section committed");
            if !self.drafts.contains_key(&next_id) {
                let committed = self.state.section(&next_id).cloned().unwrap_or_default();
                self.drafts.insert(next_id, committed);
            }
            self.cursor = Some(next);
            self.furthest = self.furthest.max(next);
            return Ok(self.position());
        }

        self.cursor = None;
        let payload = self.build_payload();
        info!(
            questionnaire = %payload.questionnaire_id,
            patient = %payload.patient_id,
            risk = payload.risk.tier.as_str(),
            "questionnaire complete"
        );
        self.emitter.seal(payload);
        self.deliver()?;
        Ok(Position::Complete)
    }

    /// Moves back to the previous applicable section, exposing its stored answers
    /// for editing. Nothing is re-validated until the next `advance`.
    pub fn retreat(&mut self) -> Result<Position, WizardError> {
        let cursor = self.cursor.ok_or(WizardError::Completed)?;
        if cursor == 0 {
            return Err(WizardError::NoPreviousSection);
        }
        self.cursor = Some(cursor - 1);
        debug!(to = self.applicable[cursor - 1], "section reopened");
        Ok(self.position())
    }

    /// Re-sends the sealed payload after a failed submission.
    pub fn retry_submission(&mut self) -> Result<&Ack, WizardError> {
        if self.cursor.is_some() {
            return Err(WizardError::NotComplete);
        }
        self.deliver()
    }

    fn deliver(&mut self) -> Result<&Ack, WizardError> {
        match self.emitter.deliver(&mut self.sink) {
            Ok(ack) => {
                info!(reference = %ack.reference, "questionnaire submitted");
                Ok(ack)
            }
            Err(EmitError::Sink(err)) => {
                warn!(error = %err, "questionnaire submission failed");
                Err(WizardError::Submission(err))
            }
            Err(EmitError::AlreadyDelivered) => Err(WizardError::AlreadySubmitted),
            Err(EmitError::NotSealed) => Err(WizardError::NotComplete),
        }
    }

    fn build_payload(&self) -> CompletionPayload {
        CompletionPayload {
            questionnaire_id: self.spec.id.clone(),
            questionnaire_version: self.spec.version.clone(),
            patient_id: self.patient.id.clone(),
            completed_on: self.today,
            sections: self.state.clone(),
            risk: self.risk_profile(),
        }
    }

    /// Committed answers only; drafts are not part of the form state.
    pub fn form_state(&self) -> &FormState {
        &self.state
    }

    /// Recomputed from the committed answers on every call.
    pub fn risk_profile(&self) -> RiskProfile {
        self.aggregator.assess(&self.state)
    }

    pub fn completion(&self) -> Option<&CompletionPayload> {
        self.emitter.payload()
    }

    pub fn ack(&self) -> Option<&Ack> {
        self.emitter.ack()
    }

    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    pub fn spec(&self) -> &QuestionnaireSpec {
        &self.spec
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn applicable_sections(&self) -> impl Iterator<Item = &SectionSpec> {
        self.applicable
            .iter()
            .map(|index| &self.spec.sections[*index])
    }

    /// `(committed, total)` counted over applicable sections.
    pub fn progress(&self) -> (usize, usize) {
        let committed = self
            .applicable_sections()
            .filter(|section| self.state.contains_section(&section.id))
            .count();
        (committed, self.applicable.len())
    }

    /// 1-based position of the current section among the applicable ones.
    pub fn step_number(&self) -> Option<usize> {
        self.cursor.map(|cursor| cursor + 1)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

fn applicable_sections(spec: &QuestionnaireSpec, patient: &Patient, today: NaiveDate) -> Vec<usize> {
    spec.sections
        .iter()
        .enumerate()
        .filter_map(|(index, section)| match section.check_applicable(patient, today) {
            Ok(()) => Some(index),
            Err(err) => {
                debug!(section = %section.id, reason = %err, "section skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicability::Applicability;
    use crate::completion::MemorySink;
    use crate::patient::Gender;
    use crate::spec::field::{FieldSpec, FieldType};
    use crate::store::InMemoryPatientStore;

    fn spec() -> QuestionnaireSpec {
        QuestionnaireSpec {
            id: "mini".into(),
            title: "Mini".into(),
            version: "1".into(),
            description: None,
            sections: vec![
                SectionSpec::new("contact", "Contact")
                    .with_field(FieldSpec::new("email", FieldType::Email, "Email").required()),
                SectionSpec::new("pregnancy", "Pregnancy")
                    .applies_if(Applicability::gender(Gender::Female))
                    .with_field(FieldSpec::new("pregnant", FieldType::Boolean, "Pregnant").required()),
                SectionSpec::new("consent", "Consent")
                    .with_field(FieldSpec::new("agree", FieldType::Boolean, "Agree").required()),
            ],
            risk_rules: None,
        }
    }

    fn store(gender: Gender) -> InMemoryPatientStore {
        [Patient {
            id: "p".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            gender,
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            cnp: "1900101123450".into(),
            email: None,
            phone: None,
            address: None,
        }]
        .into_iter()
        .collect()
    }

    fn session(gender: Gender) -> WizardSession<MemorySink> {
        WizardSession::start_on(
            spec(),
            &store(gender),
            "p",
            MemorySink::new(),
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        )
        .expect("session")
    }

    #[test]
    fn male_patient_skips_pregnancy() {
        let mut wizard = session(Gender::Male);
        wizard.answer("email", "a@b.ro").unwrap();
        assert_eq!(wizard.advance().unwrap(), Position::Section(2));
        assert_eq!(wizard.progress(), (1, 2));
    }

    #[test]
    fn answer_outside_current_section_is_rejected() {
        let mut wizard = session(Gender::Female);
        let err = wizard.answer("pregnant", true).unwrap_err();
        assert!(matches!(err, WizardError::UnknownField { .. }));
    }

    #[test]
    fn unreached_sections_are_not_visible() {
        let wizard = session(Gender::Female);
        assert!(wizard.answers("contact").is_some());
        assert!(wizard.answers("pregnancy").is_none());
    }

    #[test]
    fn retreat_at_start_fails() {
        let mut wizard = session(Gender::Female);
        assert!(matches!(wizard.retreat(), Err(WizardError::NoPreviousSection)));
    }

    #[test]
    fn missing_patient_is_reported() {
        let result = WizardSession::start_on(
            spec(),
            &InMemoryPatientStore::new(),
            "ghost",
            MemorySink::new(),
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        );
        assert!(matches!(result, Err(WizardError::PatientNotFound(id)) if id == "ghost"));
    }
}
