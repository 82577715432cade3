use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::patient::{Gender, Patient};

/// Predicate deciding whether a section is shown to a patient.
///
/// Evaluated against the immutable patient record and the session date, so the
/// set of applicable sections is fixed for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Applicability {
    #[default]
    Always,
    Gender {
        is: Gender,
    },
    MinAge {
        years: u32,
    },
    All {
        predicates: Vec<Applicability>,
    },
    Any {
        predicates: Vec<Applicability>,
    },
    Not {
        predicate: Box<Applicability>,
    },
}

impl Applicability {
    pub fn gender(gender: Gender) -> Self {
        Applicability::Gender { is: gender }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Applicability::Always)
    }

    pub fn applies(&self, patient: &Patient, today: NaiveDate) -> bool {
        match self {
            Applicability::Always => true,
            Applicability::Gender { is } => patient.gender == *is,
            Applicability::MinAge { years } => patient.age_on(today) >= *years,
            Applicability::All { predicates } => predicates
                .iter()
                .all(|predicate| predicate.applies(patient, today)),
            Applicability::Any { predicates } => predicates
                .iter()
                .any(|predicate| predicate.applies(patient, today)),
            Applicability::Not { predicate } => !predicate.applies(patient, today),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn patient(gender: Gender, birth: (i32, u32, u32)) -> Patient {
        Patient {
            id: "p".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            gender,
            birth_date: NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2).unwrap(),
            cnp: String::new(),
            email: None,
            phone: None,
            address: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[test]
    fn gender_predicate_matches_record() {
        let predicate = Applicability::gender(Gender::Female);
        assert!(predicate.applies(&patient(Gender::Female, (1990, 1, 1)), today()));
        assert!(!predicate.applies(&patient(Gender::Male, (1990, 1, 1)), today()));
    }

    #[test]
    fn combined_predicate_from_json() {
        let predicate: Applicability = serde_json::from_value(json!({
            "op": "all",
            "predicates": [
                { "op": "gender", "is": "female" },
                { "op": "min_age", "years": 12 }
            ]
        }))
        .expect("predicate");
        assert!(predicate.applies(&patient(Gender::Female, (2000, 1, 1)), today()));
        assert!(!predicate.applies(&patient(Gender::Female, (2016, 1, 1)), today()));
        assert!(!predicate.applies(&patient(Gender::Male, (2000, 1, 1)), today()));
    }

    #[test]
    fn missing_predicate_defaults_to_always() {
        assert!(Applicability::default().is_always());
    }
}
