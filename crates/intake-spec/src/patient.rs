use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Administrative gender as recorded on the patient file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Postal address of a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Identity and demographic record supplied by the patient store.
///
/// The wizard never mutates a patient; section applicability is evaluated
/// against this record once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub cnp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut years = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(birth: NaiveDate) -> Patient {
        Patient {
            id: "p-1".into(),
            first_name: "Ana".into(),
            last_name: "Pop".into(),
            gender: Gender::Female,
            birth_date: birth,
            cnp: "2900315123457".into(),
            email: None,
            phone: None,
            address: None,
        }
    }

    #[test]
    fn age_counts_completed_years_only() {
        let p = patient(NaiveDate::from_ymd_opt(1990, 3, 15).unwrap());
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()), 33);
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()), 34);
    }

    #[test]
    fn age_never_goes_negative() {
        let p = patient(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 0);
    }

    #[test]
    fn deserializes_without_optional_contact() {
        let p: Patient = serde_json::from_value(serde_json::json!({
            "id": "p-7",
            "first_name": "Ion",
            "last_name": "Ionescu",
            "gender": "male",
            "birth_date": "1985-01-01",
            "cnp": "1850101123456"
        }))
        .expect("deserialize");
        assert_eq!(p.gender, Gender::Male);
        assert!(p.address.is_none());
        assert_eq!(p.full_name(), "Ion Ionescu");
    }
}
