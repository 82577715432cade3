use std::collections::BTreeMap;

use thiserror::Error;

use crate::patient::Patient;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("patient '{0}' not found")]
    NotFound(String),
    #[error("patient store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to patient records owned by the hosting application.
pub trait PatientStore {
    fn find_patient_by_id(&self, id: &str) -> Result<Patient, StoreError>;
}

impl<S: PatientStore + ?Sized> PatientStore for &S {
    fn find_patient_by_id(&self, id: &str) -> Result<Patient, StoreError> {
        (**self).find_patient_by_id(id)
    }
}

/// Patient store backed by a map, keyed by patient id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPatientStore {
    patients: BTreeMap<String, Patient>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patient: Patient) -> Option<Patient> {
        self.patients.insert(patient.id.clone(), patient)
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

impl FromIterator<Patient> for InMemoryPatientStore {
    fn from_iter<T: IntoIterator<Item = Patient>>(iter: T) -> Self {
        let mut store = Self::new();
        for patient in iter {
            store.insert(patient);
        }
        store
    }
}

impl PatientStore for InMemoryPatientStore {
    fn find_patient_by_id(&self, id: &str) -> Result<Patient, StoreError> {
        self.patients
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
