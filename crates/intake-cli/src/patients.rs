use std::fs;
use std::path::Path;

use intake_spec::{InMemoryPatientStore, Patient, PatientStore, StoreError};
use tracing::debug;

/// Patient store loaded from a JSON array of patient records.
pub struct PatientFile {
    patients: InMemoryPatientStore,
}

impl PatientFile {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            StoreError::Unavailable(format!("cannot read {}: {}", path.display(), err))
        })?;
        let patients = Self::parse(&contents).map_err(|err| {
            StoreError::Unavailable(format!("cannot parse {}: {}", path.display(), err))
        })?;
        debug!(path = %path.display(), patients = patients.len(), "patient file loaded");
        Ok(Self { patients })
    }

    fn parse(json: &str) -> Result<InMemoryPatientStore, serde_json::Error> {
        let records: Vec<Patient> = serde_json::from_str(json)?;
        Ok(records.into_iter().collect())
    }
}

impl PatientStore for PatientFile {
    fn find_patient_by_id(&self, id: &str) -> Result<Patient, StoreError> {
        self.patients.find_patient_by_id(id)
    }
}
