use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use intake_spec::{Ack, CompletionPayload, SubmissionError, SubmissionSink};
use tracing::info;

/// Encoding used for stored submissions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Cbor,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Cbor => "cbor",
        }
    }
}

/// Writes each completed questionnaire to its own file under `root`.
///
/// A file that already exists is never overwritten, so a questionnaire can
/// only be stored once per patient and day.
pub struct DirectorySink {
    root: PathBuf,
    format: OutputFormat,
}

impl DirectorySink {
    pub fn new(root: PathBuf, format: OutputFormat) -> Self {
        Self { root, format }
    }

    pub fn file_path(&self, payload: &CompletionPayload) -> PathBuf {
        self.root.join(format!(
            "{}-{}-{}.{}",
            payload.questionnaire_id,
            payload.patient_id,
            payload.completed_on.format("%Y%m%d"),
            self.format.extension()
        ))
    }

    fn encode(&self, payload: &CompletionPayload) -> Result<Vec<u8>, SubmissionError> {
        match self.format {
            OutputFormat::Json => payload
                .to_json_pretty()
                .map(String::into_bytes)
                .map_err(|err| SubmissionError::Encode(err.to_string())),
            OutputFormat::Cbor => payload
                .to_cbor()
                .map_err(|err| SubmissionError::Encode(err.to_string())),
        }
    }
}

impl SubmissionSink for DirectorySink {
    fn submit(&mut self, payload: &CompletionPayload) -> Result<Ack, SubmissionError> {
        let path = self.file_path(payload);
        if path.exists() {
            return Err(SubmissionError::Rejected(format!(
                "{} already exists",
                path.display()
            )));
        }
        let bytes = self.encode(payload)?;
        fs::create_dir_all(&self.root).map_err(|err| {
            SubmissionError::Unavailable(format!("{}: {}", self.root.display(), err))
        })?;
        fs::write(&path, bytes)
            .map_err(|err| SubmissionError::Unavailable(format!("{}: {}", path.display(), err)))?;
        info!(path = %path.display(), "submission stored");
        Ok(Ack {
            reference: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use intake_spec::{FormState, RiskProfile};

    use super::*;

    fn payload() -> CompletionPayload {
        CompletionPayload {
            questionnaire_id: "dental-intake".into(),
            questionnaire_version: "1.2.0".into(),
            patient_id: "p-100".into(),
            completed_on: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            sections: FormState::new().with_section("smoking", [("smoker", true)]),
            risk: RiskProfile::default(),
        }
    }

    #[test]
    fn cbor_submission_round_trips() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let mut sink = DirectorySink::new(dir.path().join("out"), OutputFormat::Cbor);
        let ack = sink.submit(&payload()).expect("stored");

        let path = dir.path().join("out").join("dental-intake-p-100-20240520.cbor");
        assert_eq!(ack.reference, path.display().to_string());
        let stored = CompletionPayload::from_cbor(&fs::read(&path).expect("read")).expect("decode");
        assert_eq!(stored, payload());
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let mut sink = DirectorySink::new(dir.path().to_path_buf(), OutputFormat::Json);
        sink.submit(&payload()).expect("first");
        assert!(matches!(
            sink.submit(&payload()),
            Err(SubmissionError::Rejected(_))
        ));
    }
}
