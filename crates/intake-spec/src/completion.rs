use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answers::FormState;
use crate::risk::RiskProfile;

/// Everything the hosting application receives when a questionnaire is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub questionnaire_id: String,
    pub questionnaire_version: String,
    pub patient_id: String,
    pub completed_on: NaiveDate,
    pub sections: FormState,
    pub risk: RiskProfile,
}

impl CompletionPayload {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }
}

/// Receipt returned by a sink that accepted a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub reference: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission sink unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode submission: {0}")]
    Encode(String),
}

/// Destination for completed questionnaires.
pub trait SubmissionSink {
    fn submit(&mut self, payload: &CompletionPayload) -> Result<Ack, SubmissionError>;
}

impl<S: SubmissionSink + ?Sized> SubmissionSink for &mut S {
    fn submit(&mut self, payload: &CompletionPayload) -> Result<Ack, SubmissionError> {
        (**self).submit(payload)
    }
}

/// Sink that keeps accepted payloads in memory. Can be told to fail the next
/// `n` submissions.
#[derive(Debug, Default)]
pub struct MemorySink {
    submissions: Vec<CompletionPayload>,
    failures_left: usize,
    attempts: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: times,
            ..Self::default()
        }
    }

    pub fn submissions(&self) -> &[CompletionPayload] {
        &self.submissions
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl SubmissionSink for MemorySink {
    fn submit(&mut self, payload: &CompletionPayload) -> Result<Ack, SubmissionError> {
        self.attempts += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(SubmissionError::Unavailable("memory sink offline".into()));
        }
        self.submissions.push(payload.clone());
        Ok(Ack {
            reference: format!("memory-{}", self.submissions.len()),
        })
    }
}

/// Holds the sealed payload and delivers it until the first acknowledgement.
#[derive(Debug, Default)]
pub(crate) struct CompletionEmitter {
    payload: Option<CompletionPayload>,
    ack: Option<Ack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EmitError {
    NotSealed,
    AlreadyDelivered,
    Sink(SubmissionError),
}

impl CompletionEmitter {
    /// The first sealed payload wins; later calls are ignored.
    pub(crate) fn seal(&mut self, payload: CompletionPayload) {
        if self.payload.is_none() {
            self.payload = Some(payload);
        }
    }

    pub(crate) fn payload(&self) -> Option<&CompletionPayload> {
        self.payload.as_ref()
    }

    pub(crate) fn ack(&self) -> Option<&Ack> {
        self.ack.as_ref()
    }

    pub(crate) fn deliver<S: SubmissionSink>(&mut self, sink: &mut S) -> Result<&Ack, EmitError> {
        if self.ack.is_some() {
            return Err(EmitError::AlreadyDelivered);
        }
        let payload = self.payload.as_ref().ok_or(EmitError::NotSealed)?;
        let ack = sink.submit(payload).map_err(EmitError::Sink)?;
        Ok(self.ack.insert(ack))
    }
}
