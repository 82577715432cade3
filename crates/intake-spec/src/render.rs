use serde_json::{Map, Value, json};

use crate::answers::FieldValue;
use crate::completion::SubmissionSink;
use crate::error::WizardError;
use crate::risk::RiskTier;
use crate::spec::field::FieldType;
use crate::visibility::{VisibilityMode, resolve_visibility};
use crate::wizard::WizardSession;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The current section still needs answers.
    NeedInput,
    /// All applicable sections are committed but the submission is pending.
    Complete,
    /// The completion payload was acknowledged.
    Submitted,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Submitted => "submitted",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub committed: usize,
    pub total: usize,
}

/// Describes a single field of the current section.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub kind: FieldType,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<FieldValue>,
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RenderSection {
    pub id: String,
    pub title: String,
    pub intro: Option<String>,
    /// 1-based step among the applicable sections.
    pub step: usize,
}

/// Snapshot of a session used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub questionnaire_id: String,
    pub questionnaire_title: String,
    pub questionnaire_version: String,
    pub status: RenderStatus,
    pub section: Option<RenderSection>,
    pub progress: RenderProgress,
    pub fields: Vec<RenderField>,
    pub risk_tier: RiskTier,
    pub risk_labels: Vec<String>,
}

/// Build the renderer payload from the session.
pub fn build_render_payload<S: SubmissionSink>(
    session: &WizardSession<S>,
) -> Result<RenderPayload, WizardError> {
    let spec = session.spec();
    let (committed, total) = session.progress();

    let (section, fields) = match session.current_section() {
        Some(current) => {
            let empty = Default::default();
            let answers = session.answers(&current.id).unwrap_or(&empty);
            let visibility = resolve_visibility(current, answers, VisibilityMode::Hidden);
            let fields = current
                .fields
                .iter()
                .map(|field| RenderField {
                    id: field.id.clone(),
                    label: field.label.clone(),
                    description: field.description.clone(),
                    kind: field.kind,
                    required: field.required,
                    visible: visibility.get(&field.id).copied().unwrap_or(true),
                    current_value: answers.get(&field.id).cloned(),
                    choices: field.choices.clone(),
                })
                .collect::<Vec<_>>();
            let section = RenderSection {
                id: current.id.clone(),
                title: current.title.clone(),
                intro: session.current_intro()?,
                step: session.step_number().unwrap_or(1),
            };
            (Some(section), fields)
        }
        None => (None, Vec::new()),
    };

    let status = if !session.is_complete() {
        RenderStatus::NeedInput
    } else if session.ack().is_some() {
        RenderStatus::Submitted
    } else {
        RenderStatus::Complete
    };

    let risk = session.risk_profile();

    Ok(RenderPayload {
        questionnaire_id: spec.id.clone(),
        questionnaire_title: spec.title.clone(),
        questionnaire_version: spec.version.clone(),
        status,
        section,
        progress: RenderProgress { committed, total },
        fields,
        risk_tier: risk.tier,
        risk_labels: risk.labels().into_iter().map(str::to_string).collect(),
    })
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert(
                "description".into(),
                field
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert("type".into(), Value::String(field.kind.as_str().to_string()));
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            if let Some(current_value) = &field.current_value {
                map.insert("current_value".into(), field_value_json(current_value));
            }
            if let Some(choices) = &field.choices {
                map.insert(
                    "choices".into(),
                    Value::Array(
                        choices
                            .iter()
                            .map(|choice| Value::String(choice.clone()))
                            .collect(),
                    ),
                );
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    let section = payload.section.as_ref().map(|section| {
        json!({
            "id": section.id,
            "title": section.title,
            "intro": section.intro,
            "step": section.step,
        })
    });

    json!({
        "questionnaire_id": payload.questionnaire_id,
        "questionnaire_title": payload.questionnaire_title,
        "questionnaire_version": payload.questionnaire_version,
        "status": payload.status.as_str(),
        "section": section,
        "progress": {
            "committed": payload.progress.committed,
            "total": payload.progress.total,
        },
        "fields": fields,
        "risk": {
            "tier": payload.risk_tier.as_str(),
            "labels": payload.risk_labels,
        },
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Questionnaire: {} ({} v{})",
        payload.questionnaire_title, payload.questionnaire_id, payload.questionnaire_version
    ));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.committed,
        payload.progress.total
    ));

    match &payload.section {
        Some(section) => {
            lines.push(format!(
                "Section {}/{}: {}",
                section.step, payload.progress.total, section.title
            ));
            if let Some(intro) = &section.intro {
                lines.push(format!("  {}", intro));
            }
            for field in payload.fields.iter().filter(|field| field.visible) {
                let mut entry = format!(" - {} ({})", field.id, field.label);
                if field.required {
                    entry.push_str(" [required]");
                }
                if let Some(value) = &field.current_value {
                    entry.push_str(&format!(" = {}", value));
                }
                lines.push(entry);
            }
        }
        None => lines.push("All applicable sections are answered.".to_string()),
    }

    let mut risk_line = format!("Risk: {}", payload.risk_tier.as_str());
    if !payload.risk_labels.is_empty() {
        risk_line.push_str(&format!(" ({})", payload.risk_labels.join(", ")));
    }
    lines.push(risk_line);

    lines.join("\n")
}

fn field_value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(flag) => Value::Bool(*flag),
        FieldValue::Text(text) => Value::String(text.clone()),
    }
}
