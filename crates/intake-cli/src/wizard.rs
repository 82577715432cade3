use std::fmt::Write;

use intake_spec::{
    Ack, CompletionPayload, FieldType, FieldValue, RenderField, RenderPayload, RenderStatus,
    ValidationResult,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: section headers and prompts only.
    Clean,
    /// Verbose output: status, visible fields, risk and parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints headers, prompts and outcomes for the terminal wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!(
            "Questionnaire: {} (v{})",
            payload.questionnaire_title, payload.questionnaire_version
        );
        if self.verbosity.is_verbose() {
            println!("Commands: 'back' returns to the previous section, 'exit' aborts.");
        }
        self.header_printed = true;
    }

    pub fn show_section(&self, payload: &RenderPayload) {
        let Some(section) = &payload.section else {
            return;
        };
        println!();
        println!(
            "[{}/{}] {}",
            section.step, payload.progress.total, section.title
        );
        if let Some(intro) = &section.intro {
            println!("{}", intro);
        }
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{}), risk so far: {}",
                payload.status.as_str(),
                payload.progress.committed,
                payload.progress.total,
                payload.risk_tier.as_str()
            );
        } else if payload.status == RenderStatus::NeedInput
            && payload.fields.iter().all(|field| !field.visible)
        {
            println!("This section has no visible fields; press enter to continue.");
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = prompt.label.clone();
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            line.push_str(&format!(" [{}]", current));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, result: &ValidationResult) {
        eprintln!("Please correct the following answers:");
        for error in &result.errors {
            eprintln!(
                "  {} - {}",
                error.field_id.as_deref().unwrap_or("<section>"),
                error.message
            );
        }
    }

    pub fn show_completion(&self, payload: &CompletionPayload, ack: Option<&Ack>) {
        println!();
        println!("Done ✅");
        println!("Risk: {}", payload.risk.tier.as_str());
        let labels = payload.risk.labels();
        if !labels.is_empty() {
            println!("Findings: {}", labels.join(", "));
        }
        if let Some(ack) = ack {
            println!("Submitted: {}", ack.reference);
        }
        if self.verbosity.is_verbose() {
            match payload.to_cbor() {
                Ok(bytes) => println!("Payload (CBOR hex): {}", encode_hex(&bytes)),
                Err(err) => eprintln!("Failed to serialize payload to CBOR: {}", err),
            }
        }
        if self.show_answers_json {
            match payload.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize payload to JSON: {}", err),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(field: &RenderField) -> Self {
        Self {
            label: field.label.clone(),
            description: field.description.clone(),
            required: field.required,
            hint: hint(field),
            current: field.current_value.as_ref().map(ToString::to_string),
        }
    }
}

fn hint(field: &RenderField) -> Option<String> {
    match field.kind {
        FieldType::Boolean => Some("(yes/no)".to_string()),
        FieldType::Date => Some("(YYYY-MM-DD)".to_string()),
        FieldType::Cnp => Some("(13 digits)".to_string()),
        FieldType::Choice => field
            .choices
            .as_ref()
            .filter(|choices| !choices.is_empty())
            .map(|choices| format!("({})", choices.join("/"))),
        FieldType::Text | FieldType::Email | FieldType::Phone => None,
    }
}

/// What the user typed at a prompt.
#[derive(Debug, PartialEq)]
pub enum PromptAnswer {
    Value(FieldValue),
    /// Keep the current value, or leave an optional field empty.
    Keep,
    Clear,
    Back,
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turns a raw input line into an answer for `field`. Field-level rules such
/// as email syntax are left to the section validation on advance.
pub fn parse_answer(field: &RenderField, raw: &str) -> Result<PromptAnswer, AnswerParseError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("back") {
        return Ok(PromptAnswer::Back);
    }
    if raw == "-" {
        return Ok(PromptAnswer::Clear);
    }
    if raw.is_empty() {
        if field.required && field.current_value.is_none() {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(PromptAnswer::Keep);
    }

    match field.kind {
        FieldType::Boolean => parse_boolean(raw).map(PromptAnswer::Value),
        FieldType::Choice => parse_choice(field, raw).map(PromptAnswer::Value),
        _ => Ok(PromptAnswer::Value(FieldValue::text(raw))),
    }
}

fn parse_boolean(raw: &str) -> Result<FieldValue, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "da" | "1" => Ok(FieldValue::Bool(true)),
        "false" | "f" | "no" | "n" | "nu" | "0" => Ok(FieldValue::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_choice(field: &RenderField, raw: &str) -> Result<FieldValue, AnswerParseError> {
    let choices = field.choices.as_deref().unwrap_or_default();
    if let Some(choice) = choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
    {
        return Ok(FieldValue::text(choice.clone()));
    }
    if let Ok(index) = raw.parse::<usize>()
        && let Some(choice) = index.checked_sub(1).and_then(|index| choices.get(index))
    {
        return Ok(FieldValue::text(choice.clone()));
    }
    Err(AnswerParseError::new(
        format!("Please choose one of: {}.", choices.join(", ")),
        Some("expected a listed option or its number".to_string()),
    ))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}
