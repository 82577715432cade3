mod patients;
mod sinks;
mod telemetry;
mod wizard;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use intake_spec::{
    Cnp, FormState, PatientStore, QuestionnaireSpec, RiskAggregator, SectionAnswers,
    ValidationContext, ValidationResult, WizardError, WizardSession, build_render_payload,
    dental_intake, render_json_ui, render_text, validate_section,
};
use patients::PatientFile;
use sinks::{DirectorySink, OutputFormat};
use tracing::{debug, warn};
use wizard::{PromptAnswer, PromptContext, Verbosity, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Answers keyed by section id, then field id.
type AnswerFile = BTreeMap<String, SectionAnswers>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Dental intake questionnaire wizard",
    long_about = "Runs the patient intake questionnaire in a terminal and stores the completed form with its risk profile"
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a patient through the questionnaire and store the result.
    Wizard {
        /// Patient id to look up in the patient file.
        #[arg(long)]
        patient: String,
        /// JSON array of patient records.
        #[arg(long, value_name = "PATIENTS")]
        patients: PathBuf,
        /// Questionnaire JSON (defaults to the built-in dental intake form).
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        /// Answers keyed by section id used to prefill the wizard.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Do not prompt; advance with the prefilled answers only.
        #[arg(long, requires = "answers")]
        batch: bool,
        /// Directory receiving the completed form (defaults to DENTAL_INTAKE_OUTPUT_DIR or the current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Encoding of the stored form.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Session date used for age rules and date limits (defaults to today).
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
        /// Also print the section snapshot before prompting.
        #[arg(long, value_enum)]
        render: Option<RenderMode>,
        /// Show status, risk and parse expectations while prompting.
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Print the completed form as JSON.
        #[arg(long)]
        answers_json: bool,
    },
    /// Validate an answers file section by section for one patient.
    Validate {
        #[arg(long)]
        patient: String,
        #[arg(long, value_name = "PATIENTS")]
        patients: PathBuf,
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "YYYY-MM-DD")]
        today: Option<NaiveDate>,
    },
    /// Print the risk profile of an answers file as JSON.
    Risk {
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Check a personal numeric code.
    CheckCnp {
        cnp: String,
        /// Also verify the control digit.
        #[arg(long)]
        strict: bool,
    },
    /// Print the JSON schema of questionnaire files.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level)?;

    match cli.command {
        Command::Wizard {
            patient,
            patients,
            spec,
            answers,
            batch,
            out,
            format,
            today,
            render,
            verbose,
            answers_json,
        } => {
            let options = WizardOptions {
                batch,
                render,
                verbosity: Verbosity::from_verbose(verbose),
                answers_json,
            };
            run_wizard(
                &patient,
                &PatientFile::open(&patients)?,
                load_spec(spec)?,
                load_answers(answers)?,
                DirectorySink::new(resolve_output_root(out)?, format),
                session_date(today),
                options,
            )
        }
        Command::Validate {
            patient,
            patients,
            spec,
            answers,
            today,
        } => run_validate(
            &patient,
            &PatientFile::open(&patients)?,
            &load_spec(spec)?,
            &load_answers(Some(answers))?,
            session_date(today),
        ),
        Command::Risk { spec, answers } => run_risk(&load_spec(spec)?, load_answers(Some(answers))?),
        Command::CheckCnp { cnp, strict } => run_check_cnp(&cnp, strict),
        Command::Schema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&QuestionnaireSpec::json_schema()?)?
            );
            Ok(())
        }
    }
}

fn load_spec(path: Option<PathBuf>) -> CliResult<QuestionnaireSpec> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(&path)?;
            Ok(QuestionnaireSpec::from_json(&json)?)
        }
        None => Ok(dental_intake()?),
    }
}

fn load_answers(path: Option<PathBuf>) -> CliResult<AnswerFile> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(AnswerFile::new()),
    }
}

fn session_date(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

fn resolve_output_root(out: Option<PathBuf>) -> CliResult<PathBuf> {
    let candidate = match out {
        Some(path) => path,
        None => env::var_os("DENTAL_INTAKE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if candidate.as_os_str().is_empty() {
        return Err("output directory cannot be empty".into());
    }
    Ok(candidate)
}

struct WizardOptions {
    batch: bool,
    render: Option<RenderMode>,
    verbosity: Verbosity,
    answers_json: bool,
}

fn run_wizard<P: PatientStore>(
    patient_id: &str,
    patients: &P,
    spec: QuestionnaireSpec,
    prefill: AnswerFile,
    sink: DirectorySink,
    today: NaiveDate,
    options: WizardOptions,
) -> CliResult<()> {
    let mut session = WizardSession::start_on(spec, patients, patient_id, sink, today)?;
    let mut presenter = WizardPresenter::new(options.verbosity, options.answers_json);
    let mut prefilled = Vec::new();

    while let Some(section) = session.current_section() {
        let section_id = section.id.clone();
        if !prefilled.contains(&section_id) {
            if let Some(answers) = prefill.get(&section_id) {
                for (field_id, value) in answers {
                    session.answer(field_id, value.clone())?;
                }
            }
            prefilled.push(section_id.clone());
        }

        if !options.batch {
            let payload = build_render_payload(&session)?;
            presenter.show_header(&payload);
            presenter.show_section(&payload);
            print_render_output(options.render, &session)?;
            if fill_section(&mut session, &presenter)? == SectionStep::Back {
                match session.retreat() {
                    Ok(_) => {}
                    Err(WizardError::NoPreviousSection) => {
                        println!("Already at the first section.")
                    }
                    Err(err) => return Err(err.into()),
                }
                continue;
            }
        }

        match session.advance() {
            Ok(_) => {}
            Err(WizardError::Validation { section_id, result }) if !options.batch => {
                debug!(section = %section_id, "section needs corrections");
                presenter.show_validation(&result);
            }
            Err(WizardError::Validation { section_id, result }) => {
                describe_validation(&section_id, &result);
                return Err(format!("section '{}' is invalid", section_id).into());
            }
            Err(WizardError::Submission(err)) => {
                warn!(error = %err, "retrying submission");
                session.retry_submission()?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(payload) = session.completion() {
        presenter.show_completion(payload, session.ack());
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum SectionStep {
    Filled,
    Back,
}

/// Prompts every visible field of the current section in order. Visibility is
/// re-evaluated after each answer so follow-up fields appear as soon as they apply.
fn fill_section<S: intake_spec::SubmissionSink>(
    session: &mut WizardSession<S>,
    presenter: &WizardPresenter,
) -> CliResult<SectionStep> {
    let field_ids: Vec<String> = match session.current_section() {
        Some(section) => section.fields.iter().map(|field| field.id.clone()).collect(),
        None => return Ok(SectionStep::Filled),
    };

    for field_id in field_ids {
        let payload = build_render_payload(session)?;
        let Some(field) = payload.fields.iter().find(|field| field.id == field_id) else {
            continue;
        };
        if !field.visible {
            continue;
        }

        let prompt = PromptContext::new(field);
        loop {
            presenter.show_prompt(&prompt);
            let line = read_line()?;
            match parse_answer(field, &line) {
                Ok(PromptAnswer::Value(value)) => {
                    session.answer(&field_id, value)?;
                    break;
                }
                Ok(PromptAnswer::Keep) => break,
                Ok(PromptAnswer::Clear) => {
                    session.clear(&field_id)?;
                    break;
                }
                Ok(PromptAnswer::Back) => return Ok(SectionStep::Back),
                Err(err) => presenter.show_parse_error(&err),
            }
        }
    }
    Ok(SectionStep::Filled)
}

fn read_line() -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Err("input closed before the questionnaire was complete".into());
    }
    if input.trim().eq_ignore_ascii_case("exit") {
        return Err("wizard aborted by user".into());
    }
    Ok(input)
}

fn print_render_output<S: intake_spec::SubmissionSink>(
    mode: Option<RenderMode>,
    session: &WizardSession<S>,
) -> CliResult<()> {
    let Some(mode) = mode else {
        return Ok(());
    };
    let payload = build_render_payload(session)?;
    match mode {
        RenderMode::Text => println!("{}", render_text(&payload)),
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&render_json_ui(&payload))?),
    }
    Ok(())
}

fn run_validate<P: PatientStore>(
    patient_id: &str,
    patients: &P,
    spec: &QuestionnaireSpec,
    answers: &AnswerFile,
    today: NaiveDate,
) -> CliResult<()> {
    spec.check()?;
    let patient = patients.find_patient_by_id(patient_id)?;
    let ctx = ValidationContext::on(today);
    let mut invalid = Vec::new();

    for section in &spec.sections {
        if let Err(err) = section.check_applicable(&patient, today) {
            if answers.contains_key(&section.id) {
                println!("Section {}: {}", section.id, err);
                invalid.push(section.id.clone());
            }
            continue;
        }
        let empty = SectionAnswers::new();
        let section_answers = answers.get(&section.id).unwrap_or(&empty);
        let result = validate_section(section, section_answers, &ctx);
        if result.valid {
            println!("Section {}: valid", section.id);
        } else {
            describe_validation(&section.id, &result);
            invalid.push(section.id.clone());
        }
    }

    for section_id in answers.keys() {
        if spec.section(section_id).is_none() {
            println!("Section {}: not part of questionnaire '{}'", section_id, spec.id);
            invalid.push(section_id.clone());
        }
    }

    if invalid.is_empty() {
        println!("Validation result: valid");
        Ok(())
    } else {
        println!("Validation result: invalid");
        Err(format!("invalid sections: {}", invalid.join(", ")).into())
    }
}

fn describe_validation(section_id: &str, result: &ValidationResult) {
    println!("Section {}: invalid", section_id);
    for error in &result.errors {
        println!(
            "  {} - {}",
            error.field_id.as_deref().unwrap_or("<section>"),
            error.message
        );
    }
    let missing = result.missing_required();
    if !missing.is_empty() {
        println!("  Missing required answers: {}", missing.join(", "));
    }
}

fn run_risk(spec: &QuestionnaireSpec, answers: AnswerFile) -> CliResult<()> {
    let aggregator = RiskAggregator::from_spec(spec)?;
    let state = answers
        .into_iter()
        .fold(FormState::new(), |mut state, (section_id, section)| {
            state.insert_section(section_id, section);
            state
        });
    let profile = aggregator.assess(&state);
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn run_check_cnp(cnp: &str, strict: bool) -> CliResult<()> {
    let parsed = if strict {
        Cnp::parse_strict(cnp)
    } else {
        Cnp::parse(cnp)
    };
    match parsed {
        Ok(cnp) => {
            println!("CNP is valid");
            println!("  Birth date: {}", cnp.birth_date());
            if let Some(gender) = cnp.gender() {
                println!("  Gender: {}", gender.as_str());
            }
            println!("  County code: {:02}", cnp.county_code());
            if !strict && !cnp.has_valid_checksum() {
                println!(
                    "  Control digit: {} (expected {})",
                    cnp.control_digit(),
                    cnp.expected_control_digit()
                );
            }
            Ok(())
        }
        Err(err) => {
            println!("CNP is invalid: {}", err);
            Err(err.into())
        }
    }
}
