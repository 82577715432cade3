use chrono::NaiveDate;
use regex::Regex;

use crate::answers::{FieldValue, SectionAnswers, ValidationError, ValidationResult};
use crate::cnp::Cnp;
use crate::spec::field::{Constraint, FieldSpec, FieldType};
use crate::spec::section::SectionSpec;
use crate::visibility::{VisibilityMode, resolve_visibility};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[0-9]{10,15}$";
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

/// Date used for range checks such as `not_future`.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub today: NaiveDate,
}

impl ValidationContext {
    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }
}

pub fn validate_non_empty(value: &str) -> ValidationResult {
    ValidationResult::from_errors(non_empty_errors(None, value))
}

pub fn validate_email(value: &str) -> ValidationResult {
    ValidationResult::from_errors(email_errors(None, value))
}

pub fn validate_phone(value: &str) -> ValidationResult {
    ValidationResult::from_errors(phone_errors(None, value))
}

/// Structural CNP check; the control digit is only enforced by [`validate_cnp_strict`].
pub fn validate_cnp(value: &str) -> ValidationResult {
    ValidationResult::from_errors(cnp_errors(None, value, false))
}

pub fn validate_cnp_strict(value: &str) -> ValidationResult {
    ValidationResult::from_errors(cnp_errors(None, value, true))
}

/// Accepts `YYYY-MM-DD` or `DD.MM.YYYY` between the optional bounds.
pub fn validate_date(
    value: &str,
    not_before: Option<NaiveDate>,
    not_after: Option<NaiveDate>,
) -> ValidationResult {
    ValidationResult::from_errors(date_errors(None, value, not_before, not_after))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Checks one answer against its field definition. Requiredness is handled by
/// [`validate_section`].
pub fn validate_field(
    field: &FieldSpec,
    value: &FieldValue,
    ctx: &ValidationContext,
) -> ValidationResult {
    let id = Some(field.id.as_str());

    if field.kind.expects_flag() {
        return match value.as_bool() {
            Some(flag) => {
                let mut result = ValidationResult::ok();
                if !flag && field.constraint.as_ref().is_some_and(|c| c.must_accept) {
                    result.push(ValidationError::new(
                        id,
                        "not_accepted",
                        "must be accepted to continue",
                    ));
                }
                result
            }
            None => ValidationResult::from_errors(vec![type_mismatch(field)]),
        };
    }

    let Some(text) = value.as_text() else {
        return ValidationResult::from_errors(vec![type_mismatch(field)]);
    };

    let mut errors = match field.kind {
        FieldType::Text => non_empty_errors(id, text),
        FieldType::Email => email_errors(id, text),
        FieldType::Phone => phone_errors(id, text),
        FieldType::Cnp => {
            let strict = field.constraint.as_ref().is_some_and(|c| c.checksum);
            cnp_errors(id, text, strict)
        }
        FieldType::Date => {
            let constraint = field.constraint.clone().unwrap_or_default();
            let not_after = constraint.not_future.then_some(ctx.today);
            date_errors(id, text, constraint.not_before, not_after)
        }
        FieldType::Choice => choice_errors(field, text),
        FieldType::Boolean => Vec::new(),
    };

    if errors.is_empty()
        && let Some(constraint) = &field.constraint
    {
        errors.extend(constraint_errors(field, text, constraint));
    }

    ValidationResult::from_errors(errors)
}

/// Validates the visible fields of a section in declaration order, then reports
/// answers for fields the section does not define.
pub fn validate_section(
    section: &SectionSpec,
    answers: &SectionAnswers,
    ctx: &ValidationContext,
) -> ValidationResult {
    let visibility = resolve_visibility(section, answers, VisibilityMode::Hidden);
    let mut result = ValidationResult::ok();

    for field in &section.fields {
        if !visibility.get(&field.id).copied().unwrap_or(true) {
            continue;
        }

        match answers.get(&field.id).filter(|value| !value.is_blank()) {
            None => {
                if field.required {
                    result.push(ValidationError::new(
                        Some(field.id.as_str()),
                        "required",
                        format!("'{}' is required", field.label),
                    ));
                }
            }
            Some(value) => result.extend(validate_field(field, value, ctx)),
        }
    }

    for field_id in answers.keys() {
        if section.field(field_id).is_none() {
            result.push(ValidationError::new(
                Some(field_id.as_str()),
                "unknown_field",
                format!("section '{}' has no field '{}'", section.id, field_id),
            ));
        }
    }

    result
}

fn non_empty_errors(id: Option<&str>, value: &str) -> Vec<ValidationError> {
    if value.trim().is_empty() {
        vec![ValidationError::new(id, "empty", "value must not be empty")]
    } else {
        Vec::new()
    }
}

fn email_errors(id: Option<&str>, value: &str) -> Vec<ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return non_empty_errors(id, value);
    }
    match Regex::new(EMAIL_PATTERN) {
        Ok(regex) if regex.is_match(value) => Vec::new(),
        _ => vec![ValidationError::new(
            id,
            "invalid_email",
            format!("'{}' is not a valid email address", value),
        )],
    }
}

/// Spaces, dashes, dots and parentheses are ignored.
fn phone_errors(id: Option<&str>, value: &str) -> Vec<ValidationError> {
    let normalized: String = value
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if normalized.is_empty() {
        return non_empty_errors(id, &normalized);
    }
    match Regex::new(PHONE_PATTERN) {
        Ok(regex) if regex.is_match(&normalized) => Vec::new(),
        _ => vec![ValidationError::new(
            id,
            "invalid_phone",
            format!("'{}' is not a valid phone number", value.trim()),
        )],
    }
}

fn cnp_errors(id: Option<&str>, value: &str, strict: bool) -> Vec<ValidationError> {
    let parsed = if strict {
        Cnp::parse_strict(value)
    } else {
        Cnp::parse(value)
    };
    match parsed {
        Ok(_) => Vec::new(),
        Err(err) => vec![ValidationError::new(id, "invalid_cnp", err.to_string())],
    }
}

fn date_errors(
    id: Option<&str>,
    value: &str,
    not_before: Option<NaiveDate>,
    not_after: Option<NaiveDate>,
) -> Vec<ValidationError> {
    let Some(date) = parse_date(value) else {
        return vec![ValidationError::new(
            id,
            "invalid_date",
            format!("'{}' is not a date (expected YYYY-MM-DD)", value.trim()),
        )];
    };

    let mut errors = Vec::new();
    if let Some(limit) = not_before
        && date < limit
    {
        errors.push(ValidationError::new(
            id,
            "date_too_early",
            format!("date must not be before {}", limit),
        ));
    }
    if let Some(limit) = not_after
        && date > limit
    {
        errors.push(ValidationError::new(
            id,
            "date_in_future",
            format!("date must not be after {}", limit),
        ));
    }
    errors
}

fn choice_errors(field: &FieldSpec, value: &str) -> Vec<ValidationError> {
    let known = field
        .choices
        .as_ref()
        .is_some_and(|choices| choices.iter().any(|choice| choice == value));
    if known {
        Vec::new()
    } else {
        vec![ValidationError::new(
            Some(field.id.as_str()),
            "invalid_choice",
            format!("'{}' is not one of the allowed options", value),
        )]
    }
}

fn constraint_errors(
    field: &FieldSpec,
    value: &str,
    constraint: &Constraint,
) -> Vec<ValidationError> {
    let id = Some(field.id.as_str());
    let length = value.trim().chars().count();
    let mut errors = Vec::new();

    if let Some(min_len) = constraint.min_len
        && length < min_len
    {
        errors.push(ValidationError::new(
            id,
            "min_length",
            format!("must be at least {} characters", min_len),
        ));
    }

    if let Some(max_len) = constraint.max_len
        && length > max_len
    {
        errors.push(ValidationError::new(
            id,
            "max_length",
            format!("must be at most {} characters", max_len),
        ));
    }

    if let Some(pattern) = &constraint.pattern
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(value.trim())
    {
        errors.push(ValidationError::new(
            id,
            "pattern_mismatch",
            "value does not match the expected format",
        ));
    }

    errors
}

fn type_mismatch(field: &FieldSpec) -> ValidationError {
    let expected = if field.kind.expects_flag() {
        "a yes/no answer"
    } else {
        "a text answer"
    };
    ValidationError::new(
        Some(field.id.as_str()),
        "type_mismatch",
        format!("expected {}", expected),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ValidationContext {
        ValidationContext::on(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
    }

    #[test]
    fn email_accepts_common_addresses() {
        assert!(validate_email("ana.pop@clinic.ro").valid);
        assert!(!validate_email("ana.pop@clinic").valid);
        assert!(!validate_email("ana pop@clinic.ro").valid);
        assert_eq!(validate_email("").errors[0].code, "empty");
    }

    #[test]
    fn phone_ignores_separators() {
        assert!(validate_phone("0722 123 456").valid);
        assert!(validate_phone("+40 (722) 123-456").valid);
        assert!(!validate_phone("12345").valid);
        assert!(!validate_phone("07221234ab").valid);
    }

    #[test]
    fn date_accepts_both_formats() {
        assert!(validate_date("2020-02-29", None, None).valid);
        assert!(validate_date("29.02.2020", None, None).valid);
        assert_eq!(validate_date("2021-02-29", None, None).errors[0].code, "invalid_date");
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let today = ctx().today;
        assert!(validate_date("2024-05-20", None, Some(today)).valid);
        let result = validate_date("2024-05-21", None, Some(today));
        assert_eq!(result.errors[0].code, "date_in_future");
        let floor = NaiveDate::from_ymd_opt(1900, 1, 1);
        assert_eq!(
            validate_date("1899-12-31", floor, None).errors[0].code,
            "date_too_early"
        );
    }

    #[test]
    fn cnp_examples() {
        assert!(validate_cnp("1850101123456").valid);
        let result = validate_cnp("abc");
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
        assert!(!validate_cnp_strict("1850101123456").valid);
    }

    #[test]
    fn boolean_field_rejects_text() {
        let field = FieldSpec::new("smoker", FieldType::Boolean, "Smoker");
        let result = validate_field(&field, &FieldValue::text("yes"), &ctx());
        assert_eq!(result.errors[0].code, "type_mismatch");
    }

    #[test]
    fn consent_must_be_accepted() {
        let field = FieldSpec::new("gdpr", FieldType::Boolean, "Consent").with_constraint(Constraint {
            must_accept: true,
            ..Constraint::default()
        });
        assert!(validate_field(&field, &FieldValue::Bool(true), &ctx()).valid);
        let result = validate_field(&field, &FieldValue::Bool(false), &ctx());
        assert_eq!(result.errors[0].code, "not_accepted");
    }

    #[test]
    fn constraints_run_after_kind_checks() {
        let field = FieldSpec::new("weeks", FieldType::Text, "Weeks").with_constraint(Constraint {
            pattern: Some(r"^\d{1,2}$".into()),
            ..Constraint::default()
        });
        assert!(validate_field(&field, &FieldValue::text("12"), &ctx()).valid);
        let result = validate_field(&field, &FieldValue::text("twelve"), &ctx());
        assert_eq!(result.errors[0].code, "pattern_mismatch");
    }

    #[test]
    fn choice_must_be_listed() {
        let field = FieldSpec::new("reason", FieldType::Choice, "Reason").with_choices(&["pain", "checkup"]);
        assert!(validate_field(&field, &FieldValue::text("pain"), &ctx()).valid);
        assert_eq!(
            validate_field(&field, &FieldValue::text("other"), &ctx()).errors[0].code,
            "invalid_choice"
        );
    }
}
