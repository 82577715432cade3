use serde_json::json;

use intake_spec::{FormState, QuestionnaireSpec, RiskAggregator, RiskRules, RiskTier, SpecError};

fn clinic_form(rules: serde_json::Value) -> Result<QuestionnaireSpec, SpecError> {
    let form = json!({
        "id": "clinic",
        "title": "Clinic",
        "version": "1",
        "sections": [
            { "id": "health", "title": "Health", "fields": [
                { "id": "conditions", "type": "text", "label": "Conditions", "risk_scan": true }
            ]}
        ],
        "risk_rules": rules
    });
    QuestionnaireSpec::from_json(&form.to_string())
}

fn conditions(text: &str) -> FormState {
    FormState::new().with_section("health", [("conditions", text)])
}

#[test]
fn questionnaire_rules_replace_the_dental_table() {
    let spec = clinic_form(json!([
        { "label": "beta blockers", "tier": "high", "keywords": ["beta-blocant*"] }
    ]))
    .expect("valid questionnaire");
    assert_ne!(spec.risk_rules(), RiskRules::dental_defaults());

    let aggregator = RiskAggregator::from_spec(&spec).expect("rules compile");

    let profile = aggregator.assess(&conditions("iau beta-blocante zilnic"));
    assert_eq!(profile.tier, RiskTier::High);
    assert_eq!(profile.labels(), vec!["beta blockers"]);

    let profile = aggregator.assess(&conditions("diabet zaharat tip 2"));
    assert_eq!(profile.tier, RiskTier::Minimal);
    assert!(profile.findings.is_empty());
}

#[test]
fn questionnaire_rules_are_checked_on_load() {
    let err = clinic_form(json!([
        { "label": "punctuation", "tier": "medium", "keywords": ["..."] }
    ]))
    .unwrap_err();
    assert!(matches!(err, SpecError::Pattern { pattern, .. } if pattern == "..."));
}
