use chrono::NaiveDate;

use intake_spec::{
    InMemoryPatientStore, MemorySink, Patient, RenderStatus, WizardSession, build_render_payload,
    dental_intake, render_json_ui, render_text,
};

fn session(patient_id: &str) -> WizardSession<MemorySink> {
    let patients: Vec<Patient> =
        serde_json::from_str(include_str!("fixtures/patients.json")).expect("patients");
    let store: InMemoryPatientStore = patients.into_iter().collect();
    WizardSession::start_on(
        dental_intake().expect("questionnaire"),
        &store,
        patient_id,
        MemorySink::new(),
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
    )
    .expect("session")
}

#[test]
fn text_render_lists_first_section() {
    let wizard = session("p-200");
    let payload = build_render_payload(&wizard).expect("payload");
    assert_eq!(payload.status, RenderStatus::NeedInput);

    let text = render_text(&payload);
    assert!(text.contains("Questionnaire: Dental clinic patient questionnaire (dental-intake v1.2.0)"));
    assert!(text.contains("Status: need_input (0/8)"));
    assert!(text.contains("Section 1/8: Personal details"));
    assert!(text.contains("Welcome, Maria Ionescu."));
    assert!(text.contains(" - cnp (Personal numeric code (CNP)) [required]"));
    assert!(text.contains("Risk: minimal"));
}

#[test]
fn male_patient_sees_seven_steps() {
    let wizard = session("p-100");
    let text = render_text(&build_render_payload(&wizard).expect("payload"));
    assert!(text.contains("Section 1/7: Personal details"));
}

#[test]
fn json_render_marks_hidden_fields() {
    let mut wizard = session("p-100");
    wizard.answer("cnp", "1850101123456").unwrap();
    wizard.answer("birth_date", "1985-01-01").unwrap();
    wizard.advance().unwrap();
    wizard.answer("email", "ion@example.ro").unwrap();
    wizard.answer("phone", "0721000111").unwrap();
    wizard.answer("address", "Str. Lunga 1, Brasov").unwrap();
    wizard.advance().unwrap();
    wizard.answer("chronic_conditions", "hipertensiune").unwrap();
    wizard.answer("under_treatment", false).unwrap();
    wizard.advance().unwrap();

    let ui = render_json_ui(&build_render_payload(&wizard).expect("payload"));
    assert_eq!(ui["status"], "need_input");
    assert_eq!(ui["section"]["id"], "allergies");
    assert_eq!(ui["section"]["step"], 4);
    assert_eq!(ui["progress"]["committed"], 3);
    assert_eq!(ui["progress"]["total"], 7);
    assert_eq!(ui["fields"][0]["id"], "has_allergies");
    assert_eq!(ui["fields"][0]["visible"], true);
    assert_eq!(ui["fields"][1]["id"], "allergy_details");
    assert_eq!(ui["fields"][1]["visible"], false);
    assert_eq!(ui["risk"]["tier"], "medium");
    assert_eq!(ui["risk"]["labels"][0], "hypertension");

    wizard.answer("has_allergies", true).unwrap();
    let ui = render_json_ui(&build_render_payload(&wizard).expect("payload"));
    assert_eq!(ui["fields"][0]["current_value"], true);
    assert_eq!(ui["fields"][1]["visible"], true);
}

#[test]
fn submitted_session_has_no_section() {
    let mut wizard = session("p-100");
    let answers: serde_json::Value =
        serde_json::from_str(include_str!("fixtures/answers.json")).expect("answers");
    while let Some(section) = wizard.current_section() {
        let section_id = section.id.clone();
        if let Some(fields) = answers[&section_id].as_object() {
            for (field_id, value) in fields {
                let value: intake_spec::FieldValue =
                    serde_json::from_value(value.clone()).expect("value");
                wizard.answer(field_id, value).unwrap();
            }
        }
        wizard.advance().unwrap();
    }

    let payload = build_render_payload(&wizard).expect("payload");
    assert_eq!(payload.status, RenderStatus::Submitted);
    let ui = render_json_ui(&payload);
    assert!(ui["section"].is_null());
    assert_eq!(ui["fields"].as_array().map(Vec::len), Some(0));
    assert_eq!(ui["risk"]["tier"], "high");
    assert!(render_text(&payload).contains("All applicable sections are answered."));
}
