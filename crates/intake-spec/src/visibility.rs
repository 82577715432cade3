use crate::answers::SectionAnswers;
use crate::spec::section::SectionSpec;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// How fields whose condition cannot be decided yet are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    Visible,
    Hidden,
}

pub fn resolve_visibility(
    section: &SectionSpec,
    answers: &SectionAnswers,
    mode: VisibilityMode,
) -> VisibilityMap {
    let mut map = VisibilityMap::new();

    for field in &section.fields {
        let visible = if let Some(condition) = &field.visible_if {
            match condition.evaluate(answers) {
                Some(value) => value,
                None => match mode {
                    VisibilityMode::Visible => true,
                    VisibilityMode::Hidden => false,
                },
            }
        } else {
            true
        };
        map.insert(field.id.clone(), visible);
    }

    map
}

/// Keeps only the answers of fields that are visible and defined in the section.
pub fn prune_hidden(section: &SectionSpec, answers: &SectionAnswers) -> SectionAnswers {
    let visibility = resolve_visibility(section, answers, VisibilityMode::Hidden);
    answers
        .iter()
        .filter(|(field_id, value)| {
            visibility.get(*field_id).copied().unwrap_or(false) && !value.is_blank()
        })
        .map(|(field_id, value)| (field_id.clone(), value.clone()))
        .collect()
}
