//! Keyword-driven clinical risk classification.
//!
//! The aggregator is a pure function of the form state: it never mutates the
//! answers and always reports findings in section, field, rule order, so two
//! runs over identical state produce identical profiles.

use std::collections::{BTreeMap, BTreeSet};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{FieldValue, FormState};
use crate::spec::questionnaire::{QuestionnaireSpec, SpecError};

/// Risk tiers ordered `Minimal < Medium < High`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Minimal,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Minimal => "minimal",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Keywords mapped to a tier. Keywords are split into words the same way
/// answers are, and each word is a glob. A single-word keyword matches any
/// word of an answer; longer keywords such as `beta-blocant` or
/// `tensiune mar*` must match consecutive words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RiskRule {
    pub label: String,
    pub tier: RiskTier,
    pub keywords: Vec<String>,
}

impl RiskRule {
    fn new(label: &str, tier: RiskTier, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            tier,
            keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RiskRules {
    pub rules: Vec<RiskRule>,
}

impl RiskRules {
    /// Table used when a questionnaire does not ship its own.
    pub fn dental_defaults() -> Self {
        use RiskTier::{High, Medium};

        let rules = vec![
            RiskRule::new(
                "anticoagulant therapy",
                High,
                &[
                    "anticoagul*",
                    "warfarin*",
                    "acenocumarol*",
                    "sintrom*",
                    "trombostop*",
                    "rivaroxaban*",
                    "xarelto*",
                    "apixaban*",
                    "eliquis*",
                    "dabigatran*",
                    "pradaxa*",
                    "heparin*",
                    "clopidogrel*",
                    "plavix*",
                ],
            ),
            RiskRule::new(
                "bisphosphonate therapy",
                High,
                &[
                    "bisfosfonat*",
                    "bisphosphonat*",
                    "alendronat*",
                    "zoledron*",
                    "ibandronat*",
                    "risedronat*",
                ],
            ),
            RiskRule::new(
                "cardiac disease",
                High,
                &[
                    "cardiac*",
                    "cardiopat*",
                    "infarct*",
                    "pacemaker",
                    "stimulator",
                    "endocardit*",
                    "valvulopat*",
                    "heart",
                ],
            ),
            RiskRule::new("diabetes", High, &["diabet*"]),
            RiskRule::new(
                "bleeding disorder",
                High,
                &[
                    "hemofil*",
                    "hemophil*",
                    "haemophil*",
                    "coagulopat*",
                    "trombocitopen*",
                    "thrombocytopen*",
                ],
            ),
            RiskRule::new(
                "infectious disease",
                High,
                &["hepatit*", "hiv", "sida", "aids", "tuberculo*", "tbc"],
            ),
            RiskRule::new(
                "anaesthetic allergy",
                High,
                &[
                    "lidocain*",
                    "articain*",
                    "ubistesin*",
                    "xilina",
                    "anestez*",
                    "anesthe*",
                    "anaesthe*",
                ],
            ),
            RiskRule::new(
                "penicillin allergy",
                High,
                &["penicil*", "amoxicil*", "augmentin*"],
            ),
            RiskRule::new(
                "allergy",
                Medium,
                &[
                    "alerg*",
                    "allerg*",
                    "latex",
                    "iod",
                    "iodine",
                    "aspirin*",
                    "ibuprofen*",
                    "nurofen*",
                    "sulfamid*",
                    "sulfonamid*",
                ],
            ),
            RiskRule::new("asthma", Medium, &["astm*", "asthma*"]),
            RiskRule::new(
                "hypertension",
                Medium,
                &["hipertens*", "hypertens*", "high blood pressure", "tensiune mare"],
            ),
            RiskRule::new("epilepsy", Medium, &["epilep*", "convuls*"]),
            RiskRule::new("thyroid disease", Medium, &["tiroid*", "thyroid*"]),
            RiskRule::new(
                "smoking",
                Medium,
                &["fumat*", "fumator*", "smok*", "tutun", "tobacco", "cigar*"],
            ),
            RiskRule::new("pregnancy", Medium, &["sarcin*", "pregnan*", "gravid*"]),
        ];

        Self { rules }
    }

    pub fn check(&self) -> Result<(), SpecError> {
        compile_rules(self).map(|_| ())
    }
}

/// One answer that contributed to the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub section_id: String,
    pub field_id: String,
    pub label: String,
    pub tier: RiskTier,
    /// The word or phrase that matched, `yes` for flag fields.
    pub matched: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub tier: RiskTier,
    pub findings: Vec<RiskFinding>,
}

impl RiskProfile {
    fn from_findings(findings: Vec<RiskFinding>) -> Self {
        let tier = findings
            .iter()
            .map(|finding| finding.tier)
            .max()
            .unwrap_or_default();
        Self { tier, findings }
    }

    /// Distinct finding labels in first-seen order.
    pub fn labels(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.findings
            .iter()
            .filter(|finding| seen.insert(finding.label.as_str()))
            .map(|finding| finding.label.as_str())
            .collect()
    }
}

struct CompiledRule {
    label: String,
    tier: RiskTier,
    words: GlobSet,
    phrases: Vec<Vec<GlobMatcher>>,
}

impl CompiledRule {
    fn find_match(&self, words: &[String]) -> Option<String> {
        if let Some(word) = words.iter().find(|word| self.words.is_match(word.as_str())) {
            return Some(word.clone());
        }
        self.phrases.iter().find_map(|phrase| {
            words
                .windows(phrase.len())
                .find(|window| {
                    window
                        .iter()
                        .zip(phrase)
                        .all(|(word, glob)| glob.is_match(word.as_str()))
                })
                .map(|window| window.join(" "))
        })
    }
}

type FieldKey = (String, String);

/// Compiled rule table plus the questionnaire fields it reads.
pub struct RiskAggregator {
    rules: Vec<CompiledRule>,
    scanned: BTreeSet<FieldKey>,
    flags: BTreeMap<FieldKey, (RiskTier, String)>,
}

impl RiskAggregator {
    pub fn from_spec(spec: &QuestionnaireSpec) -> Result<Self, SpecError> {
        let mut aggregator = Self::new(&spec.risk_rules())?;
        for section in &spec.sections {
            for field in &section.fields {
                let key = (section.id.clone(), field.id.clone());
                if field.risk_scan {
                    aggregator.scanned.insert(key.clone());
                }
                if let Some(tier) = field.risk_if_true {
                    aggregator.flags.insert(key, (tier, field.label.clone()));
                }
            }
        }
        Ok(aggregator)
    }

    /// Aggregator that reads no fields until some are registered.
    pub fn new(rules: &RiskRules) -> Result<Self, SpecError> {
        Ok(Self {
            rules: compile_rules(rules)?,
            scanned: BTreeSet::new(),
            flags: BTreeMap::new(),
        })
    }

    pub fn scan_field(mut self, section_id: &str, field_id: &str) -> Self {
        self.scanned
            .insert((section_id.to_string(), field_id.to_string()));
        self
    }

    pub fn flag_field(mut self, section_id: &str, field_id: &str, tier: RiskTier, label: &str) -> Self {
        self.flags.insert(
            (section_id.to_string(), field_id.to_string()),
            (tier, label.to_string()),
        );
        self
    }

    pub fn assess(&self, state: &FormState) -> RiskProfile {
        let mut findings = Vec::new();

        for (section_id, answers) in state.iter() {
            for (field_id, value) in answers {
                let key = (section_id.to_string(), field_id.clone());

                if let Some((tier, label)) = self.flags.get(&key)
                    && value.as_bool() == Some(true)
                {
                    findings.push(RiskFinding {
                        section_id: section_id.to_string(),
                        field_id: field_id.clone(),
                        label: label.clone(),
                        tier: *tier,
                        matched: "yes".to_string(),
                    });
                }

                if !self.scanned.contains(&key) {
                    continue;
                }
                let FieldValue::Text(text) = value else {
                    continue;
                };
                let words = normalize_words(text);
                for rule in &self.rules {
                    if let Some(matched) = rule.find_match(&words) {
                        findings.push(RiskFinding {
                            section_id: section_id.to_string(),
                            field_id: field_id.clone(),
                            label: rule.label.clone(),
                            tier: rule.tier,
                            matched,
                        });
                    }
                }
            }
        }

        RiskProfile::from_findings(findings)
    }
}

fn compile_rules(rules: &RiskRules) -> Result<Vec<CompiledRule>, SpecError> {
    rules.rules.iter().map(compile_rule).collect()
}

fn compile_rule(rule: &RiskRule) -> Result<CompiledRule, SpecError> {
    if rule.keywords.is_empty() {
        return Err(SpecError::EmptyRule(rule.label.clone()));
    }

    let mut builder = GlobSetBuilder::new();
    let mut phrases = Vec::new();
    for keyword in &rule.keywords {
        let tokens = keyword_tokens(keyword);
        match tokens.as_slice() {
            [] => {
                return Err(SpecError::Pattern {
                    pattern: keyword.clone(),
                    message: "keyword has no letters or digits".to_string(),
                });
            }
            [word] => {
                builder.add(compile_token(keyword, word)?);
            }
            words => {
                let phrase = words
                    .iter()
                    .map(|word| compile_token(keyword, word).map(|glob| glob.compile_matcher()))
                    .collect::<Result<Vec<_>, _>>()?;
                phrases.push(phrase);
            }
        }
    }
    let words = builder.build().map_err(|err| SpecError::Pattern {
        pattern: rule.label.clone(),
        message: err.to_string(),
    })?;

    Ok(CompiledRule {
        label: rule.label.clone(),
        tier: rule.tier,
        words,
        phrases,
    })
}

/// Splits a keyword like an answer, keeping the glob wildcards `*` and `?`.
fn keyword_tokens(keyword: &str) -> Vec<String> {
    keyword
        .chars()
        .map(fold_char)
        .collect::<String>()
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '*' || ch == '?'))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

fn compile_token(keyword: &str, token: &str) -> Result<Glob, SpecError> {
    GlobBuilder::new(token)
        .case_insensitive(true)
        .build()
        .map_err(|err| SpecError::Pattern {
            pattern: keyword.to_string(),
            message: err.to_string(),
        })
}

/// Lowercases, strips Romanian diacritics and splits on anything that is not a letter or digit.
pub fn normalize_words(text: &str) -> Vec<String> {
    text.chars()
        .map(fold_char)
        .collect::<String>()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold_char(ch: char) -> char {
    match ch {
        'ă' | 'â' | 'Ă' | 'Â' => 'a',
        'î' | 'Î' => 'i',
        'ș' | 'ş' | 'Ș' | 'Ş' => 's',
        'ț' | 'ţ' | 'Ț' | 'Ţ' => 't',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> RiskAggregator {
        RiskAggregator::new(&RiskRules::dental_defaults())
            .expect("default rules compile")
            .scan_field("allergies", "allergy_details")
            .scan_field("general_health", "chronic_conditions")
            .flag_field("pregnancy", "pregnant", RiskTier::Medium, "pregnancy")
    }

    #[test]
    fn empty_state_is_minimal() {
        let profile = aggregator().assess(&FormState::new());
        assert_eq!(profile.tier, RiskTier::Minimal);
        assert!(profile.findings.is_empty());
    }

    #[test]
    fn penicillin_and_diabetes_is_high() {
        let state = FormState::new()
            .with_section("allergies", [("allergy_details", "penicillin")])
            .with_section("general_health", [("chronic_conditions", "diabetes")]);
        let profile = aggregator().assess(&state);
        assert_eq!(profile.tier, RiskTier::High);
        assert_eq!(profile.labels(), vec!["penicillin allergy", "diabetes"]);
    }

    #[test]
    fn diacritics_and_case_are_ignored() {
        let state = FormState::new()
            .with_section("general_health", [("chronic_conditions", "Hipertensiune, ASTM bronșic")]);
        let profile = aggregator().assess(&state);
        assert_eq!(profile.tier, RiskTier::Medium);
        assert_eq!(profile.labels(), vec!["asthma", "hypertension"]);
    }

    #[test]
    fn phrases_need_consecutive_words() {
        let state = FormState::new()
            .with_section("general_health", [("chronic_conditions", "high blood pressure")]);
        assert_eq!(aggregator().assess(&state).tier, RiskTier::Medium);

        let state = FormState::new()
            .with_section("general_health", [("chronic_conditions", "blood is high pressure")]);
        assert_eq!(aggregator().assess(&state).tier, RiskTier::Minimal);
    }

    #[test]
    fn unscanned_fields_are_ignored() {
        let state = FormState::new().with_section("contact", [("address", "Str. Diabetului 3")]);
        assert_eq!(aggregator().assess(&state).tier, RiskTier::Minimal);
    }

    #[test]
    fn flag_fields_count_only_when_true() {
        let yes = FormState::new().with_section("pregnancy", [("pregnant", true)]);
        let no = FormState::new().with_section("pregnancy", [("pregnant", false)]);
        assert_eq!(aggregator().assess(&yes).tier, RiskTier::Medium);
        assert_eq!(aggregator().assess(&no).tier, RiskTier::Minimal);
    }

    #[test]
    fn rule_without_keywords_is_rejected() {
        let rules = RiskRules {
            rules: vec![RiskRule::new("empty", RiskTier::High, &[])],
        };
        assert!(matches!(rules.check(), Err(SpecError::EmptyRule(_))));
    }

    fn custom(keyword: &str) -> RiskAggregator {
        let rules = RiskRules {
            rules: vec![RiskRule::new("custom", RiskTier::High, &[keyword])],
        };
        RiskAggregator::new(&rules)
            .expect("rule compiles")
            .scan_field("medications", "current_medications")
    }

    fn medications(text: &str) -> FormState {
        FormState::new().with_section("medications", [("current_medications", text)])
    }

    #[test]
    fn punctuated_keywords_match_like_answers() {
        let profile = custom("beta-blocant").assess(&medications("iau beta-blocant zilnic"));
        assert_eq!(profile.tier, RiskTier::High);
        assert_eq!(profile.findings[0].matched, "beta blocant");

        assert_eq!(
            custom("crohn's").assess(&medications("Boala Crohn's")).tier,
            RiskTier::High
        );
        assert_eq!(
            custom("beta-blocant").assess(&medications("beta si blocant")).tier,
            RiskTier::Minimal
        );
    }

    #[test]
    fn phrase_words_keep_wildcards() {
        let aggregator = custom("tensiune mar*");
        assert_eq!(
            aggregator.assess(&medications("tensiune mare")).tier,
            RiskTier::High
        );
        assert_eq!(
            aggregator.assess(&medications("tensiune mica")).tier,
            RiskTier::Minimal
        );
    }

    #[test]
    fn keyword_without_words_is_rejected() {
        let rules = RiskRules {
            rules: vec![RiskRule::new("dashes", RiskTier::High, &["--"])],
        };
        assert!(matches!(rules.check(), Err(SpecError::Pattern { .. })));
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(RiskTier::High > RiskTier::Medium);
        assert!(RiskTier::Medium > RiskTier::Minimal);
    }
}
