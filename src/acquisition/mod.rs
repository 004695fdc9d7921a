//! Simulated knowledge-acquisition interviews.
//!
//! Each [`Scenario`] scripts an expert's answers. Asking a question yields the
//! base answer plus any keyword-triggered additions, and the rule the scenario
//! is meant to elicit is recorded as captured through the repository.

use miette::Diagnostic;
use thiserror::Error;

use crate::knowledge::{KnowledgeRepository, Rule, Scenario};

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum AcquisitionError {
    #[error("unknown acquisition scenario: \"{id}\"")]
    #[diagnostic(
        code(akh::acquisition::unknown_scenario),
        help("Available scenarios: {available}")
    )]
    UnknownScenario { id: String, available: String },

    #[error("the dataset has no acquisition scenarios")]
    #[diagnostic(
        code(akh::acquisition::no_scenarios),
        help("Add entries to `acquisition_scenarios` in the dataset.")
    )]
    NoScenarios,
}

pub type AcquisitionResult<T> = std::result::Result<T, AcquisitionError>;

// ── Expert answers ──────────────────────────────────────────────────────

/// Answer given when a scenario scripts nothing for the question.
pub const FALLBACK_ANSWER: &str = "I would need more technical context to answer with certainty.";

/// Question asked when a scenario suggests none.
pub const GENERIC_QUESTION: &str = "What would you check first, and why?";

/// The first suggested question of a scenario, or [`GENERIC_QUESTION`].
pub fn default_question(scenario: &Scenario) -> &str {
    scenario
        .suggested_questions
        .first()
        .map(String::as_str)
        .unwrap_or(GENERIC_QUESTION)
}

/// The simulated expert's reply to `question`.
///
/// Keywords match case-insensitively anywhere in the question. Identical
/// additions are included once.
pub fn expert_answer(scenario: &Scenario, question: &str) -> String {
    let question = question.to_lowercase();
    let mut parts: Vec<&str> = Vec::new();
    if !scenario.base_answer.is_empty() {
        parts.push(&scenario.base_answer);
    }

    let mut extras: Vec<&str> = Vec::new();
    for (keyword, answer) in &scenario.keyword_answers {
        if question.contains(&keyword.to_lowercase()) && !extras.contains(&answer.as_str()) {
            extras.push(answer);
        }
    }
    parts.extend(extras);

    if parts.is_empty() {
        FALLBACK_ANSWER.to_string()
    } else {
        parts.join(" ")
    }
}

/// A rule in `IF ... THEN ...` form.
pub fn describe_rule(rule: &Rule) -> String {
    let conditions = if rule.conditions.is_empty() {
        "(no conditions)".to_string()
    } else {
        rule.conditions.join(" AND ")
    };
    format!(
        "IF {conditions}\nTHEN {} (certainty: {})",
        rule.conclusion, rule.certainty
    )
}

// ── Interview ───────────────────────────────────────────────────────────

/// What happened during one interview turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewOutcome {
    pub scenario_id: String,
    pub question: String,
    pub answer: String,
    /// The rule the scenario elicits, when it names one.
    pub captured_rule: Option<String>,
    /// `false` when the rule had been captured before or is unknown.
    pub newly_captured: bool,
}

/// Runs interview turns against a repository, capturing rules as it goes.
pub struct Interview<'r, R: KnowledgeRepository + ?Sized> {
    repo: &'r mut R,
}

impl<'r, R: KnowledgeRepository + ?Sized> Interview<'r, R> {
    pub fn new(repo: &'r mut R) -> Self {
        Self { repo }
    }

    /// Ask one question in one scenario. A missing or blank question falls
    /// back to [`default_question`].
    pub fn conduct(
        &mut self,
        scenario_id: &str,
        question: Option<&str>,
    ) -> AcquisitionResult<InterviewOutcome> {
        let snapshot = self.repo.snapshot();
        if snapshot.scenarios.is_empty() {
            return Err(AcquisitionError::NoScenarios);
        }
        let scenario = snapshot.scenario(scenario_id.trim()).ok_or_else(|| {
            AcquisitionError::UnknownScenario {
                id: scenario_id.to_string(),
                available: snapshot
                    .scenarios
                    .iter()
                    .map(|s| s.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| default_question(scenario))
            .to_string();
        let answer = expert_answer(scenario, &question);
        let scenario_id = scenario.id.clone();
        let captured_rule = scenario.extracted_rule.clone();

        let newly_captured = match &captured_rule {
            Some(rule_id) => self.repo.mark_captured(rule_id),
            None => {
                tracing::warn!(scenario = %scenario_id, "scenario names no extracted rule");
                false
            }
        };

        tracing::debug!(
            scenario = %scenario_id,
            rule = captured_rule.as_deref().unwrap_or("-"),
            newly_captured,
            "interview turn complete"
        );

        Ok(InterviewOutcome {
            scenario_id,
            question,
            answer,
            captured_rule,
            newly_captured,
        })
    }

    /// Walk every scenario once with its default question.
    pub fn run_all(&mut self) -> AcquisitionResult<Vec<InterviewOutcome>> {
        if self.repo.snapshot().scenarios.is_empty() {
            return Err(AcquisitionError::NoScenarios);
        }
        let ids: Vec<String> = self
            .repo
            .snapshot()
            .scenarios
            .iter()
            .map(|s| s.id.clone())
            .collect();
        ids.iter().map(|id| self.conduct(id, None)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{KnowledgeSnapshot, MemoryRepository};

    fn scenario() -> Scenario {
        Scenario {
            id: "SCN_01".into(),
            context: "The pack loses range in cold weather.".into(),
            suggested_questions: vec!["What happens to the impedance when it is cold?".into()],
            base_answer: "Check the interface resistance first.".into(),
            keyword_answers: vec![
                ("Impedance".into(), "Impedance above 50 mOhm is abnormal.".into()),
                ("cold".into(), "Below 0 C the electrolyte conducts poorly.".into()),
                ("temperature".into(), "Below 0 C the electrolyte conducts poorly.".into()),
            ],
            extracted_rule: Some("R1".into()),
        }
    }

    #[test]
    fn answer_combines_base_and_keywords() {
        let answer = expert_answer(&scenario(), "Does IMPEDANCE rise in the cold?");
        assert_eq!(
            answer,
            "Check the interface resistance first. Impedance above 50 mOhm is abnormal. \
             Below 0 C the electrolyte conducts poorly."
        );
    }

    #[test]
    fn duplicate_keyword_answers_appear_once() {
        let answer = expert_answer(&scenario(), "cold temperature");
        assert_eq!(
            answer.matches("Below 0 C").count(),
            1,
            "answer was: {answer}"
        );
    }

    #[test]
    fn fallback_when_nothing_scripted() {
        let empty = Scenario::default();
        assert_eq!(expert_answer(&empty, "anything?"), FALLBACK_ANSWER);
        assert_eq!(default_question(&empty), GENERIC_QUESTION);
    }

    #[test]
    fn keyword_only_answer() {
        let mut s = scenario();
        s.base_answer.clear();
        assert_eq!(expert_answer(&s, "impedance?"), "Impedance above 50 mOhm is abnormal.");
    }

    #[test]
    fn keyword_answers_follow_dataset_order() {
        let snapshot = KnowledgeSnapshot::from_json_str(
            r#"{"acquisition_scenarios": [
                {"id": "SCN_01", "keyword_answers": {"voltage": "V-answer.", "cold": "C-answer."}}
            ]}"#,
        )
        .unwrap();
        let scenario = snapshot.scenario("SCN_01").unwrap();
        assert_eq!(expert_answer(scenario, "voltage when cold"), "V-answer. C-answer.");
    }

    #[test]
    fn describe_rule_format() {
        let rule = Rule::new("R1", ["low_range", "cold_ambient"], "interface_degradation", 0.8);
        assert_eq!(
            describe_rule(&rule),
            "IF low_range AND cold_ambient\nTHEN interface_degradation (certainty: 0.8)"
        );
    }

    #[test]
    fn conduct_captures_rule_once() {
        let mut snapshot = KnowledgeSnapshot::with_rules(vec![Rule::new("R1", ["a"], "X", 0.5)]);
        snapshot.scenarios.push(scenario());
        let mut repo = MemoryRepository::new(snapshot);

        let mut interview = Interview::new(&mut repo);
        let first = interview.conduct("SCN_01", None).unwrap();
        assert_eq!(first.question, "What happens to the impedance when it is cold?");
        assert_eq!(first.captured_rule.as_deref(), Some("R1"));
        assert!(first.newly_captured);

        let second = interview.conduct("SCN_01", Some("  ")).unwrap();
        assert!(!second.newly_captured);
        assert_eq!(repo.captured_rules(), ["R1"]);
    }

    #[test]
    fn unknown_scenario_lists_available() {
        let mut snapshot = KnowledgeSnapshot::default();
        snapshot.scenarios.push(scenario());
        let mut repo = MemoryRepository::new(snapshot);
        let err = Interview::new(&mut repo).conduct("SCN_99", None).unwrap_err();
        assert!(
            matches!(err, AcquisitionError::UnknownScenario { ref available, .. } if available == "SCN_01")
        );
    }

    #[test]
    fn no_scenarios_is_an_error() {
        let mut repo = MemoryRepository::new(KnowledgeSnapshot::default());
        assert!(matches!(
            Interview::new(&mut repo).run_all(),
            Err(AcquisitionError::NoScenarios)
        ));
    }
}
