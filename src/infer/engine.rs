//! Rule evaluation and winner selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::knowledge::{KnowledgeSnapshot, Rule};

use super::{Diagnosis, InferenceResult, Outcome, SymptomSet, TraceEntry};

/// Stateless inference engine. The snapshot is passed into every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceEngine;

impl InferenceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Diagnose a set of raw symptom tokens.
    ///
    /// Rules are ranked by `(full match, certainty, specificity, score)`; among
    /// equal keys the rule that comes first in the snapshot wins. A diagnosis
    /// is bound only when the top-ranked rule matches completely. A rule whose
    /// id repeats an earlier rule's id is ignored.
    pub fn infer<I, S>(&self, snapshot: &KnowledgeSnapshot, symptoms: I) -> InferenceResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symptoms: SymptomSet = symptoms.into_iter().collect();

        let mut seen = HashSet::new();
        let eligible: Vec<&Rule> = snapshot
            .rules
            .iter()
            .filter(|r| r.is_eligible() && seen.insert(r.id.as_str()))
            .collect();
        let trace: Vec<TraceEntry> = eligible
            .iter()
            .map(|rule| Self::evaluate(rule, &symptoms))
            .collect();

        let mut best: Option<usize> = None;
        for (i, entry) in trace.iter().enumerate() {
            if best.is_none_or(|b| rank(entry, &trace[b]) == Ordering::Greater) {
                best = Some(i);
            }
        }

        let outcome = match best {
            Some(i) if trace[i].full_match => Outcome::Diagnosed(diagnosis_from(eligible[i])),
            _ => Outcome::NoDiagnosis,
        };

        tracing::debug!(
            symptoms = symptoms.len(),
            evaluated = trace.len(),
            full_matches = trace.iter().filter(|e| e.full_match).count(),
            winner = best.map(|i| trace[i].rule_id.as_str()).unwrap_or("-"),
            diagnosed = matches!(outcome, Outcome::Diagnosed(_)),
            "inference complete"
        );

        InferenceResult {
            outcome,
            trace,
            symptoms,
        }
    }

    /// Evaluate one rule against a symptom set.
    pub fn evaluate(rule: &Rule, symptoms: &SymptomSet) -> TraceEntry {
        let (matched, missing): (Vec<String>, Vec<String>) = rule
            .conditions
            .iter()
            .cloned()
            .partition(|condition| symptoms.contains(condition));

        let score = if rule.conditions.is_empty() {
            0.0
        } else {
            matched.len() as f32 / rule.conditions.len() as f32
        };

        TraceEntry {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            conclusion: rule.conclusion.clone(),
            full_match: missing.is_empty() && !matched.is_empty(),
            matched,
            missing,
            score,
            certainty: rule.certainty,
            specificity: rule.specificity(),
        }
    }
}

/// Selection order: full match, certainty, specificity, score.
fn rank(a: &TraceEntry, b: &TraceEntry) -> Ordering {
    a.full_match
        .cmp(&b.full_match)
        .then_with(|| a.certainty.total_cmp(&b.certainty))
        .then_with(|| a.specificity.cmp(&b.specificity))
        .then_with(|| a.score.total_cmp(&b.score))
}

fn diagnosis_from(rule: &Rule) -> Diagnosis {
    Diagnosis {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        conclusion: rule.conclusion.clone(),
        certainty: rule.certainty,
        failure_type: rule.failure_type.clone(),
        required_repairs: rule.required_repairs.clone(),
        client_explanation: rule.client_explanation.clone(),
        technical_explanation: rule.technical_explanation.clone(),
        conditions: rule.conditions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::NO_DIAGNOSIS;

    fn snapshot(rules: Vec<Rule>) -> KnowledgeSnapshot {
        KnowledgeSnapshot::with_rules(rules)
    }

    #[test]
    fn full_match_is_diagnosed() {
        let snap = snapshot(vec![Rule::new(
            "R1",
            ["overheat", "swelling"],
            "battery_fault",
            0.9,
        )]);
        let result = InferenceEngine::new().infer(&snap, ["overheat", "swelling", "noise"]);
        assert_eq!(result.label(), "battery_fault");
        let winner = result.winner_entry().unwrap();
        assert_eq!(winner.rule_id, "R1");
        assert_eq!(winner.score, 1.0);
        assert_eq!(result.symptoms.len(), 3);
    }

    #[test]
    fn partial_match_is_never_diagnosed() {
        let snap = snapshot(vec![Rule::new(
            "R1",
            ["overheat", "swelling"],
            "battery_fault",
            0.9,
        )]);
        let result = InferenceEngine::new().infer(&snap, ["overheat"]);
        assert_eq!(result.label(), NO_DIAGNOSIS);
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].matched, vec!["overheat"]);
        assert_eq!(result.trace[0].missing, vec!["swelling"]);
        assert_eq!(result.trace[0].score, 0.5);
    }

    #[test]
    fn specificity_breaks_certainty_tie() {
        let snap = snapshot(vec![
            Rule::new("R1", ["a"], "X", 0.5),
            Rule::new("R2", ["a", "b"], "Y", 0.5),
        ]);
        let result = InferenceEngine::new().infer(&snap, ["a", "b"]);
        assert_eq!(result.label(), "Y");
    }

    #[test]
    fn certainty_beats_specificity() {
        let snap = snapshot(vec![
            Rule::new("R1", ["a", "b"], "X", 0.6),
            Rule::new("R2", ["a"], "Y", 0.7),
        ]);
        let result = InferenceEngine::new().infer(&snap, ["a", "b"]);
        assert_eq!(result.label(), "Y");
    }

    #[test]
    fn equal_keys_keep_first_rule() {
        let snap = snapshot(vec![
            Rule::new("R1", ["a"], "X", 0.5),
            Rule::new("R2", ["a"], "Y", 0.5),
        ]);
        let result = InferenceEngine::new().infer(&snap, ["a"]);
        assert_eq!(result.diagnosis().unwrap().rule_id, "R1");
    }

    #[test]
    fn full_match_beats_more_certain_partial() {
        let snap = snapshot(vec![
            Rule::new("R1", ["a", "b"], "X", 0.99),
            Rule::new("R2", ["a"], "Y", 0.1),
        ]);
        let result = InferenceEngine::new().infer(&snap, ["a"]);
        assert_eq!(result.label(), "Y");
    }

    #[test]
    fn ineligible_rules_are_not_traced() {
        let snap = snapshot(vec![
            Rule::new("EMPTY", Vec::<String>::new(), "Z", 1.0),
            Rule::new("R1", ["a"], "X", 0.5),
        ]);
        let result = InferenceEngine::new().infer(&snap, ["a"]);
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].rule_id, "R1");
    }

    #[test]
    fn empty_symptoms_yield_no_diagnosis() {
        let snap = snapshot(vec![Rule::new("R1", ["a"], "X", 0.5)]);
        let result = InferenceEngine::new().infer(&snap, [" ", ""]);
        assert!(result.symptoms.is_empty());
        assert_eq!(result.label(), NO_DIAGNOSIS);
    }

    #[test]
    fn empty_rule_base_yields_no_diagnosis() {
        let result = InferenceEngine::new().infer(&KnowledgeSnapshot::default(), ["a"]);
        assert!(result.trace.is_empty());
        assert_eq!(result.label(), NO_DIAGNOSIS);
    }

    #[test]
    fn repeated_rule_id_is_traced_once() {
        let snap = KnowledgeSnapshot {
            rules: vec![
                Rule::new("R1", ["a"], "X", 0.5),
                Rule::new("R1", ["a"], "Y", 0.9),
            ],
            ..KnowledgeSnapshot::default()
        };
        let result = InferenceEngine::new().infer(&snap, ["a"]);
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.label(), "X");
        assert_eq!(result.trace.iter().filter(|e| result.is_winner(e)).count(), 1);
    }
}
