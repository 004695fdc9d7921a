//! Single-step rule inference over a knowledge snapshot.
//!
//! [`InferenceEngine::infer`] evaluates every eligible rule against a symptom
//! set, records one [`TraceEntry`] per rule, and binds a diagnosis only when the
//! best-ranked rule matches completely.

pub mod engine;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::knowledge::rule::rule_label;

pub use engine::InferenceEngine;

/// Label of the outcome when no rule matched completely.
pub const NO_DIAGNOSIS: &str = "diagnosis_not_possible";

// ---------------------------------------------------------------------------
// Symptoms
// ---------------------------------------------------------------------------

/// Normalized observed symptoms: trimmed, non-empty, deduplicated, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymptomSet(BTreeSet<String>);

impl SymptomSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for SymptomSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|token| token.as_ref().trim().to_string())
                .filter(|token| !token.is_empty())
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Trace and result
// ---------------------------------------------------------------------------

/// How one rule fared against the symptom set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    /// The conclusion the rule would have produced.
    pub conclusion: String,
    /// Conditions present in the symptom set, in rule order.
    pub matched: Vec<String>,
    /// Conditions absent from the symptom set, in rule order.
    pub missing: Vec<String>,
    pub full_match: bool,
    /// `matched / conditions`.
    pub score: f32,
    pub certainty: f32,
    /// Number of conditions.
    pub specificity: usize,
}

impl TraceEntry {
    pub fn label(&self) -> String {
        rule_label(&self.rule_id, self.rule_name.as_deref())
    }
}

/// A diagnosis bound to its winning rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    pub conclusion: String,
    pub certainty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
    pub required_repairs: Vec<String>,
    pub client_explanation: String,
    pub technical_explanation: String,
    pub conditions: Vec<String>,
}

impl Diagnosis {
    pub fn rule_label(&self) -> String {
        rule_label(&self.rule_id, self.rule_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    NoDiagnosis,
    Diagnosed(Diagnosis),
}

/// Outcome of one inference call, with the trace and symptoms it used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub outcome: Outcome,
    /// One entry per eligible rule, in snapshot order.
    pub trace: Vec<TraceEntry>,
    pub symptoms: SymptomSet,
}

impl InferenceResult {
    /// The diagnosed conclusion, or [`NO_DIAGNOSIS`].
    pub fn label(&self) -> &str {
        match &self.outcome {
            Outcome::Diagnosed(diagnosis) => &diagnosis.conclusion,
            Outcome::NoDiagnosis => NO_DIAGNOSIS,
        }
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match &self.outcome {
            Outcome::Diagnosed(diagnosis) => Some(diagnosis),
            Outcome::NoDiagnosis => None,
        }
    }

    pub fn is_diagnosed(&self) -> bool {
        self.diagnosis().is_some()
    }

    /// Whether `entry` belongs to the winning rule.
    pub fn is_winner(&self, entry: &TraceEntry) -> bool {
        self.diagnosis()
            .is_some_and(|diagnosis| diagnosis.rule_id == entry.rule_id)
    }

    pub fn winner_entry(&self) -> Option<&TraceEntry> {
        self.trace.iter().find(|entry| self.is_winner(entry))
    }
}
