//! Type checking of relation triples against the vocabulary and the hierarchy.
//!
//! Each relation kind constrains what its destination may be:
//!
//! | kind              | destination must be in    | on miss |
//! |-------------------|---------------------------|---------|
//! | `symptom-of`      | symptoms ∪ concepts       | error   |
//! | `requires-repair` | repairs ∪ concepts        | error   |
//! | `causes`          | diagnoses ∪ concepts      | warning |
//! | anything else     | (not type-checked)        | warning |
//!
//! Origins are free-form domain labels more often than not, so an origin that
//! is neither a diagnosis nor a concept is only a warning.

use std::collections::BTreeSet;
use std::fmt;

use crate::knowledge::Vocabulary;

use super::{IssueKind, RelationTriple, RelationsInput, ValidationIssue};

/// The relation kinds the validator knows how to type-check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKind {
    SymptomOf,
    RequiresRepair,
    Causes,
    Other(String),
}

impl RelationKind {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "symptom-of" => Self::SymptomOf,
            "requires-repair" => Self::RequiresRepair,
            "causes" => Self::Causes,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SymptomOf => "symptom-of",
            Self::RequiresRepair => "requires-repair",
            Self::Causes => "causes",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors and warnings from one relation validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl RelationReport {
    fn push(&mut self, issue: ValidationIssue) {
        if issue.is_error() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Flatten into a single list, errors first.
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        let mut issues = self.errors;
        issues.extend(self.warnings);
        issues
    }
}

/// Validates relation triples against vocabularies and concept names.
#[derive(Debug, Clone, Copy)]
pub struct RelationValidator<'a> {
    allowed_kinds: Option<&'a BTreeSet<String>>,
    symptoms: &'a BTreeSet<String>,
    diagnoses: &'a BTreeSet<String>,
    repairs: &'a BTreeSet<String>,
    node_names: &'a BTreeSet<String>,
}

impl<'a> RelationValidator<'a> {
    pub fn new(vocabulary: &'a Vocabulary, node_names: &'a BTreeSet<String>) -> Self {
        Self {
            allowed_kinds: None,
            symptoms: &vocabulary.symptoms,
            diagnoses: &vocabulary.diagnoses,
            repairs: &vocabulary.repairs,
            node_names,
        }
    }

    /// Restrict relation kinds to an allow-list. An empty list counts as not configured.
    pub fn with_allowed_kinds(mut self, allowed: Option<&'a BTreeSet<String>>) -> Self {
        self.allowed_kinds = allowed.filter(|kinds| !kinds.is_empty());
        self
    }

    /// Validate relations as read from the dataset.
    ///
    /// A relations value that is not a list yields a single fatal error.
    pub fn validate_relations(&self, input: &RelationsInput) -> RelationReport {
        match input {
            RelationsInput::Malformed { found } => {
                let mut report = RelationReport::default();
                report.push(ValidationIssue::error(
                    IssueKind::InvalidRootShape,
                    format!("ontology relations must be a list, found {found}"),
                ));
                report
            }
            RelationsInput::Triples(triples) => self.validate_triples(triples),
        }
    }

    /// Validate each triple in order. Positions in messages are 1-based.
    pub fn validate_triples(&self, triples: &[RelationTriple]) -> RelationReport {
        let mut report = RelationReport::default();

        for (i, triple) in triples.iter().enumerate() {
            self.check_triple(i + 1, triple, &mut report);
        }

        tracing::debug!(
            triples = triples.len(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "relations validated"
        );
        report
    }

    fn check_triple(&self, pos: usize, triple: &RelationTriple, report: &mut RelationReport) {
        let missing: Vec<&str> = [
            ("origin", &triple.origin),
            ("relation_kind", &triple.relation_kind),
            ("destination", &triple.destination),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if !missing.is_empty() {
            report.push(ValidationIssue::error(
                IssueKind::DataShape,
                format!("relation #{pos} is missing {}", missing.join(", ")),
            ));
            return;
        }

        let kind = RelationKind::parse(&triple.relation_kind);

        if let Some(allowed) = self.allowed_kinds {
            if !allowed.contains(kind.as_str()) {
                report.push(ValidationIssue::error(
                    IssueKind::UnknownRelationKind,
                    format!(
                        "relation #{pos} {triple}: kind '{kind}' is not in allowed_relation_kinds"
                    ),
                ));
                return;
            }
        }

        let dest = triple.destination.trim();
        match &kind {
            RelationKind::SymptomOf => {
                if !self.known(self.symptoms, dest) {
                    report.push(ValidationIssue::error(
                        IssueKind::TypeMismatch,
                        format!(
                            "relation #{pos} {triple}: destination '{dest}' is not a known symptom or ontology concept"
                        ),
                    ));
                }
            }
            RelationKind::RequiresRepair => {
                if !self.known(self.repairs, dest) {
                    report.push(ValidationIssue::error(
                        IssueKind::TypeMismatch,
                        format!(
                            "relation #{pos} {triple}: destination '{dest}' is not a known repair or ontology concept"
                        ),
                    ));
                }
            }
            RelationKind::Causes => {
                if !self.known(self.diagnoses, dest) {
                    report.push(ValidationIssue::warning(
                        IssueKind::UnverifiedReference,
                        format!(
                            "relation #{pos} {triple}: destination '{dest}' is not a known diagnosis or ontology concept"
                        ),
                    ));
                }
            }
            RelationKind::Other(name) => {
                let message = if self.allowed_kinds.is_some() {
                    format!("relation #{pos} {triple}: kind '{name}' is allowed but not type-checked")
                } else {
                    format!(
                        "relation #{pos} {triple}: unrecognized kind '{name}' (no allowed_relation_kinds configured, not validated strictly)"
                    )
                };
                report.push(ValidationIssue::warning(IssueKind::UnknownRelationKind, message));
            }
        }

        let origin = triple.origin.trim();
        if !self.known(self.diagnoses, origin) {
            report.push(ValidationIssue::warning(
                IssueKind::UnverifiedReference,
                format!(
                    "relation #{pos} {triple}: origin '{origin}' is not a known diagnosis or ontology concept"
                ),
            ));
        }
    }

    fn known(&self, vocabulary: &BTreeSet<String>, label: &str) -> bool {
        vocabulary.contains(label) || self.node_names.contains(label)
    }
}
