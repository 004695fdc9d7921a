//! Ontology coherence: one validator contract, several checks.
//!
//! Every check implements [`OntologyValidator`]; a coherence run is simply the
//! concatenation of the issues each validator returns, in order.

use crate::knowledge::KnowledgeSnapshot;

use super::hierarchy::validate_hierarchy;
use super::relations::RelationValidator;
use super::{IssueKind, ValidationIssue};

/// A validation pass over the ontology of a knowledge snapshot.
pub trait OntologyValidator: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Return every issue found. An empty list means the pass succeeded.
    fn validate(&self, snapshot: &KnowledgeSnapshot) -> Vec<ValidationIssue>;
}

/// Cycles, duplicate children, and depth, per the snapshot's validation config.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyCheck;

impl OntologyValidator for HierarchyCheck {
    fn name(&self) -> &str {
        "hierarchy"
    }

    fn validate(&self, snapshot: &KnowledgeSnapshot) -> Vec<ValidationIssue> {
        let config = &snapshot.ontology.validation;
        validate_hierarchy(
            &snapshot.ontology.hierarchy,
            config.forbid_cycles,
            config.max_depth,
        )
    }
}

/// Relation triples type-checked against vocabulary and concept names.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationCheck;

impl OntologyValidator for RelationCheck {
    fn name(&self) -> &str {
        "relations"
    }

    fn validate(&self, snapshot: &KnowledgeSnapshot) -> Vec<ValidationIssue> {
        let nodes = snapshot.ontology.node_names();
        RelationValidator::new(&snapshot.vocabulary, &nodes)
            .with_allowed_kinds(snapshot.ontology.validation.allowed_relation_kinds.as_ref())
            .validate_relations(&snapshot.ontology.relations)
            .into_issues()
    }
}

/// Vocabulary entries that never appear in the hierarchy.
///
/// Only meaningful once a hierarchy exists; with no concepts at all nothing is
/// reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct VocabularyCheck;

impl OntologyValidator for VocabularyCheck {
    fn name(&self) -> &str {
        "vocabulary"
    }

    fn validate(&self, snapshot: &KnowledgeSnapshot) -> Vec<ValidationIssue> {
        let nodes = snapshot.ontology.node_names();
        if nodes.is_empty() {
            return Vec::new();
        }

        let vocab = &snapshot.vocabulary;
        [
            ("components", &vocab.components),
            ("symptoms", &vocab.symptoms),
            ("repairs", &vocab.repairs),
        ]
        .into_iter()
        .flat_map(|(category, entries)| {
            entries
                .iter()
                .filter(|entry| !nodes.contains(entry.as_str()))
                .map(move |entry| {
                    ValidationIssue::warning(
                        IssueKind::UnverifiedReference,
                        format!(
                            "'{entry}' (vocabulary.{category}) does not appear in the ontology hierarchy"
                        ),
                    )
                })
        })
        .collect()
    }
}

/// The standard set of coherence checks, in reporting order.
pub fn default_validators() -> Vec<Box<dyn OntologyValidator>> {
    vec![
        Box::new(HierarchyCheck),
        Box::new(RelationCheck),
        Box::new(VocabularyCheck),
    ]
}

/// Run every validator against the snapshot and collect their issues.
pub fn validate_coherence(
    snapshot: &KnowledgeSnapshot,
    validators: &[Box<dyn OntologyValidator>],
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for validator in validators {
        let found = validator.validate(snapshot);
        tracing::debug!(
            validator = validator.name(),
            issues = found.len(),
            "coherence check finished"
        );
        issues.extend(found);
    }
    issues
}
