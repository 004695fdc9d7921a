//! Persistence tests: verify that captured rules survive across repository
//! sessions and that the rest of the dataset document is left intact.

use std::path::{Path, PathBuf};

use akh_diag::acquisition::{AcquisitionError, Interview};
use akh_diag::error::KnowledgeError;
use akh_diag::knowledge::{JsonRepository, KnowledgeRepository, MemoryRepository};
use akh_diag::ontology::{IssueKind, default_validators, validate_coherence};

const BUNDLED: &str = include_str!("../data/knowledge/ev-ssb.json");

/// Copy the bundled dataset into `dir` and return its path.
fn dataset_file(dir: &Path) -> PathBuf {
    let path = dir.join("ev-ssb.json");
    std::fs::write(&path, BUNDLED).unwrap();
    path
}

#[test]
fn captured_rule_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dataset_file(dir.path());

    // First session: capture a rule that is not yet recorded.
    {
        let mut repo = JsonRepository::open(&path).unwrap();
        assert!(!repo.is_captured("SSB_R7"));
        assert!(repo.mark_captured("SSB_R7"));
        assert!(!repo.mark_captured("SSB_R7"), "second capture must be a no-op");
        repo.save().unwrap();
    }

    // Second session: the capture is on disk.
    {
        let repo = JsonRepository::open(&path).unwrap();
        assert!(repo.is_captured("SSB_R7"));
        assert_eq!(repo.captured_rules().last().map(String::as_str), Some("SSB_R7"));
        assert_eq!(repo.captured_rules().len(), 7);
    }
}

#[test]
fn save_keeps_the_rest_of_the_document() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dataset_file(dir.path());

    let mut repo = JsonRepository::open(&path).unwrap();
    repo.mark_captured("SSB_R8");
    repo.save().unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    let captured_line = saved
        .lines()
        .find(|line| line.trim_start().starts_with("\"captured_rules\""))
        .unwrap();
    assert!(captured_line.contains("\"SSB_R8\""));

    // Apart from the captured list the text is unchanged, line for line.
    let untouched = |text: &str| -> Vec<String> {
        text.lines()
            .filter(|line| !line.trim_start().starts_with("\"captured_rules\""))
            .map(|line| line.trim_end_matches(',').to_string())
            .collect()
    };
    assert_eq!(untouched(BUNDLED), untouched(&saved));

    let reopened = JsonRepository::open(&path).unwrap();
    assert_eq!(
        reopened.snapshot().rules.len(),
        repo.snapshot().rules.len()
    );
    assert!(reopened.load_report().is_clean());
}

#[test]
fn save_preserves_hierarchy_order_and_duplicates() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("ordered.json");
    std::fs::write(
        &path,
        r#"{
  "rules": [{"id": "R1", "conditions": ["a"], "conclusion": "X", "certainty": 0.5}],
  "ontology": {"hierarchy": {"Zeta": {}, "Alpha": {"Cell": {}, "Cell": {}}}}
}"#,
    )
    .unwrap();

    let duplicate_errors = |repo: &JsonRepository| {
        validate_coherence(repo.snapshot(), &default_validators())
            .iter()
            .filter(|issue| issue.kind == IssueKind::DuplicateChild)
            .count()
    };
    let expected_tree = "Zeta\nAlpha\n  ├─ Cell\n  └─ Cell";

    // First session: capture and save.
    {
        let mut repo = JsonRepository::open(&path).unwrap();
        assert_eq!(repo.snapshot().ontology.graph().render_tree(), expected_tree);
        assert_eq!(duplicate_errors(&repo), 1);
        assert!(repo.mark_captured("R1"));
        repo.save().unwrap();
    }

    // Second session: the hierarchy reads back exactly as written.
    {
        let repo = JsonRepository::open(&path).unwrap();
        assert!(repo.is_captured("R1"));
        assert_eq!(repo.snapshot().ontology.graph().render_tree(), expected_tree);
        assert_eq!(duplicate_errors(&repo), 1);
    }

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains(r#""hierarchy": {"Zeta": {}, "Alpha": {"Cell": {}, "Cell": {}}}"#));
}

#[test]
fn document_without_captures_gains_the_key() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("small.json");
    std::fs::write(
        &path,
        r#"{"rules": [{"id": "R1", "conditions": ["a"], "conclusion": "X", "certainty": 0.5}]}"#,
    )
    .unwrap();

    {
        let mut repo = JsonRepository::open(&path).unwrap();
        assert!(repo.captured_rules().is_empty());
        assert!(!repo.mark_captured("R2"), "unknown rule ids are not captured");
        assert!(repo.mark_captured("R1"));
        repo.save().unwrap();
    }

    let repo = JsonRepository::open(&path).unwrap();
    assert_eq!(repo.captured_rules(), ["R1"]);
    assert_eq!(repo.path(), path.as_path());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = JsonRepository::open(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, KnowledgeError::Io { .. }));
}

#[test]
fn invalid_json_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"rules\": [").unwrap();
    assert!(matches!(
        JsonRepository::open(&path).unwrap_err(),
        KnowledgeError::Json { .. }
    ));

    std::fs::write(&path, "[1, 2, 3]").unwrap();
    match JsonRepository::open(&path).unwrap_err() {
        KnowledgeError::RootShape { found } => assert_eq!(found, "array"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn bundled_repository_is_read_only() {
    let mut repo = MemoryRepository::bundled().unwrap();
    assert!(repo.mark_captured("SSB_R7"));
    assert!(matches!(repo.save(), Err(KnowledgeError::ReadOnly)));
}

#[test]
fn interview_captures_persist() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dataset_file(dir.path());

    // First session: run every scenario.
    {
        let mut repo = JsonRepository::open(&path).unwrap();
        let outcomes = Interview::new(&mut repo).run_all().unwrap();
        assert_eq!(outcomes.len(), 4);

        let fresh: Vec<_> = outcomes
            .iter()
            .filter(|o| o.newly_captured)
            .filter_map(|o| o.captured_rule.as_deref())
            .collect();
        assert_eq!(fresh, vec!["SSB_R7"]);
        repo.save().unwrap();
    }

    // Second session: nothing left to capture from the scenarios.
    {
        let mut repo = JsonRepository::open(&path).unwrap();
        assert!(repo.is_captured("SSB_R7"));
        let outcome = Interview::new(&mut repo).conduct("SCN_04", None).unwrap();
        assert!(!outcome.newly_captured);
    }
}

#[test]
fn unknown_scenario_lists_available_ids() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dataset_file(dir.path());
    let mut repo = JsonRepository::open(&path).unwrap();

    match Interview::new(&mut repo).conduct("SCN_99", None).unwrap_err() {
        AcquisitionError::UnknownScenario { id, available } => {
            assert_eq!(id, "SCN_99");
            assert!(available.contains("SCN_01"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
