//! Repository over a dataset: the only place a snapshot-adjacent mutation
//! (recording a captured rule) happens.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;

use crate::error::{KnowledgeError, KnowledgeResult};

use super::{KnowledgeSnapshot, LoadReport, LoadedDataset, bundled_dataset, load_dataset};

/// Access to a dataset snapshot plus its captured-rule list.
pub trait KnowledgeRepository {
    fn snapshot(&self) -> &KnowledgeSnapshot;

    /// Ids of rules captured so far, in capture order.
    fn captured_rules(&self) -> &[String];

    /// Record a rule as captured.
    ///
    /// Returns `true` only when the rule was not captured before. Blank ids and
    /// ids that name no rule in the snapshot are ignored.
    fn mark_captured(&mut self, rule_id: &str) -> bool;

    /// Persist the captured-rule list.
    fn save(&self) -> KnowledgeResult<()>;

    fn is_captured(&self, rule_id: &str) -> bool {
        self.captured_rules().iter().any(|id| id == rule_id)
    }
}

fn capture(snapshot: &KnowledgeSnapshot, captured: &mut Vec<String>, rule_id: &str) -> bool {
    let rule_id = rule_id.trim();
    if rule_id.is_empty() {
        return false;
    }
    if snapshot.rule(rule_id).is_none() {
        tracing::warn!(rule_id, "cannot capture unknown rule");
        return false;
    }
    if captured.iter().any(|id| id == rule_id) {
        return false;
    }
    captured.push(rule_id.to_string());
    tracing::debug!(rule_id, total = captured.len(), "rule captured");
    true
}

// ── JSON file ───────────────────────────────────────────────────────────

/// A dataset file on disk. Saving rewrites `captured_rules` and leaves the
/// text of every other top-level entry as it was read, including key order
/// and duplicate keys.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    path: PathBuf,
    dataset: LoadedDataset,
}

impl JsonRepository {
    pub fn open(path: impl AsRef<Path>) -> KnowledgeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let dataset = load_dataset(&path)?;
        Ok(Self { path, dataset })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.dataset.report
    }
}

impl KnowledgeRepository for JsonRepository {
    fn snapshot(&self) -> &KnowledgeSnapshot {
        &self.dataset.snapshot
    }

    fn captured_rules(&self) -> &[String] {
        &self.dataset.captured_rules
    }

    fn mark_captured(&mut self, rule_id: &str) -> bool {
        let LoadedDataset {
            snapshot,
            captured_rules,
            ..
        } = &mut self.dataset;
        capture(snapshot, captured_rules, rule_id)
    }

    fn save(&self) -> KnowledgeResult<()> {
        let content = splice_captured(&self.dataset.source, &self.dataset.captured_rules)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KnowledgeError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|e| KnowledgeError::Write {
            path: self.path.display().to_string(),
            source: e,
        })?;

        tracing::info!(
            path = %self.path.display(),
            captured = self.dataset.captured_rules.len(),
            "dataset saved"
        );
        Ok(())
    }
}

const CAPTURED_KEY: &str = "captured_rules";

/// Top-level entries of a dataset document in document order. Values keep
/// their original text.
struct TopLevel(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for TopLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = TopLevel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TopLevel, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, Box<RawValue>>()? {
                    entries.push(entry);
                }
                Ok(TopLevel(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Replace the `captured_rules` entry of `source` (appending it when absent)
/// and copy every other entry through verbatim.
fn splice_captured(source: &str, captured: &[String]) -> KnowledgeResult<String> {
    let json_error = |e: serde_json::Error| KnowledgeError::Json {
        message: e.to_string(),
    };
    let TopLevel(entries) = serde_json::from_str(source).map_err(json_error)?;

    let ids = captured
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(json_error)?;
    let captured_entry = format!("  \"{CAPTURED_KEY}\": [{}]", ids.join(", "));

    let mut lines = Vec::with_capacity(entries.len() + 1);
    let mut spliced = false;
    for (key, value) in &entries {
        if key == CAPTURED_KEY {
            // Later duplicates of the key are dropped.
            if !spliced {
                lines.push(captured_entry.clone());
                spliced = true;
            }
            continue;
        }
        let key = serde_json::to_string(key).map_err(json_error)?;
        lines.push(format!("  {key}: {}", value.get()));
    }
    if !spliced {
        lines.push(captured_entry);
    }

    Ok(format!("{{\n{}\n}}\n", lines.join(",\n")))
}

// ── In memory ───────────────────────────────────────────────────────────

/// A repository with no backing file. Captures live for the lifetime of the
/// value and [`save`](KnowledgeRepository::save) always fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    snapshot: KnowledgeSnapshot,
    captured: Vec<String>,
}

impl MemoryRepository {
    pub fn new(snapshot: KnowledgeSnapshot) -> Self {
        Self {
            snapshot,
            captured: Vec::new(),
        }
    }

    /// The bundled dataset, including its recorded captures.
    pub fn bundled() -> KnowledgeResult<Self> {
        bundled_dataset().map(Self::from)
    }
}

impl From<LoadedDataset> for MemoryRepository {
    fn from(dataset: LoadedDataset) -> Self {
        Self {
            snapshot: dataset.snapshot,
            captured: dataset.captured_rules,
        }
    }
}

impl KnowledgeRepository for MemoryRepository {
    fn snapshot(&self) -> &KnowledgeSnapshot {
        &self.snapshot
    }

    fn captured_rules(&self) -> &[String] {
        &self.captured
    }

    fn mark_captured(&mut self, rule_id: &str) -> bool {
        capture(&self.snapshot, &mut self.captured, rule_id)
    }

    fn save(&self) -> KnowledgeResult<()> {
        Err(KnowledgeError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Rule;

    fn repo() -> MemoryRepository {
        MemoryRepository::new(KnowledgeSnapshot::with_rules(vec![
            Rule::new("R1", ["a"], "X", 0.5),
            Rule::new("R2", ["b"], "Y", 0.5),
        ]))
    }

    #[test]
    fn capture_once() {
        let mut repo = repo();
        assert!(repo.mark_captured("R1"));
        assert!(!repo.mark_captured("R1"));
        assert!(repo.mark_captured(" R2 "));
        assert_eq!(repo.captured_rules(), ["R1", "R2"]);
        assert!(repo.is_captured("R2"));
    }

    #[test]
    fn blank_and_unknown_ids_ignored() {
        let mut repo = repo();
        assert!(!repo.mark_captured(""));
        assert!(!repo.mark_captured("   "));
        assert!(!repo.mark_captured("R9"));
        assert!(repo.captured_rules().is_empty());
    }

    #[test]
    fn splice_keeps_other_entries_verbatim() {
        let source = r#"{"zeta": {"B": {}, "A": {}, "A": {}}, "captured_rules": ["R1"], "alpha": 1}"#;
        let spliced = splice_captured(source, &["R1".to_string(), "R2".to_string()]).unwrap();
        assert_eq!(
            spliced,
            "{\n  \"zeta\": {\"B\": {}, \"A\": {}, \"A\": {}},\n  \"captured_rules\": [\"R1\", \"R2\"],\n  \"alpha\": 1\n}\n"
        );
    }

    #[test]
    fn splice_appends_missing_key() {
        let spliced = splice_captured(r#"{"rules": []}"#, &["R1".to_string()]).unwrap();
        assert_eq!(spliced, "{\n  \"rules\": [],\n  \"captured_rules\": [\"R1\"]\n}\n");

        let empty = splice_captured("{}", &[]).unwrap();
        assert_eq!(empty, "{\n  \"captured_rules\": []\n}\n");
    }

    #[test]
    fn memory_repository_cannot_save() {
        assert!(matches!(repo().save(), Err(KnowledgeError::ReadOnly)));
    }
}
