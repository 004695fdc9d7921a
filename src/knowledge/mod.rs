//! Knowledge datasets: loading, snapshots, and the capture repository.
//!
//! A dataset is a single JSON document. Loading is lenient: any entry that
//! cannot be read (a rule without an id, a test case without an expected
//! diagnosis) is skipped and recorded in the [`LoadReport`]. Only an unreadable
//! file, invalid JSON, or a non-object root are errors.
//!
//! A demo dataset for solid-state EV battery diagnostics is bundled into the
//! binary and available through [`KnowledgeSnapshot::bundled`].

pub mod cases;
pub mod repository;
pub mod rule;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::ontology::{
    HierarchyInput, IssueKind, OntologyGraph, RelationsInput, ValidationIssue,
};

pub use cases::{Expected, Scenario, TestCase};
pub use repository::{JsonRepository, KnowledgeRepository, MemoryRepository};
pub use rule::Rule;

const BUNDLED_DATASET: &str = include_str!("../../data/knowledge/ev-ssb.json");

// ── Vocabulary and ontology ─────────────────────────────────────────────

/// Controlled vocabularies of the domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Vocabulary {
    pub symptoms: BTreeSet<String>,
    pub diagnoses: BTreeSet<String>,
    pub repairs: BTreeSet<String>,
    pub components: BTreeSet<String>,
}

impl Vocabulary {
    fn from_value(value: &Value, issues: &mut Vec<ValidationIssue>) -> Self {
        let Some(obj) = value.as_object() else {
            issues.push(shape_warning(format!(
                "vocabulary must be an object, found {}, ignored",
                json_type_name(value)
            )));
            return Self::default();
        };
        Self {
            symptoms: string_set(obj, "symptoms", issues),
            diagnoses: string_set(obj, "diagnoses", issues),
            repairs: string_set(obj, "repairs", issues),
            components: string_set(obj, "components", issues),
        }
    }
}

/// Settings for hierarchy and relation validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub forbid_cycles: bool,
    pub max_depth: Option<usize>,
    /// `None` or an empty set means no allow-list.
    pub allowed_relation_kinds: Option<BTreeSet<String>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            forbid_cycles: true,
            max_depth: None,
            allowed_relation_kinds: None,
        }
    }
}

impl ValidationConfig {
    fn from_value(value: &Value, issues: &mut Vec<ValidationIssue>) -> Self {
        let mut config = Self::default();
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                issues.push(shape_warning("ontology.validation_config must be an object, ignored"));
            }
            return config;
        };

        if let Some(forbid) = obj.get("forbid_cycles") {
            match forbid.as_bool() {
                Some(flag) => config.forbid_cycles = flag,
                None => issues.push(shape_warning(
                    "validation_config.forbid_cycles must be a boolean, using true",
                )),
            }
        }

        match obj.get("max_depth") {
            None | Some(Value::Null) => {}
            Some(depth) => match depth.as_u64() {
                Some(depth) => config.max_depth = usize::try_from(depth).ok(),
                None => issues.push(shape_warning(
                    "validation_config.max_depth must be a non-negative integer, ignored",
                )),
            },
        }

        if obj.contains_key("allowed_relation_kinds") {
            let kinds = string_set(obj, "allowed_relation_kinds", issues);
            config.allowed_relation_kinds = (!kinds.is_empty()).then_some(kinds);
        }

        config
    }
}

/// Concept hierarchy, relation triples, and their validation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ontology {
    pub hierarchy: HierarchyInput,
    pub relations: RelationsInput,
    pub validation: ValidationConfig,
}

impl Ontology {
    pub fn graph(&self) -> OntologyGraph<'_> {
        OntologyGraph::new(self.hierarchy.roots())
    }

    /// Every concept name in the hierarchy.
    pub fn node_names(&self) -> BTreeSet<String> {
        self.graph().node_names()
    }
}

// ── Snapshot ────────────────────────────────────────────────────────────

/// An immutable view of one dataset.
///
/// Every engine, renderer, and validator call takes a snapshot by reference;
/// nothing in the crate holds a global dataset.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSnapshot {
    pub domain: String,
    pub vocabulary: Vocabulary,
    /// Rules in dataset order. Ids are unique.
    pub rules: Vec<Rule>,
    pub ontology: Ontology,
    pub test_cases: Vec<TestCase>,
    pub scenarios: Vec<Scenario>,
}

impl KnowledgeSnapshot {
    /// A snapshot holding only the given rules. Later rules that repeat an
    /// earlier id are dropped.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        let mut seen = HashSet::new();
        let rules = rules
            .into_iter()
            .filter(|rule| {
                let fresh = seen.insert(rule.id.clone());
                if !fresh {
                    tracing::warn!(rule_id = %rule.id, "duplicate rule id dropped");
                }
                fresh
            })
            .collect();
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Parse a dataset document, discarding the load report.
    pub fn from_json_str(text: &str) -> KnowledgeResult<Self> {
        parse_dataset(text).map(|loaded| loaded.snapshot)
    }

    /// Load a dataset file, discarding the load report.
    pub fn load(path: impl AsRef<Path>) -> KnowledgeResult<Self> {
        load_dataset(path.as_ref()).map(|loaded| loaded.snapshot)
    }

    /// The dataset compiled into the binary.
    pub fn bundled() -> KnowledgeResult<Self> {
        Self::from_json_str(BUNDLED_DATASET)
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.id.as_str())
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

// ── Loading ─────────────────────────────────────────────────────────────

/// Data-shape findings from loading a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub issues: Vec<ValidationIssue>,
    pub rules_loaded: usize,
    pub rules_skipped: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A parsed dataset together with everything needed to write it back.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub snapshot: KnowledgeSnapshot,
    pub captured_rules: Vec<String>,
    pub report: LoadReport,
    /// The document text as read. Saving splices `captured_rules` into it.
    pub(crate) source: String,
}

/// The bundled dataset with its load report.
pub fn bundled_dataset() -> KnowledgeResult<LoadedDataset> {
    parse_dataset(BUNDLED_DATASET)
}

/// Read and parse a dataset file.
pub fn load_dataset(path: &Path) -> KnowledgeResult<LoadedDataset> {
    let text = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let loaded = parse_dataset(&text)?;
    tracing::info!(
        path = %path.display(),
        rules = loaded.report.rules_loaded,
        skipped = loaded.report.rules_skipped,
        "dataset loaded"
    );
    Ok(loaded)
}

/// Parse a dataset document.
pub fn parse_dataset(text: &str) -> KnowledgeResult<LoadedDataset> {
    let document: Value = serde_json::from_str(text).map_err(|e| KnowledgeError::Json {
        message: e.to_string(),
    })?;
    let Some(root) = document.as_object() else {
        return Err(KnowledgeError::RootShape {
            found: json_type_name(&document).to_string(),
        });
    };

    let mut report = LoadReport::default();

    let domain = root
        .get("domain")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string();

    let vocabulary = match root.get("vocabulary") {
        None | Some(Value::Null) => Vocabulary::default(),
        Some(value) => Vocabulary::from_value(value, &mut report.issues),
    };

    let rules = read_rules(root.get("rules"), &mut report);
    let ontology = read_ontology(text, root.get("ontology"), &mut report.issues)?;

    let test_cases = read_list(root, "test_cases", &mut report.issues, TestCase::from_value);
    let scenarios = read_list(
        root,
        "acquisition_scenarios",
        &mut report.issues,
        Scenario::from_value,
    );

    let captured_rules = match root.get("captured_rules") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => normalize_tokens(items.iter().filter_map(Value::as_str)),
        Some(other) => {
            report.issues.push(shape_warning(format!(
                "captured_rules must be a list, found {}, ignored",
                json_type_name(other)
            )));
            Vec::new()
        }
    };

    for issue in &report.issues {
        tracing::debug!(issue = %issue, "dataset shape issue");
    }

    Ok(LoadedDataset {
        snapshot: KnowledgeSnapshot {
            domain,
            vocabulary,
            rules,
            ontology,
            test_cases,
            scenarios,
        },
        captured_rules,
        report,
        source: text.to_string(),
    })
}

fn read_rules(value: Option<&Value>, report: &mut LoadReport) -> Vec<Rule> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            report.issues.push(shape_warning(format!(
                "rules must be a list, found {}, ignored",
                json_type_name(other)
            )));
            return Vec::new();
        }
    };

    let mut rules: Vec<Rule> = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        match Rule::from_value(index, item) {
            Ok(rule) if !seen.insert(rule.id.clone()) => {
                report.rules_skipped += 1;
                report.issues.push(shape_warning(format!(
                    "duplicate rule id '{}' at rules[{index}], skipped",
                    rule.id
                )));
            }
            Ok(rule) => {
                if !rule.is_eligible() {
                    report.issues.push(shape_warning(format!(
                        "rule '{}' has no conditions and can never match",
                        rule.id
                    )));
                }
                rules.push(rule);
            }
            Err(message) => {
                report.rules_skipped += 1;
                report.issues.push(shape_warning(message));
            }
        }
    }
    report.rules_loaded = rules.len();
    rules
}

/// Hierarchy keys are read from the raw text so duplicate siblings survive;
/// `serde_json::Value` would keep only the last of them.
#[derive(Deserialize)]
struct HierarchyDocument {
    #[serde(default)]
    ontology: Option<HierarchySection>,
}

#[derive(Deserialize)]
struct HierarchySection {
    #[serde(default)]
    hierarchy: Option<HierarchyInput>,
}

fn read_ontology(
    text: &str,
    value: Option<&Value>,
    issues: &mut Vec<ValidationIssue>,
) -> KnowledgeResult<Ontology> {
    let obj = match value {
        None | Some(Value::Null) => return Ok(Ontology::default()),
        Some(Value::Object(obj)) => obj,
        Some(other) => {
            issues.push(shape_warning(format!(
                "ontology must be an object, found {}, ignored",
                json_type_name(other)
            )));
            return Ok(Ontology::default());
        }
    };

    let document: HierarchyDocument =
        serde_json::from_str(text).map_err(|e| KnowledgeError::Json {
            message: e.to_string(),
        })?;
    let hierarchy = document
        .ontology
        .and_then(|section| section.hierarchy)
        .unwrap_or_default();

    Ok(Ontology {
        hierarchy,
        relations: obj
            .get("relations")
            .map(RelationsInput::from_value)
            .unwrap_or_default(),
        validation: obj
            .get("validation_config")
            .map(|v| ValidationConfig::from_value(v, issues))
            .unwrap_or_default(),
    })
}

fn read_list<T>(
    root: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<ValidationIssue>,
    parse: impl Fn(usize, &Value) -> Result<T, String>,
) -> Vec<T> {
    match root.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match parse(index, item) {
                Ok(parsed) => Some(parsed),
                Err(message) => {
                    issues.push(shape_warning(message));
                    None
                }
            })
            .collect(),
        Some(other) => {
            issues.push(shape_warning(format!(
                "{key} must be a list, found {}, ignored",
                json_type_name(other)
            )));
            Vec::new()
        }
    }
}

fn string_set(
    obj: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<ValidationIssue>,
) -> BTreeSet<String> {
    match obj.get(key) {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => normalize_tokens(items.iter().filter_map(Value::as_str))
            .into_iter()
            .collect(),
        Some(other) => {
            issues.push(shape_warning(format!(
                "{key} must be a list of strings, found {}, ignored",
                json_type_name(other)
            )));
            BTreeSet::new()
        }
    }
}

fn shape_warning(message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::warning(IssueKind::DataShape, message)
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Trim tokens, drop empty ones, and collapse duplicates, keeping first
/// occurrence order.
pub fn normalize_tokens<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter_map(|token| {
            let token = token.as_ref().trim();
            (!token.is_empty() && seen.insert(token.to_string())).then(|| token.to_string())
        })
        .collect()
}

/// JSON type name used in shape messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
