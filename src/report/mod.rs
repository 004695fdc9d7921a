//! Coverage and quality report for a dataset.
//!
//! Three measurements, each with its own pass condition:
//!
//! - **rule coverage**: share of rules captured through acquisition interviews;
//! - **test-case precision**: share of bundled test cases the engine diagnoses
//!   as expected;
//! - **ontology coherence**: no error-severity issue from the coherence checks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::acquisition::describe_rule;
use crate::infer::{InferenceEngine, NO_DIAGNOSIS};
use crate::knowledge::{Expected, KnowledgeRepository, KnowledgeSnapshot};
use crate::ontology::{ValidationIssue, default_validators, validate_coherence};

/// Failing cases listed in the rendered report before truncation.
const MAX_LISTED_FAILURES: usize = 10;

/// Pass thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_min_coverage")]
    pub min_coverage_pct: f64,
    #[serde(default = "default_min_precision")]
    pub min_precision_pct: f64,
}

fn default_min_coverage() -> f64 {
    70.0
}

fn default_min_precision() -> f64 {
    80.0
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_coverage_pct: default_min_coverage(),
            min_precision_pct: default_min_precision(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule coverage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RuleCoverage {
    pub total: usize,
    /// Captured ids that name a rule, sorted.
    pub captured: Vec<String>,
    /// Rule ids not yet captured, sorted.
    pub missing: Vec<String>,
    pub pct: f64,
}

/// Compare the captured list against the snapshot's rule ids. Captured ids
/// that name no rule are ignored.
pub fn rule_coverage(snapshot: &KnowledgeSnapshot, captured: &[String]) -> RuleCoverage {
    let rule_ids: BTreeSet<&str> = snapshot.rule_ids().collect();
    let captured_ids: BTreeSet<&str> = captured.iter().map(String::as_str).collect();

    let captured: Vec<String> = rule_ids
        .intersection(&captured_ids)
        .map(|id| id.to_string())
        .collect();
    let missing: Vec<String> = rule_ids
        .difference(&captured_ids)
        .map(|id| id.to_string())
        .collect();

    let total = rule_ids.len();
    let pct = percentage(captured.len(), total);
    RuleCoverage {
        total,
        captured,
        missing,
        pct,
    }
}

// ---------------------------------------------------------------------------
// Test-case precision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub case_id: String,
    pub expected: Expected,
    /// Label the engine produced.
    pub obtained: String,
    pub rule_id: Option<String>,
    pub certainty: f32,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CasePrecision {
    pub results: Vec<CaseResult>,
    pub passed: usize,
    /// Cases for which the engine reached no diagnosis.
    pub no_diagnosis: usize,
    pub pct: f64,
}

impl CasePrecision {
    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Run every test case in the snapshot through the engine.
pub fn evaluate_cases(engine: &InferenceEngine, snapshot: &KnowledgeSnapshot) -> CasePrecision {
    let results: Vec<CaseResult> = snapshot
        .test_cases
        .iter()
        .map(|case| {
            let result = engine.infer(snapshot, &case.symptoms);
            let obtained = result.label().to_string();
            let diagnosis = result.diagnosis();
            CaseResult {
                case_id: case.id.clone(),
                passed: case.expected.accepts(&obtained),
                expected: case.expected.clone(),
                rule_id: diagnosis.map(|d| d.rule_id.clone()),
                certainty: diagnosis.map(|d| d.certainty).unwrap_or(0.0),
                obtained,
            }
        })
        .collect();

    let passed = results.iter().filter(|r| r.passed).count();
    let no_diagnosis = results.iter().filter(|r| r.obtained == NO_DIAGNOSIS).count();
    let pct = percentage(passed, results.len());
    tracing::debug!(cases = results.len(), passed, no_diagnosis, "test cases evaluated");

    CasePrecision {
        results,
        passed,
        no_diagnosis,
        pct,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// All three measurements plus the thresholds they are judged against.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub coverage: RuleCoverage,
    pub precision: CasePrecision,
    pub coherence_issues: Vec<ValidationIssue>,
    pub config: ReportConfig,
    missing_rules: Vec<String>,
}

impl CoverageReport {
    pub fn build(snapshot: &KnowledgeSnapshot, captured: &[String], config: ReportConfig) -> Self {
        let coverage = rule_coverage(snapshot, captured);
        let precision = evaluate_cases(&InferenceEngine::new(), snapshot);
        let coherence_issues = validate_coherence(snapshot, &default_validators());

        let missing_rules = coverage
            .missing
            .iter()
            .filter_map(|id| snapshot.rule(id))
            .map(|rule| format!("{}\n{}", rule.label(), describe_rule(rule)))
            .collect();

        Self {
            coverage,
            precision,
            coherence_issues,
            config,
            missing_rules,
        }
    }

    pub fn from_repository<R>(repo: &R, config: ReportConfig) -> Self
    where
        R: KnowledgeRepository + ?Sized,
    {
        Self::build(repo.snapshot(), repo.captured_rules(), config)
    }

    pub fn coverage_ok(&self) -> bool {
        self.coverage.pct >= self.config.min_coverage_pct
    }

    pub fn precision_ok(&self) -> bool {
        self.precision.pct >= self.config.min_precision_pct
    }

    /// Warnings do not make an ontology incoherent.
    pub fn ontology_coherent(&self) -> bool {
        !self.coherence_issues.iter().any(ValidationIssue::is_error)
    }

    pub fn passed(&self) -> bool {
        self.coverage_ok() && self.precision_ok() && self.ontology_coherent()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        lines.push("== Rule coverage ==".to_string());
        lines.push(format!("Rules: {}", self.coverage.total));
        lines.push(format!("Captured: {}", self.coverage.captured.len()));
        lines.push(format!("Coverage: {:.1}%", self.coverage.pct));
        if self.missing_rules.is_empty() {
            lines.push("Not yet captured: none".to_string());
        } else {
            lines.push("Not yet captured:".to_string());
            for rule in &self.missing_rules {
                lines.extend(rule.lines().map(|line| format!("  {line}")));
            }
        }

        lines.push(String::new());
        lines.push("== Test cases ==".to_string());
        let total = self.precision.results.len();
        lines.push(format!("Cases: {total}"));
        lines.push(format!("Passed: {}", self.precision.passed));
        lines.push(format!("Precision: {:.1}%", self.precision.pct));
        lines.push(format!(
            "No diagnosis: {} ({:.1}%)",
            self.precision.no_diagnosis,
            percentage(self.precision.no_diagnosis, total)
        ));
        let failures: Vec<&CaseResult> = self.precision.failures().collect();
        for failure in failures.iter().take(MAX_LISTED_FAILURES) {
            lines.push(format!(
                "  FAILED {}: expected '{}' obtained '{}' rule={} certainty={}",
                failure.case_id,
                failure.expected,
                failure.obtained,
                failure.rule_id.as_deref().unwrap_or("-"),
                failure.certainty
            ));
        }
        if failures.len() > MAX_LISTED_FAILURES {
            lines.push(format!(
                "  ... and {} more",
                failures.len() - MAX_LISTED_FAILURES
            ));
        }

        lines.push(String::new());
        lines.push("== Ontology ==".to_string());
        let errors = self.coherence_issues.iter().filter(|i| i.is_error()).count();
        lines.push(format!(
            "Issues: {} error(s), {} warning(s)",
            errors,
            self.coherence_issues.len() - errors
        ));
        for issue in self.coherence_issues.iter().filter(|i| i.is_error()) {
            lines.push(format!("  {issue}"));
        }

        lines.push(String::new());
        lines.push("== Summary ==".to_string());
        lines.push(format!(
            "[{}] rule coverage >= {:.0}% (actual {:.1}%)",
            mark(self.coverage_ok()),
            self.config.min_coverage_pct,
            self.coverage.pct
        ));
        lines.push(format!(
            "[{}] test-case precision >= {:.0}% (actual {:.1}%)",
            mark(self.precision_ok()),
            self.config.min_precision_pct,
            self.precision.pct
        ));
        lines.push(format!(
            "[{}] ontology coherent",
            mark(self.ontology_coherent())
        ));
        lines.push(format!(
            "Overall: {}",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        lines.join("\n")
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "PASS" } else { "FAIL" }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
