//! Audience-specific explanations of inference results.
//!
//! The same [`InferenceResult`] reads differently for a vehicle owner
//! ([`Profile::Client`]), a technician in training ([`Profile::Apprentice`]),
//! and a diagnostics engineer ([`Profile::Expert`]). Rendering is pure: the
//! output depends only on the result, the profile, and the [`ExplainConfig`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::infer::{Diagnosis, InferenceResult, NO_DIAGNOSIS, TraceEntry};

/// Who the explanation is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Client,
    Apprentice,
    Expert,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Client, Profile::Apprentice, Profile::Expert];

    /// Parse a profile name, case-insensitively. Anything unrecognized is
    /// [`Profile::Client`].
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "apprentice" => Self::Apprentice,
            "expert" => Self::Expert,
            _ => Self::Client,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Apprentice => "apprentice",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many near-miss candidates each profile lists when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainConfig {
    #[serde(default = "default_apprentice_candidates")]
    pub apprentice_candidates: usize,
    #[serde(default = "default_expert_candidates")]
    pub expert_candidates: usize,
}

fn default_apprentice_candidates() -> usize {
    2
}

fn default_expert_candidates() -> usize {
    5
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            apprentice_candidates: default_apprentice_candidates(),
            expert_candidates: default_expert_candidates(),
        }
    }
}

const CLIENT_NO_DIAGNOSIS: &str = "We could not reach a diagnosis from the symptoms you reported.";
const CLIENT_NEXT_STEP: &str = "Next step: note any other symptoms you observe and have the \
                                vehicle inspected by an authorized service center.";
const CLIENT_REPAIR_FALLBACK: &str =
    "Recommended action: contact an authorized service center for a full inspection.";
const SELECTION_HEURISTIC: [&str; 2] = [
    "Selection heuristic: only rules whose conditions are all present can be chosen.",
    "Ties are broken by certainty first, then by specificity (number of conditions).",
];

/// Renders inference results as plain text.
#[derive(Debug, Clone, Default)]
pub struct ExplanationRenderer {
    config: ExplainConfig,
}

impl ExplanationRenderer {
    pub fn new(config: ExplainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    pub fn render(&self, result: &InferenceResult, profile: Profile) -> String {
        let lines = match (result.diagnosis(), profile) {
            (None, Profile::Client) => client_no_diagnosis(),
            (None, Profile::Apprentice) => {
                apprentice_no_diagnosis(result, self.config.apprentice_candidates)
            }
            (None, Profile::Expert) => expert_no_diagnosis(result, self.config.expert_candidates),
            (Some(d), Profile::Client) => client_diagnosis(d),
            (Some(d), Profile::Apprentice) => apprentice_diagnosis(result, d),
            (Some(d), Profile::Expert) => expert_diagnosis(result, d),
        };
        lines.join("\n")
    }
}

// ── No diagnosis ────────────────────────────────────────────────────────

fn client_no_diagnosis() -> Vec<String> {
    vec![CLIENT_NO_DIAGNOSIS.to_string(), CLIENT_NEXT_STEP.to_string()]
}

fn apprentice_no_diagnosis(result: &InferenceResult, limit: usize) -> Vec<String> {
    let mut lines = vec![
        "No rule matched all of its conditions, so no diagnosis is possible.".to_string(),
        format!("Symptoms considered: {}", join_or(result.symptoms.iter(), "none")),
    ];

    let mut candidates: Vec<&TraceEntry> = result.trace.iter().collect();
    candidates.sort_by(|a, b| {
        desc(a.score, b.score)
            .then_with(|| desc(a.certainty, b.certainty))
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
    });

    if candidates.is_empty() || limit == 0 {
        lines.push("Nearest candidates: none".to_string());
        return lines;
    }

    lines.push("Nearest candidates:".to_string());
    for (rank, entry) in candidates.iter().take(limit).enumerate() {
        lines.push(format!(
            "  {}. {} -> {} (score {:.2}, certainty {:.2})",
            rank + 1,
            entry.label(),
            entry.conclusion,
            entry.score,
            entry.certainty
        ));
        lines.push(format!("     missing: {}", join_or(&entry.missing, "none")));
    }
    lines
}

fn expert_no_diagnosis(result: &InferenceResult, limit: usize) -> Vec<String> {
    let mut lines = vec![
        format!("Diagnosis: {NO_DIAGNOSIS}"),
        format!("Symptoms: {}", join_or(result.symptoms.iter(), "none")),
        format!("Rules evaluated: {}", result.trace.len()),
    ];

    let mut candidates: Vec<&TraceEntry> = result.trace.iter().collect();
    candidates.sort_by(|a, b| {
        b.full_match
            .cmp(&a.full_match)
            .then_with(|| desc(a.score, b.score))
            .then_with(|| desc(a.certainty, b.certainty))
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
    });

    if candidates.is_empty() || limit == 0 {
        lines.push("Top candidates: none".to_string());
        return lines;
    }

    lines.push("Top candidates:".to_string());
    for entry in candidates.iter().take(limit) {
        lines.push(format!("  {}", trace_summary(entry)));
        lines.push(format!("    matched: {}", join_or(&entry.matched, "none")));
        lines.push(format!("    missing: {}", join_or(&entry.missing, "none")));
    }
    lines
}

// ── Bound diagnosis ─────────────────────────────────────────────────────

fn client_diagnosis(diagnosis: &Diagnosis) -> Vec<String> {
    let percent = (diagnosis.certainty * 100.0).round() as i64;
    let mut lines = vec![
        format!("Diagnosis: {}", diagnosis.conclusion),
        format!("Confidence: {percent}%"),
    ];
    if let Some(failure_type) = &diagnosis.failure_type {
        lines.push(format!("Failure type: {failure_type}"));
    }
    if !diagnosis.client_explanation.is_empty() {
        lines.push(diagnosis.client_explanation.clone());
    }
    if diagnosis.required_repairs.is_empty() {
        lines.push(CLIENT_REPAIR_FALLBACK.to_string());
    } else {
        lines.push(format!(
            "Recommended repairs: {}",
            diagnosis.required_repairs.join(", ")
        ));
    }
    lines
}

fn apprentice_diagnosis(result: &InferenceResult, diagnosis: &Diagnosis) -> Vec<String> {
    let (matched, missing): (Vec<&String>, Vec<&String>) = diagnosis
        .conditions
        .iter()
        .partition(|condition| result.symptoms.contains(condition));

    let mut lines = vec![
        format!("Diagnosis: {}", diagnosis.conclusion),
        format!(
            "Rule applied: {} (certainty {})",
            diagnosis.rule_label(),
            diagnosis.certainty
        ),
        format!("Symptoms reported: {}", join_or(result.symptoms.iter(), "none")),
        format!("Conditions matched: {}", join_or(matched, "none")),
        format!("Conditions missing: {}", join_or(missing, "none")),
    ];
    if !diagnosis.technical_explanation.is_empty() {
        lines.push(format!(
            "Technical explanation: {}",
            diagnosis.technical_explanation
        ));
    }
    lines.push(format!(
        "Suggested repairs: {}",
        join_or(&diagnosis.required_repairs, "N/A")
    ));
    lines.extend(SELECTION_HEURISTIC.iter().map(|line| line.to_string()));
    lines
}

fn expert_diagnosis(result: &InferenceResult, diagnosis: &Diagnosis) -> Vec<String> {
    let mut lines = vec![
        format!("Diagnosis: {}", diagnosis.conclusion),
        format!(
            "Winning rule: {} (certainty {})",
            diagnosis.rule_label(),
            diagnosis.certainty
        ),
    ];
    if let Some(failure_type) = &diagnosis.failure_type {
        lines.push(format!("Failure type: {failure_type}"));
    }

    let mut entries: Vec<&TraceEntry> = result.trace.iter().collect();
    entries.sort_by(|a, b| {
        b.full_match
            .cmp(&a.full_match)
            .then_with(|| desc(a.certainty, b.certainty))
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
            .then_with(|| desc(a.score, b.score))
    });

    lines.push(format!("Trace ({} rules evaluated):", entries.len()));
    for entry in entries {
        let summary = trace_summary(entry);
        if result.is_winner(entry) {
            lines.push(format!("  {summary}"));
        } else if entry.full_match {
            lines.push(format!("  {summary}  DISCARDED (matched but lower priority)"));
        } else {
            lines.push(format!(
                "  {summary}  DISCARDED (missing: {})",
                entry.missing.join(", ")
            ));
        }
    }

    if !diagnosis.required_repairs.is_empty() {
        lines.push(format!(
            "Required repairs: {}",
            diagnosis.required_repairs.join(", ")
        ));
    }
    lines
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn trace_summary(entry: &TraceEntry) -> String {
    format!(
        "{}: full_match={} score={:.2} certainty={:.2} matched={}/{} -> {}",
        entry.label(),
        entry.full_match,
        entry.score,
        entry.certainty,
        entry.matched.len(),
        entry.specificity,
        entry.conclusion
    )
}

/// Descending order for floats.
fn desc(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

fn join_or<I, S>(items: I, empty: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<S> = items.into_iter().collect();
    if items.is_empty() {
        empty.to_string()
    } else {
        items
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::InferenceEngine;
    use crate::knowledge::{KnowledgeSnapshot, Rule};

    fn snapshot() -> KnowledgeSnapshot {
        KnowledgeSnapshot::with_rules(vec![
            Rule::new("R1", ["overheat", "swelling"], "battery_fault", 0.9)
                .with_name("Thermal swelling")
                .with_failure_type("thermal")
                .with_repairs(["cell_replacement"])
                .with_explanations(
                    "A battery cell is overheating and swelling.",
                    "Gas generation in the cell stack causes swelling under heat.",
                ),
            Rule::new("R2", ["overheat"], "cooling_fault", 0.6),
            Rule::new("R3", ["noise", "vibration", "overheat"], "motor_fault", 0.7),
        ])
    }

    fn render(symptoms: &[&str], profile: Profile) -> String {
        let snap = snapshot();
        let result = InferenceEngine::new().infer(&snap, symptoms);
        ExplanationRenderer::default().render(&result, profile)
    }

    #[test]
    fn profile_parse_defaults_to_client() {
        assert_eq!(Profile::parse("Expert"), Profile::Expert);
        assert_eq!(Profile::parse(" apprentice "), Profile::Apprentice);
        assert_eq!(Profile::parse("manager"), Profile::Client);
        assert_eq!(Profile::parse(""), Profile::Client);
    }

    #[test]
    fn client_diagnosis_shows_percentage_and_repairs() {
        let text = render(&["overheat", "swelling"], Profile::Client);
        assert!(text.starts_with("Diagnosis: battery_fault\nConfidence: 90%"));
        assert!(text.contains("Failure type: thermal"));
        assert!(text.contains("A battery cell is overheating and swelling."));
        assert!(text.contains("Recommended repairs: cell_replacement"));
    }

    #[test]
    fn client_without_repairs_gets_fallback() {
        let text = render(&["overheat"], Profile::Client);
        assert!(text.contains("Diagnosis: cooling_fault"));
        assert!(text.contains("Confidence: 60%"));
        assert!(text.contains(CLIENT_REPAIR_FALLBACK));
    }

    #[test]
    fn apprentice_diagnosis_splits_conditions_and_states_heuristic() {
        let text = render(&["overheat", "swelling", "noise"], Profile::Apprentice);
        assert!(text.contains("Rule applied: R1 (Thermal swelling) (certainty 0.9)"));
        assert!(text.contains("Symptoms reported: noise, overheat, swelling"));
        assert!(text.contains("Conditions matched: overheat, swelling"));
        assert!(text.contains("Conditions missing: none"));
        assert!(text.contains("Technical explanation: Gas generation"));
        assert!(text.ends_with(SELECTION_HEURISTIC[1]));
    }

    #[test]
    fn expert_diagnosis_annotates_discarded_rules() {
        let text = render(&["overheat", "swelling"], Profile::Expert);
        let trace: Vec<&str> = text.lines().filter(|l| l.starts_with("  ")).collect();
        assert_eq!(trace.len(), 3);
        assert!(trace[0].starts_with("  R1 (Thermal swelling): full_match=true"));
        assert!(!trace[0].contains("DISCARDED"));
        assert!(trace[1].starts_with("  R2:"));
        assert!(trace[1].ends_with("DISCARDED (matched but lower priority)"));
        assert!(trace[2].starts_with("  R3:"));
        assert!(trace[2].ends_with("DISCARDED (missing: noise, vibration)"));
        assert!(text.contains("Required repairs: cell_replacement"));
    }

    #[test]
    fn client_no_diagnosis_is_plain() {
        let text = render(&["swelling"], Profile::Client);
        assert_eq!(text, format!("{CLIENT_NO_DIAGNOSIS}\n{CLIENT_NEXT_STEP}"));
    }

    #[test]
    fn apprentice_no_diagnosis_lists_two_nearest() {
        let text = render(&["swelling", "noise"], Profile::Apprentice);
        assert!(text.contains("1. R1 (Thermal swelling) -> battery_fault (score 0.50"));
        assert!(text.contains("missing: overheat"));
        assert!(text.contains("2. R3 -> motor_fault (score 0.33"));
        assert!(!text.contains("R2"));
    }

    #[test]
    fn expert_no_diagnosis_lists_candidates_with_sets() {
        let text = render(&["swelling"], Profile::Expert);
        assert!(text.starts_with("Diagnosis: diagnosis_not_possible"));
        assert!(text.contains("Rules evaluated: 3"));
        let first = text
            .lines()
            .position(|l| l.starts_with("  R1"))
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[first + 1], "    matched: swelling");
        assert_eq!(lines[first + 2], "    missing: overheat");
    }

    #[test]
    fn candidate_limits_come_from_config() {
        let snap = snapshot();
        let result = InferenceEngine::new().infer(&snap, ["swelling"]);
        let renderer = ExplanationRenderer::new(ExplainConfig {
            apprentice_candidates: 1,
            expert_candidates: 1,
        });
        let apprentice = renderer.render(&result, Profile::Apprentice);
        assert!(apprentice.contains("1. R1"));
        assert!(!apprentice.contains("2. "));
        let expert = renderer.render(&result, Profile::Expert);
        assert_eq!(expert.lines().filter(|l| l.contains("full_match=")).count(), 1);
    }

    #[test]
    fn rendering_is_deterministic() {
        for profile in Profile::ALL {
            let a = render(&["overheat", "noise"], profile);
            let b = render(&["noise", "overheat"], profile);
            assert_eq!(a, b);
        }
    }
}
