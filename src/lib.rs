// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # akh-diag
//!
//! A rule-based diagnostic expert system with an ontology coherence checker.
//!
//! ## Architecture
//!
//! - **Knowledge** (`knowledge`): JSON datasets loaded into immutable snapshots,
//!   plus a repository for recording captured rules
//! - **Inference** (`infer`): single-step rule matching with a strict
//!   full-match policy and an auditable per-rule trace
//! - **Explanation** (`explain`): client, apprentice, and expert renderings of
//!   one result
//! - **Ontology** (`ontology`): cycle-safe hierarchy checks and relation
//!   type-checking behind one validator contract
//! - **Acquisition** (`acquisition`): simulated expert interviews that capture
//!   rules
//! - **Report** (`report`): rule coverage, test-case precision, and coherence
//!   against thresholds
//!
//! ## Library usage
//!
//! ```
//! use akh_diag::explain::{ExplanationRenderer, Profile};
//! use akh_diag::infer::InferenceEngine;
//! use akh_diag::knowledge::{KnowledgeSnapshot, Rule};
//!
//! let snapshot = KnowledgeSnapshot::with_rules(vec![
//!     Rule::new("R1", ["overheat", "swelling"], "battery_fault", 0.9),
//! ]);
//! let result = InferenceEngine::new().infer(&snapshot, ["overheat", "swelling", "noise"]);
//! assert_eq!(result.label(), "battery_fault");
//!
//! let text = ExplanationRenderer::default().render(&result, Profile::Client);
//! assert!(text.contains("Confidence: 90%"));
//! ```

pub mod acquisition;
pub mod config;
pub mod error;
pub mod explain;
pub mod infer;
pub mod knowledge;
pub mod ontology;
pub mod report;
