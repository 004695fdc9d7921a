//! akh-diag CLI: rule-based diagnostics and ontology checks.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use akh_diag::acquisition::{Interview, InterviewOutcome, describe_rule};
use akh_diag::config::DiagConfig;
use akh_diag::explain::{ExplanationRenderer, Profile};
use akh_diag::infer::InferenceEngine;
use akh_diag::knowledge::{
    JsonRepository, KnowledgeRepository, LoadReport, MemoryRepository, bundled_dataset,
};
use akh_diag::ontology::{HierarchyInput, default_validators, validate_coherence};
use akh_diag::report::CoverageReport;

#[derive(Parser)]
#[command(
    name = "akh-diag",
    version,
    about = "Rule-based diagnostic expert system"
)]
struct Cli {
    /// Dataset JSON file. Defaults to the configured dataset, then the bundled one.
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Config file. Defaults to ./akh-diag.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose a set of symptoms and explain the result.
    Diagnose {
        /// Observed symptoms (comma-separated, e.g. "overheat,swelling").
        #[arg(long, value_delimiter = ',', required = true)]
        symptoms: Vec<String>,

        /// Audience: client, apprentice, or expert. Unknown values mean client.
        #[arg(long)]
        profile: Option<String>,

        /// Print the inference result as JSON instead of an explanation.
        #[arg(long)]
        json: bool,
    },

    /// Check ontology coherence. Exits non-zero when errors are found.
    Validate,

    /// Print the ontology hierarchy as a tree.
    Tree,

    /// Report data-shape problems found while loading the dataset.
    Check,

    /// Coverage and quality report. Exits non-zero when a threshold fails.
    Report,

    /// Run a simulated expert interview and record the captured rule.
    Acquire {
        /// Scenario id. Every scenario is run in turn when omitted.
        #[arg(long)]
        scenario: Option<String>,

        /// Question for the expert. Defaults to the scenario's first suggestion.
        #[arg(long)]
        question: Option<String>,
    },

    /// List rules in IF ... THEN ... form.
    Rules,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let cwd = std::env::current_dir().into_diagnostic()?;
    let config = DiagConfig::discover(cli.config.as_deref(), &cwd)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    let dataset = cli.dataset.as_deref().or(config.dataset.as_deref());
    let (mut repo, load_report) = open_repository(dataset)?;

    match cli.command {
        Commands::Diagnose {
            symptoms,
            profile,
            json,
        } => {
            let result = InferenceEngine::new().infer(repo.snapshot(), &symptoms);
            if json {
                println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
            } else {
                let profile = profile
                    .as_deref()
                    .map(Profile::parse)
                    .unwrap_or_else(|| config.profile());
                let renderer = ExplanationRenderer::new(config.explain.clone());
                println!("{}", renderer.render(&result, profile));
            }
        }

        Commands::Validate => {
            let issues = validate_coherence(repo.snapshot(), &default_validators());
            let (errors, warnings): (Vec<_>, Vec<_>) = issues.iter().partition(|i| i.is_error());

            println!("Errors ({}):", errors.len());
            for issue in &errors {
                println!("  - {}", issue.message);
            }
            println!("Warnings ({}):", warnings.len());
            for issue in &warnings {
                println!("  - {}", issue.message);
            }

            if !errors.is_empty() {
                miette::bail!("ontology is not coherent: {} error(s)", errors.len());
            }
            println!("Ontology is coherent.");
        }

        Commands::Tree => match &repo.snapshot().ontology.hierarchy {
            HierarchyInput::Malformed { found } => {
                miette::bail!("ontology hierarchy must be a mapping, found {found}");
            }
            HierarchyInput::Forest(roots) if roots.is_empty() => {
                println!("No ontology hierarchy defined.");
            }
            HierarchyInput::Forest(_) => {
                println!("{}", repo.snapshot().ontology.graph().render_tree());
            }
        },

        Commands::Check => {
            let snapshot = repo.snapshot();
            println!("Domain: {}", snapshot.domain);
            println!(
                "Rules: {} loaded, {} skipped",
                load_report.rules_loaded, load_report.rules_skipped
            );
            println!("Test cases: {}", snapshot.test_cases.len());
            println!("Scenarios: {}", snapshot.scenarios.len());
            if load_report.is_clean() {
                println!("Dataset shape: OK");
            } else {
                println!("Dataset shape issues ({}):", load_report.issues.len());
                for issue in &load_report.issues {
                    println!("  - {issue}");
                }
            }
        }

        Commands::Report => {
            let report = CoverageReport::from_repository(repo.as_ref(), config.report.clone());
            println!("{}", report.render());
            if !report.passed() {
                miette::bail!("coverage report thresholds not met");
            }
        }

        Commands::Acquire { scenario, question } => {
            let outcomes = {
                let mut interview = Interview::new(repo.as_mut());
                match scenario {
                    Some(id) => vec![interview.conduct(&id, question.as_deref())?],
                    None => interview.run_all()?,
                }
            };

            for outcome in &outcomes {
                print_interview(repo.as_ref(), outcome);
                println!();
            }

            let fresh = outcomes.iter().filter(|o| o.newly_captured).count();
            println!(
                "Captured rules: {} ({} new this session)",
                repo.captured_rules().len(),
                fresh
            );
            repo.save()?;
        }

        Commands::Rules => {
            let snapshot = repo.snapshot();
            if snapshot.rules.is_empty() {
                println!("No rules defined.");
            }
            for rule in &snapshot.rules {
                let marker = if repo.is_captured(&rule.id) {
                    " [captured]"
                } else {
                    ""
                };
                println!("{}{marker}", rule.label());
                for line in describe_rule(rule).lines() {
                    println!("  {line}");
                }
            }
        }
    }

    Ok(())
}

/// Open a file-backed repository, or the bundled dataset when no path is given.
fn open_repository(path: Option<&Path>) -> Result<(Box<dyn KnowledgeRepository>, LoadReport)> {
    match path {
        Some(path) => {
            let repo = JsonRepository::open(path)?;
            let report = repo.load_report().clone();
            Ok((Box::new(repo), report))
        }
        None => {
            let dataset = bundled_dataset()?;
            let report = dataset.report.clone();
            Ok((Box::new(MemoryRepository::from(dataset)), report))
        }
    }
}

fn print_interview(repo: &dyn KnowledgeRepository, outcome: &InterviewOutcome) {
    let snapshot = repo.snapshot();
    let context = snapshot
        .scenario(&outcome.scenario_id)
        .map(|s| s.context.as_str())
        .unwrap_or_default();

    println!("Scenario {}: {context}", outcome.scenario_id);
    println!("You: \"{}\"", outcome.question);
    println!("Expert: \"{}\"", outcome.answer);

    let Some(rule_id) = &outcome.captured_rule else {
        println!("This scenario names no extracted rule.");
        return;
    };
    match snapshot.rule(rule_id) {
        Some(rule) => {
            println!("Captured rule {}:", rule.label());
            for line in describe_rule(rule).lines() {
                println!("  {line}");
            }
        }
        None => println!("Captured rule {rule_id}: not found in the rule base"),
    }
    if outcome.newly_captured {
        println!("Status: newly captured");
    } else {
        println!("Status: already captured");
    }
}
