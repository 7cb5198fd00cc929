//! Heimdallr CLI
//!
//! The `heimdallr` command classifies diagnostic input and runs the matching
//! analysis workflow against an OpenAI-compatible model. Ticket lookups and
//! log searches go to Jira and the log search API when `JIRA_SERVER` and
//! `LOG_SEARCH_API_HOST` are set.
//!
//! ## Commands
//!
//! - `classify`: Classify input and print the result as JSON
//! - `plan`: Show a category's template and its dependency levels
//! - `steps`: List the step catalog
//! - `run`: Full diagnosis, printing the final report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heimdallr_core::telemetry::{self, LogFormat, LogSettings};
use heimdallr_core::{
    Category, DiagnosisFlow, HeimdallrConfig, RuleClassifier, StepGroup, WorkflowCatalog,
};
use heimdallr_llm::{DataSourceExecutor, LlmConfig, OpenAiExecutor};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "heimdallr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnosis orchestration for alerts, tickets and log queries", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format: full, compact or json
    #[arg(long, global = true, env = "HEIMDALLR_LOG_FORMAT", default_value = "full")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify input text and print the result as JSON
    Classify {
        /// Alert text, ticket reference or log request
        text: String,

        /// Use only the keyword rules; never call the model
        #[arg(long)]
        rules_only: bool,
    },

    /// Show the workflow template for a category and its dependency levels
    Plan {
        /// alert, ticket, log_query, hybrid or unknown
        category: String,
    },

    /// List every step with its dependencies and required parameters
    Steps,

    /// Run a full diagnosis
    Run {
        /// Alert text, ticket reference or log request
        text: String,

        /// TOML engine configuration (HEIMDALLR_* variables still override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the whole diagnosis state as JSON instead of the report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init(LogSettings::new(cli.log_format, level));

    match cli.command {
        Commands::Classify { text, rules_only } => cmd_classify(&text, rules_only).await,
        Commands::Plan { category } => {
            println!("{}", render_plan(&category)?);
            Ok(())
        }
        Commands::Steps => {
            print!("{}", render_steps(&WorkflowCatalog::standard()));
            Ok(())
        }
        Commands::Run { text, config, json } => cmd_run(&text, config.as_deref(), json).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<HeimdallrConfig> {
    let config = match path {
        Some(path) => HeimdallrConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env_overrides()
            .context("Invalid HEIMDALLR_* override")?,
        None => HeimdallrConfig::from_env().context("Invalid HEIMDALLR_* setting")?,
    };
    debug!(?config, "engine configuration");
    Ok(config)
}

fn build_flow(config: &HeimdallrConfig) -> Result<DiagnosisFlow> {
    let catalog = Arc::new(WorkflowCatalog::standard());
    let model = OpenAiExecutor::new(
        LlmConfig::from_env().context("Failed to configure model client")?,
        catalog.clone(),
    )
    .context("Failed to build model client")?;
    let executor = DataSourceExecutor::from_env(Arc::new(model))
        .context("Failed to configure Jira or log search")?;
    debug!(
        jira = executor.has_jira(),
        log_search = executor.has_log_search(),
        "data sources"
    );
    Ok(DiagnosisFlow::with_catalog(
        Arc::new(executor),
        config,
        catalog,
    ))
}

async fn cmd_classify(text: &str, rules_only: bool) -> Result<()> {
    let result = if rules_only {
        RuleClassifier::new()
            .classify(text)
            .context("Rule classification failed")?
    } else {
        let config = load_config(None)?;
        build_flow(&config)?.classify(text).await
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_run(text: &str, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let flow = build_flow(&config)?;
    let state = flow.run(text).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("{}", state.final_report);
    }
    Ok(())
}

fn render_plan(category: &str) -> Result<String> {
    let category: Category = category
        .parse()
        .with_context(|| format!("Unknown category '{category}'"))?;
    let catalog = WorkflowCatalog::standard();
    let plan = catalog.plan_for(category);

    let mut out = format!("Workflow: {category}\n\nTemplate:\n");
    for (idx, step) in catalog.templates().select(category).iter().enumerate() {
        out.push_str(&format!("  {:>2}. {step}\n", idx + 1));
    }
    out.push_str("\nLevels:\n");
    for (idx, level) in plan.levels.iter().enumerate() {
        let marker = if plan.forced_level == Some(idx) {
            " (cycle)"
        } else {
            ""
        };
        out.push_str(&format!("  L{idx}{marker}: {}\n", level.join(", ")));
    }
    Ok(out)
}

fn render_steps(catalog: &WorkflowCatalog) -> String {
    let mut out = String::new();
    for def in catalog.steps() {
        let deps = catalog.graph().dependencies_of(&def.name);
        out.push_str(&format!("{} [{}]\n", def.name, group_label(def.group)));
        out.push_str(&format!(
            "    after:  {}\n",
            if deps.is_empty() {
                "-".to_string()
            } else {
                deps.join(", ")
            }
        ));
        out.push_str(&format!("    params: {}\n", def.required_params.join(", ")));
    }
    out
}

fn group_label(group: StepGroup) -> &'static str {
    match group {
        StepGroup::Classification => "classification",
        StepGroup::Alert => "alert",
        StepGroup::Ticket => "ticket",
        StepGroup::Log => "log",
        StepGroup::Synthesis => "synthesis",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "heimdallr",
            "--verbose",
            "run",
            "PROJ-1",
            "--config",
            "heimdallr.toml",
            "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Full);
        match cli.command {
            Commands::Run { text, config, json } => {
                assert_eq!(text, "PROJ-1");
                assert_eq!(config, Some(PathBuf::from("heimdallr.toml")));
                assert!(json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_classify_rules_only() {
        let cli =
            Cli::try_parse_from(["heimdallr", "classify", "db down", "--rules-only"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Classify { rules_only: true, .. }
        ));
    }

    #[test]
    fn test_cli_parses_log_format() {
        let cli = Cli::try_parse_from(["heimdallr", "steps", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["heimdallr", "steps", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_plan_for_ticket_lists_levels() {
        let out = render_plan("ticket").unwrap();
        assert!(out.starts_with("Workflow: ticket"));
        assert!(out.contains("L0: input_classification"));
        assert!(out.contains("ticket_basic_info"));
        assert!(!out.contains("(cycle)"));
    }

    #[test]
    fn test_plan_rejects_unknown_label() {
        assert!(render_plan("weather").is_err());
        assert!(render_plan("unknown").is_ok());
    }

    #[test]
    fn test_steps_lists_whole_catalog() {
        let out = render_steps(&WorkflowCatalog::standard());
        assert_eq!(out.lines().filter(|l| !l.starts_with(' ')).count(), 19);
        assert!(out.contains("comprehensive_report [synthesis]"));
        assert!(out.contains("    after:  ticket_basic_info, ticket_categorization"));
    }

    #[test]
    fn test_load_config_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heimdallr.toml");
        std::fs::write(&path, "max_parallelism = 5\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_parallelism, 5);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
