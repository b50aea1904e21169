//! Sin Querella command line
//!
//! Runs scripted reporting sessions against the workflow controller and
//! prints the outcome as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};

use sinquerella_core::{DiagramCatalog, WorkflowConfig};

mod logging;
mod scenario;

use logging::{init_logging, LogFormat};
use scenario::{Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "sinquerella")]
#[command(about = "Minor traffic accident reports without a police complaint")]
#[command(version)]
struct Cli {
    /// Workflow configuration file (YAML)
    #[arg(long, global = true, env = "SINQUERELLA_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted reporting session
    Run {
        /// Scenario file (YAML)
        scenario: PathBuf,
        /// Print only the review-page summary
        #[arg(long)]
        summary: bool,
    },
    /// List the accident-type diagrams
    Diagrams,
    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&Path>) -> Result<WorkflowConfig> {
    match path {
        Some(path) => WorkflowConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => WorkflowConfig::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.log_format, &config.log_level)?;

    match cli.command {
        Commands::Run { scenario, summary } => {
            let scenario = Scenario::from_file(&scenario)?;
            let runner = ScenarioRunner::new(&config, &scenario.fixtures)?;
            let report = runner
                .run(&scenario)
                .await
                .with_context(|| format!("Scenario '{}' failed", scenario.name))?;

            let output = if summary {
                serde_json::to_string_pretty(&report.summary)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", output);
        }
        Commands::Diagrams => {
            let catalog = DiagramCatalog::from_config(&config);
            let sections: Vec<_> = catalog
                .sections()
                .iter()
                .map(|section| {
                    json!({
                        "id": section.id,
                        "title": section.title,
                        "description": section.description,
                        "diagrams": section
                            .diagrams
                            .iter()
                            .map(|id| json!({
                                "id": id,
                                "infractionAttribution": catalog.requires_infraction_attribution(id),
                            }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
