//! # Scan Engine Plan Validator
//!
//! Command-line tool for checking scan engine configurations before they are
//! saved or scheduled. Builds the execution plan exactly as an orchestration
//! run would and prints it, or reports the configuration error.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use scanner_core::config::ConfigManager;
use scanner_core::constants::EXECUTION_STAGES;
use scanner_core::plan::{ExecutionPlan, ExecutionPlanBuilder};
use scanner_core::registry::{partition_tools, StaticToolCatalog};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "plan-validator")]
#[command(about = "Validate scan engine configurations and show their execution plan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the execution plan of one or more engine configuration files
    Plan {
        /// Engine configuration files (YAML)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the global stage table
    Stages,

    /// Validate the service configuration (config/scanner.yaml + SCANNER__* overrides)
    Service {
        /// Explicit configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Commands::Plan { files } => validate_plans(files, cli.format),
        Commands::Stages => show_stages(cli.format),
        Commands::Service { config } => validate_service_config(config.as_deref(), cli.format),
    };

    match result {
        Ok(()) => {
            info!("Validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Validation failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            process::exit(1);
        }
    }
}

fn validate_plans(files: &[PathBuf], format: OutputFormat) -> anyhow::Result<()> {
    let builder = ExecutionPlanBuilder::new();
    let mut failures = 0usize;

    for file in files {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;

        match builder.build(&raw) {
            Ok(plan) => {
                println!("✅ {}", file.display());
                print_plan(&plan, format)?;
            }
            Err(e) => {
                failures += 1;
                println!("❌ {}: {}", file.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} configurations are invalid", failures, files.len());
    }
    Ok(())
}

fn print_plan(plan: &ExecutionPlan, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(plan)?),
        OutputFormat::Table => {
            let catalog = StaticToolCatalog::builtin();
            println!(
                "  declared order: {}",
                plan.declared_order()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            for stage in plan.stages() {
                println!("  [{}] {} ({})", stage.index, stage.name, stage.mode);
                for scan_type in &stage.scan_types {
                    let tools = plan.tools_for(*scan_type).cloned().unwrap_or_default();
                    let groups = partition_tools(&catalog, *scan_type, tools.keys().map(String::as_str));
                    let grouped = groups
                        .iter()
                        .map(|(input, names)| format!("{:?}: {}", input, names.join(", ")))
                        .collect::<Vec<_>>()
                        .join("; ");
                    println!("      {:<20} {}", scan_type.as_str(), grouped);
                }
            }
            println!("  total tools: {}", plan.total_tools());
        }
    }
    Ok(())
}

fn show_stages(format: OutputFormat) -> anyhow::Result<()> {
    let stages: Vec<serde_json::Value> = EXECUTION_STAGES
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            serde_json::json!({
                "index": index,
                "name": stage.name,
                "mode": stage.mode,
                "scan_types": stage.scan_types,
            })
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stages)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&stages)?),
        OutputFormat::Table => {
            for (index, stage) in EXECUTION_STAGES.iter().enumerate() {
                println!(
                    "[{}] {:<14} {:<10} {}",
                    index,
                    stage.name,
                    stage.mode.as_str(),
                    stage
                        .scan_types
                        .iter()
                        .map(|scan_type| scan_type.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    }
    Ok(())
}

fn validate_service_config(
    path: Option<&std::path::Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let manager = match path {
        Some(path) => ConfigManager::load_from_path(path)?,
        None => ConfigManager::load()?,
    };

    println!("✅ Service configuration valid");
    println!("Environment: {}", manager.environment());
    if let Some(path) = manager.config_path() {
        println!("Source: {}", path.display());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(manager.config())?),
        OutputFormat::Yaml | OutputFormat::Table => {
            println!("{}", serde_yaml::to_string(manager.config())?)
        }
    }
    Ok(())
}
