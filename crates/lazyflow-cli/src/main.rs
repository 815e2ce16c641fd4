//! lazyflow CLI: run, validate and explain YAML jobs over JSON records.

use clap::{Parser, Subcommand};
use lazyflow_core::PipelineConfig;
use lazyflow_dsl::input::read_records;
use lazyflow_dsl::{explain_job, parse_job, run_job, Job};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lazyflow")]
#[command(about = "Lazy, fused data pipelines over JSON records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job over an input file and print the result as JSON
    Run {
        /// Path to the job YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// JSON lines or JSON array input
        #[arg(short, long)]
        input: PathBuf,

        /// Default worker count for `parallel` steps (overrides config)
        #[arg(long)]
        workers: Option<usize>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a job YAML file (syntax, predicates, field paths, config)
    Validate {
        /// Path to the job YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Show the fused stage chain of a job
    Explain {
        /// Path to the job YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pipeline,
            input,
            workers,
            pretty,
        } => {
            if let Err(e) = run_pipeline(&pipeline, &input, workers, pretty) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { pipeline } => {
            if let Err(e) = load_job(&pipeline) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Pipeline is valid");
        }
        Commands::Explain { pipeline } => {
            if let Err(e) = explain_pipeline(&pipeline) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_job(path: &Path) -> Result<Job, Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(path)?;
    Ok(parse_job(&yaml_content)?)
}

/// The job's `config` block replaces the environment defaults; `--workers`
/// overrides both.
fn resolve_config(job: &Job, workers: Option<usize>) -> PipelineConfig {
    let mut config = match &job.config {
        Some(from_job) => from_job.clone(),
        None => PipelineConfig::from_env(),
    };
    if let Some(workers) = workers {
        config.default_parallelism = workers;
    }
    config
}

fn run_pipeline(
    pipeline_path: &Path,
    input_path: &Path,
    workers: Option<usize>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut job = load_job(pipeline_path)?;
    job.config = Some(resolve_config(&job, workers));
    job.validate()?;

    let records = read_records(input_path)?;
    tracing::debug!(records = records.len(), input = %input_path.display(), "loaded input");

    let result = run_job(&job, records)?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", rendered);
    Ok(())
}

fn explain_pipeline(pipeline_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let job = load_job(pipeline_path)?;
    let stages = explain_job(&job)?;
    let config = resolve_config(&job, None);

    println!("Pipeline Stage Chain");
    println!("====================");
    println!();
    for (i, stage) in stages.iter().enumerate() {
        println!("  {}. {}", i + 1, stage);
    }
    println!();
    println!("Default parallelism: {}", config.default_parallelism);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_workers_override_job_config() {
        let job = parse_job("config: { default_parallelism: 2 }").unwrap();
        assert_eq!(resolve_config(&job, None).default_parallelism, 2);
        assert_eq!(resolve_config(&job, Some(7)).default_parallelism, 7);
    }

    #[test]
    fn job_config_keeps_unset_fields_at_defaults() {
        let job = parse_job("config: { thread_name_prefix: jobs }").unwrap();
        let config = resolve_config(&job, None);
        assert_eq!(config.thread_name_prefix, "jobs");
        assert_eq!(config.fallback_funnel_capacity, 1024);
    }
}
