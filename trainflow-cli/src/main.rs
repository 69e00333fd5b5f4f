//! Command-line entry points for trainflow.
//!
//! Every stage is a subcommand taking explicit paths, so an external
//! scheduler can run stages one at a time. `run` and `schedule` drive the
//! whole pipeline from a JSON config.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use trainflow::cancellation::CancellationToken;
use trainflow::config::PipelineConfig;
use trainflow::context::PipelineContext;
use trainflow::core::{ArtifactType, PipelineRun};
use trainflow::events::LoggingEventSink;
use trainflow::observability::{init_logging, LoggingConfig};
use trainflow::pipeline::PipelineBuilder;
use trainflow::scheduler::{PipelineScheduler, StageCommand};
use trainflow::store::ArtifactStore;

#[derive(Parser, Debug)]
#[command(name = "trainflow", version, about = "Fixed-order ML training pipeline")]
struct Cli {
    /// Log filter directive used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Downloads the raw dataset and validates its columns.
    Extract {
        #[arg(long)]
        source_url: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Encodes, splits and scales the raw dataset.
    Transform {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        train_output: PathBuf,
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
        #[arg(long, default_value_t = 42)]
        random_seed: u64,
        #[arg(long)]
        scaler_output: Option<PathBuf>,
    },
    /// Grid-searches and fits the classifier.
    Train {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        model_output: PathBuf,
        #[arg(long)]
        params_output: Option<PathBuf>,
    },
    /// Scores the model on the test partition.
    Evaluate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        model_input: PathBuf,
        #[arg(long)]
        metrics_output: PathBuf,
        #[arg(long)]
        confusion_matrix_output: Option<PathBuf>,
    },
    /// Stores a versioned copy of an artifact.
    Save {
        #[arg(long)]
        source: PathBuf,
        /// One of model, metrics, plots.
        #[arg(long = "type")]
        artifact_type: ArtifactType,
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
    },
    /// Runs the whole pipeline once.
    Run(ConfigArgs),
    /// Runs the pipeline on its configured schedule.
    Schedule {
        #[command(flatten)]
        config: ConfigArgs,
        /// Stop after this many runs.
        #[arg(long)]
        max_runs: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Pipeline config (JSON).
    #[arg(long)]
    config: PathBuf,
}

impl Commands {
    fn into_stage_command(self) -> Option<StageCommand> {
        let command = match self {
            Self::Extract { source_url, output } => StageCommand::Extract { source_url, output },
            Self::Transform {
                input,
                train_output,
                test_fraction,
                random_seed,
                scaler_output,
            } => StageCommand::Transform {
                input,
                train_output,
                test_fraction,
                random_seed,
                scaler_output,
            },
            Self::Train {
                input,
                model_output,
                params_output,
            } => StageCommand::Train {
                input,
                model_output,
                params_output,
            },
            Self::Evaluate {
                input,
                model_input,
                metrics_output,
                confusion_matrix_output,
            } => StageCommand::Evaluate {
                input,
                model_input,
                metrics_output,
                confusion_matrix_output,
            },
            Self::Save {
                source,
                artifact_type,
                results_dir,
            } => StageCommand::Save {
                source,
                artifact_type,
                results_dir,
            },
            Self::Run(_) | Self::Schedule { .. } => return None,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_logging = LoggingConfig {
        level: cli.log_level,
        json: cli.log_json,
    };

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(&args.config, &cli_logging)?;
            let run = run_once(&config).await?;
            print_run(&run)?;
            run.ensure_succeeded().context("pipeline run failed")?;
            Ok(())
        }
        Commands::Schedule { config, max_runs } => {
            let config = load_config(&config.config, &cli_logging)?;
            run_scheduled(&config, max_runs).await
        }
        command => {
            init_logging(&cli_logging).context("initializing logging")?;
            let Some(stage_command) = command.into_stage_command() else {
                bail!("not a stage command");
            };
            let name = stage_command.name();
            let output = stage_command
                .execute()
                .await
                .with_context(|| format!("{name} failed"))?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn load_config(path: &std::path::Path, cli_logging: &LoggingConfig) -> Result<PipelineConfig> {
    let config = PipelineConfig::from_file(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    // The config file wins unless the command line asked for something else.
    let logging = if cli_logging == &LoggingConfig::default() {
        config.logging.clone()
    } else {
        cli_logging.clone()
    };
    init_logging(&logging).context("initializing logging")?;
    Ok(config)
}

async fn run_once(config: &PipelineConfig) -> Result<PipelineRun> {
    let store = Arc::new(ArtifactStore::new(&config.paths.results_dir));
    let pipeline = PipelineBuilder::from_config(config, store)
        .build()
        .context("building pipeline")?;
    let ctx = Arc::new(
        PipelineContext::new(pipeline.name()).with_event_sink(Arc::new(LoggingEventSink::debug())),
    );
    Ok(pipeline.run(ctx).await)
}

async fn run_scheduled(config: &PipelineConfig, max_runs: Option<usize>) -> Result<()> {
    let schedule = config.schedule().context("parsing schedule")?;
    let store = Arc::new(ArtifactStore::new(&config.paths.results_dir));
    let pipeline = PipelineBuilder::from_config(config, store)
        .build()
        .context("building pipeline")?;

    let token = Arc::new(CancellationToken::new());
    let scheduler = PipelineScheduler::new(pipeline, schedule)
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
        .with_cancellation(Arc::clone(&token));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current stage");
            token.cancel("interrupted");
        }
    });

    let runs = scheduler.run(max_runs).await;
    for run in &runs {
        print_run(run)?;
    }

    let failed = runs.iter().filter(|r| r.is_failure()).count();
    info!(runs = runs.len(), failed, "Schedule finished");
    if failed > 0 {
        bail!("{failed} of {} scheduled runs failed", runs.len());
    }
    Ok(())
}

fn print_run(run: &PipelineRun) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(run)?);
    Ok(())
}
