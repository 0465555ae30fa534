//! AutoML CLI
//!
//! Command-line front end for the guided AutoML workflow.

use std::collections::BTreeMap;
use std::path::PathBuf;

use automl_client::session::PipelineStep;
use automl_client::types::{ExportFormat, GraphKind, SessionId, TrainOptions, TransformOptions};
use automl_client::{load_config, run_command, Command, Config, RunOptions};
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "automl")]
#[command(about = "Guided AutoML workflow client")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file and AUTOML_API_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Session to continue working on
    #[arg(short, long)]
    session: Option<String>,

    /// Do not wake the backend before pipeline calls
    #[arg(long)]
    no_wake: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Wake the backend and report the result
    Ping,
    /// Keep the backend warm from activity lines read on stdin
    Watch,
    /// Upload a .csv or .xlsx dataset and start a session
    Upload { path: PathBuf },
    /// Fill missing values; without --fill only reports null counts
    Clean {
        /// Fill strategy per column, as COLUMN=STRATEGY
        #[arg(long = "fill", value_parser = parse_key_value)]
        fill: Vec<(String, String)>,
        #[arg(long)]
        target: Option<String>,
    },
    /// Exploratory statistics
    Eda {
        #[arg(long)]
        target: Option<String>,
    },
    /// Encode, scale, balance and reshape columns
    Transform {
        #[arg(long)]
        encoding: Option<String>,
        #[arg(long, value_delimiter = ',')]
        encoding_columns: Vec<String>,
        #[arg(long)]
        scaling: Option<String>,
        #[arg(long, value_delimiter = ',')]
        scaling_columns: Vec<String>,
        #[arg(long)]
        balancing: Option<String>,
        #[arg(long, value_delimiter = ',')]
        balancing_columns: Vec<String>,
        #[arg(long)]
        skewness: Option<String>,
        #[arg(long, value_delimiter = ',')]
        skewness_columns: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        drop_columns: Vec<String>,
    },
    /// Train a model
    Train {
        /// Model key, e.g. random_forest
        #[arg(long)]
        model: String,
        /// Hyperparameter as NAME=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        #[arg(long, default_value_t = 0.2)]
        test_size: f64,
        #[arg(long, default_value_t = 42)]
        random_state: i64,
        #[arg(long)]
        no_stratify: bool,
    },
    /// Metrics for every trained model
    Metrics,
    /// SHAP feature importance for a trained model
    Explain {
        #[arg(long)]
        model: String,
    },
    /// Dump the session data and step metadata
    Data,
    /// Render a chart to a PNG file
    Graph {
        kind: GraphKind,
        /// Chart parameter as NAME=VALUE
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a PDF report or a Jupyter notebook
    Export {
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask the assistant a question
    Ask {
        question: String,
        /// Page the question is about
        #[arg(long, default_value = "upload")]
        step: PipelineStep,
    },
    /// List the workflow steps
    Steps,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Ping => Command::Ping,
            CliCommand::Watch => Command::Watch,
            CliCommand::Upload { path } => Command::Upload { path },
            CliCommand::Clean { fill, target } => Command::Clean {
                fill_strategies: fill.into_iter().collect::<BTreeMap<_, _>>(),
                target_column: target,
            },
            CliCommand::Eda { target } => Command::Eda {
                target_column: target,
            },
            CliCommand::Transform {
                encoding,
                encoding_columns,
                scaling,
                scaling_columns,
                balancing,
                balancing_columns,
                skewness,
                skewness_columns,
                drop_columns,
            } => Command::Transform {
                options: TransformOptions {
                    encoding,
                    encoding_columns,
                    scaling,
                    scaling_columns,
                    balancing,
                    balancing_columns,
                    drop_columns,
                    skewness,
                    skewness_columns,
                },
            },
            CliCommand::Train {
                model,
                params,
                test_size,
                random_state,
                no_stratify,
            } => {
                let mut options = TrainOptions::new(model);
                options.hyperparameters = params
                    .into_iter()
                    .map(|(name, value)| {
                        let value = serde_json::from_str(&value)
                            .unwrap_or(serde_json::Value::String(value));
                        (name, value)
                    })
                    .collect();
                options.test_size = test_size;
                options.random_state = random_state;
                options.stratify = !no_stratify;
                Command::Train { options }
            }
            CliCommand::Metrics => Command::Metrics,
            CliCommand::Explain { model } => Command::Explain { model_key: model },
            CliCommand::Data => Command::Data,
            CliCommand::Graph {
                kind,
                params,
                output,
            } => Command::Graph {
                kind,
                params,
                output,
            },
            CliCommand::Export { format, output } => Command::Export { format, output },
            CliCommand::Ask { question, step } => Command::Ask { question, step },
            CliCommand::Steps => Command::Steps,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, base_url={:?}, session={:?}, no_wake={}, log_level={:?}",
        args.config,
        args.base_url,
        args.session,
        args.no_wake,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.apply_env();

    if let Some(base_url) = args.base_url {
        config.backend.base_url = base_url;
    }

    let options = RunOptions {
        session: args.session.map(SessionId::new),
        no_wake: args.no_wake,
    };

    if let Err(e) = run_command(config, options, args.command.into()).await {
        tracing::error!("Command failed: {}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
