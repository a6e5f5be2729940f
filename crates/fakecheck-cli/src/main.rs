//! fakecheck-infer
//!
//! Classifies one piece of text as fake or real news and prints a single
//! `{label, confidence}` mapping to stdout.

use anyhow::Context;
use clap::Parser;
use fakecheck_classifiers::service::describe_metrics;
use fakecheck_classifiers::{Classifier, DeviceSpec, InferenceService};
use fakecheck_core::output::{self, OutputFormat};
use fakecheck_core::{ClassificationRequest, Error, ErrorKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

mod config;

const EXIT_CONFIG: u8 = 3;
const EXIT_INVALID_INPUT: u8 = 4;
const EXIT_INFERENCE: u8 = 5;

#[derive(Parser, Debug)]
#[command(name = "fakecheck-infer")]
#[command(about = "Classify news text as Fake or Real", long_about = None)]
pub struct Cli {
    /// Text to classify; words are joined with single spaces
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "fakecheck.yaml")]
    config: PathBuf,

    /// Model artifact directory
    #[arg(short, long, env = "FAKECHECK_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Device to run on (cpu, cuda[:N], metal[:N])
    #[arg(short, long, env = "FAKECHECK_DEVICE")]
    device: Option<DeviceSpec>,

    /// Maximum tokens fed to the model
    #[arg(long)]
    max_length: Option<usize>,

    /// Per-call timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Output format (python, json)
    #[arg(short, long, default_value = "python")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn text(&self) -> String {
        self.text.join(" ")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let text = cli.text();
    ClassificationRequest::validate(&text)?;

    let config = config::load(cli)?;
    debug!(?config, "Configuration loaded");

    describe_metrics();

    let service = InferenceService::start(&config.model, &config.service)
        .await
        .context("Failed to load model")?;
    info!(classifier = service.name(), "Model loaded");

    let result = service.classify(&text).await?;
    let line = output::render(&result, cli.format)?;
    Ok(line)
}

/// Exit status for a failed run
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>().map(Error::kind) {
        Some(ErrorKind::InvalidInput) => EXIT_INVALID_INPUT,
        Some(ErrorKind::Inference) => EXIT_INFERENCE,
        Some(ErrorKind::Configuration) | None => EXIT_CONFIG,
    }
}

/// Initialize tracing/logging on stderr
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("fakecheck=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fakecheck=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
