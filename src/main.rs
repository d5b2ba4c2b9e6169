//! VertexCare - CHW intervention planning agent
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vertexcare::core::logging;
use vertexcare::{Agent, Config, PatientId, ProviderType, Repl};

/// VertexCare - CHW intervention planning agent
#[derive(Parser, Debug)]
#[command(name = "vertexcare")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Generate a plan for one patient, print it as JSON and exit
    #[arg(long, short = 'p')]
    patient: Option<PatientId>,

    /// Reasoning backend (scripted, gemini, vertex)
    #[arg(long, short = 'b')]
    backend: Option<ProviderType>,

    /// Model name for the Gemini or Vertex backend
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Directory holding models/ and data/
    #[arg(long, short = 'a')]
    artifacts: Option<PathBuf>,

    /// Maximum reasoning iterations per run
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Ask the backend for schema-constrained JSON
    #[arg(long)]
    structured: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Before loading config so file problems are reported
    logging::init(args.debug);

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(backend) = args.backend {
        config.backend.provider = backend;
    }

    if let Some(model) = args.model {
        config.backend.model = model;
    }

    if let Some(artifacts) = args.artifacts {
        config.artifacts.root = artifacts;
    }

    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    if args.structured {
        config.backend.structured_output = true;
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.save_config {
        let path = config.save()?;
        println!("Configuration saved to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    // Single patient mode
    if let Some(patient_id) = args.patient {
        let agent = Agent::from_config(&config)?;
        let outcome = agent.run(patient_id).await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(if outcome.is_plan() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(ExitCode::SUCCESS)
}
