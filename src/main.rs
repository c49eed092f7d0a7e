use anyhow::{Context, Result};
use apiscope::analyzer::analyze;
use apiscope::config::{AppConfig, ConfigLoader, SynthesisOptions};
use apiscope::synth::{OutputFormat, load_observations_file, synthesize};
use apiscope::web;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apiscope", version)]
#[command(about = "Synthesize OpenAPI documents from observed HTTP traffic")]
struct Cli {
    /// Config file (defaults to ./apiscope.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report path templates, resource groups and traffic statistics
    Analyze {
        /// Observation snapshot (JSON array or HAR)
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate an OpenAPI document
    Synthesize {
        /// Observation snapshot (JSON array or HAR)
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format; inferred from the output extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "api-version")]
        api_version: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Serve analysis and synthesis over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    ConfigLoader::load(path).context("loading configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries generated documents, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input, output } => {
            let observations = load_observations_file(&input)
                .with_context(|| format!("reading observations from {}", input.display()))?;
            let report = analyze(&observations);
            write_output(output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        }
        Commands::Synthesize {
            input,
            output,
            format,
            title,
            api_version,
            description,
        } => {
            let observations = load_observations_file(&input)
                .with_context(|| format!("reading observations from {}", input.display()))?;
            let options = config.synthesis.overridden_by(&SynthesisOptions {
                title,
                version: api_version,
                description,
            });
            let format = format
                .or_else(|| output.as_deref().map(OutputFormat::from_path))
                .unwrap_or(OutputFormat::Yaml);

            let document = synthesize(&observations, &options);
            write_output(output.as_deref(), &format.render(&document)?)?;
        }
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            web::run_server(config).await?;
        }
    }

    Ok(())
}
