use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use phish_guard::analyzer::PhishingAnalyzer;
use phish_guard::config::Config;
use phish_guard::extract::DataUri;
use phish_guard::pipeline::AnalysisRequest;
use phish_guard::pipeline::verdict::no_content_verdict;
use phish_guard::server;

#[derive(Parser)]
#[command(name = "phish-guard", version, about = "Phishing content analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze text, an image and/or an .eml file and print the verdict
    Analyze {
        /// Message text to analyze
        #[arg(long)]
        text: Option<String>,

        /// Image file (screenshot of a message)
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,

        /// Raw email file (.eml)
        #[arg(long, value_name = "PATH")]
        email: Option<PathBuf>,

        /// Print the full run record instead of just the verdict
        #[arg(long)]
        detailed: bool,
    },
    /// Run the HTTP API
    Serve {
        /// Port to listen on (defaults to PHISH_GUARD_PORT or 8080)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    let analyzer = Arc::new(PhishingAnalyzer::from_config(&config)?);

    match cli.command {
        Command::Analyze {
            text,
            image,
            email,
            detailed,
        } => {
            let request = AnalysisRequest::new(
                text,
                image.as_deref().map(read_data_uri).transpose()?,
                email.as_deref().map(read_data_uri).transpose()?,
            );

            let output = if detailed {
                match analyzer.analyze_detailed(&request).await? {
                    Some(run) => serde_json::to_string_pretty(&run)?,
                    None => serde_json::to_string_pretty(&no_content_verdict())?,
                }
            } else {
                serde_json::to_string_pretty(&analyzer.analyze(&request).await?)?
            };
            println!("{output}");
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            eprintln!("phish-guard v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Model: {}", config.llm.model);
            eprintln!("   API:   http://0.0.0.0:{}/api/analyze", port);
            server::serve(analyzer, port).await?;
        }
    }

    Ok(())
}

fn read_data_uri(path: &Path) -> anyhow::Result<String> {
    let uri = DataUri::from_file(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(uri.as_str().to_string())
}
