mod error;
mod rpc;
mod sse;
mod tools;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use error::Result;
use tools::ToolSet;

#[derive(Parser)]
#[command(name = "skipper-server")]
#[command(about = "Tool server exposing weather, district-code and web-search tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Transport to serve: line-delimited JSON on stdio, or SSE over HTTP.
    #[arg(long, value_enum, default_value = "sse")]
    transport: TransportKind,

    /// Bind address for the SSE transport.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransportKind {
    Stdio,
    Sse,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let tools = ToolSet::from_env()?;

    match cli.transport {
        TransportKind::Stdio => serve_stdio(tools).await,
        TransportKind::Sse => sse::serve(tools, &cli.bind).await,
    }
}

/// One JSON-RPC message per line; stdout carries nothing but protocol
/// traffic (logs go to stderr).
async fn serve_stdio(tools: ToolSet) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = rpc::handle_message(&tools, &line).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("server=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
