mod config;
mod error;

use std::io::{self, BufRead, Write};

use clap::Parser;
use mcp::Target;
use runtime::{McpToolHost, OpenAiGateway, Session, SessionOptions, ToolHost};

use config::Config;
use error::Result;

#[derive(Parser)]
#[command(name = "skipper")]
#[command(about = "A tool-augmented chat agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Tool server: path to a local server executable or script, or an
    /// http(s) endpoint URL.
    #[arg(default_value = "http://127.0.0.1:8000")]
    agent: String,

    /// Override the configured model id.
    #[arg(long)]
    model: Option<String>,
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
    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    println!("skipper v{}", env!("CARGO_PKG_VERSION"));

    let target = Target::parse(&cli.agent)?;
    let mut tools = McpToolHost::connect(&target).await?;

    let catalog = tools.list_tools().await?;
    let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
    println!(
        "Connected to {} ({}). Tools: {}",
        cli.agent,
        tools.server_name().unwrap_or("unknown server"),
        names.join(", ")
    );

    let gateway = OpenAiGateway::new(&config.base_url, &config.api_key, &config.model)?;
    let mut session = Session::with_options(
        gateway,
        tools,
        SessionOptions {
            max_rounds: config.max_rounds,
        },
    );
    println!("Session ID: {}", session.id);
    println!("Model: {}", config.model);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        // A failed turn is reported and the loop keeps going; the session
        // and its history survive.
        match session.submit(input).await {
            Ok(answer) => {
                println!("\n{answer}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    session.shutdown().await;
    println!("\nSession ended.");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
