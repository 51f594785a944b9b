//! linkrelay CLI Client
//!
//! Command-line front-end: submit a link to the daemon, or send raw commands.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use linkrelay::config::ConfigBuilder;
use linkrelay::protocol::{Command, Response};
use linkrelay::{Config, Endpoint, RelayClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

/// linkrelay CLI
#[derive(Parser, Debug)]
#[command(name = "linkrelay-cli")]
#[command(about = "Send download links to a linkrelay daemon")]
#[command(version)]
struct Args {
    /// TOML config file (command-line flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon address (host:port)
    #[arg(short, long)]
    server: Option<Endpoint>,

    /// Deadline for the whole exchange, in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask the daemon to download a link
    Submit {
        /// The link to download
        link: String,
    },

    /// Send raw command lines, one per argument
    Raw {
        /// Command lines, e.g. "lsmod" "vd"
        #[arg(required = true)]
        lines: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = RelayClient::from_config(&config);

    // Ctrl+C aborts the exchange instead of killing the process mid-write
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result = match &args.command {
        Commands::Submit { link } => client.submit_cancellable(link, &cancel).await,
        Commands::Raw { lines } => match Command::from_lines(lines.iter().cloned()) {
            Ok(command) => client.send(&command, &cancel).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(response) => {
            print_response(&response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> linkrelay::Result<Config> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(endpoint) = &args.server {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(ms) = args.timeout_ms {
        builder = builder.timeout_ms(ms);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

fn print_response(response: &Response) {
    let text = response.to_string_lossy();
    print!("{}", text);
    if !text.is_empty() && !text.ends_with('\n') {
        println!();
    }
}
