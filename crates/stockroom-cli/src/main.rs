//! Stockroom - command-line console for the grocery inventory API.
//!
//! Each invocation builds a fresh console context, runs one command through
//! the cache layer, and tears the context down again.

mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockroom_core::{ClientConfig, ConsoleContext, ResourceKind};

/// File name prefix for the rolling log
const LOG_FILE_PREFIX: &str = "stockroom.log";

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Admin console for the grocery inventory API")]
#[command(version)]
struct Args {
    /// API base URL (overrides config file and STOCKROOM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to a daily file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a bearer token (prompted for when not given)
    Login { token: Option<String> },
    /// Forget the stored token
    Logout,
    /// Show who the stored token belongs to
    Whoami,
    /// List one page of a collection
    List {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        size: Option<i64>,
    },
    /// Show a single item
    Get {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        id: String,
    },
    /// Create an item from a JSON object
    Create {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        json: String,
    },
    /// Change some fields of an item
    Patch {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        id: String,
        json: String,
    },
    /// Replace a whole item (products and inventories only)
    Replace {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        id: String,
        json: String,
    },
    /// Delete an item
    Delete {
        #[arg(value_parser = parse_kind)]
        resource: ResourceKind,
        id: String,
    },
    /// Totals for every collection
    Summary,
}

fn parse_kind(name: &str) -> Result<ResourceKind, String> {
    ResourceKind::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.path()).collect();
        format!("unknown resource '{}', expected one of: {}", name, known.join(", "))
    })
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must be held until exit.
fn init_tracing(log_file: Option<PathBuf>) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=stockroom_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_dir = if args.log_file {
        Some(ClientConfig::cache_dir()?)
    } else {
        None
    };
    let _guard = init_tracing(log_dir);

    let config = ClientConfig::load()
        .context("Failed to load configuration")?
        .with_api_url_override(args.api_url);
    info!(api = %config.api_base_url, "Stockroom starting");

    let context = ConsoleContext::from_config(config)?;
    let result = commands::run(&context, args.command).await;
    context.shutdown();

    match result {
        Ok(output) => {
            if let Some(output) = output {
                println!("{}", output);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(commands::CommandError::Api(e)) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("{}", context.notice_for(&e));
            Ok(ExitCode::FAILURE)
        }
        Err(commands::CommandError::Other(e)) => Err(e),
    }
}
