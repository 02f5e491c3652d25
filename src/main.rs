use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use logroll::config::Config;
use logroll::{LogLevel, LogRecord, LogWriter};

/// Append stdin lines to a rotating log file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.logroll/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Active log file, overriding the config
    #[arg(short, long, env = "LOGROLL_PATH")]
    path: Option<PathBuf>,

    /// Level given to every record
    #[arg(short, long, default_value = "info")]
    level: LogLevel,

    /// Target given to every record
    #[arg(short, long, default_value = "stdin")]
    target: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "logroll=debug"
    } else {
        "logroll=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(path) = args.path {
        config.path = path;
    }
    config.validate()?;

    let mut writer = LogWriter::from_config(&config).context("Failed to create log writer")?;
    info!("Logging to: {}", writer.active_path().display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count: u64 = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        writer.write(LogRecord::new(args.level, args.target.as_str(), line));
        count += 1;
    }

    writer.close().await;
    info!(records = count, "stdin closed");
    Ok(())
}
