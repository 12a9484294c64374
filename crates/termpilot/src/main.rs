//! # termpilot
//!
//! Run one command in a driven shell and print the structured result.
//!
//! ```text
//! termpilot [--config FILE] [--timeout-ms N] [--strict] -- COMMAND...
//! ```
//!
//! The shell is launched from the YAML config (or defaults), the command is
//! executed with `run()`, and the `RunResult` is printed as pretty JSON on
//! stdout. Logs go to stderr and follow `RUST_LOG`.

use std::time::Duration;

use anyhow::{bail, Context};
use termpilot::{Driver, DriverConfig, LaunchOptions, RunOptions};

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    timeout_ms: Option<u64>,
    strict: bool,
    command: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config = Some(args.next().context("--config requires a file")?);
            }
            "--timeout-ms" => {
                let value = args.next().context("--timeout-ms requires a value")?;
                parsed.timeout_ms = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --timeout-ms value: {value}"))?,
                );
            }
            "--strict" => parsed.strict = true,
            "--" => {
                parsed.command = args.collect();
                break;
            }
            other => bail!("unexpected argument: {other}"),
        }
    }
    if parsed.command.is_empty() {
        bail!("usage: termpilot [--config FILE] [--timeout-ms N] [--strict] -- COMMAND...");
    }
    Ok(parsed)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => DriverConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => DriverConfig::default(),
    };

    let driver = Driver::launch(LaunchOptions::from_config(&config)?).await?;
    tracing::info!("Driver launched, running command...");

    let mut options = RunOptions::new();
    if let Some(ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    if args.strict {
        options = options.strict();
    }

    let result = driver.run(&args.command.join(" "), options).await;
    driver.dispose();

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match parse_args(std::env::args().skip(1)) {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        tracing::error!("termpilot failed: {:#}", e);
        std::process::exit(1);
    }
}
