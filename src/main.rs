use clap::{Parser, Subcommand};
use risco_cloud::constants::DEFAULT_POLL_INTERVAL_SECS;
use risco_cloud::{logger, manager_from_config, ArmCommand, ClientConfig, RiscoError, StatePoller};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Query and control a Risco alarm panel through the vendor cloud
///
/// Credentials come from RISCO_USERNAME / RISCO_PASSWORD (plus optional
/// RISCO_CODE, RISCO_PIN, RISCO_LANG).
#[derive(Debug, Parser)]
#[command(name = "risco-cloud", version)]
struct Cli {
    /// Override the cloud base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Give up after this many retries (default: retry until success)
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Give up after retrying for this many seconds
    #[arg(long, global = true)]
    max_elapsed: Option<u64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current alarm state
    Status,
    /// Arm the first partition
    Arm,
    /// Disarm the first partition
    Disarm,
    /// Part-arm the first partition
    Partarm,
    /// Poll the alarm state and print every change
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        interval: u64,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logger::init_logger(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RiscoError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = Some(max_retries);
    }
    if let Some(secs) = cli.max_elapsed {
        config.retry.max_elapsed = Some(Duration::from_secs(secs));
    }

    let manager = manager_from_config(&config);
    manager
        .run_scoped(|manager| async move {
            match cli.command {
                Command::Status => {
                    let state = manager.get_arm_status().await?;
                    println!("{}", state);
                }
                Command::Arm => send(&manager, ArmCommand::Arm).await?,
                Command::Disarm => send(&manager, ArmCommand::Disarm).await?,
                Command::Partarm => send(&manager, ArmCommand::PartArm).await?,
                Command::Watch { interval, count } => {
                    let mut poller =
                        StatePoller::new(Arc::clone(&manager), Duration::from_secs(interval));
                    if let Some(count) = count {
                        poller = poller.with_max_polls(count);
                    }
                    let shutdown = async {
                        let _ = tokio::signal::ctrl_c().await;
                    };
                    poller
                        .run(shutdown, |change| {
                            println!("{} {}", change.observed_at.to_rfc3339(), change.current);
                        })
                        .await;
                }
            }
            Ok::<(), RiscoError>(())
        })
        .await
}

async fn send(
    manager: &risco_cloud::HttpSessionManager,
    command: ArmCommand,
) -> Result<(), RiscoError> {
    let reply = manager.set_arm_status(command).await?;
    println!("{}", reply);
    Ok(())
}
