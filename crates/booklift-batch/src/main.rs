//! Booklift - Main entry point

use std::process;

use anyhow::Context;
use booklift_batch::{pipeline, Cli, Commands, RunStatus, Settings};
use booklift_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit code for a run stopped by Ctrl-C
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("booklift")
        .filter_directives("sqlx=warn")
        .build();

    // LOG_* variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring LOG_* overrides: {:#}", e);
            log_config
        },
    };

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    let code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            1
        },
    };

    // Flush the file writer before exiting; `process::exit` skips destructors.
    drop(guard);
    process::exit(code);
}

/// Execute the CLI command, returning the process exit code
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Run {
            chunk_size,
            input,
            output,
        } => {
            let settings = Settings::resolve(cli.config.as_deref())?.with_overrides(
                *chunk_size,
                input.clone(),
                output.clone(),
            );
            settings.validate()?;

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            let run = pipeline::run(&settings, cancel).await?;
            Ok(match &run.status {
                RunStatus::Completed => 0,
                RunStatus::Failed { .. } => {
                    if let Some((step, failure)) = run.failure() {
                        eprintln!("Step '{}' failed: {}", step, failure.cause);
                        if failure.cause.is_duplicate_key() {
                            eprintln!(
                                "The relational store already holds these ids; \
                                 clear it before running again."
                            );
                        }
                        if failure.partial_write_possible {
                            eprintln!("Part of the failed chunk may have been written.");
                        }
                    }
                    1
                },
                RunStatus::Cancelled { next_step } => {
                    eprintln!("Cancelled before step '{}'", next_step);
                    EXIT_CANCELLED
                },
            })
        },

        Commands::Check => {
            let settings = Settings::load(cli.config.as_deref())?;
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{}", rendered);
            Ok(0)
        },
    }
}

/// Cancel the run at the next step boundary on Ctrl-C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, stopping after the current step");
        cancel.cancel();
    }
}
