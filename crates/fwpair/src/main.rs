mod cli;
mod commands;
mod config;
mod email;
mod error;
mod output;
mod report;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = init_tracing(cli.global.verbose, matches!(cli.command, Command::Run(_)));
    let result = commands::dispatch(cli.command, &cli.global).await;
    // Flush the file log; process::exit skips destructors.
    drop(guard);

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Console logging on stderr; runs also append to a daily log file.
fn init_tracing(verbosity: u8, log_to_file: bool) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_or = |fallback: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_or(level));

    let (file, guard) = if log_to_file {
        let defaults = config::load_config_or_default().defaults;
        let dir = config::log_dir(&defaults);
        if std::fs::create_dir_all(&dir).is_ok() {
            let appender = tracing_appender::rolling::daily(&dir, "fwpair.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The file keeps the full run at info even when the console is quiet.
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_or(if verbosity == 0 { "info" } else { level }));
            (Some(layer), Some(guard))
        } else {
            (None, None)
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}
