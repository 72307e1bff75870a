// src/main.rs
mod app;
mod cache;
mod cli;
mod config;
mod discovery;
mod error;
mod output;
mod types;
mod utils;

#[cfg(test)]
mod testing;

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, warn};

use cli::Args;
use config::Paths;

const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    let paths = match Paths::resolve(args.home.as_deref()) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = utils::fs::create_private_dir(paths.root()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    let guard = match utils::logging::init(&paths.log_file(), args.debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to open log file {}: {}", paths.log_file().display(), e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Using state directory {}", paths.root().display());

    // SSH and kubectl calls block, keep them off the runtime so Ctrl-C can still be observed
    let task = tokio::task::spawn_blocking(move || app::run(args, paths));

    let code = tokio::select! {
        joined = task => match joined {
            Ok(Ok(())) => ExitCode::SUCCESS,
            Ok(Err(e)) => {
                error!("{}", e);
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("Command task failed: {}", e);
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning in-flight request");
            eprintln!("Interrupted");
            drop(guard);
            // The blocking worker may sit in a socket read; exiting closes the connection.
            std::process::exit(INTERRUPTED.into());
        }
    };

    drop(guard);
    code
}
