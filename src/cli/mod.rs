//! Command line interface for pslpkg.

pub mod args;
pub mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;
use clap::Parser;

/// Parse arguments, initialize logging, and execute the requested command
pub async fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);
    execute_command(args).await
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
