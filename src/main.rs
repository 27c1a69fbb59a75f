//! pslpkg binary entry point.

use pslpkg::cli::{self, OutputManager};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = tokio::select! {
        result = cli::run() => match result {
            Ok(code) => code,
            Err(e) => {
                let output = OutputManager::new(false, false);
                output.error(&format!("Fatal error: {e}"));
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            let output = OutputManager::new(false, false);
            output.error("Interrupted by Ctrl-C");
            1
        }
    };
    process::exit(exit_code);
}
