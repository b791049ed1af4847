use format_server::bootstrap::run;
use format_server::logger::is_installed as LoggerInstalled;

use std::env::{args, current_dir};
use std::process::ExitCode;

use log::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let working_dir = match current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to determine working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&working_dir, args().skip(1)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if LoggerInstalled() {
                error!("{e}");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}
