use std::process::ExitCode;

use colored::Colorize;
use json_narrow::cli;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // RUST_LOG=json_narrow=debug for checker traces; results go to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let command_line_interface = cli::CommandLineInterface::load();
    match command_line_interface.run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
