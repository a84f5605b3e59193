// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse flags, hand off to `ui::run`.
// - Any failure is printed once here and turns into exit code 1.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use uclip::{cli::Args, ui};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match ui::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::report_error(&err, args.verbose);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise debug output for this crate with `--verbose`
/// and only warnings without it.
fn init_logging(verbose: bool) {
    let default = if verbose { "uclip=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
