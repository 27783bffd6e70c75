//! CLI entrypoint for the embedmongo orchestrator.
//!
//! The binary delegates to [`embedmongo::run`], which loads configuration,
//! initialises diagnostics and executes `start` or `stop`.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    embedmongo::run(std::env::args_os(), &mut stdout, &mut stderr)
}
