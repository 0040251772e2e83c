//! stylebuild - Command-line tool that compiles LESS stylesheets into CSS

use std::process::ExitCode;

use stylebuild::cli;

fn main() -> ExitCode {
    cli::run()
}
