use clap::Parser;
use papertrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
