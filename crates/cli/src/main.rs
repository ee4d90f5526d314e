// habits CLI entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod exit_code;
mod output;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "habits", version, about = "Command-line client for Habitica")]
struct Cli {
    /// Config file [default: <config dir>/habits/config.toml]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).init();

    match commands::run(cli.config, cli.command) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            output::print_error(&error);
            ExitCode::from_error(&error).into()
        }
    }
}
