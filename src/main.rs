// src/main.rs

use clap::{CommandFactory, Parser};
use color_eyre::eyre::Result;

mod cli;
mod core;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let args = cli::Cli::parse();
    let Some(mode) = args.mode else {
        let mut command = cli::Cli::command();
        command.print_help()?;
        println!();
        return Ok(());
    };

    match mode {
        cli::Mode::Subdomain => core::runner::run_subdomain_scan(args.subdomain_config()?).await,
        cli::Mode::ZeroRate => core::runner::run_zero_rate_scan(args.zero_rate_config()?).await,
    }
}
