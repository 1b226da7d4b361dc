mod cli;
mod commands;
mod config;
mod errors;
mod logging;

use crate::cli::Cli;
use crate::config::Config;

use clap::Parser;
use color_eyre::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    errors::init()?;
    let args = Cli::parse();
    let config = Config::new()?;
    config.ensure_dirs()?;
    let _log_guard = logging::init(&config.data_dir)?;
    commands::dispatch(args.cmd, config).await
}
