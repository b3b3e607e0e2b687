mod cli;
mod config;

use clap::Parser;
use tokio::runtime::Runtime;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse command line and environment variables
    let cli::Cli { command } = cli::Cli::parse();
    let config = config::Config::from_env()?;

    // Run the command to completion
    let runtime = Runtime::new()?;
    runtime.block_on(cli::run(command, &config))
}
