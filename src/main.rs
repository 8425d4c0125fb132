use anyhow::Result;
use clap::Parser;

use kepler::cli::{self, args::Cli, context::init_tracing};
use kepler::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;
    init_tracing(&config.global.logging)?;
    cli::run(cli, config).await
}
