//! Composer CLI entry point.

use clap::Parser;

use composer::cli::{commands, handle_error, load_config, Cli, Commands};
use composer::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let _logger = LoggerImpl::init(&config.logging)?;

    match cli.command {
        Commands::Rewrite(args) => commands::rewrite::execute(args, &config, cli.json).await,
        Commands::Actions => commands::actions::execute(cli.json),
        Commands::Config(command) => {
            commands::config::execute(command, &config, cli.config.as_deref(), cli.json)
        }
    }
}
