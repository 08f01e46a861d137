//! atc-mcp: coordinator for teams of coding agents.
//!
//! # Subcommands
//!
//! - `serve`: Serve coordinator tools over stdio
//! - `config`: Show resolved configuration
//! - `status`: List teams and their member counts

use agent_team_coord_core::logging;
use clap::Parser;

use atc_mcp::cli::{Cli, Commands};
use atc_mcp::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(&cli.config, args).await,
        Commands::Config(args) => commands::config_cmd::run(&cli.config, args).await,
        Commands::Status(args) => commands::status::run(&cli.config, args).await,
    }
}
