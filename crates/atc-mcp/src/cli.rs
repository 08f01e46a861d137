//! CLI argument types for atc-mcp.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Coordinator for teams of coding agents, served as an MCP tool server
#[derive(Parser, Debug)]
#[command(name = "atc-mcp", version, about)]
pub struct Cli {
    /// Config file to use instead of the discovered .atc.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve coordinator tools over stdio
    Serve(ServeArgs),
    /// Show resolved configuration
    Config(ConfigArgs),
    /// List teams and their member counts
    Status(StatusArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Project receiving agent config documents (default: current directory)
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Root holding team directories (default: ~/.atc/teams)
    #[arg(long)]
    pub teams_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Root holding team directories (default: ~/.atc/teams)
    #[arg(long)]
    pub teams_dir: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
