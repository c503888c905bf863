pub mod config;

use clap::{Parser, Subcommand};

/// npg-gateway — a policy-mediated tool-call gateway.
#[derive(Debug, Parser)]
#[command(name = "npg-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate the services config, reporting any issues.
    Validate,
    /// Dump the resolved runtime configuration (env vars + defaults) as
    /// pretty-printed JSON, and the parsed services list.
    Show,
}
