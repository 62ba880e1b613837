//! CLI module for the relay
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `send` - Dispatch one conversation with retry and failover
//! - `endpoints` - List configured endpoints
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Ask the default endpoint, failing over on errors
//! relay send "Summarise RFC 9110 in one line"
//!
//! # Stream from a specific endpoint without failover
//! relay send --endpoint local --no-failover --stream "Hello"
//!
//! # Generate shell completions
//! relay completions bash > ~/.bash_completion.d/relay
//! ```

pub mod completions;
pub mod config;
pub mod endpoints;
pub mod output;
pub mod send;

pub use completions::handle_completions;
pub use config::handle_config_init;
pub use endpoints::handle_endpoints;
pub use send::handle_send;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Relay - resilient multi-endpoint LLM dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    version,
    about = "Send conversations to LLM endpoints with retry and failover"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch a conversation
    Send(SendArgs),
    /// List configured endpoints
    Endpoints(EndpointsArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Config file the command reads, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Send(args) => Some(&args.config),
            Commands::Endpoints(args) => Some(&args.config),
            Commands::Config(_) | Commands::Completions(_) => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// User prompt (read from stdin when omitted and no conversation file is given)
    pub prompt: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Try this endpoint first
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Do not fail over when the preferred endpoint fails
    #[arg(long, requires = "endpoint")]
    pub no_failover: bool,

    /// Print the answer as it streams in
    #[arg(short, long)]
    pub stream: bool,

    /// System instruction prepended to the conversation
    #[arg(long)]
    pub system: Option<String>,

    /// JSON file holding an array of {"role", "content"} turns
    #[arg(long)]
    pub conversation: Option<PathBuf>,

    /// Print endpoint health after the dispatch
    #[arg(long)]
    pub health: bool,

    /// Output as JSON
    #[arg(long, conflicts_with = "stream")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EndpointsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "relay.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
