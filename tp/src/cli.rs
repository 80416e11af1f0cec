//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Trip planning daemon
#[derive(Debug, Parser)]
#[command(name = "tp", version, about = "Multi-stage trip planning daemon", arg_required_else_help = true)]
pub struct Cli {
    /// Path to a config file (defaults to .tripdaemon.yml, then
    /// ~/.config/tripdaemon/tripdaemon.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Serve,

    /// Submit a trip request from a JSON file ('-' reads stdin)
    Submit {
        file: PathBuf,

        /// Poll the session until it completes or fails
        #[arg(long)]
        wait: bool,
    },

    /// Show a session's status
    Status {
        session_id: Uuid,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show daemon session metrics
    Metrics {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the daemon is alive
    Ping,

    /// Ask a running daemon to shut down gracefully
    Stop,
}

/// Output format for read commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
