//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use secretary_core::TracingOutputFormat;

use crate::tools::ToolGroup;

/// secretary - calendars, tasks, events and journals as tools
#[derive(Debug, Parser)]
#[command(name = "secretary")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file (a .secrets.toml next to it is read too)
    #[arg(long, short, env = "SECRETARY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log output format (logs always go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    /// Tool group to enable (can be repeated; default: all)
    #[arg(long = "tools", value_enum, action = clap::ArgAction::Append, global = true)]
    pub tools: Vec<ToolGroup>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for TracingOutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve tools over stdin/stdout (default)
    Serve,

    /// Print the tool catalogue as JSON
    Tools,

    /// Validate the configuration and test the server connection
    CheckConfig {
        /// Only validate the configuration, do not contact the server
        #[arg(long)]
        offline: bool,
    },
}
