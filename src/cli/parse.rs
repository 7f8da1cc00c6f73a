//! CLI parse: clap types for logrelay. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::record::Severity;

/// logrelay - cross-process log relay and live log viewer
#[derive(Parser, Debug)]
#[command(name = "logrelay")]
#[command(about = "Relay log records from producer processes into a live, bounded log view")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Relay socket path (overrides configuration)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the relay and print live log lines until interrupted
    Serve {
        /// Print lines without severity colors
        #[arg(long)]
        no_color: bool,
    },
    /// Send one log record to a running relay
    Send {
        /// Producer identity (application or package name)
        #[arg(long)]
        producer: String,
        /// Origin label
        #[arg(long, default_value = "logrelay-cli")]
        tag: String,
        /// Severity name, letter or numeric code
        #[arg(long, default_value = "info")]
        severity: Severity,
        /// Message text
        message: String,
    },
    /// Forward logcat brief-format lines from stdin to a running relay
    Forward {
        /// Producer identity for every forwarded line
        #[arg(long)]
        producer: String,
    },
    /// Print the resolved configuration as TOML
    Config,
}
