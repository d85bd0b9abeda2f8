//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Amazon Ads extraction tap
#[derive(Parser, Debug)]
#[command(name = "tap-amazon-ads")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON), read at start and rewritten at checkpoints
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the configuration specification
    Spec,

    /// Test credentials and profile access
    Check,

    /// Print the stream catalog
    Discover,

    /// Read data from streams
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,
    },
}

impl Commands {
    /// Stream names selected by `read --streams`
    pub fn selected_streams(&self) -> Vec<String> {
        match self {
            Commands::Read {
                streams: Some(list),
            } => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_with_streams() {
        let cli = Cli::parse_from([
            "tap-amazon-ads",
            "--config",
            "config.json",
            "--state",
            "state.json",
            "read",
            "--streams",
            "keywords, targets,,",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("config.json")));
        assert_eq!(cli.state, Some(PathBuf::from("state.json")));
        assert_eq!(
            cli.command.selected_streams(),
            vec!["keywords".to_string(), "targets".to_string()]
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tap-amazon-ads", "check", "-v", "--config-json", "{}"]);
        assert!(cli.verbose);
        assert_eq!(cli.config_json.as_deref(), Some("{}"));
        assert!(matches!(cli.command, Commands::Check));
        assert!(cli.command.selected_streams().is_empty());
    }
}
