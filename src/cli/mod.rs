//! CLI command definitions and parsing
use crate::storage::FindingType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "findex",
    version,
    about = "Hybrid lexical and semantic search over session findings",
    long_about = "findex stores praise, blockers, suggestions and nitpicks extracted from development \
                  sessions in a single SQLite file and answers free-text queries by fusing BM25 and \
                  vector search with Reciprocal Rank Fusion."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/findex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and apply the schema
    Init,

    /// Show database statistics
    Stats,

    /// Search findings
    Search {
        /// Search query text
        query: String,

        /// Only return findings of this type (praise, blocker, suggestion, nitpick)
        #[arg(short = 't', long = "type")]
        finding_type: Option<FindingType>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Replace findings from a JSON file, grouped by session
    Ingest {
        /// JSON array of findings
        file: PathBuf,
    },

    /// Delete every finding of a session
    PurgeSession {
        /// Session identifier
        session_id: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
