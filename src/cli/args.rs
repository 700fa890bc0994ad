//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::config::OutputFormat;

/// Build hierarchical trees from flat parent-referencing records
#[derive(Parser, Debug)]
#[command(name = "treebuilder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global config
    #[arg(short, long, global = true, env = "TREEBUILDER_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and print trees from a record file
    Build {
        /// Record file (.json or .toml)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Root record id; all trees when omitted
        #[arg(short, long, allow_negative_numbers = true)]
        root: Option<i64>,
        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Drop records whose name matches, with their subtree (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// List ids of records that start a tree
    Roots {
        /// Record file (.json or .toml)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,
}
