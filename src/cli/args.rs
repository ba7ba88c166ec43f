//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Live, lazily-materialized tree views over domain hierarchies
#[derive(Parser, Debug)]
#[command(name = "treeview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding a local .treeview.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Materialize and print a tree
    Render {
        /// TOML document or directory (default: configured document)
        #[arg(value_hint = ValueHint::AnyPath)]
        source: Option<PathBuf>,
        /// Root target object id (default: the editing context root)
        #[arg(short, long)]
        target: Option<String>,
        /// Tree-item id to expand (repeatable)
        #[arg(short = 'e', long = "expand")]
        expanded: Vec<String>,
        /// Representation identifier to render instead of -t/-e
        #[arg(short, long, conflicts_with_all = ["target", "expanded"])]
        representation: Option<String>,
        /// Show tree-item ids
        #[arg(long)]
        ids: bool,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the ancestor ids that reveal a tree item
    Path {
        #[arg(value_hint = ValueHint::AnyPath)]
        source: Option<PathBuf>,
        /// Tree-item id to reveal
        #[arg(short, long)]
        item: String,
        /// Root target object id
        #[arg(short, long)]
        target: Option<String>,
        /// Render the tree with the path expanded
        #[arg(long)]
        show: bool,
    },

    /// Print the ids that expand a tree item and its subtree
    Expand {
        #[arg(value_hint = ValueHint::AnyPath)]
        source: Option<PathBuf>,
        /// Tree-item id to expand
        #[arg(short, long)]
        item: String,
        /// Root target object id
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Encode or decode representation identifiers
    Repr {
        #[command(subcommand)]
        command: ReprCommands,
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
pub enum ReprCommands {
    /// Build a representation identifier
    Encode {
        /// Tree description id
        #[arg(short, long)]
        description: String,
        /// Root target object id
        #[arg(short, long)]
        target: String,
        /// Expanded tree-item id (repeatable)
        #[arg(short = 'e', long = "expand")]
        expanded: Vec<String>,
    },
    /// Show the parts of a representation identifier
    Decode {
        /// Representation identifier
        representation: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Show config file locations
    Path,
}
