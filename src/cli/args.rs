//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use clap_complete::Shell;

use crate::domain::NodeId;

/// In-memory hierarchical tree over a TOML record file
#[derive(Parser, Debug)]
#[command(name = "memtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Record file (default: `default_file` from settings)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath, env = "MEMTREE_FILE")]
    pub file: Option<PathBuf>,

    /// Print shell completions and exit
    #[arg(long = "generator", value_enum)]
    pub generator: Option<Shell>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the tree, or the subtree below an id
    Tree {
        /// Subtree root
        id: Option<NodeId>,
    },

    /// Show one node with its relations and payload
    Show {
        id: NodeId,
    },

    /// Resolve a path of names to an id
    Path {
        /// Path like `A/B/C`
        path: String,
        /// Resolve below this node instead of the first root
        #[arg(short, long)]
        start: Option<NodeId>,
        /// Match this payload field instead of the configured one
        #[arg(long)]
        field: Option<String>,
    },

    /// List nodes depth-first, indented by level
    Walk {
        /// Start node (default: whole forest)
        #[arg(short, long)]
        start: Option<NodeId>,
        /// Levels to descend, 0 = unlimited
        #[arg(long, default_value_t = 0)]
        depth: usize,
    },

    /// List descendants of a node
    Children {
        id: NodeId,
        /// Levels to descend, 0 = unlimited
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Add a node
    Add {
        /// Value of the name field
        #[arg(short, long)]
        name: String,
        /// Parent id (0 = root level)
        #[arg(short, long, default_value_t = NodeId::ROOT)]
        parent: NodeId,
        /// Insert after this sibling (default: append)
        #[arg(short, long)]
        after: Option<NodeId>,
        /// Extra payload fields as key=value
        #[arg(long = "set", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Remove a node
    Remove {
        id: NodeId,
        /// Remove the whole subtree (default from settings)
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move nodes below a new parent
    Move {
        #[arg(required = true)]
        ids: Vec<NodeId>,
        /// New parent (0 = root level, or taken from --after)
        #[arg(short, long, default_value_t = NodeId::ROOT)]
        parent: NodeId,
        /// Place after this sibling (0 = first position)
        #[arg(short, long, default_value_t = NodeId::ROOT)]
        after: NodeId,
    },

    /// Set the name field of a node
    Rename {
        id: NodeId,
        name: String,
    },

    /// Copy a subtree below another node
    Copy {
        src: NodeId,
        /// Destination parent (0 = root level)
        dest: NodeId,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print a settings template
    Template,
    /// Show settings file locations
    Path,
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}
