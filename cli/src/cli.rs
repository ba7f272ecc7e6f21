//! Command-line interface for flux

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flux")]
#[command(about = "Content-addressed version control for tabular text datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override repository location (defaults to $FLUX_REPO or ./.flux)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a flux repository
    Init,

    /// Create an immutable version from a raw CSV file and a config
    Create {
        /// Raw CSV input file (must contain a `text` column)
        input: String,

        /// Preprocessing config as a JSON file (defaults to an empty pipeline)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Tag to assign to the created version
        #[arg(long)]
        tag: Option<String>,

        /// Author recorded on the version (defaults to the OS username)
        #[arg(long)]
        author: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all versions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one version's metadata and metrics
    Show {
        /// Version reference: full hash, unique prefix, or tag
        reference: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign or move a tag
    Tag {
        /// Version reference the tag should point at
        reference: String,

        /// Tag name
        name: String,
    },

    /// List all tags
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two versions
    Compare {
        /// Left (old) version reference
        left: String,

        /// Right (new) version reference
        right: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a version to a portable .tar.gz archive
    Export {
        /// Version reference to export
        reference: String,

        /// Directory the archive is written into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Import a version archive, verifying its content hash
    Import {
        /// Path to a .tar.gz archive produced by `flux export`
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-hash a stored version's artifacts and check its identity
    Verify {
        /// Version reference to verify
        reference: String,
    },
}
