//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// skc - Result cache for skill invocations
#[derive(Parser)]
#[command(name = "skc")]
#[command(author, version, about, long_about = None)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides config and SKILLCACHE_DIR)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Producer identity recorded on written entries
    #[arg(short, long, global = true)]
    pub producer: Option<String>,

    /// Disable caching
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a cached payload
    Get {
        namespace: String,
        key: String,
    },

    /// Store a payload
    Put {
        namespace: String,
        key: String,

        /// Payload as JSON (read from stdin when omitted)
        #[arg(long)]
        payload: Option<String>,

        /// Expire the entry after this many seconds
        #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
        ttl: Option<i64>,

        /// Invalidate the entry when this file changes
        #[arg(long = "track", value_name = "PATH")]
        tracked: Vec<PathBuf>,
    },

    /// Report whether an entry is fresh
    Check {
        namespace: String,
        key: String,
    },

    /// Remove one entry, or every entry of a namespace
    Invalidate {
        namespace: String,
        key: Option<String>,
    },

    /// Remove entries that track a file
    InvalidateFile {
        path: PathBuf,

        /// Only look in this namespace
        #[arg(long)]
        namespace: Option<String>,
    },

    /// List namespaces, or the entries of one
    List {
        namespace: Option<String>,
    },

    /// Access shared resources
    Shared {
        #[command(subcommand)]
        command: SharedCommands,
    },

    /// Remove corrupt, stale, or orphaned files
    Gc {
        /// Report without deleting
        #[arg(long)]
        dry_run: bool,

        /// Also remove expired or changed entries
        #[arg(long)]
        stale: bool,

        /// Known producer; entries from any other are removed
        #[arg(long = "known-producer", value_name = "NAME")]
        known_producers: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SharedCommands {
    /// Print a shared payload, whoever produced it
    Get {
        name: String,
    },

    /// Print the canonical location of a shared resource
    Resolve {
        name: String,
    },
}
