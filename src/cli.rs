use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gcsfuse-spank",
    version,
    about = "Debugging companion for the gcsfuse job-step mount plug-in",
    long_about = "Inspect and dry-run the pieces of the gcsfuse mount plug-in: parse mount\n\
                  lists, resolve them the way the submission callback would, check them\n\
                  for conflicts, probe mountpoints, and verify node prerequisites."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a mount list and print the structured specs
    Parse {
        /// Mount list, e.g. "bucket:/mnt/data:-o ro;:/mnt/all"
        #[arg(value_name = "LIST")]
        list: String,

        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Resolve relative mount points exactly as the submission callback would
    Resolve {
        /// Mount list, e.g. "bucket:./data"
        #[arg(value_name = "LIST")]
        list: String,

        /// Base directory (default: current directory)
        #[arg(long, value_name = "PATH")]
        cwd: Option<PathBuf>,
    },

    /// Check a new mount list against an accumulated one for conflicts
    Check {
        /// The already-accumulated mount list
        #[arg(long, value_name = "LIST", default_value = "")]
        current: String,

        /// The list to be added
        #[arg(value_name = "LIST")]
        new: String,
    },

    /// Test whether a path is currently a mountpoint (exit 0: yes, 1: no)
    Probe {
        /// Path to probe
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Validate prerequisites (gcsfuse, fusermount, umount, logger)
    Doctor,

    /// Generate shell completion script (bash, zsh, fish, powershell, elvish)
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
