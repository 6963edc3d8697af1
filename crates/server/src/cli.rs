use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Path to the configuration file.
    ///
    /// Defaults to `Config.toml` in the working directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start serving update checks and installer downloads.
    Serve,

    /// Print the SHA-256 checksum clients will expect for an installer file.
    Checksum {
        /// Installer file path.
        path: PathBuf,
    },
}
