use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scdloop")]
#[command(author, version, about = "Read and write loop points of SCD game-audio files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the loop stored in a file
    Read {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a loop, in samples
    Write {
        #[arg(required = true)]
        file: PathBuf,

        /// First sample of the loop
        start: u64,

        /// Sample the loop jumps back from (exclusive)
        end: u64,

        /// Leave the header loop fields of Vorbis files untouched
        #[arg(long)]
        no_header_sync: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove the loop from a file
    Clear {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display stream information without interpreting loop data
    Info {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
