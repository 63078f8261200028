use clap::{Parser, Subcommand};
use seamcut::simulate::ScheduledSeek;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seamcut")]
#[command(author, version, about = "Virtual timeline playback for edited video")]
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
    /// Convert a time between the edited and source timelines
    Map {
        /// Edit file (clip list or segment list JSON)
        #[arg(required = true)]
        edit: PathBuf,

        /// Time in seconds to convert
        #[arg(long, allow_negative_numbers = true)]
        at: f64,

        /// Treat the time as a source position and map it to virtual time
        #[arg(long)]
        real: bool,

        /// Snap source times within this many seconds of a segment
        #[arg(long)]
        tolerance: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the segments of an edit and any problems with it
    Inspect {
        /// Edit file to inspect
        #[arg(required = true)]
        edit: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play an edit on a simulated video element and report what happens
    Simulate {
        /// Edit file to play
        #[arg(required = true)]
        edit: PathBuf,

        /// Seek during playback, as TARGET or AT:TARGET seconds (repeatable)
        #[arg(long = "seek", value_name = "AT:TARGET")]
        seeks: Vec<ScheduledSeek>,

        /// Playback rate
        #[arg(long)]
        rate: Option<f64>,

        /// Stop after this many simulated seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Length of the simulated source in seconds
        #[arg(long)]
        source_duration: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
