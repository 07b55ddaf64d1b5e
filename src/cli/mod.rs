//! CLI interface for Faderlink

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Physical slider control for desktop application volumes
#[derive(Parser)]
#[command(name = "faderlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the sliders and control application volumes
    Run {
        /// Mapping file path
        #[arg(short, long, default_value = "mapping.txt")]
        config: PathBuf,
    },

    /// Validate a mapping file
    Check {
        /// Mapping file path
        #[arg(short, long, default_value = "mapping.txt")]
        config: PathBuf,
    },

    /// Generate an example mapping file
    Init,

    /// List serial ports
    Ports,

    /// Print incoming slider readings without touching any volume
    Monitor {
        /// Mapping file path
        #[arg(short, long, default_value = "mapping.txt")]
        config: PathBuf,
    },
}
