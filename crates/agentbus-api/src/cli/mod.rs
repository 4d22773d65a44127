//! CLI command definitions for the `abus` binary.

pub mod config;
pub mod demo;

use clap::{Parser, Subcommand};

/// Run and inspect agents that talk over an in-process event bus.
#[derive(Parser)]
#[command(name = "abus", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved configuration and where it came from.
    Config,

    /// Start the demonstration agents, exercise the bus, and print statistics.
    Demo {
        /// Number of pings to post.
        #[arg(long, default_value_t = 3)]
        pings: u32,

        /// Number of steps in the demonstration task.
        #[arg(long, default_value_t = 3)]
        steps: usize,
    },
}
