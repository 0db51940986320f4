//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rkdoc",
    version,
    about = "Inspect and recompute RK parametric documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Application configuration (RON).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a small Box/Fillet/Cylinder document and save it.
    Demo {
        /// Output file.
        #[arg(value_name = "OUT")]
        output: PathBuf,
    },

    /// List objects with their type, status and dependencies.
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Recompute a document and print the per-object outcome.
    Recompute {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Write the recomputed document back to FILE.
        #[arg(long)]
        save: bool,
    },

    /// Print the dependency graph in DOT format.
    Graph {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}
