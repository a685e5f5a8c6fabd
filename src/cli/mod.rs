// src/cli/mod.rs
//! CLI definitions for missionpack
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "missionpack")]
#[command(version)]
#[command(about = "Build, inspect and extract mission packages", long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a package from files and records
    Build {
        /// Package name
        #[arg(short, long)]
        name: String,

        /// Package uid (generated when omitted)
        #[arg(short, long)]
        uid: Option<String>,

        /// Free-form remarks
        #[arg(short, long)]
        remarks: Option<String>,

        /// Output archive path
        #[arg(short, long)]
        output: String,

        /// Directory of <uid>.cot records to include
        #[arg(long)]
        records: Option<String>,

        /// Files to include
        files: Vec<String>,

        /// Do not import the package on the receiving device
        #[arg(long)]
        no_import: bool,

        /// Delete the package on the receiving device after processing
        #[arg(long)]
        delete_on_receive: bool,
    },

    /// Extract a package (upgrading legacy archives in place)
    Extract {
        /// Archive to extract
        archive: String,

        /// Extraction root
        #[arg(short, long, default_value = ".")]
        root: String,

        /// Glob patterns of legacy entries to ignore
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },

    /// Show a package's manifest
    Inspect {
        /// Archive to inspect
        archive: String,

        /// List every content entry
        #[arg(short, long)]
        entries: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether an archive carries a recognized manifest
    Check {
        /// Archive to check
        archive: String,
    },
}
