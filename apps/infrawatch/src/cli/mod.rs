//! # InfraWatch CLI Module
//!
//! ## Available Commands
//!
//! - `classify` - Classify one snapshot into a stage
//! - `detect` - Detect signals between two snapshots
//! - `evaluate` - Run one full cycle (stage + signals)
//! - `aggregate` - Build a weighted index from observations
//! - `coverage` - Compute a coverage range from revenue and capex
//! - `replay` - Re-run the engine over a snapshot history
//! - `check-config` - Validate and print the active thresholds
//! - `stages` - List the lifecycle stages

mod commands;

use crate::config::ConfigHandle;
use clap::{Parser, Subcommand};
use infrawatch_core::InfraWatchError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// InfraWatch - Stage & Signal Engine
///
/// Classifies infrastructure economics snapshots into lifecycle stages and
/// flags significant indicator movements.
#[derive(Parser, Debug)]
#[command(name = "infrawatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Threshold config file (TOML); built-in thresholds when omitted
    #[arg(short = 'c', long, global = true, env = "INFRAWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a snapshot into a lifecycle stage
    Classify {
        /// Snapshot file (full metrics snapshot or stage inputs, JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Detect signals between two snapshots
    Detect {
        /// Current snapshot (JSON)
        #[arg(long)]
        current: PathBuf,

        /// Comparison snapshot (JSON)
        #[arg(long)]
        previous: PathBuf,
    },

    /// Run one evaluation cycle
    Evaluate {
        /// Current snapshot (JSON)
        #[arg(long)]
        current: PathBuf,

        /// Comparison snapshot (JSON); stage only when omitted
        #[arg(long)]
        previous: Option<PathBuf>,
    },

    /// Build a weighted index from observations
    Aggregate {
        /// Observations file (JSON array)
        #[arg(short, long)]
        file: PathBuf,

        /// Index family name from the config
        #[arg(long, default_value = "gpu_hourly_index")]
        family: String,
    },

    /// Compute a coverage range
    Coverage {
        /// Attributable revenue for the period
        #[arg(long)]
        revenue: f64,

        /// Capital expenditure for the period
        #[arg(long)]
        capex: f64,

        /// Entity the figures belong to
        #[arg(long)]
        entity: Option<String>,
    },

    /// Replay the engine over a snapshot history
    Replay {
        /// History file (JSON array of snapshots)
        #[arg(short, long)]
        file: PathBuf,

        /// Drop repeated threshold crossings across cycles
        #[arg(long)]
        dedup: bool,

        /// Re-read the config file before every cycle
        #[arg(long)]
        reload: bool,
    },

    /// Validate and print the active thresholds
    CheckConfig,

    /// List the lifecycle stages
    Stages,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), InfraWatchError> {
    let json_mode = cli.json_mode;
    let handle = ConfigHandle::open(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Classify { file }) => cmd_classify(&handle, json_mode, &file),
        Some(Commands::Detect { current, previous }) => {
            cmd_detect(&handle, json_mode, &current, &previous)
        }
        Some(Commands::Evaluate { current, previous }) => {
            cmd_evaluate(&handle, json_mode, &current, previous.as_deref())
        }
        Some(Commands::Aggregate { file, family }) => {
            cmd_aggregate(&handle, json_mode, &file, &family)
        }
        Some(Commands::Coverage {
            revenue,
            capex,
            entity,
        }) => cmd_coverage(&handle, json_mode, revenue, capex, entity),
        Some(Commands::Replay {
            file,
            dedup,
            reload,
        }) => cmd_replay(&handle, json_mode, &file, dedup, reload),
        Some(Commands::CheckConfig) => cmd_check_config(&handle, json_mode),
        Some(Commands::Stages) => cmd_stages(json_mode),
        None => {
            // No subcommand - list stages by default
            cmd_stages(json_mode)
        }
    }
}
