//! # InfraWatch Orchestrator Library
//!
//! Everything the `infrawatch` binary does around the pure engine:
//! - `cli`: clap commands
//! - `config`: TOML loading and atomic hot-swap
//! - `ledger`: crossing dedup across cycles
//! - `report`: serializable report records

pub mod cli;
pub mod config;
pub mod ledger;
pub mod report;
