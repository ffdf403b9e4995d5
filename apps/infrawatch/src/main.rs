//! # InfraWatch - Stage & Signal Engine
//!
//! The command-line orchestrator around `infrawatch-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/infrawatch (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   Config    │    │  Crossing ledger │     │
//! │  │  (clap)     │    │   (TOML)    │    │  + reports       │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                  ┌──────────────────┐                           │
//! │                  │ infrawatch-core  │                           │
//! │                  │   (THE LOGIC)    │                           │
//! │                  └──────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! infrawatch classify -f snapshot.json
//! infrawatch evaluate --current this_week.json --previous last_week.json
//! infrawatch --config thresholds.toml replay -f history.json --dedup
//! ```

use clap::Parser;
use infrawatch::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // INFRAWATCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("INFRAWATCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "infrawatch=debug"
    } else {
        "infrawatch=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the InfraWatch startup banner.
fn print_banner() {
    println!(
        r#"
  InfraWatch v{}

  Stage Classification & Signal Detection
"#,
        env!("CARGO_PKG_VERSION")
    );
}
