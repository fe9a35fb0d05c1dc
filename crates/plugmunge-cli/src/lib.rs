//! plugmunge: applies and reverts plugin config changes on native project files
//!
//! The library exposes the munger and its collaborators for the binary and
//! for integration tests.

pub mod commands;
pub mod common;
pub mod config_file;
pub mod config_parser;
pub mod errors;
pub mod munger;
pub mod plugin_info;

pub use common::GlobalOpts;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber. `RUST_LOG` overrides the level derived
/// from the verbosity flags.
pub fn init_tracing() {
    let level = plugmunge_logger::verbosity_to_filter();
    let default_filter = format!("plugmunge={level},plugmunge_tree={level},plugmunge_state={level}");
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
