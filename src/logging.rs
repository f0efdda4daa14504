//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Scanning remote files...");
//! debug!("Remote root: {}", root);
//! ```

pub use tracing::{debug, error, info, trace, warn};

/// Map the CLI verbosity count to a default filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence; otherwise the level follows `-v` flags:
///
/// ```bash
/// RUST_LOG=debug shipit
/// RUST_LOG=shipit::agent=trace shipit -d
/// ```
pub fn init_tracing(verbosity: u8) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level_for(verbosity))),
		)
		.with_writer(std::io::stderr)
		.init();
}


// vim: ts=4
