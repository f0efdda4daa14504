//! # shipit - Transactional deploys without a shell
//!
//! shipit mirrors a local directory onto a host that can only be reached by
//! FTP uploads and HTTP requests. It asks a disposable scan agent for the
//! remote state, diffs it against the local tree, then ships a disposable
//! deploy agent carrying the changed files. The deploy agent backs up what
//! it touches and rolls everything back when a step fails.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipit::config::ConfigLoader;
//! use shipit::deploy::DeployRunner;
//! use shipit::transport::local::LocalHost;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load(None)?;
//!     let host = LocalHost::new("/srv/fake", &*config.public_dir, &*config.base_url);
//!     let outcome = DeployRunner::new(&config, &host, &host).run(false).await?;
//!     for action in &outcome.actions {
//!         println!("{}", action);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod archive;
pub mod compare;
pub mod config;
pub mod deploy;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod paths;
pub mod protocol;
pub mod scan;
pub mod transport;
pub mod types;
pub mod util;

// Re-export commonly used types and functions
pub use config::{Config, ConfigLoader};
pub use deploy::{DeployOutcome, DeployRunner, DeployStatus};
pub use error::{AgentError, ArchiveError, ConfigError, DeployError, ScanError, TransportError};
pub use types::{Action, ActionKind, FileKind, FileRecord};

// vim: ts=4
