//! One-time remote execution
//!
//! The remote host only offers file upload and HTTP. An agent is therefore
//! written to a local temporary file, uploaded under a random name into the
//! public directory and triggered with one POST carrying its secret. Each
//! agent gets a fresh name and a fresh, independent secret.
//!
//! # Example Usage
//!
//! ```ignore
//! use shipit::transport::{AgentRunner, FtpTransfer, HttpTrigger};
//!
//! let runner = AgentRunner::new(&transfer, &trigger, "/public_html", "https://example.com");
//! let report = runner.run(|out, secret| write_agent(out, secret)).await?;
//! ```

pub mod ftp;
pub mod http;
pub mod local;

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ArchiveError, DeployError, TransportError};
use crate::logging::*;
use crate::util;

pub use ftp::FtpTransfer;
pub use http::HttpTrigger;
pub use local::LocalHost;

const AGENT_NAME_LEN: usize = 72;
const SECRET_LEN: usize = 128;

/// Delivers a local file to a path on the remote host
#[async_trait]
pub trait Transfer: Send + Sync {
	/// `remote_path` is absolute; missing parent directories are created
	async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), TransportError>;
}

/// Requests a delivered agent
#[async_trait]
pub trait Trigger: Send + Sync {
	/// POST `key=<secret>` to `url` and return the response body
	async fn post(&self, url: &str, secret: &str) -> Result<String, TransportError>;
}

pub struct AgentRunner<'a> {
	transfer: &'a dyn Transfer,
	trigger: &'a dyn Trigger,
	public_dir: String,
	base_url: String,
}

impl<'a> AgentRunner<'a> {
	pub fn new(
		transfer: &'a dyn Transfer,
		trigger: &'a dyn Trigger,
		public_dir: impl Into<String>,
		base_url: impl Into<String>,
	) -> Self {
		Self { transfer, trigger, public_dir: public_dir.into(), base_url: base_url.into() }
	}

	/// Build an agent with `build`, deliver and trigger it once. The local
	/// blob is removed whatever happens.
	pub async fn run<F>(&self, build: F) -> Result<String, DeployError>
	where
		F: FnOnce(&mut dyn Write, &str) -> Result<(), ArchiveError>,
	{
		let name = format!("{}.php", util::random_token(AGENT_NAME_LEN));
		let secret = util::random_token(SECRET_LEN);

		let blob = tempfile::Builder::new()
			.prefix("shipit-")
			.suffix(".php")
			.tempfile()
			.map_err(TransportError::Io)?;
		{
			let file: &File = blob.as_file();
			let mut out = BufWriter::new(file);
			build(&mut out, &secret)?;
			out.flush().map_err(TransportError::Io)?;
		}

		let remote_path = format!("{}/{}", self.public_dir.trim_end_matches('/'), name);
		let url = format!("{}/{}", self.base_url.trim_end_matches('/'), name);

		debug!("Uploading agent to {}", remote_path);
		self.transfer.upload(blob.path(), &remote_path).await?;
		debug!("Triggering {}", url);
		let body = self.trigger.post(&url, &secret).await?;
		trace!("Agent response:\n{}", body);
		Ok(body)
	}
}


// vim: ts=4
