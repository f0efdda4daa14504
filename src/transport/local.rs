//! Loopback host
//!
//! A host written as `file:///some/dir` stands for a machine whose
//! filesystem root is `/some/dir`. Uploads are plain copies below it and a
//! trigger runs the delivered program with the in-crate agent interpreter,
//! so a whole deploy can be exercised without a network.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{Transfer, Trigger};
use crate::agent;
use crate::error::TransportError;
use crate::logging::*;

pub const SCHEME: &str = "file://";

pub struct LocalHost {
	root: PathBuf,
	public_dir: String,
	base_url: String,
}

/// Directory behind a `file://` host value
pub fn host_root(host: &str) -> Option<PathBuf> {
	host.strip_prefix(SCHEME).filter(|p| p.starts_with('/')).map(PathBuf::from)
}

impl LocalHost {
	pub fn new(
		root: impl Into<PathBuf>,
		public_dir: impl Into<String>,
		base_url: impl Into<String>,
	) -> Self {
		Self {
			root: root.into(),
			public_dir: public_dir.into(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn map(&self, remote_path: &str) -> PathBuf {
		self.root.join(remote_path.trim_start_matches('/'))
	}

	/// Delivered file a URL refers to
	fn resolve(&self, url: &str) -> Option<PathBuf> {
		let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
		if name.is_empty() || name.split('/').any(|s| s == "..") {
			return None;
		}
		Some(self.map(&self.public_dir).join(name))
	}
}

fn local_error(message: impl Into<String>) -> TransportError {
	TransportError::Local { message: message.into() }
}

#[async_trait]
impl Transfer for LocalHost {
	async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), TransportError> {
		let dest = self.map(remote_path);
		if let Some(parent) = dest.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::copy(local, &dest).await?;
		debug!("Delivered {} to {}", local.display(), dest.display());
		Ok(())
	}
}

#[async_trait]
impl Trigger for LocalHost {
	async fn post(&self, url: &str, secret: &str) -> Result<String, TransportError> {
		let not_found = || TransportError::Status { url: url.to_string(), status: 404 };
		let program = self.resolve(url).ok_or_else(not_found)?;
		if !program.is_file() {
			return Err(not_found());
		}

		let secret = secret.to_string();
		tokio::task::spawn_blocking(move || agent::run(&program, &secret))
			.await
			.map_err(|e| local_error(format!("agent task failed: {}", e)))?
			.map_err(|e| local_error(format!("agent failed: {}", e)))
	}
}


// vim: ts=4
