//! Uploads over explicit FTPS, driven through `curl`

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::Transfer;
use crate::error::TransportError;
use crate::logging::*;

pub const DEFAULT_PORT: u16 = 21;

pub struct FtpTransfer {
	host: String,
	port: u16,
	user: String,
	password: String,
}

impl FtpTransfer {
	pub fn new(
		host: impl Into<String>,
		port: Option<u16>,
		user: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			host: host.into(),
			port: port.unwrap_or(DEFAULT_PORT),
			user: user.into(),
			password: password.into(),
		}
	}

	pub fn url(&self, remote_path: &str) -> String {
		let path = remote_path
			.split('/')
			.filter(|s| !s.is_empty())
			.map(percent_encode)
			.collect::<Vec<_>>()
			.join("/");
		format!("ftp://{}:{}/{}", self.host, self.port, path)
	}
}

/// Escape everything outside the unreserved URL set
fn percent_encode(segment: &str) -> String {
	let mut out = String::with_capacity(segment.len());
	for b in segment.bytes() {
		match b {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
			_ => out.push_str(&format!("%{:02X}", b)),
		}
	}
	out
}

/// Config text for `curl -K -`, keeping credentials off the command line
fn curl_config(user: &str, password: &str) -> String {
	let credentials = format!("{}:{}", user, password);
	let mut quoted = String::with_capacity(credentials.len() + 2);
	for c in credentials.chars() {
		match c {
			'\\' | '"' => {
				quoted.push('\\');
				quoted.push(c);
			}
			'\n' => quoted.push_str("\\n"),
			'\r' => quoted.push_str("\\r"),
			'\t' => quoted.push_str("\\t"),
			_ => quoted.push(c),
		}
	}
	format!("user = \"{}\"\n", quoted)
}

impl FtpTransfer {
	fn command(&self, local: &Path, url: &str) -> Command {
		let mut cmd = Command::new("curl");
		cmd.arg("--silent")
			.arg("--show-error")
			.arg("--ssl-reqd")
			.arg("--ftp-create-dirs")
			.arg("-K")
			.arg("-")
			.arg("-T")
			.arg(local)
			.arg(url)
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::piped());
		cmd
	}
}

#[async_trait]
impl Transfer for FtpTransfer {
	async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), TransportError> {
		let url = self.url(remote_path);
		debug!("curl upload {} -> {}", local.display(), url);

		let spawn_error = |e| TransportError::SpawnFailed { cmd: "curl".to_string(), source: e };
		let mut child = self.command(local, &url).spawn().map_err(spawn_error)?;
		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(curl_config(&self.user, &self.password).as_bytes()).await?;
		}
		let output = child.wait_with_output().await?;

		if output.status.success() {
			Ok(())
		} else {
			Err(TransportError::Upload {
				code: output.status.code(),
				message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}
}


// vim: ts=4
