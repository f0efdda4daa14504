//! Remote scan agent
//!
//! Reports the tree below its root in the wire format of
//! [`crate::protocol::scan`], leaving out its own program file. The report
//! is only printed once the whole walk succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use super::{secrets_match, Lifecycle};
use crate::exclusion::FileFilter;
use crate::logging::*;
use crate::protocol::report::fail_line;
use crate::protocol::scan::{encode_record, encode_root};
use crate::scan;

pub struct ScanAgent {
	root: PathBuf,
	program: PathBuf,
	filter: FileFilter,
	lifecycle: Lifecycle,
	report: String,
}

impl ScanAgent {
	pub fn open(
		program: &Path,
		root: &str,
		secret: &str,
		supplied: &str,
		rules: Vec<(String, bool)>,
	) -> Self {
		let base = program.parent().unwrap_or_else(|| Path::new(".")).join(root.trim_matches('/'));
		let mut agent = ScanAgent {
			root: base.clone(),
			program: program.to_path_buf(),
			filter: FileFilter::default(),
			lifecycle: Lifecycle::Ready,
			report: String::new(),
		};

		if !secrets_match(secret, supplied) {
			warn!("Scan agent {} called with an invalid key", program.display());
			agent.abort("open", "invalid key");
			return agent;
		}
		match fs::canonicalize(&base) {
			Ok(root) if root.is_dir() => agent.root = root,
			_ => {
				agent.abort("open", "root not found");
				return agent;
			}
		}
		match FileFilter::from_rules(rules) {
			Ok(filter) => agent.filter = filter,
			Err(e) => agent.abort("open", &e.to_string()),
		}
		agent
	}

	pub fn is_consumed(&self) -> bool {
		self.lifecycle == Lifecycle::Consumed
	}

	pub fn into_report(self) -> String {
		self.report
	}

	pub fn scan(&mut self) {
		if self.is_consumed() {
			return;
		}
		let own = fs::canonicalize(&self.program).ok();
		match scan::walk(&self.root, &self.filter, own.as_deref()) {
			Ok(records) => {
				debug!("Scan agent reporting {} entries", records.len());
				self.report.push_str(&encode_root(&self.root.to_string_lossy()));
				self.report.push('\n');
				for record in &records {
					self.report.push_str(&encode_record(record));
					self.report.push('\n');
				}
			}
			Err(e) => self.abort("scan", &e.to_string()),
		}
	}

	pub fn cleanup(&mut self) {
		if !self.is_consumed() {
			self.consume();
		}
	}

	fn abort(&mut self, action: &str, reason: &str) {
		self.consume();
		self.report.push_str(&fail_line(action, None, Some(reason)));
		self.report.push('\n');
	}

	fn consume(&mut self) {
		self.lifecycle = Lifecycle::Consumed;
		if let Err(e) = fs::remove_file(&self.program) {
			error!("Cannot delete agent {}: {}", self.program.display(), e);
			self.report.push_str(&fail_line("cleanup", None, Some("cannot delete agent")));
			self.report.push('\n');
		}
	}
}


// vim: ts=4
