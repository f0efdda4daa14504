//! Transactional deploy agent
//!
//! Every creating or modifying step journals how to undo itself. The first
//! such step that fails reports the failure, undoes every journaled step in
//! reverse, reports `[OK] revert` and cleans up without running the
//! post-success jobs. Nothing runs after that. Deletions are not journaled:
//! a failed `unlink`/`rmdir` is reported and the run continues.
//!
//! The agent is single-use. Once consumed (after cleanup, a rollback or a
//! bad key) its program file is gone and every further call is ignored.

use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::journal::{under, Journal, Reversal};
use super::{secrets_match, Lifecycle};
use crate::logging::*;
use crate::protocol::report::{fail_line, ok_line};
use crate::util;

fn reason(e: io::Error) -> String {
	e.to_string()
}

fn set_mode(path: &Path, mode: u32) -> Result<(), String> {
	fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(reason)
}

pub struct DeployAgent<R> {
	root: PathBuf,
	program: PathBuf,
	payload: Option<R>,
	ts: u64,
	lifecycle: Lifecycle,
	journal: Journal,
	report: String,
}

impl<R: Read> DeployAgent<R> {
	/// `root` is relative to the program's directory; `payload` must be
	/// positioned at the first byte after the separator
	pub fn open(program: &Path, root: &str, secret: &str, supplied: &str, payload: R) -> Self {
		let base = program.parent().unwrap_or_else(|| Path::new(".")).join(root.trim_matches('/'));
		let mut agent = DeployAgent {
			root: fs::canonicalize(&base).unwrap_or(base),
			program: program.to_path_buf(),
			payload: Some(payload),
			ts: SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default(),
			lifecycle: Lifecycle::Ready,
			journal: Journal::new(),
			report: String::new(),
		};

		if !secrets_match(secret, supplied) {
			warn!("Deploy agent {} called with an invalid key", program.display());
			agent.payload = None;
			agent.consume();
			agent.fail("open", None, Some("invalid key"));
		} else {
			debug!("Deploy agent targeting {}", agent.root.display());
		}
		agent
	}

	pub fn is_consumed(&self) -> bool {
		self.lifecycle == Lifecycle::Consumed
	}

	pub fn report(&self) -> &str {
		&self.report
	}

	pub fn into_report(self) -> String {
		self.report
	}

	pub fn mkdir(&mut self, path: &str, mode: u32) {
		self.step("mkdir", path, |agent| {
			let full = agent.full(path);
			match fs::create_dir(&full) {
				Ok(()) => {
					agent.journal.record(path, Reversal::RemoveDir { path: path.to_string() });
					set_mode(&full, mode)
				}
				Err(e) if e.kind() == io::ErrorKind::AlreadyExists && is_real_dir(&full) => Ok(()),
				Err(e) => Err(reason(e)),
			}
		});
	}

	pub fn chmod(&mut self, path: &str, mode: u32) {
		self.step("chmod", path, |agent| {
			let full = agent.full(path);
			let orig = fs::metadata(&full).map_err(reason)?.permissions().mode() & 0o777;
			set_mode(&full, mode)?;
			agent.journal.record(path, Reversal::RestoreMode { path: path.to_string(), mode: orig });
			Ok(())
		});
	}

	pub fn symlink(&mut self, path: &str, target: &str) {
		self.step("symlink", path, |agent| {
			let full = agent.full(path);
			let backup = agent.sidecar(path, "bak");
			let staged = agent.sidecar(path, "new");

			match fs::symlink_metadata(&full) {
				Ok(meta) if meta.file_type().is_symlink() => {
					let current = fs::read_link(&full).map_err(reason)?;
					symlink(current, agent.full(&backup))
						.map_err(|_| "failed to create backup link".to_string())?;
					agent.journal.record(&backup, Reversal::Remove { path: backup.clone() });
				}
				Ok(_) => return Err("file exists and is not a link".to_string()),
				Err(e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => return Err(reason(e)),
			}

			symlink(target, agent.full(&staged)).map_err(|_| "failed to create new link".to_string())?;
			agent.journal.record(path, Reversal::Remove { path: staged });
			Ok(())
		});
	}

	pub fn extract(&mut self, path: &str, mode: u32, size: u64, hash: &str) {
		self.step("extract", path, |agent| {
			let full = agent.full(path);
			let backup = agent.sidecar(path, "bak");
			let staged = agent.sidecar(path, "new");
			let staged_full = agent.full(&staged);

			if let Ok(meta) = fs::symlink_metadata(&full) {
				if meta.file_type().is_file() {
					let backup_full = agent.full(&backup);
					fs::copy(&full, &backup_full)
						.map_err(|_| "failed to create backup file".to_string())?;
					agent.journal.record(&backup, Reversal::Remove { path: backup.clone() });
					set_mode(&backup_full, meta.permissions().mode() & 0o777)?;
				}
			}

			let mut out = fs::File::create(&staged_full)
				.map_err(|_| "failed to open file for writing".to_string())?;
			agent.journal.record(path, Reversal::Remove { path: staged });

			let payload = agent.payload.as_mut().ok_or_else(|| "payload closed".to_string())?;
			let copied = io::copy(&mut payload.take(size), &mut out)
				.map_err(|_| "failed writing file contents".to_string())?;
			if copied != size {
				return Err("failed writing file contents".to_string());
			}
			drop(out);

			if util::hash_file(&staged_full).map_err(reason)? != hash {
				return Err("hash mismatch".to_string());
			}
			set_mode(&staged_full, mode)
		});
	}

	pub fn commit(&mut self, path: &str) {
		self.step("commit", path, |agent| {
			let backup = agent.sidecar(path, "bak");
			let staged = agent.sidecar(path, "new");
			fs::rename(agent.full(&staged), agent.full(path)).map_err(reason)?;

			if agent.journal.take(&backup).is_some() {
				agent.journal.record(
					path,
					Reversal::RestoreBackup { backup: backup.clone(), path: path.to_string() },
				);
				agent.journal.schedule_cleanup(&backup, Reversal::Remove { path: backup.clone() });
			} else {
				agent.journal.record(path, Reversal::Remove { path: path.to_string() });
			}
			Ok(())
		});
	}

	pub fn unlink(&mut self, path: &str) {
		if self.is_consumed() {
			return;
		}
		match fs::remove_file(self.full(path)) {
			Ok(()) => self.ok("unlink", Some(path)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => self.ok("unlink", Some(path)),
			Err(e) => self.fail("unlink", Some(path), Some(&e.to_string())),
		}
	}

	pub fn rmdir(&mut self, path: &str) {
		if self.is_consumed() {
			return;
		}
		match fs::remove_dir(self.full(path)) {
			Ok(()) => self.ok("rmdir", Some(path)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => self.ok("rmdir", Some(path)),
			Err(e) => self.fail("rmdir", Some(path), Some(&e.to_string())),
		}
	}

	/// Finish the run. Post-success jobs are skipped on the rollback path.
	pub fn cleanup(&mut self, run_jobs: bool) {
		if self.is_consumed() {
			return;
		}
		let jobs = self.journal.drain_cleanup();
		if run_jobs {
			for (key, job) in jobs {
				if let Err(e) = job.apply(&self.root) {
					self.fail("cleanup", Some(&key), Some(&e.to_string()));
				}
			}
		}
		self.payload = None;
		self.consume();
		self.ok("cleanup", None);
	}

	/// Consume a run the program never cleaned up, without touching the tree
	pub fn release(&mut self) {
		if !self.is_consumed() {
			warn!("Deploy agent ended without cleanup");
			self.payload = None;
			self.consume();
		}
	}

	fn step<F>(&mut self, action: &str, path: &str, f: F)
	where
		F: FnOnce(&mut Self) -> Result<(), String>,
	{
		if self.is_consumed() {
			return;
		}
		match f(self) {
			Ok(()) => self.ok(action, Some(path)),
			Err(reason) => self.rollback(action, path, &reason),
		}
	}

	fn rollback(&mut self, action: &str, path: &str, reason: &str) {
		warn!("{} {} failed: {}, rolling back", action, path, reason);
		self.fail(action, Some(path), Some(reason));
		for (key, reversal) in self.journal.drain_for_rollback() {
			debug!("Reverting {:?}", reversal);
			if let Err(e) = reversal.apply(&self.root) {
				self.fail("revert", Some(&key), Some(&e.to_string()));
			}
		}
		self.ok("revert", None);
		self.cleanup(false);
	}

	fn consume(&mut self) {
		self.lifecycle = Lifecycle::Consumed;
		if let Err(e) = fs::remove_file(&self.program) {
			error!("Cannot delete agent {}: {}", self.program.display(), e);
			self.fail("cleanup", None, Some("cannot delete agent"));
		}
	}

	fn full(&self, path: &str) -> PathBuf {
		under(&self.root, path)
	}

	fn sidecar(&self, path: &str, kind: &str) -> String {
		format!("{}.{}.{}", path, self.ts, kind)
	}

	fn ok(&mut self, action: &str, path: Option<&str>) {
		self.report.push_str(&ok_line(action, path));
		self.report.push('\n');
	}

	fn fail(&mut self, action: &str, path: Option<&str>, reason: Option<&str>) {
		self.report.push_str(&fail_line(action, path, reason));
		self.report.push('\n');
	}
}

fn is_real_dir(path: &Path) -> bool {
	fs::symlink_metadata(path).map(|m| m.file_type().is_dir()).unwrap_or(false)
}


// vim: ts=4
