//! Per-run undo bookkeeping of the deploy agent
//!
//! Entries are plain data, keyed by the path (or sidecar path) they concern.
//! Recording an existing key replaces the entry where it stands, so the
//! rollback order follows the first mutation of each key.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// How to undo, or finish, one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reversal {
	/// Directory created by this run
	RemoveDir { path: String },
	/// Mode changed by this run
	RestoreMode { path: String, mode: u32 },
	/// Staged, committed or sidecar entry created by this run
	Remove { path: String },
	/// Original content moved aside before a commit replaced it
	RestoreBackup { backup: String, path: String },
}

impl Reversal {
	/// Apply against the agent's target root
	pub fn apply(&self, root: &Path) -> io::Result<()> {
		match self {
			Reversal::RemoveDir { path } => fs::remove_dir(under(root, path)),
			Reversal::RestoreMode { path, mode } => {
				fs::set_permissions(under(root, path), fs::Permissions::from_mode(*mode))
			}
			Reversal::Remove { path } => fs::remove_file(under(root, path)),
			Reversal::RestoreBackup { backup, path } => {
				fs::rename(under(root, backup), under(root, path))
			}
		}
	}
}

/// Map a slash-rooted agent path below `root`
pub fn under(root: &Path, path: &str) -> std::path::PathBuf {
	root.join(path.trim_start_matches('/'))
}

#[derive(Debug, Default)]
pub struct Journal {
	reversals: Vec<(String, Reversal)>,
	cleanup: Vec<(String, Reversal)>,
}

fn upsert(list: &mut Vec<(String, Reversal)>, key: &str, reversal: Reversal) {
	match list.iter_mut().find(|(k, _)| k == key) {
		Some(entry) => entry.1 = reversal,
		None => list.push((key.to_string(), reversal)),
	}
}

impl Journal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(&mut self, key: &str, reversal: Reversal) {
		upsert(&mut self.reversals, key, reversal);
	}

	pub fn take(&mut self, key: &str) -> Option<Reversal> {
		let i = self.reversals.iter().position(|(k, _)| k == key)?;
		Some(self.reversals.remove(i).1)
	}

	pub fn schedule_cleanup(&mut self, key: &str, job: Reversal) {
		upsert(&mut self.cleanup, key, job);
	}

	pub fn reversals(&self) -> &[(String, Reversal)] {
		&self.reversals
	}

	pub fn cleanup_jobs(&self) -> &[(String, Reversal)] {
		&self.cleanup
	}

	/// Empty the reversal list, most recent first
	pub fn drain_for_rollback(&mut self) -> Vec<(String, Reversal)> {
		let mut entries = std::mem::take(&mut self.reversals);
		entries.reverse();
		entries
	}

	pub fn drain_cleanup(&mut self) -> Vec<(String, Reversal)> {
		std::mem::take(&mut self.cleanup)
	}
}


// vim: ts=4
