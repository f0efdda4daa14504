//! Local/remote reconciliation
//!
//! Produces the action list that makes the remote tree match the local
//! one: actions for local records come first, in local scan order, then one
//! deletion per remote path the local side never mentioned, in remote
//! report order. Content is compared by hash only.

use crate::paths;
use crate::protocol::RemoteTree;
use crate::types::{Action, ActionKind, FileKind, FileRecord};

pub struct Comparator {
	local_root: String,
}

impl Comparator {
	/// `local_root` is the absolute local path scans were taken from
	pub fn new(local_root: impl Into<String>) -> Self {
		Self { local_root: paths::normalize(&local_root.into()) }
	}

	pub fn compare<I>(&self, local: I, remote: &RemoteTree) -> Vec<Action>
	where
		I: IntoIterator<Item = FileRecord>,
	{
		let mut visited = vec![false; remote.len()];
		let mut actions = Vec::new();

		for record in local {
			let action = match remote.position(&record.path) {
				Some(i) => {
					visited[i] = true;
					self.compare_existing(record, &remote.records()[i], &remote.root)
				}
				None => self.compare_missing(record, &remote.root),
			};
			actions.extend(action);
		}

		for (record, _) in remote.records().iter().zip(&visited).filter(|&(_, &seen)| !seen) {
			let kind = match record.kind {
				FileKind::Directory { .. } => ActionKind::Rmdir,
				FileKind::File { .. } | FileKind::Symlink { .. } => ActionKind::Unlink,
				FileKind::Unknown => ActionKind::Error {
					message: "unknown remote file type, please add to ignore list".to_string(),
				},
			};
			actions.push(Action::new(record.path.clone(), kind));
		}

		actions
	}

	fn compare_existing(
		&self,
		local: FileRecord,
		remote: &FileRecord,
		remote_root: &str,
	) -> Option<Action> {
		let path = local.path;
		let kind = match (local.kind, &remote.kind) {
			(FileKind::Directory { mode }, FileKind::Directory { mode: remote_mode }) => {
				if mode == *remote_mode {
					return None;
				}
				ActionKind::Chmod { mode }
			}
			(FileKind::Symlink { target }, FileKind::Symlink { target: remote_target }) => {
				self.symlink(&target, Some(remote_target), remote_root)?
			}
			(
				FileKind::File { mode, hash, source },
				FileKind::File { mode: remote_mode, hash: remote_hash, .. },
			) => {
				if hash != *remote_hash {
					upload(hash, source, mode, &path)
				} else if mode != *remote_mode {
					ActionKind::Chmod { mode }
				} else {
					return None;
				}
			}
			(FileKind::Unknown, _) | (_, FileKind::Unknown) => ActionKind::Error {
				message: "unknown file type, please add to ignore list".to_string(),
			},
			(local_kind, remote_kind) => ActionKind::Error {
				message: format!(
					"local file is a {}, but remote file is a {}",
					local_kind.name(),
					remote_kind.name()
				),
			},
		};
		Some(Action::new(path, kind))
	}

	fn compare_missing(&self, local: FileRecord, remote_root: &str) -> Option<Action> {
		let path = local.path;
		let kind = match local.kind {
			FileKind::Directory { mode } => ActionKind::Mkdir { mode },
			FileKind::Symlink { target } => self.symlink(&target, None, remote_root)?,
			FileKind::File { mode, hash, source } => upload(hash, source, mode, &path),
			FileKind::Unknown => ActionKind::Error {
				message: "unknown local file type, please add to ignore list".to_string(),
			},
		};
		Some(Action::new(path, kind))
	}

	/// Decide whether a link must be (re)created. Absolute targets inside
	/// the local root are rebased onto the remote root; absolute targets
	/// outside it are refused; relative targets compare verbatim.
	fn symlink(
		&self,
		local_target: &str,
		remote_target: Option<&String>,
		remote_root: &str,
	) -> Option<ActionKind> {
		let target = if paths::is_absolute(local_target) {
			let normalized = paths::normalize(local_target);
			if !paths::is_subpath_of(&normalized, &self.local_root) {
				return Some(ActionKind::Error {
					message: "symlink target outside root directory".to_string(),
				});
			}
			rebase(&normalized, &self.local_root, remote_root)
		} else {
			local_target.to_string()
		};

		if remote_target.map_or(false, |t| *t == target) {
			None
		} else {
			Some(ActionKind::Symlink { target })
		}
	}
}

fn upload(hash: String, source: Option<std::path::PathBuf>, mode: u32, path: &str) -> ActionKind {
	match source {
		Some(source) => ActionKind::Upload { hash, source, mode },
		None => ActionKind::Error { message: format!("no local source for {}", path) },
	}
}

/// Swap the `from` prefix of `path` for `to`
fn rebase(path: &str, from: &str, to: &str) -> String {
	let suffix = &path[from.trim_end_matches('/').len()..];
	let rebased = format!("{}{}", to.trim_end_matches('/'), suffix);
	if rebased.is_empty() {
		"/".to_string()
	} else {
		rebased
	}
}


// vim: ts=4
