//! Snapshot records and reconciling actions

use std::fmt;
use std::path::PathBuf;

/// One entry of a tree snapshot
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileRecord {
	/// Slash-rooted path relative to the scan root
	pub path: String,
	pub kind: FileKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FileKind {
	/// Regular file; `source` is only known on the local side
	File { mode: u32, hash: String, source: Option<PathBuf> },
	Directory { mode: u32 },
	/// Symlink, reported by target string and never followed
	Symlink { target: String },
	/// Devices, sockets, fifos and anything else the tool cannot deploy
	Unknown,
}

impl FileKind {
	pub fn name(&self) -> &'static str {
		match self {
			FileKind::File { .. } => "file",
			FileKind::Directory { .. } => "directory",
			FileKind::Symlink { .. } => "symlink",
			FileKind::Unknown => "unknown",
		}
	}
}

impl FileRecord {
	pub fn file(path: impl Into<String>, mode: u32, hash: impl Into<String>) -> Self {
		FileRecord {
			path: path.into(),
			kind: FileKind::File { mode, hash: hash.into(), source: None },
		}
	}

	pub fn directory(path: impl Into<String>, mode: u32) -> Self {
		FileRecord { path: path.into(), kind: FileKind::Directory { mode } }
	}

	pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
		FileRecord { path: path.into(), kind: FileKind::Symlink { target: target.into() } }
	}

	pub fn unknown(path: impl Into<String>) -> Self {
		FileRecord { path: path.into(), kind: FileKind::Unknown }
	}
}

/// One reconciling operation for a single path
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Action {
	pub path: String,
	pub kind: ActionKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ActionKind {
	Mkdir { mode: u32 },
	Chmod { mode: u32 },
	Symlink { target: String },
	Upload { hash: String, source: PathBuf, mode: u32 },
	Rmdir,
	Unlink,
	/// Diff error; never turns into a mutation
	Error { message: String },
}

impl ActionKind {
	pub fn name(&self) -> &'static str {
		match self {
			ActionKind::Mkdir { .. } => "mkdir",
			ActionKind::Chmod { .. } => "chmod",
			ActionKind::Symlink { .. } => "symlink",
			ActionKind::Upload { .. } => "upload",
			ActionKind::Rmdir => "rmdir",
			ActionKind::Unlink => "unlink",
			ActionKind::Error { .. } => "error",
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, ActionKind::Error { .. })
	}
}

impl Action {
	pub fn new(path: impl Into<String>, kind: ActionKind) -> Self {
		Action { path: path.into(), kind }
	}

	pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
		Action { path: path.into(), kind: ActionKind::Error { message: message.into() } }
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.kind.name(), self.path)
	}
}

// vim: ts=4
