//! Tree scanning
//!
//! Walks a tree pre-order (a directory is always reported before anything
//! below it), offering every entry to the side's [`FileFilter`]. A rejected
//! directory prunes its whole subtree. Symlinks are reported by target and
//! never followed; files are hashed in full; anything that is not a file,
//! directory or symlink is reported as `unknown` so the diff can refuse it.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::exclusion::FileFilter;
use crate::logging::*;
use crate::types::{FileKind, FileRecord};
use crate::util;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScanError + '_ {
	move |source| ScanError::Io { path: path.to_path_buf(), source }
}

/// Walk `root`, skipping the entry at `skip` (the scan agent's own source)
pub fn walk(
	root: &Path,
	filter: &FileFilter,
	skip: Option<&Path>,
) -> Result<Vec<FileRecord>, ScanError> {
	let mut records = Vec::new();
	walk_dir(root, "", filter, skip, &mut records)?;
	Ok(records)
}

fn walk_dir(
	dir: &Path,
	rel: &str,
	filter: &FileFilter,
	skip: Option<&Path>,
	records: &mut Vec<FileRecord>,
) -> Result<(), ScanError> {
	let mut entries =
		fs::read_dir(dir).map_err(io_error(dir))?.collect::<Result<Vec<_>, _>>().map_err(io_error(dir))?;
	entries.sort_by_key(|e| e.file_name());

	for entry in entries {
		let abs = entry.path();
		if skip.map_or(false, |s| s == abs.as_path()) {
			continue;
		}

		let name = entry.file_name();
		let path = format!("{}/{}", rel, name.to_string_lossy());
		if !filter.accepts(&path) {
			trace!("Filtered out {}", path);
			continue;
		}

		if name.to_str().is_none() {
			warn!("Non UTF-8 file name {:?}, reporting as unknown", abs);
			records.push(FileRecord::unknown(path));
			continue;
		}

		let meta = fs::symlink_metadata(&abs).map_err(io_error(&abs))?;
		let file_type = meta.file_type();
		let mode = meta.permissions().mode() & 0o777;

		if file_type.is_symlink() {
			let target = fs::read_link(&abs).map_err(io_error(&abs))?;
			records.push(FileRecord::symlink(path, target.to_string_lossy()));
		} else if file_type.is_dir() {
			records.push(FileRecord::directory(path.clone(), mode));
			walk_dir(&abs, &path, filter, skip, records)?;
		} else if file_type.is_file() {
			let hash = util::hash_file(&abs).map_err(io_error(&abs))?;
			records.push(FileRecord { path, kind: FileKind::File { mode, hash, source: Some(abs) } });
		} else {
			records.push(FileRecord::unknown(path));
		}
	}

	Ok(())
}

/// Scanner for the local side of a deploy
pub struct LocalScanner {
	root: PathBuf,
	filter: FileFilter,
}

impl LocalScanner {
	pub fn new(root: impl Into<PathBuf>, filter: FileFilter) -> Self {
		Self { root: root.into(), filter }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn scan(&self) -> Result<Vec<FileRecord>, ScanError> {
		debug!("Scanning local tree {}", self.root.display());
		let records = walk(&self.root, &self.filter, None)?;
		debug!("Local tree has {} entries", records.len());
		Ok(records)
	}
}


// vim: ts=4
