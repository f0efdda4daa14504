//! Deploy agent compilation
//!
//! The builder collects at most one action per path, orders the entries
//! parent-first and compiles them into three command groups:
//!
//! 1. extract: `mkdir`, `chmod`, staged `symlink`, staged `extract`
//! 2. commit: one `commit` per staged entry, in extract order
//! 3. cleanup: `unlink`/`rmdir`, deepest first
//!
//! The agent program is the runtime source, the rendered commands, the
//! separator and then the contents of every uploaded file back to back, in
//! extract order. No delimiters are needed since `extract` carries sizes.
//!
//! # Example Usage
//!
//! ```ignore
//! use shipit::archive::ArchiveBuilder;
//!
//! let mut builder = ArchiveBuilder::new("..");
//! for action in actions {
//!     builder.add(action)?;
//! }
//! builder.compile()?.write_to(&mut file, &secret)?;
//! ```

pub mod php;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::error::ArchiveError;
use crate::exclusion::FileFilter;
use crate::logging::*;
use crate::paths;
use crate::types::{Action, ActionKind};

/// One agent statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Mkdir { path: String, mode: u32 },
	Chmod { path: String, mode: u32 },
	Symlink { path: String, target: String },
	Extract { path: String, mode: u32, size: u64, hash: String },
	Commit { path: String },
	Unlink { path: String },
	Rmdir { path: String },
}

impl Command {
	pub fn name(&self) -> &'static str {
		match self {
			Command::Mkdir { .. } => "mkdir",
			Command::Chmod { .. } => "chmod",
			Command::Symlink { .. } => "symlink",
			Command::Extract { .. } => "extract",
			Command::Commit { .. } => "commit",
			Command::Unlink { .. } => "unlink",
			Command::Rmdir { .. } => "rmdir",
		}
	}

	pub fn path(&self) -> &str {
		match self {
			Command::Mkdir { path, .. }
			| Command::Chmod { path, .. }
			| Command::Symlink { path, .. }
			| Command::Extract { path, .. }
			| Command::Commit { path }
			| Command::Unlink { path }
			| Command::Rmdir { path } => path,
		}
	}
}

#[derive(Debug, Clone)]
struct PendingEntry {
	path: String,
	depth: usize,
	kind: ActionKind,
}

/// File whose contents go into the payload region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
	pub source: PathBuf,
	pub size: u64,
}

#[derive(Debug, Default)]
pub struct ArchiveBuilder {
	root: String,
	entries: Vec<PendingEntry>,
	index: HashMap<String, usize>,
}

impl ArchiveBuilder {
	/// `root` is the target root as seen from the agent's own directory
	pub fn new(root: impl Into<String>) -> Self {
		Self { root: root.into(), entries: Vec::new(), index: HashMap::new() }
	}

	/// Queue an action; a later action for the same path replaces the
	/// earlier one. Diff errors are refused.
	pub fn add(&mut self, action: Action) -> Result<(), ArchiveError> {
		let path = paths::normalize(&paths::rooted(&action.path));
		if let ActionKind::Error { message } = action.kind {
			return Err(ArchiveError::Unbuildable { path, message });
		}

		let entry = PendingEntry { depth: paths::depth(&path), path: path.clone(), kind: action.kind };
		match self.index.get(&path) {
			Some(&i) => self.entries[i] = entry,
			None => {
				self.index.insert(path, self.entries.len());
				self.entries.push(entry);
			}
		}
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Order the queued entries into commands, sizing every upload now
	pub fn compile(&self) -> Result<Archive, ArchiveError> {
		let mut sorted: Vec<&PendingEntry> = self.entries.iter().collect();
		sorted.sort_by_key(|e| e.depth);

		let mut extract = Vec::new();
		let mut commit = Vec::new();
		let mut cleanup = Vec::new();
		let mut payload = Vec::new();

		for entry in sorted {
			let path = entry.path.clone();
			match &entry.kind {
				ActionKind::Mkdir { mode } => extract.push(Command::Mkdir { path, mode: *mode }),
				ActionKind::Chmod { mode } => extract.push(Command::Chmod { path, mode: *mode }),
				ActionKind::Symlink { target } => {
					extract.push(Command::Symlink { path: path.clone(), target: target.clone() });
					commit.push(Command::Commit { path });
				}
				ActionKind::Upload { hash, source, mode } => {
					let size = fs::metadata(source)
						.map_err(|e| ArchiveError::Io { path: source.clone(), source: e })?
						.len();
					payload.push(PayloadFile { source: source.clone(), size });
					extract.push(Command::Extract {
						path: path.clone(),
						mode: *mode,
						size,
						hash: hash.clone(),
					});
					commit.push(Command::Commit { path });
				}
				ActionKind::Unlink => cleanup.push((entry.depth, Command::Unlink { path })),
				ActionKind::Rmdir => cleanup.push((entry.depth, Command::Rmdir { path })),
				ActionKind::Error { message } => {
					return Err(ArchiveError::Unbuildable { path, message: message.clone() });
				}
			}
		}

		// Deepest first; equal depths keep queue order
		cleanup.sort_by(|a, b| b.0.cmp(&a.0));

		let mut commands = extract;
		commands.append(&mut commit);
		commands.extend(cleanup.into_iter().map(|(_, c)| c));

		debug!("Compiled {} commands, {} payload files", commands.len(), payload.len());
		Ok(Archive { root: self.root.clone(), commands, payload })
	}
}

/// Compiled deploy agent, ready to be written out
#[derive(Debug, Clone)]
pub struct Archive {
	root: String,
	commands: Vec<Command>,
	payload: Vec<PayloadFile>,
}

impl Archive {
	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn payload(&self) -> &[PayloadFile] {
		&self.payload
	}

	/// Program source up to and including the separator
	pub fn source(&self, secret: &str) -> String {
		php::deploy_program(&self.root, secret, &self.commands)
	}

	/// Write source and payload; returns the number of payload bytes
	pub fn write_to<W>(&self, out: &mut W, secret: &str) -> Result<u64, ArchiveError>
	where
		W: Write + ?Sized,
	{
		let sink = PathBuf::from("<agent>");
		out.write_all(self.source(secret).as_bytes())
			.map_err(|e| ArchiveError::Io { path: sink.clone(), source: e })?;

		let mut total = 0;
		for file in &self.payload {
			total += copy_payload(file, out)?;
		}
		out.flush().map_err(|e| ArchiveError::Io { path: sink, source: e })?;
		Ok(total)
	}
}

fn copy_payload<W: Write + ?Sized>(file: &PayloadFile, out: &mut W) -> Result<u64, ArchiveError> {
	let io_error = |e: io::Error| ArchiveError::Io { path: file.source.clone(), source: e };
	let size_changed =
		|actual| ArchiveError::SizeChanged { path: file.source.clone(), expected: file.size, actual };

	let f = fs::File::open(&file.source).map_err(io_error)?;
	let actual = f.metadata().map_err(io_error)?.len();
	if actual != file.size {
		return Err(size_changed(actual));
	}
	let copied = io::copy(&mut f.take(file.size), out).map_err(io_error)?;
	if copied != file.size {
		return Err(size_changed(copied));
	}
	Ok(copied)
}

/// Scan agent source for `root`, carrying the remote rule set
pub fn scan_agent(root: &str, secret: &str, filter: &FileFilter) -> String {
	php::scan_program(root, secret, filter.rules())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn names(archive: &Archive) -> Vec<String> {
		archive.commands().iter().map(|c| format!("{} {}", c.name(), c.path())).collect()
	}

	fn upload(dir: &TempDir, name: &str, contents: &str) -> ActionKind {
		let source = dir.path().join(name);
		fs::write(&source, contents).unwrap();
		ActionKind::Upload { hash: crate::util::hash(contents.as_bytes()), source, mode: 0o644 }
	}

	#[test]
	fn test_phases_and_depth_order() {
		let dir = TempDir::new().unwrap();
		let mut builder = ArchiveBuilder::new("..");
		builder.add(Action::new("/a/b/f", upload(&dir, "f", "12345"))).unwrap();
		builder.add(Action::new("/old/deep/x", ActionKind::Unlink)).unwrap();
		builder.add(Action::new("/a/b", ActionKind::Mkdir { mode: 0o755 })).unwrap();
		builder.add(Action::new("/old", ActionKind::Rmdir)).unwrap();
		builder.add(Action::new("/a", ActionKind::Mkdir { mode: 0o755 })).unwrap();
		builder.add(Action::new("/l", ActionKind::Symlink { target: "a".to_string() })).unwrap();
		builder.add(Action::new("/old/deep", ActionKind::Rmdir)).unwrap();

		let archive = builder.compile().unwrap();
		assert_eq!(
			names(&archive),
			vec![
				"mkdir /a",
				"symlink /l",
				"mkdir /a/b",
				"extract /a/b/f",
				"commit /l",
				"commit /a/b/f",
				"unlink /old/deep/x",
				"rmdir /old/deep",
				"rmdir /old",
			]
		);
		assert_eq!(archive.payload().len(), 1);
		assert_eq!(archive.payload()[0].size, 5);
	}

	#[test]
	fn test_equal_depth_deletions_keep_order() {
		let mut builder = ArchiveBuilder::new("..");
		builder.add(Action::new("/old.txt", ActionKind::Unlink)).unwrap();
		builder.add(Action::new("/old", ActionKind::Rmdir)).unwrap();
		assert_eq!(names(&builder.compile().unwrap()), vec!["unlink /old.txt", "rmdir /old"]);
	}

	#[test]
	fn test_last_write_wins_and_paths_normalize() {
		let mut builder = ArchiveBuilder::new("");
		builder.add(Action::new("a/", ActionKind::Mkdir { mode: 0o700 })).unwrap();
		builder.add(Action::new("/b", ActionKind::Unlink)).unwrap();
		builder.add(Action::new("/a", ActionKind::Chmod { mode: 0o750 })).unwrap();
		assert_eq!(builder.len(), 2);
		assert_eq!(
			builder.compile().unwrap().commands(),
			&[
				Command::Chmod { path: "/a".to_string(), mode: 0o750 },
				Command::Unlink { path: "/b".to_string() }
			]
		);
	}

	#[test]
	fn test_error_actions_are_refused() {
		let mut builder = ArchiveBuilder::new("");
		let err = builder.add(Action::error("/x", "boom")).unwrap_err();
		assert!(matches!(err, ArchiveError::Unbuildable { .. }));
		assert!(builder.is_empty());
	}

	#[test]
	fn test_program_bytes() {
		let dir = TempDir::new().unwrap();
		let mut builder = ArchiveBuilder::new("../app");
		builder.add(Action::new("/x.txt", upload(&dir, "x", "hello"))).unwrap();
		builder.add(Action::new("/y.txt", upload(&dir, "y", "world!"))).unwrap();
		builder.add(Action::new("/gone", ActionKind::Unlink)).unwrap();

		let archive = builder.compile().unwrap();
		let mut out = Vec::new();
		assert_eq!(archive.write_to(&mut out, "s3").unwrap(), 11);

		let expected = format!(
			"{}$agent = DeployAgent::open('../app', 's3');\n\
			 $agent->extract('/x.txt', 420, 5, '{}');\n\
			 $agent->extract('/y.txt', 420, 6, '{}');\n\
			 $agent->commit('/x.txt');\n\
			 $agent->commit('/y.txt');\n\
			 $agent->unlink('/gone');\n\
			 $agent->cleanup();\n\
			 __halt_compiler();helloworld!",
			php::DEPLOY_RUNTIME,
			crate::util::hash(b"hello"),
			crate::util::hash(b"world!"),
		);
		assert_eq!(String::from_utf8(out).unwrap(), expected);
	}

	#[test]
	fn test_changed_payload_is_detected() {
		let dir = TempDir::new().unwrap();
		let mut builder = ArchiveBuilder::new("");
		builder.add(Action::new("/f", upload(&dir, "f", "abc"))).unwrap();
		let archive = builder.compile().unwrap();
		fs::write(dir.path().join("f"), "abcdef").unwrap();

		let err = archive.write_to(&mut Vec::new(), "k").unwrap_err();
		assert!(matches!(err, ArchiveError::SizeChanged { expected: 3, actual: 6, .. }));
	}
}

// vim: ts=4
