//! Scan report records
//!
//! ```text
//! R:'/srv/www/app'            scan root, exactly one
//! D:493:'/public'             directory, permission bits in decimal
//! F:420:<sha256>:'/index.php' regular file
//! L:'../shared':'/storage'    symlink, target first
//! ?:'/fifo'                   anything else
//! ```

use std::collections::HashMap;

use super::quote::{quote, split_fields};
use super::ProtocolError;
use crate::logging::*;
use crate::types::{FileKind, FileRecord};

/// One decoded report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanLine {
	Root(String),
	Record(FileRecord),
}

pub fn encode_root(root: &str) -> String {
	format!("R:{}", quote(root))
}

pub fn encode_record(record: &FileRecord) -> String {
	match &record.kind {
		FileKind::Directory { mode } => format!("D:{}:{}", mode, quote(&record.path)),
		FileKind::File { mode, hash, .. } => {
			format!("F:{}:{}:{}", mode, hash, quote(&record.path))
		}
		FileKind::Symlink { target } => format!("L:{}:{}", quote(target), quote(&record.path)),
		FileKind::Unknown => format!("?:{}", quote(&record.path)),
	}
}

fn parse_mode(line: &str, field: &str) -> Result<u32, ProtocolError> {
	field.parse().map_err(|_| ProtocolError::malformed(line, format!("bad mode {:?}", field)))
}

pub fn decode_line(line: &str) -> Result<ScanLine, ProtocolError> {
	let fields = split_fields(line)?;
	let arity = |n: usize| {
		if fields.len() == n {
			Ok(())
		} else {
			Err(ProtocolError::malformed(line, format!("expected {} fields", n)))
		}
	};

	match fields[0].as_str() {
		"R" => {
			arity(2)?;
			Ok(ScanLine::Root(fields[1].clone()))
		}
		"D" => {
			arity(3)?;
			let mode = parse_mode(line, &fields[1])?;
			Ok(ScanLine::Record(FileRecord::directory(fields[2].clone(), mode)))
		}
		"F" => {
			arity(4)?;
			let mode = parse_mode(line, &fields[1])?;
			Ok(ScanLine::Record(FileRecord::file(fields[3].clone(), mode, fields[2].clone())))
		}
		"L" => {
			arity(3)?;
			Ok(ScanLine::Record(FileRecord::symlink(fields[2].clone(), fields[1].clone())))
		}
		"?" => {
			arity(2)?;
			Ok(ScanLine::Record(FileRecord::unknown(fields[1].clone())))
		}
		token => Err(ProtocolError::malformed(line, format!("unknown token {:?}", token))),
	}
}

/// Remote snapshot: records in report order, indexed by path
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
	/// Absolute remote path the records are relative to
	pub root: String,
	records: Vec<FileRecord>,
	index: HashMap<String, usize>,
}

impl RemoteTree {
	pub fn new(root: impl Into<String>) -> Self {
		RemoteTree { root: root.into(), records: Vec::new(), index: HashMap::new() }
	}

	/// Add a record; a repeated path replaces the earlier one in place
	pub fn insert(&mut self, record: FileRecord) {
		match self.index.get(&record.path) {
			Some(&i) => self.records[i] = record,
			None => {
				self.index.insert(record.path.clone(), self.records.len());
				self.records.push(record);
			}
		}
	}

	pub fn get(&self, path: &str) -> Option<&FileRecord> {
		self.index.get(path).map(|&i| &self.records[i])
	}

	pub(crate) fn position(&self, path: &str) -> Option<usize> {
		self.index.get(path).copied()
	}

	pub fn records(&self) -> &[FileRecord] {
		&self.records
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// Decode a full scan response, skipping lines that do not parse
pub fn decode_report(text: &str) -> Result<RemoteTree, ProtocolError> {
	let mut root: Option<String> = None;
	let mut records = Vec::new();
	let mut failures = Vec::new();

	for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
		if line.is_empty() {
			continue;
		}
		match decode_line(line) {
			Ok(ScanLine::Root(path)) => {
				if root.is_some() {
					return Err(ProtocolError::DuplicateRoot);
				}
				root = Some(path);
			}
			Ok(ScanLine::Record(record)) => records.push(record),
			Err(e) => {
				if line.starts_with("[FAIL]") {
					failures.push(line.to_string());
				}
				debug!("Skipping scan line: {}", e);
			}
		}
	}

	let root = root.ok_or(ProtocolError::MissingRoot { failures })?;
	let mut tree = RemoteTree::new(root);
	for record in records {
		tree.insert(record);
	}
	Ok(tree)
}


// vim: ts=4
