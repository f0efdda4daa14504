//! Deploy agent progress report
//!
//! ```text
//! [OK] mkdir '/a'
//! [FAIL] extract '/a/f.txt': hash mismatch
//! [OK] revert
//! [OK] cleanup
//! ```
//!
//! Success of a whole deploy is decided only by the presence of a `[FAIL]`
//! line, so the same check works for reports produced by any runtime.

use super::quote::{quote, read_quoted};

const OK: &str = "[OK]";
const FAIL: &str = "[FAIL]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Ok,
	Fail,
}

/// One parsed progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
	pub status: Status,
	pub action: String,
	pub path: Option<String>,
	pub reason: Option<String>,
}

pub fn ok_line(action: &str, path: Option<&str>) -> String {
	match path {
		Some(path) => format!("{} {} {}", OK, action, quote(path)),
		None => format!("{} {}", OK, action),
	}
}

pub fn fail_line(action: &str, path: Option<&str>, reason: Option<&str>) -> String {
	let mut line = match path {
		Some(path) => format!("{} {} {}", FAIL, action, quote(path)),
		None => format!("{} {}", FAIL, action),
	};
	if let Some(reason) = reason {
		line.push_str(": ");
		line.push_str(reason);
	}
	line
}

pub fn parse_line(line: &str) -> Option<ReportLine> {
	let (status, rest) = if let Some(rest) = line.strip_prefix(OK) {
		(Status::Ok, rest)
	} else if let Some(rest) = line.strip_prefix(FAIL) {
		(Status::Fail, rest)
	} else {
		return None;
	};

	let rest = rest.strip_prefix(' ')?;
	let end = rest.find(|c: char| c == ' ' || c == ':').unwrap_or(rest.len());
	let action = rest[..end].to_string();
	let mut rest = &rest[end..];

	let mut path = None;
	if let Some(after_space) = rest.strip_prefix(' ') {
		let (value, after) = read_quoted(after_space)?;
		path = Some(value);
		rest = after;
	}

	let reason = match rest.strip_prefix(": ") {
		Some(reason) => Some(reason.to_string()),
		None if rest.is_empty() => None,
		None => return None,
	};

	Some(ReportLine { status, action, path, reason })
}

/// Full text returned by a triggered agent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentReport {
	text: String,
}

impl AgentReport {
	pub fn new(text: impl Into<String>) -> Self {
		AgentReport { text: text.into() }
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn has_failure(&self) -> bool {
		self.text.lines().any(|l| l.starts_with(FAIL))
	}

	/// Progress lines that parse; anything else the host printed is skipped
	pub fn lines(&self) -> Vec<ReportLine> {
		self.text.lines().filter_map(parse_line).collect()
	}

	pub fn failures(&self) -> Vec<ReportLine> {
		self.lines().into_iter().filter(|l| l.status == Status::Fail).collect()
	}
}


// vim: ts=4
