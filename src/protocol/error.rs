//! Protocol error types

use std::fmt;

/// Protocol error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
	/// A line does not follow the record grammar
	Malformed { line: String, reason: String },

	/// The scan report carried no root record
	MissingRoot {
		/// `[FAIL]` lines found in the response instead
		failures: Vec<String>,
	},

	/// The scan report carried more than one root record
	DuplicateRoot,
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Malformed { line, reason } => {
				write!(f, "Malformed line {:?}: {}", line, reason)
			}
			ProtocolError::MissingRoot { failures } if failures.is_empty() => {
				write!(f, "Remote root dir not returned with scan")
			}
			ProtocolError::MissingRoot { failures } => {
				write!(f, "Remote root dir not returned with scan: {}", failures.join("; "))
			}
			ProtocolError::DuplicateRoot => write!(f, "Remote scan returned more than one root"),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
	pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
		ProtocolError::Malformed { line: line.to_string(), reason: reason.into() }
	}
}

// vim: ts=4
