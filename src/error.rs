//! Error types for shipit operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::exclusion::ExclusionError;
use crate::protocol::ProtocolError;

/// Main error type for a deploy run
#[derive(Debug)]
pub enum DeployError {
	/// Configuration could not be loaded or validated
	Config(ConfigError),

	/// Upload or trigger request failed
	Transport(TransportError),

	/// Remote scan report could not be used
	Protocol(ProtocolError),

	/// Local tree could not be scanned
	Scan(ScanError),

	/// Deploy agent could not be built
	Archive(ArchiveError),

	/// Filter patterns did not compile
	Exclusion(ExclusionError),
}

impl fmt::Display for DeployError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeployError::Config(e) => write!(f, "Configuration error: {}", e),
			DeployError::Transport(e) => write!(f, "Transport error: {}", e),
			DeployError::Protocol(e) => write!(f, "Protocol error: {}", e),
			DeployError::Scan(e) => write!(f, "Scan error: {}", e),
			DeployError::Archive(e) => write!(f, "Archive error: {}", e),
			DeployError::Exclusion(e) => write!(f, "Filter error: {}", e),
		}
	}
}

impl Error for DeployError {}

impl From<ConfigError> for DeployError {
	fn from(e: ConfigError) -> Self {
		DeployError::Config(e)
	}
}

impl From<TransportError> for DeployError {
	fn from(e: TransportError) -> Self {
		DeployError::Transport(e)
	}
}

impl From<ProtocolError> for DeployError {
	fn from(e: ProtocolError) -> Self {
		DeployError::Protocol(e)
	}
}

impl From<ScanError> for DeployError {
	fn from(e: ScanError) -> Self {
		DeployError::Scan(e)
	}
}

impl From<ArchiveError> for DeployError {
	fn from(e: ArchiveError) -> Self {
		DeployError::Archive(e)
	}
}

impl From<ExclusionError> for DeployError {
	fn from(e: ExclusionError) -> Self {
		DeployError::Exclusion(e)
	}
}

/// Configuration errors, always raised before any network traffic
#[derive(Debug)]
pub enum ConfigError {
	/// Required option has no value
	Missing { key: &'static str },

	/// Option has a value of the wrong shape
	Invalid { key: &'static str, message: String },

	/// Config file could not be read
	Read { path: PathBuf, source: io::Error },

	/// Config file could not be parsed
	Parse { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Missing { key } => write!(f, "Missing required option \"{}\"", key),
			ConfigError::Invalid { key, message } => {
				write!(f, "Config option \"{}\" {}", key, message)
			}
			ConfigError::Read { path, source } => {
				write!(f, "Cannot read {}: {}", path.display(), source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Cannot parse {}: {}", path.display(), message)
			}
		}
	}
}

impl Error for ConfigError {}

/// Errors of the transfer and trigger collaborators
#[derive(Debug)]
pub enum TransportError {
	/// Local temporary blob could not be written or read
	Io(io::Error),

	/// Upload helper could not be started
	SpawnFailed { cmd: String, source: io::Error },

	/// Upload was rejected, with the provider's code and message
	Upload { code: Option<i32>, message: String },

	/// Trigger request failed before a response arrived
	Http { url: String, message: String },

	/// Trigger request returned a non-success status
	Status { url: String, status: u16 },

	/// Loopback host could not map or run the program
	Local { message: String },
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::Io(e) => write!(f, "I/O error: {}", e),
			TransportError::SpawnFailed { cmd, source } => {
				write!(f, "Failed to spawn '{}': {}", cmd, source)
			}
			TransportError::Upload { code: Some(code), message } => {
				write!(f, "Upload failed ({}): {}", code, message)
			}
			TransportError::Upload { code: None, message } => {
				write!(f, "Upload failed: {}", message)
			}
			TransportError::Http { url, message } => {
				write!(f, "Request to {} failed: {}", url, message)
			}
			TransportError::Status { url, status } => {
				write!(f, "Request to {} returned HTTP {}", url, status)
			}
			TransportError::Local { message } => write!(f, "{}", message),
		}
	}
}

impl Error for TransportError {}

impl From<io::Error> for TransportError {
	fn from(e: io::Error) -> Self {
		TransportError::Io(e)
	}
}

/// Local scanning errors
#[derive(Debug)]
pub enum ScanError {
	/// Entry could not be listed, inspected or hashed
	Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ScanError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScanError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
		}
	}
}

impl Error for ScanError {}

/// Errors while compiling actions into a deploy agent
#[derive(Debug)]
pub enum ArchiveError {
	/// Writing the agent or reading a payload file failed
	Io { path: PathBuf, source: io::Error },

	/// Payload file changed size between planning and packing
	SizeChanged { path: PathBuf, expected: u64, actual: u64 },

	/// A diff error reached the builder
	Unbuildable { path: String, message: String },
}

impl fmt::Display for ArchiveError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ArchiveError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
			ArchiveError::SizeChanged { path, expected, actual } => write!(
				f,
				"{} changed while packing: expected {} bytes, got {}",
				path.display(),
				expected,
				actual
			),
			ArchiveError::Unbuildable { path, message } => {
				write!(f, "Cannot build action for {}: {}", path, message)
			}
		}
	}
}

impl Error for ArchiveError {}

/// Errors of the agent interpreter itself (not of the steps it runs)
#[derive(Debug)]
pub enum AgentError {
	/// Program file could not be read
	Io(io::Error),

	/// File does not start with a known agent runtime
	NotAnAgent,

	/// Generated statements could not be parsed
	Parse { message: String },

	/// Statement names an operation the runtime does not have
	UnknownOperation { name: String },

	/// Operation called with the wrong arguments
	BadArguments { operation: String, message: String },
}

impl fmt::Display for AgentError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AgentError::Io(e) => write!(f, "I/O error: {}", e),
			AgentError::NotAnAgent => write!(f, "Not an agent program"),
			AgentError::Parse { message } => write!(f, "Parse error: {}", message),
			AgentError::UnknownOperation { name } => write!(f, "Unknown operation: {}", name),
			AgentError::BadArguments { operation, message } => {
				write!(f, "Bad arguments for {}: {}", operation, message)
			}
		}
	}
}

impl Error for AgentError {}

impl From<io::Error> for AgentError {
	fn from(e: io::Error) -> Self {
		AgentError::Io(e)
	}
}

// vim: ts=4
