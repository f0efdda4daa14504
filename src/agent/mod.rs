//! Interpreter for delivered agent programs
//!
//! Agents are generated as PHP: a fixed runtime class followed by a few
//! statements driving it (see [`crate::archive::php`]). Hosts that cannot
//! run PHP, such as the loopback host used in development and tests, hand
//! the delivered file to [`run`] instead. It checks that the file starts with
//! one of the runtimes this crate ships, parses the statements and replays
//! them against the Rust implementation of the same state machine.
//!
//! The whole program is parsed and checked before anything executes; a file
//! that does not parse is still deleted.

pub mod deploy;
pub mod journal;
pub mod program;
pub mod scan;

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::php::{DEPLOY_RUNTIME, SCAN_RUNTIME};
use crate::archive::Command;
use crate::error::AgentError;
use crate::logging::*;

pub use deploy::DeployAgent;
pub use scan::ScanAgent;

use program::{Args, Parser, Statement, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Ready,
	/// Program deleted; nothing may run any more
	Consumed,
}

/// Length-independent comparison of the embedded and supplied secrets
pub fn secrets_match(expected: &str, supplied: &str) -> bool {
	let (a, b) = (expected.as_bytes(), supplied.as_bytes());
	a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Runtime {
	Deploy,
	Scan,
}

impl Runtime {
	fn source(self) -> &'static str {
		match self {
			Runtime::Deploy => DEPLOY_RUNTIME,
			Runtime::Scan => SCAN_RUNTIME,
		}
	}
}

fn detect(program: &Path) -> Result<Runtime, AgentError> {
	let limit = DEPLOY_RUNTIME.len().max(SCAN_RUNTIME.len()) as u64;
	let mut head = Vec::new();
	File::open(program)?.take(limit).read_to_end(&mut head)?;

	[Runtime::Deploy, Runtime::Scan]
		.into_iter()
		.find(|r| head.starts_with(r.source().as_bytes()))
		.ok_or(AgentError::NotAnAgent)
}

/// Run the program at `program` as if triggered with `supplied` as key,
/// returning the text it printed
pub fn run(program: &Path, supplied: &str) -> Result<String, AgentError> {
	let result = execute(program, supplied);
	if let Err(e) = &result {
		warn!("Agent {} rejected: {}", program.display(), e);
		match fs::remove_file(program) {
			Err(e) if e.kind() != io::ErrorKind::NotFound => {
				error!("Cannot delete agent {}: {}", program.display(), e);
			}
			_ => {}
		}
	}
	result
}

fn execute(program: &Path, supplied: &str) -> Result<String, AgentError> {
	let runtime = detect(program)?;
	let mut file = File::open(program)?;
	file.seek(SeekFrom::Start(runtime.source().len() as u64))?;

	let mut parser = Parser::new(BufReader::new(file));
	let statements = parser.statements()?;
	if statements.last() != Some(&Statement::Halt) {
		return Err(AgentError::Parse { message: "missing __halt_compiler()".to_string() });
	}
	let (open, calls) = match statements.split_first() {
		Some((Statement::Open { class, method, args }, rest)) if method == "open" => {
			((class.as_str(), args.as_slice()), &rest[..rest.len() - 1])
		}
		_ => {
			let message = "program must start with ::open()".to_string();
			return Err(AgentError::Parse { message });
		}
	};

	debug!("Running {:?} agent {}", runtime, program.display());
	match (runtime, open.0) {
		(Runtime::Deploy, "DeployAgent") => {
			let steps = calls.iter().map(deploy_step).collect::<Result<Vec<_>, _>>()?;
			let args = Args::new("open", open.1);
			args.expect_len(2)?;
			let payload = parser.into_inner();
			let mut agent = DeployAgent::open(program, args.str(0)?, args.str(1)?, supplied, payload);
			for step in steps {
				if agent.is_consumed() {
					break;
				}
				match step {
					DeployStep::Run(command) => apply(&mut agent, &command),
					DeployStep::Cleanup => agent.cleanup(true),
				}
			}
			agent.release();
			Ok(agent.into_report())
		}
		(Runtime::Scan, "ScanAgent") => {
			let steps = calls.iter().map(scan_step).collect::<Result<Vec<_>, _>>()?;
			let args = Args::new("open", open.1);
			args.expect_len(3)?;
			let rules = rules(&args)?;
			let mut agent = ScanAgent::open(program, args.str(0)?, args.str(1)?, supplied, rules);
			for step in steps {
				match step {
					ScanStep::Scan => agent.scan(),
					ScanStep::Cleanup => agent.cleanup(),
				}
			}
			agent.cleanup();
			Ok(agent.into_report())
		}
		(_, class) => Err(AgentError::UnknownOperation { name: format!("{}::open", class) }),
	}
}

enum DeployStep {
	Run(Command),
	Cleanup,
}

enum ScanStep {
	Scan,
	Cleanup,
}

fn call(statement: &Statement) -> Result<(&str, &[Value]), AgentError> {
	match statement {
		Statement::Call { method, args } => Ok((method.as_str(), args.as_slice())),
		other => Err(AgentError::Parse { message: format!("unexpected statement {:?}", other) }),
	}
}

fn deploy_step(statement: &Statement) -> Result<DeployStep, AgentError> {
	let (method, values) = call(statement)?;
	let args = Args::new(method, values);
	let path = || args.str(0).map(str::to_string);

	let command = match method {
		"mkdir" => {
			args.expect_len(2)?;
			Command::Mkdir { path: path()?, mode: args.mode(1)? }
		}
		"chmod" => {
			args.expect_len(2)?;
			Command::Chmod { path: path()?, mode: args.mode(1)? }
		}
		"symlink" => {
			args.expect_len(2)?;
			Command::Symlink { path: path()?, target: args.str(1)?.to_string() }
		}
		"extract" => {
			args.expect_len(4)?;
			Command::Extract {
				path: path()?,
				mode: args.mode(1)?,
				size: args.uint(2)?,
				hash: args.str(3)?.to_string(),
			}
		}
		"commit" => {
			args.expect_len(1)?;
			Command::Commit { path: path()? }
		}
		"unlink" => {
			args.expect_len(1)?;
			Command::Unlink { path: path()? }
		}
		"rmdir" => {
			args.expect_len(1)?;
			Command::Rmdir { path: path()? }
		}
		"cleanup" => {
			args.expect_len(0)?;
			return Ok(DeployStep::Cleanup);
		}
		name => return Err(AgentError::UnknownOperation { name: name.to_string() }),
	};
	Ok(DeployStep::Run(command))
}

fn scan_step(statement: &Statement) -> Result<ScanStep, AgentError> {
	let (method, values) = call(statement)?;
	Args::new(method, values).expect_len(0)?;
	match method {
		"scan" => Ok(ScanStep::Scan),
		"cleanup" => Ok(ScanStep::Cleanup),
		name => Err(AgentError::UnknownOperation { name: name.to_string() }),
	}
}

fn rules(args: &Args) -> Result<Vec<(String, bool)>, AgentError> {
	let bad = || AgentError::BadArguments {
		operation: "open".to_string(),
		message: "rules must be [regex, include] pairs".to_string(),
	};
	args.list(2)?
		.iter()
		.map(|rule| match rule {
			Value::List(pair) => match pair.as_slice() {
				[Value::Str(regex), Value::Bool(include)] => Ok((regex.clone(), *include)),
				_ => Err(bad()),
			},
			_ => Err(bad()),
		})
		.collect()
}

fn apply<R: Read>(agent: &mut DeployAgent<R>, command: &Command) {
	match command {
		Command::Mkdir { path, mode } => agent.mkdir(path, *mode),
		Command::Chmod { path, mode } => agent.chmod(path, *mode),
		Command::Symlink { path, target } => agent.symlink(path, target),
		Command::Extract { path, mode, size, hash } => agent.extract(path, *mode, *size, hash),
		Command::Commit { path } => agent.commit(path),
		Command::Unlink { path } => agent.unlink(path),
		Command::Rmdir { path } => agent.rmdir(path),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::archive::ArchiveBuilder;
	use crate::exclusion::FileFilter;
	use crate::types::{Action, ActionKind};
	use crate::util;
	use tempfile::TempDir;

	#[test]
	fn test_secrets_match() {
		assert!(secrets_match("abc", "abc"));
		assert!(!secrets_match("abc", "abd"));
		assert!(!secrets_match("abc", "ab"));
		assert!(!secrets_match("abc", ""));
	}

	#[test]
	fn test_runs_built_deploy_agent() {
		let dir = TempDir::new().unwrap();
		let root = dir.path().join("app");
		let public = dir.path().join("public");
		fs::create_dir_all(&root).unwrap();
		fs::create_dir_all(&public).unwrap();
		let source = dir.path().join("src.txt");
		fs::write(&source, "payload").unwrap();

		let mut builder = ArchiveBuilder::new("../app");
		builder.add(Action::new("/d", ActionKind::Mkdir { mode: 0o755 })).unwrap();
		builder
			.add(Action::new(
				"/d/it's.txt",
				ActionKind::Upload { hash: util::hash(b"payload"), source, mode: 0o644 },
			))
			.unwrap();

		let program = public.join("agent.php");
		let mut out = File::create(&program).unwrap();
		builder.compile().unwrap().write_to(&mut out, "key").unwrap();
		drop(out);

		let report = run(&program, "key").unwrap();
		assert_eq!(
			report,
			"[OK] mkdir '/d'\n[OK] extract '/d/it\\'s.txt'\n[OK] commit '/d/it\\'s.txt'\n[OK] cleanup\n"
		);
		assert_eq!(fs::read_to_string(root.join("d/it's.txt")).unwrap(), "payload");
		assert!(!program.exists());
	}

	#[test]
	fn test_runs_scan_agent() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("a.txt"), "a").unwrap();
		let program = dir.path().join("scan.php");
		fs::write(&program, crate::archive::scan_agent("", "key", &FileFilter::default())).unwrap();

		let report = run(&program, "key").unwrap();
		let tree = crate::protocol::scan::decode_report(&report).unwrap();
		assert_eq!(tree.len(), 1);
		assert!(tree.get("/a.txt").is_some());
		assert!(!program.exists());
	}

	#[test]
	fn test_foreign_file_is_rejected_and_deleted() {
		let dir = TempDir::new().unwrap();
		let program = dir.path().join("x.php");
		fs::write(&program, "<?php echo 'hi';").unwrap();
		assert!(matches!(run(&program, "k"), Err(AgentError::NotAnAgent)));
		assert!(!program.exists());
	}

	#[test]
	fn test_unknown_operation_runs_nothing() {
		let dir = TempDir::new().unwrap();
		let program = dir.path().join("x.php");
		let src = format!(
			"{}$agent = DeployAgent::open('', 'k');\n$agent->mkdir('/a', 493);\n\
			 $agent->format('/');\n__halt_compiler();",
			DEPLOY_RUNTIME
		);
		fs::write(&program, src).unwrap();

		assert!(matches!(run(&program, "k"), Err(AgentError::UnknownOperation { .. })));
		assert!(!dir.path().join("a").exists());
		assert!(!program.exists());
	}
}

// vim: ts=4
