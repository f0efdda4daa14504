//! Rendering of agent programs
//!
//! A program is the static runtime source followed by one statement per
//! line. Every embedded value goes through [`literal`]; nothing derived from
//! a path, target or secret is ever spliced into the source unquoted.

use super::Command;
use crate::exclusion::Rule;

pub const DEPLOY_RUNTIME: &str = include_str!("../../runtime/deploy_agent.php");
pub const SCAN_RUNTIME: &str = include_str!("../../runtime/scan_agent.php");

/// Marks the end of code; payload bytes follow immediately
pub const SEPARATOR: &str = "__halt_compiler();";

/// PHP single-quoted string literal
pub fn literal(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('\'');
	for c in value.chars() {
		if c == '\\' || c == '\'' {
			out.push('\\');
		}
		out.push(c);
	}
	out.push('\'');
	out
}

fn call(method: &str, args: &[String]) -> String {
	format!("$agent->{}({});\n", method, args.join(", "))
}

pub fn render_command(command: &Command) -> String {
	match command {
		Command::Mkdir { path, mode } => call("mkdir", &[literal(path), mode.to_string()]),
		Command::Chmod { path, mode } => call("chmod", &[literal(path), mode.to_string()]),
		Command::Symlink { path, target } => call("symlink", &[literal(path), literal(target)]),
		Command::Extract { path, mode, size, hash } => call(
			"extract",
			&[literal(path), mode.to_string(), size.to_string(), literal(hash)],
		),
		Command::Commit { path } => call("commit", &[literal(path)]),
		Command::Unlink { path } => call("unlink", &[literal(path)]),
		Command::Rmdir { path } => call("rmdir", &[literal(path)]),
	}
}

/// Source of a deploy agent, up to and including the separator
pub fn deploy_program(root: &str, secret: &str, commands: &[Command]) -> String {
	let mut src = String::from(DEPLOY_RUNTIME);
	src.push_str(&format!("$agent = DeployAgent::open({}, {});\n", literal(root), literal(secret)));
	for command in commands {
		src.push_str(&render_command(command));
	}
	src.push_str("$agent->cleanup();\n");
	src.push_str(SEPARATOR);
	src
}

/// Source of a scan agent carrying the remote side's filter rules
pub fn scan_program(root: &str, secret: &str, rules: &[Rule]) -> String {
	let rules = rules
		.iter()
		.map(|r| format!("[{}, {}]", literal(r.source()), r.include()))
		.collect::<Vec<_>>()
		.join(", ");

	let mut src = String::from(SCAN_RUNTIME);
	src.push_str(&format!(
		"$agent = ScanAgent::open({}, {}, [{}]);\n",
		literal(root),
		literal(secret),
		rules
	));
	src.push_str("$agent->scan();\n");
	src.push_str("$agent->cleanup();\n");
	src.push_str(SEPARATOR);
	src
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_literal_escapes_quote_and_backslash() {
		assert_eq!(literal("plain"), "'plain'");
		assert_eq!(literal("it's"), "'it\\'s'");
		assert_eq!(literal("a\\b"), "'a\\\\b'");
		assert_eq!(literal("new\nline"), "'new\nline'");
		assert_eq!(literal("'; system('x'); '"), "'\\'; system(\\'x\\'); \\''");
	}

	#[test]
	fn test_render_commands() {
		assert_eq!(
			render_command(&Command::Mkdir { path: "/a".to_string(), mode: 0o750 }),
			"$agent->mkdir('/a', 488);\n"
		);
		assert_eq!(
			render_command(&Command::Extract {
				path: "/a/f".to_string(),
				mode: 0o644,
				size: 11,
				hash: "abc".to_string()
			}),
			"$agent->extract('/a/f', 420, 11, 'abc');\n"
		);
		assert_eq!(
			render_command(&Command::Symlink { path: "/l".to_string(), target: "../x".to_string() }),
			"$agent->symlink('/l', '../x');\n"
		);
	}

	#[test]
	fn test_scan_program_embeds_rules() {
		let rules = vec![Rule::new("^/vendor(?:/|$)", false).unwrap()];
		let src = scan_program("..", "s3cret", &rules);
		assert!(src.starts_with(SCAN_RUNTIME));
		assert!(src.ends_with(
			"$agent = ScanAgent::open('..', 's3cret', [['^/vendor(?:/|$)', false]]);\n\
			 $agent->scan();\n$agent->cleanup();\n__halt_compiler();"
		));
	}

	/// Pattern PCRE sees inside `(`..`)` delimiters, the way PHP splits
	/// them: a backslash skips one byte, nesting ends at the matching `)`.
	/// `None` when the delimiters close early or never.
	fn delimited_pattern(src: &str) -> Option<&str> {
		let bytes = src.as_bytes();
		if bytes.first() != Some(&b'(') {
			return None;
		}
		let mut depth = 1;
		let mut i = 1;
		while i < bytes.len() {
			match bytes[i] {
				b'\\' => i += 1,
				b'(' => depth += 1,
				b')' => {
					depth -= 1;
					if depth == 0 {
						// Anything after the closing delimiter is read as modifiers
						return if i == bytes.len() - 1 { Some(&src[1..i]) } else { None };
					}
				}
				_ => {}
			}
			i += 1;
		}
		None
	}

	#[test]
	fn test_delimited_pattern() {
		assert_eq!(delimited_pattern("(^/a(?:/|$))"), Some("^/a(?:/|$)"));
		assert_eq!(delimited_pattern("(a\\)b)"), Some("a\\)b"));
		assert_eq!(delimited_pattern("(a)b)"), None);
		assert_eq!(delimited_pattern("(a(b)"), None);
	}

	#[test]
	fn test_scan_rules_survive_runtime_delimiters() {
		use crate::agent::program::{Parser, Statement, Value};
		use crate::exclusion::{FileFilter, Side};
		use std::io::Cursor;

		assert!(SCAN_RUNTIME.contains("preg_match('(' . $regex . ')', $path)"));

		let patterns: Vec<String> = ["!*~", "!/#notes", "!(draft)*", "!back\\slash", "!it's", "!a)b("]
			.iter()
			.map(|p| p.to_string())
			.collect();
		let filter = FileFilter::for_side(&patterns, Side::Remote).unwrap();
		let src = scan_program("..", "key", filter.rules());

		let statements =
			Parser::new(Cursor::new(&src.as_bytes()[SCAN_RUNTIME.len()..])).statements().unwrap();
		let rules = match &statements[0] {
			Statement::Open { args, .. } => match &args[2] {
				Value::List(rules) => rules.clone(),
				other => panic!("rules not a list: {:?}", other),
			},
			other => panic!("unexpected first statement {:?}", other),
		};
		assert_eq!(rules.len(), patterns.len());

		for (rule, expected) in rules.iter().zip(filter.rules()) {
			let regex = match rule {
				Value::List(pair) => match pair.as_slice() {
					[Value::Str(regex), Value::Bool(false)] => regex.clone(),
					other => panic!("bad rule {:?}", other),
				},
				other => panic!("bad rule {:?}", other),
			};
			assert_eq!(regex, expected.source());
			let delimited = format!("({})", regex);
			assert_eq!(delimited_pattern(&delimited), Some(regex.as_str()), "{}", regex);
		}
	}
}

// vim: ts=4
