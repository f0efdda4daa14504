//! Parser for the statements a generated agent program consists of
//!
//! Only the dialect the builders emit is understood:
//!
//! ```text
//! $agent = DeployAgent::open('..', 'secret');
//! $agent->extract('/a/f.txt', 420, 11, '<sha256>');
//! $scanner = ScanAgent::open('..', 'secret', [['^/vendor(?:/|$)', false]]);
//! __halt_compiler();
//! ```
//!
//! Literals are PHP single-quoted strings (`\\` and `\'` escapes, raw
//! newlines allowed), integers, booleans and nested lists. The parser reads
//! byte by byte so that after `__halt_compiler();` the underlying reader is
//! positioned exactly at the first payload byte.

use std::io::BufRead;

use crate::error::AgentError;

pub const HALT: &str = "__halt_compiler";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Str(String),
	Int(i64),
	Bool(bool),
	List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
	/// `$var = Class::method(args);`
	Open { class: String, method: String, args: Vec<Value> },
	/// `$var->method(args);`
	Call { method: String, args: Vec<Value> },
	/// `__halt_compiler();`, end of code
	Halt,
}

fn parse_error(message: impl Into<String>) -> AgentError {
	AgentError::Parse { message: message.into() }
}

pub struct Parser<R: BufRead> {
	reader: R,
}

impl<R: BufRead> Parser<R> {
	pub fn new(reader: R) -> Self {
		Self { reader }
	}

	pub fn into_inner(self) -> R {
		self.reader
	}

	/// Parse statements up to `__halt_compiler();` or end of input
	pub fn statements(&mut self) -> Result<Vec<Statement>, AgentError> {
		let mut statements = Vec::new();
		while let Some(statement) = self.next_statement()? {
			let halt = statement == Statement::Halt;
			statements.push(statement);
			if halt {
				break;
			}
		}
		Ok(statements)
	}

	pub fn next_statement(&mut self) -> Result<Option<Statement>, AgentError> {
		self.skip_ws()?;
		let statement = match self.peek()? {
			None => return Ok(None),
			Some(b'$') => {
				self.bump()?;
				self.ident()?;
				self.skip_ws()?;
				match self.peek()? {
					Some(b'=') => {
						self.bump()?;
						self.skip_ws()?;
						let class = self.ident()?;
						self.expect(b"::")?;
						let method = self.ident()?;
						let args = self.args()?;
						Statement::Open { class, method, args }
					}
					Some(b'-') => {
						self.expect(b"->")?;
						let method = self.ident()?;
						let args = self.args()?;
						Statement::Call { method, args }
					}
					other => return Err(unexpected(other, "'=' or '->'")),
				}
			}
			Some(_) => {
				let name = self.ident()?;
				if name != HALT {
					return Err(parse_error(format!("unexpected statement {:?}", name)));
				}
				self.skip_ws()?;
				self.expect(b"(")?;
				self.skip_ws()?;
				self.expect(b")")?;
				Statement::Halt
			}
		};
		self.skip_ws()?;
		self.expect(b";")?;
		Ok(Some(statement))
	}

	fn peek(&mut self) -> Result<Option<u8>, AgentError> {
		Ok(self.reader.fill_buf()?.first().copied())
	}

	fn bump(&mut self) -> Result<Option<u8>, AgentError> {
		let byte = self.peek()?;
		if byte.is_some() {
			self.reader.consume(1);
		}
		Ok(byte)
	}

	fn skip_ws(&mut self) -> Result<(), AgentError> {
		while let Some(b) = self.peek()? {
			if !b.is_ascii_whitespace() {
				break;
			}
			self.reader.consume(1);
		}
		Ok(())
	}

	fn expect(&mut self, token: &[u8]) -> Result<(), AgentError> {
		for &want in token {
			let got = self.bump()?;
			if got != Some(want) {
				return Err(unexpected(got, &format!("{:?}", want as char)));
			}
		}
		Ok(())
	}

	fn ident(&mut self) -> Result<String, AgentError> {
		let mut name = String::new();
		while let Some(b) = self.peek()? {
			if !(b.is_ascii_alphanumeric() || b == b'_') {
				break;
			}
			name.push(b as char);
			self.reader.consume(1);
		}
		if name.is_empty() {
			return Err(unexpected(self.peek()?, "identifier"));
		}
		Ok(name)
	}

	fn args(&mut self) -> Result<Vec<Value>, AgentError> {
		self.skip_ws()?;
		self.expect(b"(")?;
		self.sequence(b')')
	}

	/// Comma separated values up to `close`, trailing comma allowed
	fn sequence(&mut self, close: u8) -> Result<Vec<Value>, AgentError> {
		let mut values = Vec::new();
		loop {
			self.skip_ws()?;
			if self.peek()? == Some(close) {
				self.bump()?;
				return Ok(values);
			}
			values.push(self.value()?);
			self.skip_ws()?;
			match self.bump()? {
				Some(b',') => {}
				Some(b) if b == close => return Ok(values),
				other => return Err(unexpected(other, "',' or closing bracket")),
			}
		}
	}

	fn value(&mut self) -> Result<Value, AgentError> {
		match self.peek()? {
			Some(b'\'') => self.string().map(Value::Str),
			Some(b'[') => {
				self.bump()?;
				self.sequence(b']').map(Value::List)
			}
			Some(b) if b == b'-' || b.is_ascii_digit() => self.int().map(Value::Int),
			Some(_) => match self.ident()?.to_ascii_lowercase().as_str() {
				"true" => Ok(Value::Bool(true)),
				"false" => Ok(Value::Bool(false)),
				other => Err(parse_error(format!("unexpected literal {:?}", other))),
			},
			None => Err(unexpected(None, "value")),
		}
	}

	fn string(&mut self) -> Result<String, AgentError> {
		self.expect(b"'")?;
		let mut bytes = Vec::new();
		loop {
			match self.bump()? {
				Some(b'\'') => break,
				Some(b'\\') => match self.peek()? {
					Some(b @ b'\\') | Some(b @ b'\'') => {
						self.bump()?;
						bytes.push(b);
					}
					_ => bytes.push(b'\\'),
				},
				Some(b) => bytes.push(b),
				None => return Err(parse_error("unterminated string")),
			}
		}
		String::from_utf8(bytes).map_err(|_| parse_error("string is not UTF-8"))
	}

	fn int(&mut self) -> Result<i64, AgentError> {
		let mut digits = String::new();
		if self.peek()? == Some(b'-') {
			self.bump()?;
			digits.push('-');
		}
		while let Some(b) = self.peek()? {
			if !b.is_ascii_digit() {
				break;
			}
			digits.push(b as char);
			self.reader.consume(1);
		}
		digits.parse().map_err(|_| parse_error(format!("bad integer {:?}", digits)))
	}
}

fn unexpected(got: Option<u8>, wanted: &str) -> AgentError {
	match got {
		Some(b) => parse_error(format!("expected {}, found {:?}", wanted, b as char)),
		None => parse_error(format!("expected {}, found end of input", wanted)),
	}
}

/// Typed access to a statement's arguments
pub struct Args<'a> {
	operation: &'a str,
	values: &'a [Value],
}

impl<'a> Args<'a> {
	pub fn new(operation: &'a str, values: &'a [Value]) -> Self {
		Args { operation, values }
	}

	fn bad(&self, message: String) -> AgentError {
		AgentError::BadArguments { operation: self.operation.to_string(), message }
	}

	pub fn expect_len(&self, n: usize) -> Result<(), AgentError> {
		if self.values.len() == n {
			Ok(())
		} else {
			Err(self.bad(format!("expected {} arguments, got {}", n, self.values.len())))
		}
	}

	pub fn str(&self, i: usize) -> Result<&'a str, AgentError> {
		match self.values.get(i) {
			Some(Value::Str(s)) => Ok(s),
			other => Err(self.bad(format!("argument {} should be a string, got {:?}", i, other))),
		}
	}

	pub fn uint(&self, i: usize) -> Result<u64, AgentError> {
		match self.values.get(i) {
			Some(Value::Int(n)) if *n >= 0 => Ok(*n as u64),
			other => Err(self.bad(format!("argument {} should be a size, got {:?}", i, other))),
		}
	}

	pub fn mode(&self, i: usize) -> Result<u32, AgentError> {
		let n = self.uint(i)?;
		if n > 0o7777 {
			return Err(self.bad(format!("argument {} is not a mode: {}", i, n)));
		}
		Ok(n as u32)
	}

	pub fn list(&self, i: usize) -> Result<&'a [Value], AgentError> {
		match self.values.get(i) {
			Some(Value::List(items)) => Ok(items),
			other => Err(self.bad(format!("argument {} should be a list, got {:?}", i, other))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Cursor, Read};

	#[test]
	fn test_parse_statements_and_stop_at_halt() {
		let src = b"$agent = DeployAgent::open('..', 'k3y');\n$agent->mkdir('/a', 488);\n\
			$agent->extract('/a/f', 420, 3, 'abc');\n$agent->cleanup();\n__halt_compiler();XYZ";
		let mut parser = Parser::new(Cursor::new(&src[..]));
		let statements = parser.statements().unwrap();

		assert_eq!(statements.len(), 5);
		assert_eq!(
			statements[0],
			Statement::Open {
				class: "DeployAgent".to_string(),
				method: "open".to_string(),
				args: vec![Value::Str("..".to_string()), Value::Str("k3y".to_string())],
			}
		);
		assert_eq!(
			statements[1],
			Statement::Call {
				method: "mkdir".to_string(),
				args: vec![Value::Str("/a".to_string()), Value::Int(488)],
			}
		);
		assert_eq!(statements[4], Statement::Halt);

		let mut rest = Vec::new();
		parser.into_inner().read_to_end(&mut rest).unwrap();
		assert_eq!(rest, b"XYZ");
	}

	#[test]
	fn test_php_string_escapes() {
		let src = "$s->f('it\\'s', 'back\\\\slash', 'raw\\n', 'multi\nline');";
		let mut parser = Parser::new(Cursor::new(src.as_bytes()));
		let statement = parser.next_statement().unwrap().unwrap();
		assert_eq!(
			statement,
			Statement::Call {
				method: "f".to_string(),
				args: vec![
					Value::Str("it's".to_string()),
					Value::Str("back\\slash".to_string()),
					Value::Str("raw\\n".to_string()),
					Value::Str("multi\nline".to_string()),
				],
			}
		);
	}

	#[test]
	fn test_nested_lists_and_booleans() {
		let src = "$s = ScanAgent::open('', 'k', [['^/a', true], ['^/b', FALSE],]);";
		let mut parser = Parser::new(Cursor::new(src.as_bytes()));
		match parser.next_statement().unwrap().unwrap() {
			Statement::Open { args, .. } => assert_eq!(
				args[2],
				Value::List(vec![
					Value::List(vec![Value::Str("^/a".to_string()), Value::Bool(true)]),
					Value::List(vec![Value::Str("^/b".to_string()), Value::Bool(false)]),
				])
			),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_rejects_foreign_code() {
		let mut parser = Parser::new(Cursor::new(&b"echo 'hi';"[..]));
		assert!(parser.next_statement().is_err());

		let mut parser = Parser::new(Cursor::new(&b"$a->f('unterminated);"[..]));
		assert!(parser.next_statement().is_err());

		let mut parser = Parser::new(Cursor::new(&b"$a->f(1)"[..]));
		assert!(parser.next_statement().is_err());
	}

	#[test]
	fn test_args_accessors() {
		let values = vec![Value::Str("/p".to_string()), Value::Int(420), Value::Int(-1)];
		let args = Args::new("chmod", &values);
		assert_eq!(args.str(0).unwrap(), "/p");
		assert_eq!(args.mode(1).unwrap(), 0o644);
		assert!(args.uint(2).is_err());
		assert!(args.str(1).is_err());
		assert!(args.expect_len(2).is_err());
	}
}

// vim: ts=4
