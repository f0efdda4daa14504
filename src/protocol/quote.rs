//! Single-quoted string discipline shared by every wire line
//!
//! A quoted value is wrapped in `'` with three escapes: `\'`, `\n` and
//! `\\`. Quoting keeps every record on one physical line no matter what
//! the path contains.

use super::ProtocolError;

pub fn quote(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('\'');
	for c in value.chars() {
		match c {
			'\\' => out.push_str("\\\\"),
			'\'' => out.push_str("\\'"),
			'\n' => out.push_str("\\n"),
			c => out.push(c),
		}
	}
	out.push('\'');
	out
}

/// Read a quoted value at the start of `s`, returning it and the rest
pub fn read_quoted(s: &str) -> Option<(String, &str)> {
	let mut chars = s.char_indices();
	match chars.next() {
		Some((_, '\'')) => {}
		_ => return None,
	}

	let mut value = String::new();
	while let Some((i, c)) = chars.next() {
		match c {
			'\'' => return Some((value, &s[i + 1..])),
			'\\' => match chars.next() {
				Some((_, '\'')) => value.push('\''),
				Some((_, 'n')) => value.push('\n'),
				Some((_, '\\')) => value.push('\\'),
				Some((_, other)) => {
					value.push('\\');
					value.push(other);
				}
				None => return None,
			},
			'\n' => return None,
			c => value.push(c),
		}
	}
	None
}

/// Split a record line into `:`-separated fields, unquoting quoted ones
pub fn split_fields(line: &str) -> Result<Vec<String>, ProtocolError> {
	if line.is_empty() {
		return Err(ProtocolError::malformed(line, "empty line"));
	}

	let mut fields = Vec::new();
	let mut rest = line;
	loop {
		let after = if rest.starts_with('\'') {
			let (value, after) = read_quoted(rest)
				.ok_or_else(|| ProtocolError::malformed(line, "unterminated quoted field"))?;
			fields.push(value);
			after
		} else {
			let end = rest.find(':').unwrap_or(rest.len());
			let field = &rest[..end];
			if field.contains('\'') {
				return Err(ProtocolError::malformed(line, "stray quote in bare field"));
			}
			fields.push(field.to_string());
			&rest[end..]
		};

		if after.is_empty() {
			return Ok(fields);
		}
		match after.strip_prefix(':') {
			Some(next) => rest = next,
			None => return Err(ProtocolError::malformed(line, "expected ':' after field")),
		}
	}
}


// vim: ts=4
