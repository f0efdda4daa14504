//! Slash-path helpers shared by configuration and symlink reconciliation
//!
//! Remote paths never touch the local filesystem API, so everything here
//! works on `/`-separated strings rather than `std::path`.

use std::env;

pub fn is_absolute(path: &str) -> bool {
	path.starts_with('/')
}

/// True when `path` equals `parent` or lies below it
pub fn is_subpath_of(path: &str, parent: &str) -> bool {
	let path = format!("{}/", path.trim_end_matches('/'));
	let parent = format!("{}/", parent.trim_end_matches('/'));
	path.starts_with(&parent)
}

/// Collapse `.`, `..` and repeated separators without touching the filesystem
pub fn normalize(path: &str) -> String {
	let absolute = is_absolute(path);
	let mut stack: Vec<&str> = Vec::new();

	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => match stack.last() {
				Some(&last) if last != ".." => {
					stack.pop();
				}
				_ if absolute => {}
				_ => stack.push(".."),
			},
			_ => stack.push(segment),
		}
	}

	if absolute {
		format!("/{}", stack.join("/"))
	} else if stack.is_empty() {
		".".to_string()
	} else {
		stack.join("/")
	}
}

/// Resolve `parts` right to left until an absolute one is found, falling
/// back to `cwd` as the base
pub fn resolve_from(cwd: &str, parts: &[&str]) -> String {
	let mut tail = String::new();

	for part in parts.iter().rev() {
		if is_absolute(part) {
			return normalize(&format!("{}{}", part.trim_end_matches('/'), tail));
		}
		tail = format!("/{}{}", part.trim_end_matches('/'), tail);
	}

	normalize(&format!("{}{}", cwd, tail))
}

/// [`resolve_from`] against the process working directory
pub fn resolve(parts: &[&str]) -> String {
	let cwd = env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
	resolve_from(if cwd.is_empty() { "/" } else { &cwd }, parts)
}

/// Relative path leading from directory `from` to `to`
pub fn relative(from: &str, to: &str) -> String {
	let from = normalize(from);
	let to = normalize(to);
	let from: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
	let to: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

	let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

	let mut segments: Vec<&str> = vec![".."; from.len() - common];
	segments.extend_from_slice(&to[common..]);
	segments.join("/")
}

/// Number of separators, used to order entries parent-first
pub fn depth(path: &str) -> usize {
	path.matches('/').count()
}

/// `/`-rooted form with no trailing separator
pub fn rooted(path: &str) -> String {
	format!("/{}", path.trim_matches('/'))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize() {
		assert_eq!(normalize("/a/./b/../c"), "/a/c");
		assert_eq!(normalize("/a//b/"), "/a/b");
		assert_eq!(normalize("/../a"), "/a");
		assert_eq!(normalize("a/../../b"), "../b");
		assert_eq!(normalize("a/.."), ".");
		assert_eq!(normalize("/"), "/");
	}

	#[test]
	fn test_is_subpath_of() {
		assert!(is_subpath_of("/srv/site/a", "/srv/site"));
		assert!(is_subpath_of("/srv/site", "/srv/site/"));
		assert!(!is_subpath_of("/srv/site2/a", "/srv/site"));
		assert!(is_subpath_of("/anything", "/"));
	}

	#[test]
	fn test_resolve_from() {
		assert_eq!(resolve_from("/home/u", &[]), "/home/u");
		assert_eq!(resolve_from("/home/u", &["site"]), "/home/u/site");
		assert_eq!(resolve_from("/home/u", &["/etc/deploy", "../site"]), "/etc/site");
		assert_eq!(resolve_from("/home/u", &["/www", "/var/www", "public"]), "/var/www/public");
	}

	#[test]
	fn test_relative() {
		assert_eq!(relative("/var/www/public", "/var/www"), "..");
		assert_eq!(relative("/var/www", "/var/www/app"), "app");
		assert_eq!(relative("/a/b", "/a/c/d"), "../c/d");
		assert_eq!(relative("/", "/a"), "a");
		assert_eq!(relative("/a", "/a"), "");
	}

	#[test]
	fn test_depth_and_rooted() {
		assert_eq!(depth("/a/b/c"), 3);
		assert_eq!(rooted("a/b/"), "/a/b");
		assert_eq!(rooted("/"), "/");
	}
}

// vim: ts=4
