//! Filter pattern grammar and its compiled regex form
//!
//! A pattern is `[local:|remote:][!][/]glob[/]`. `*` matches within one
//! path segment, `**` spans segments. A leading `/` anchors the glob to the
//! root, otherwise it may match at any depth. A pattern that matches a
//! directory also matches everything below it.

use regex::Regex;

use super::ExclusionError;

/// Which scanner a pattern applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Local,
	Remote,
}

/// One parsed pattern, before compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPattern {
	/// `None` applies to both sides
	pub side: Option<Side>,

	/// `false` for `!`-negated patterns
	pub include: bool,

	/// Whether the glob must match from the root
	pub anchored: bool,

	pub glob: String,
}

impl FilterPattern {
	pub fn parse(pattern: &str) -> Self {
		let (side, rest) = if let Some(rest) = pattern.strip_prefix("local:") {
			(Some(Side::Local), rest)
		} else if let Some(rest) = pattern.strip_prefix("remote:") {
			(Some(Side::Remote), rest)
		} else {
			(None, pattern)
		};

		let (include, rest) = match rest.strip_prefix('!') {
			Some(rest) => (false, rest),
			None => (true, rest),
		};

		let (anchored, rest) = match rest.strip_prefix('/') {
			Some(rest) => (true, rest),
			None => (false, rest),
		};

		FilterPattern { side, include, anchored, glob: rest.trim_end_matches('/').to_string() }
	}

	pub fn applies_to(&self, side: Side) -> bool {
		self.side.map_or(true, |s| s == side)
	}

	/// Regex source valid for both PCRE and the `regex` crate
	pub fn to_regex(&self) -> String {
		let root = if self.anchored { "/" } else { "/(?:.+?/)?" };
		let glob = regex::escape(&self.glob).replace(r"\*\*", ".*").replace(r"\*", "[^/]*");
		format!("^{}{}(?:/|$)", root, glob)
	}
}

/// Compiled rule: a regex plus the polarity of a match
#[derive(Debug, Clone)]
pub struct Rule {
	regex: Regex,
	include: bool,
}

impl Rule {
	pub fn new(source: &str, include: bool) -> Result<Self, ExclusionError> {
		let regex = Regex::new(source)
			.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", source, e)))?;
		Ok(Rule { regex, include })
	}

	pub fn from_pattern(pattern: &FilterPattern) -> Result<Self, ExclusionError> {
		Rule::new(&pattern.to_regex(), pattern.include)
	}

	pub fn source(&self) -> &str {
		self.regex.as_str()
	}

	pub fn include(&self) -> bool {
		self.include
	}

	pub fn matches(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_flags() {
		let p = FilterPattern::parse("remote:!/cache/");
		assert_eq!(p.side, Some(Side::Remote));
		assert!(!p.include);
		assert!(p.anchored);
		assert_eq!(p.glob, "cache");

		let p = FilterPattern::parse("*.log");
		assert_eq!(p.side, None);
		assert!(p.include);
		assert!(!p.anchored);
	}

	#[test]
	fn test_regex_source() {
		assert_eq!(FilterPattern::parse("/vendor").to_regex(), "^/vendor(?:/|$)");
		assert_eq!(FilterPattern::parse("*.log").to_regex(), "^/(?:.+?/)?[^/]*\\.log(?:/|$)");
		assert_eq!(FilterPattern::parse("/a/**/b").to_regex(), "^/a/.*/b(?:/|$)");
	}

	#[test]
	fn test_single_star_stays_in_segment() {
		let rule = Rule::from_pattern(&FilterPattern::parse("/src/*.rs")).unwrap();
		assert!(rule.matches("/src/main.rs"));
		assert!(!rule.matches("/src/deep/main.rs"));

		let rule = Rule::from_pattern(&FilterPattern::parse("/src/**.rs")).unwrap();
		assert!(rule.matches("/src/deep/main.rs"));
	}

	#[test]
	fn test_unanchored_matches_any_depth() {
		let rule = Rule::from_pattern(&FilterPattern::parse("node_modules")).unwrap();
		assert!(rule.matches("/node_modules"));
		assert!(rule.matches("/web/node_modules"));
		assert!(rule.matches("/web/node_modules/pkg/index.js"));
		assert!(!rule.matches("/web/node_modules_old"));
	}

	#[test]
	fn test_regex_metacharacters_are_literal() {
		let rule = Rule::from_pattern(&FilterPattern::parse("/a+b (1)~")).unwrap();
		assert!(rule.matches("/a+b (1)~"));
		assert!(!rule.matches("/aab (1)~"));
	}
}

// vim: ts=4
