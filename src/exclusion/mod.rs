//! Include/exclude filtering for both scan sides
//!
//! Patterns evaluate in configured order and the first match decides; a
//! path no pattern matches is included. Local and remote rule sets are
//! derived independently from the same pattern list so the remote scanner
//! can be handed its serialised rules without the rest of the config.

mod patterns;

pub use patterns::{FilterPattern, Rule, Side};

use crate::paths;

/// Ordered, first-match-wins rule set for one side
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
	rules: Vec<Rule>,
}

impl FileFilter {
	/// Compile the patterns that apply to `side`
	pub fn for_side(patterns: &[String], side: Side) -> Result<Self, ExclusionError> {
		let rules = patterns
			.iter()
			.map(|p| FilterPattern::parse(p))
			.filter(|p| p.applies_to(side))
			.map(|p| Rule::from_pattern(&p))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { rules })
	}

	/// Rebuild a filter from serialised `(regex, include)` pairs
	pub fn from_rules<I, S>(rules: I) -> Result<Self, ExclusionError>
	where
		I: IntoIterator<Item = (S, bool)>,
		S: AsRef<str>,
	{
		let rules = rules
			.into_iter()
			.map(|(source, include)| Rule::new(source.as_ref(), include))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { rules })
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	/// Whether a root-relative path should be scanned
	pub fn accepts(&self, path: &str) -> bool {
		let path = paths::rooted(path);
		self.rules.iter().find(|r| r.matches(&path)).map_or(true, Rule::include)
	}
}

/// Errors that can occur while compiling filter rules
#[derive(Debug)]
pub enum ExclusionError {
	/// A pattern or serialised rule is not a valid expression
	InvalidPattern(String),
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => {
				write!(f, "Invalid filter pattern: {}", msg)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}

#[cfg(test)]
mod tests {
	use super::*;

	fn patterns(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn test_no_match_includes() {
		let filter = FileFilter::for_side(&patterns(&["!*.log"]), Side::Local).unwrap();
		assert!(filter.accepts("index.php"));
		assert!(!filter.accepts("logs/app.log"));
	}

	#[test]
	fn test_first_match_wins() {
		let filter =
			FileFilter::for_side(&patterns(&["!/var/cache/.keep", "/var/cache"]), Side::Local)
				.unwrap();
		assert!(!filter.accepts("/var/cache/.keep"));
		assert!(filter.accepts("/var/cache/x"));

		let filter =
			FileFilter::for_side(&patterns(&["/var/cache/.keep", "!/var/cache"]), Side::Local)
				.unwrap();
		assert!(filter.accepts("/var/cache/.keep"));
		assert!(!filter.accepts("/var/cache/x"));
		assert!(filter.accepts("/var/log"));
	}

	#[test]
	fn test_sides_are_independent() {
		let list = patterns(&["local:!/.env", "remote:!/uploads", "!*.tmp"]);
		let local = FileFilter::for_side(&list, Side::Local).unwrap();
		let remote = FileFilter::for_side(&list, Side::Remote).unwrap();

		assert!(!local.accepts("/.env"));
		assert!(local.accepts("/uploads/a.jpg"));
		assert!(remote.accepts("/.env"));
		assert!(!remote.accepts("/uploads/a.jpg"));
		assert!(!local.accepts("/x.tmp"));
		assert!(!remote.accepts("/x.tmp"));
	}

	#[test]
	fn test_serialised_rules_round_trip() {
		let list = patterns(&["remote:!/uploads", "/uploads/keep"]);
		let remote = FileFilter::for_side(&list, Side::Remote).unwrap();
		let pairs: Vec<(String, bool)> =
			remote.rules().iter().map(|r| (r.source().to_string(), r.include())).collect();
		let rebuilt = FileFilter::from_rules(pairs).unwrap();

		for path in ["/uploads", "/uploads/keep", "/index.php"] {
			assert_eq!(remote.accepts(path), rebuilt.accepts(path), "{}", path);
		}
	}

	#[test]
	fn test_invalid_serialised_rule() {
		assert!(FileFilter::from_rules(vec![("(unclosed", true)]).is_err());
	}
}

// vim: ts=4
