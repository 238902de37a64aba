//! Regex-backed matcher compiled from a canonical route.

use arcstr::ArcStr;
use regex::Regex;

use super::error::PatternResult;
use super::topic_pattern_item::{TopicPatternError, TopicPatternItem};

const SINGLE_LEVEL: &str = "([^/]+)";
const MULTI_LEVEL_TAIL: &str = "(/.*)?";
const MULTI_LEVEL_ALL: &str = "(.*)";

/// Full-string matcher for one canonical route.
///
/// The compiled expression is anchored at both ends and carries no scan
/// state, so one matcher can be shared between dispatch paths freely.
#[derive(Debug, Clone)]
pub struct TopicMatcher {
	route: ArcStr,
	regex: Regex,
	wildcard_count: usize,
}

impl TopicMatcher {
	/// Compiles the matcher for a route that has already had its
	/// `$queue/` / `$share/<group>/` prefixes removed.
	pub fn compile(route: impl Into<ArcStr>) -> PatternResult<Self> {
		let route = route.into();
		let segments = TopicPatternItem::parse_route(&route)?;
		let expression = Self::to_expression(&segments);
		let regex = Regex::new(&expression).map_err(|err| {
			TopicPatternError::matcher(route.as_str(), err.to_string())
		})?;
		Ok(Self {
			wildcard_count: segments.iter().filter(|s| s.is_wildcard()).count(),
			route,
			regex,
		})
	}

	fn to_expression(segments: &[TopicPatternItem]) -> String {
		let mut expression = String::from("(?s)^");
		for (index, segment) in segments.iter().enumerate() {
			match segment {
				| TopicPatternItem::Hash if index == 0 => {
					expression.push_str(MULTI_LEVEL_ALL);
				}
				// `/#` is optional: "a/#" accepts "a" as well as "a/..."
				| TopicPatternItem::Hash => {
					expression.push_str(MULTI_LEVEL_TAIL);
				}
				| TopicPatternItem::Plus => {
					if index > 0 {
						expression.push('/');
					}
					expression.push_str(SINGLE_LEVEL);
				}
				| TopicPatternItem::Str(literal) => {
					if index > 0 {
						expression.push('/');
					}
					expression.push_str(&regex::escape(literal));
				}
			}
		}
		expression.push('$');
		expression
	}

	/// Canonical route this matcher was built from.
	pub fn route(&self) -> &ArcStr {
		&self.route
	}

	/// Number of capture groups (one per wildcard token).
	pub fn wildcard_count(&self) -> usize {
		self.wildcard_count
	}

	/// Returns true if the whole `topic` matches.
	pub fn is_match(&self, topic: &str) -> bool {
		self.regex.is_match(topic)
	}

	/// Collects every capture group (excluding the full match) across all
	/// non-overlapping matches of `topic`.
	///
	/// A group that did not take part in the match (an absent `/#` tail)
	/// yields an empty string so positions stay aligned with wildcards.
	pub fn captures(&self, topic: &str) -> Vec<String> {
		let mut captured = Vec::with_capacity(self.wildcard_count);
		let mut start = 0;
		while start <= topic.len() {
			let Some(caps) = self.regex.captures_at(topic, start) else {
				break;
			};
			let Some(whole) = caps.get(0) else {
				break;
			};
			captured.extend(caps.iter().skip(1).map(|group| {
				group.map_or_else(String::new, |m| m.as_str().to_owned())
			}));
			start = if whole.is_empty() {
				// Zero-width match: step over one character to make progress
				whole.end()
					+ topic[whole.end() ..]
						.chars()
						.next()
						.map_or(1, char::len_utf8)
			} else {
				whole.end()
			};
		}
		captured
	}
}

impl PartialEq for TopicMatcher {
	fn eq(&self, other: &Self) -> bool {
		self.route == other.route
	}
}

impl Eq for TopicMatcher {}
