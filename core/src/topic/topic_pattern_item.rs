//! MQTT topic pattern item types and functionality

use std::convert::TryFrom;

use arcstr::{ArcStr, Substr};
use thiserror::Error;

use super::error::limits::MAX_TOPIC_LENGTH;

/// Error types for topic pattern parsing
///
/// Raised while compiling a subscription template. These are startup-time
/// configuration faults: a template that fails here is never registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPatternError {
	/// Hash wildcard (#) used not at the end of the pattern
	#[error(
		"Invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid pattern
		pattern: String,
	},

	/// Wildcard characters (+ or #) used incorrectly
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage {
		/// Description of invalid usage
		usage: String,
	},

	/// Empty topic is not valid
	#[error("Topic pattern cannot be empty")]
	EmptyTopic,

	/// Pattern exceeds the MQTT topic length limit
	#[error("Topic pattern is {length} bytes long, limit is {limit}")]
	TooLong {
		/// Length of the rejected pattern
		length: usize,
		/// Maximum accepted length
		limit: usize,
	},

	/// Pattern contains a NUL character
	#[error("Topic pattern '{pattern}' contains a null character")]
	NullCharacter {
		/// The invalid pattern
		pattern: String,
	},

	/// The generated matcher expression was rejected
	#[error("Failed to build matcher for '{pattern}': {reason}")]
	Matcher {
		/// Route the matcher was built from
		pattern: String,
		/// Reason reported by the regex engine
		reason: String,
	},
}

impl TopicPatternError {
	/// Creates a new HashPosition error
	pub fn hash_position(pattern: impl Into<String>) -> Self {
		Self::HashPosition {
			pattern: pattern.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}

	/// Creates a new Matcher error
	pub fn matcher(
		pattern: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::Matcher {
			pattern: pattern.into(),
			reason: reason.into(),
		}
	}
}

/// MQTT topic pattern segment: literal string or wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPatternItem {
	/// Literal string segment
	Str(Substr),
	/// Single-level wildcard `+`
	Plus,
	/// Multi-level wildcard `#`
	Hash,
}

impl TopicPatternItem {
	/// Returns string representation of the pattern item.
	pub fn as_str(&self) -> &str {
		match self {
			| TopicPatternItem::Str(s) => s,
			| TopicPatternItem::Plus => "+",
			| TopicPatternItem::Hash => "#",
		}
	}

	/// Returns true if this item is a wildcard (+ or #).
	pub fn is_wildcard(&self) -> bool {
		matches!(self, TopicPatternItem::Plus | TopicPatternItem::Hash)
	}

	/// Splits a canonical route into validated segments.
	///
	/// Empty levels (`a//b`, leading `/`) are literal segments, as in MQTT.
	pub fn parse_route(
		route: &ArcStr,
	) -> Result<Vec<TopicPatternItem>, TopicPatternError> {
		if route.is_empty() || route.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}
		if route.len() > MAX_TOPIC_LENGTH {
			return Err(TopicPatternError::TooLong {
				length: route.len(),
				limit: MAX_TOPIC_LENGTH,
			});
		}
		if route.contains('\0') {
			return Err(TopicPatternError::NullCharacter {
				pattern: route.to_string(),
			});
		}

		let segments = route
			.split('/')
			.map(|s| route.substr_from(s))
			.map(TopicPatternItem::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(s, TopicPatternItem::Hash))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicPatternError::hash_position(route.as_str()));
			}
		}
		Ok(segments)
	}
}

impl std::fmt::Display for TopicPatternItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl TryFrom<Substr> for TopicPatternItem {
	type Error = TopicPatternError;

	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let res = match item.as_str() {
			| "+" => TopicPatternItem::Plus,
			| "#" => TopicPatternItem::Hash,
			| _ if item.contains(['+', '#']) => {
				return Err(TopicPatternError::wildcard_usage(format!(
					"segment '{}' mixes a wildcard with other characters",
					item.as_str()
				)));
			}
			| _ => TopicPatternItem::Str(item),
		};
		Ok(res)
	}
}
