//! Error types and utilities for the topic module
//!
//! Individual error types stay in their respective modules; this module
//! holds the shared result aliases and constants.

use super::topic_pattern_item::TopicPatternError;

/// Convenient Result type for pattern operations
pub type PatternResult<T> = Result<T, TopicPatternError>;

/// Topic processing limits and constants
pub mod limits {
	/// Maximum total topic length accepted by MQTT (UTF-8 encoded string)
	pub const MAX_TOPIC_LENGTH: usize = 65_535;

	/// Prefix marking a queue subscription on the wire
	pub const QUEUE_PREFIX: &str = "$queue/";

	/// Prefix marking a shared subscription on the wire
	pub const SHARE_PREFIX: &str = "$share/";
}
