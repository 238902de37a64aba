//! Topic handling module
//!
//! This module turns subscription templates into matchers: placeholder
//! substitution, queue/share prefix handling, wildcard compilation and
//! capture extraction.

// Submodules
pub mod compiled_topic;
pub mod error;
pub mod placeholder;
pub mod topic_matcher;
pub mod topic_pattern_item;

#[cfg(test)]
mod topic_pattern_item_tests;

// Re-export commonly used types for convenience
pub use compiled_topic::{
	CompiledTopic, SubscriptionPolicy, TopicCompiler, strip_prefixes,
};
pub use error::{PatternResult, limits};
pub use placeholder::{TopicVariables, substitute};
pub use topic_matcher::TopicMatcher;
pub use topic_pattern_item::{TopicPatternError, TopicPatternItem};
