//! Template → (wire topic, canonical route, matcher) compilation.

use std::collections::HashMap;

use arcstr::ArcStr;

use super::error::PatternResult;
use super::error::limits::{QUEUE_PREFIX, SHARE_PREFIX};
use super::topic_matcher::TopicMatcher;

/// Queue/share policy applied when building the wire topic.
///
/// `queue` wins over `share` when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubscriptionPolicy {
	/// Prefix the wire topic with `$queue/`
	pub queue: bool,
	/// Prefix the wire topic with `$share/<group>/` (ignored when empty)
	pub share: Option<ArcStr>,
}

impl SubscriptionPolicy {
	/// Plain subscription, no prefix.
	pub fn plain() -> Self {
		Self::default()
	}

	/// `$queue/` subscription.
	pub fn queue() -> Self {
		Self {
			queue: true,
			share: None,
		}
	}

	/// `$share/<group>/` subscription.
	pub fn shared(group: impl Into<ArcStr>) -> Self {
		Self {
			queue: false,
			share: Some(group.into()),
		}
	}

	/// Builds the wire topic for a canonical route.
	pub fn wire_topic(&self, route: &str) -> ArcStr {
		if self.queue {
			return arcstr::format!("{QUEUE_PREFIX}{route}");
		}
		match self.share.as_deref() {
			| Some(group) if !group.is_empty() => {
				arcstr::format!("{SHARE_PREFIX}{group}/{route}")
			}
			| _ => ArcStr::from(route),
		}
	}
}

/// Removes a leading `$queue/` and then a leading `$share/<group>/`.
///
/// Only alphanumeric share group names are recognised; anything else is
/// left as part of the route.
pub fn strip_prefixes(template: &str) -> &str {
	let route = template.strip_prefix(QUEUE_PREFIX).unwrap_or(template);
	strip_share_prefix(route)
}

fn strip_share_prefix(topic: &str) -> &str {
	let Some(rest) = topic.strip_prefix(SHARE_PREFIX) else {
		return topic;
	};
	match rest.split_once('/') {
		| Some((group, route))
			if !group.is_empty()
				&& group.chars().all(|c| c.is_ascii_alphanumeric()) =>
		{
			route
		}
		| _ => topic,
	}
}

/// A compiled subscription template.
///
/// `matcher` and `route` work on the stripped form because incoming
/// message topics never carry queue/share prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTopic {
	wire_topic: ArcStr,
	route: ArcStr,
	matcher: TopicMatcher,
}

impl CompiledTopic {
	/// Compiles a resolved template (placeholders already substituted).
	pub fn compile(
		template: &str,
		policy: &SubscriptionPolicy,
	) -> PatternResult<Self> {
		let route = strip_prefixes(template);
		let matcher = TopicMatcher::compile(route)?;
		Ok(Self::from_matcher(matcher, policy))
	}

	fn from_matcher(matcher: TopicMatcher, policy: &SubscriptionPolicy) -> Self {
		Self {
			wire_topic: policy.wire_topic(matcher.route()),
			route: matcher.route().clone(),
			matcher,
		}
	}

	/// Topic sent to the broker, queue/share prefix included.
	pub fn wire_topic(&self) -> &ArcStr {
		&self.wire_topic
	}

	/// Canonical route (prefixes removed).
	pub fn route(&self) -> &ArcStr {
		&self.route
	}

	/// Matcher over the canonical route.
	pub fn matcher(&self) -> &TopicMatcher {
		&self.matcher
	}

	/// Returns true if an incoming topic matches this template.
	pub fn matches(&self, topic: &str) -> bool {
		self.matcher.is_match(topic)
	}
}

/// Compiler that reuses matchers across templates sharing one route.
#[derive(Debug, Default)]
pub struct TopicCompiler {
	matchers: HashMap<ArcStr, TopicMatcher>,
}

impl TopicCompiler {
	/// Creates an empty compiler.
	pub fn new() -> Self {
		Self::default()
	}

	/// Compiles `template`, building the matcher only on first sight of its
	/// canonical route.
	pub fn compile(
		&mut self,
		template: &str,
		policy: &SubscriptionPolicy,
	) -> PatternResult<CompiledTopic> {
		let route = strip_prefixes(template);
		let matcher = match self.matchers.get(route) {
			| Some(matcher) => matcher.clone(),
			| None => {
				let matcher = TopicMatcher::compile(route)?;
				self.matchers
					.insert(matcher.route().clone(), matcher.clone());
				matcher
			}
		};
		Ok(CompiledTopic::from_matcher(matcher, policy))
	}

	/// Number of distinct routes compiled so far.
	pub fn cached_routes(&self) -> usize {
		self.matchers.len()
	}
}
