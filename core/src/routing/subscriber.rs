use std::sync::Arc;

use arcstr::ArcStr;

use super::declaration::SubscriptionDeclaration;
use crate::topic::{CompiledTopic, TopicMatcher};

/// Runtime registration of one compiled template.
#[derive(Debug, Clone)]
pub struct Subscriber {
	topic: CompiledTopic,
	declaration: Arc<SubscriptionDeclaration>,
}

impl Subscriber {
	pub fn new(
		topic: CompiledTopic,
		declaration: Arc<SubscriptionDeclaration>,
	) -> Self {
		Self { topic, declaration }
	}

	/// Registry key and the topic sent to the broker.
	pub fn wire_topic(&self) -> &ArcStr {
		self.topic.wire_topic()
	}

	pub fn route(&self) -> &ArcStr {
		self.topic.route()
	}

	pub fn matcher(&self) -> &TopicMatcher {
		self.topic.matcher()
	}

	pub fn declaration(&self) -> &Arc<SubscriptionDeclaration> {
		&self.declaration
	}

	pub fn matches(&self, topic: &str) -> bool {
		self.topic.matches(topic)
	}

	/// Wildcard captures of `topic`, in order.
	pub fn captures(&self, topic: &str) -> Vec<String> {
		self.topic.matcher().captures(topic)
	}
}
