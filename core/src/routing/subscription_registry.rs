//! Insertion-ordered registry of subscribers keyed by wire topic.

use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;

use super::subscriber::Subscriber;

/// Subscribers keyed by wire topic.
///
/// Each wire topic maps to at most one subscriber; later registrations of
/// the same key are ignored. Lookups scan in insertion order and the first
/// match wins.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
	entries: Vec<Arc<Subscriber>>,
	index: HashMap<ArcStr, usize>,
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `subscriber` unless its wire topic is already known.
	///
	/// Returns true only for a new entry; callers subscribe on the broker
	/// in that case alone.
	pub fn register(&mut self, subscriber: Arc<Subscriber>) -> bool {
		if self.index.contains_key(subscriber.wire_topic()) {
			return false;
		}
		self.index
			.insert(subscriber.wire_topic().clone(), self.entries.len());
		self.entries.push(subscriber);
		true
	}

	/// Earliest-registered subscriber whose matcher accepts `topic`.
	pub fn find_match(&self, topic: &str) -> Option<&Arc<Subscriber>> {
		self.entries.iter().find(|s| s.matches(topic))
	}

	/// Subscriber registered under `wire_topic`.
	pub fn get(&self, wire_topic: &str) -> Option<&Arc<Subscriber>> {
		self.index.get(wire_topic).and_then(|&i| self.entries.get(i))
	}

	pub fn contains(&self, wire_topic: &str) -> bool {
		self.index.contains_key(wire_topic)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Subscribers in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<Subscriber>> {
		self.entries.iter()
	}

	/// Registered wire topics in insertion order.
	pub fn wire_topics(&self) -> impl Iterator<Item = &ArcStr> {
		self.entries.iter().map(|s| s.wire_topic())
	}
}
