//! Tests for the subscription registry

use std::sync::Arc;

use super::declaration::SubscriptionDeclaration;
use super::handler::HandlerArgs;
use super::subscriber::Subscriber;
use super::subscription_registry::SubscriptionRegistry;
use crate::topic::{CompiledTopic, SubscriptionPolicy};

fn subscriber(template: &str, policy: SubscriptionPolicy) -> Arc<Subscriber> {
	let declaration = SubscriptionDeclaration::builder(template.to_string())
		.params_at(0)
		.handler(|_args: HandlerArgs| async {})
		.build()
		.expect("valid declaration");
	let topic = CompiledTopic::compile(template, &policy)
		.expect("template should compile");
	Arc::new(Subscriber::new(topic, Arc::new(declaration)))
}

fn plain(template: &str) -> Arc<Subscriber> {
	subscriber(template, SubscriptionPolicy::plain())
}

#[test]
fn test_register_is_idempotent() {
	let mut registry = SubscriptionRegistry::new();
	assert!(registry.register(plain("a/+")));
	assert!(!registry.register(plain("a/+")));
	assert_eq!(registry.len(), 1);
}

#[test]
fn test_first_registration_wins_on_key_collision() {
	let mut registry = SubscriptionRegistry::new();
	let first = plain("a/b");
	let second = plain("a/b");
	registry.register(Arc::clone(&first));
	registry.register(second);

	let stored = registry.get("a/b").expect("registered");
	assert!(Arc::ptr_eq(stored, &first));
}

#[test]
fn test_find_match_earliest_registered() {
	let mut registry = SubscriptionRegistry::new();
	registry.register(plain("sensors/#"));
	registry.register(plain("sensors/+/temperature"));

	let found = registry.find_match("sensors/1/temperature").unwrap();
	assert_eq!(found.wire_topic().as_str(), "sensors/#");

	// Reverse insertion order flips the winner
	let mut registry = SubscriptionRegistry::new();
	registry.register(plain("sensors/+/temperature"));
	registry.register(plain("sensors/#"));
	let found = registry.find_match("sensors/1/temperature").unwrap();
	assert_eq!(found.wire_topic().as_str(), "sensors/+/temperature");
}

#[test]
fn test_find_match_none() {
	let mut registry = SubscriptionRegistry::new();
	assert!(registry.is_empty());
	assert!(registry.find_match("a").is_none());
	registry.register(plain("a/+"));
	assert!(registry.find_match("b/1").is_none());
	assert!(registry.find_match("a/1/2").is_none());
}

#[test]
fn test_same_route_different_policy_are_distinct_entries() {
	let mut registry = SubscriptionRegistry::new();
	assert!(registry.register(plain("jobs/+")));
	assert!(registry.register(subscriber("jobs/+", SubscriptionPolicy::queue())));
	assert!(registry.register(subscriber(
		"jobs/+",
		SubscriptionPolicy::shared("g")
	)));
	assert_eq!(registry.len(), 3);

	let topics: Vec<&str> = registry.wire_topics().map(|t| t.as_str()).collect();
	assert_eq!(topics, vec!["jobs/+", "$queue/jobs/+", "$share/g/jobs/+"]);
	assert!(registry.contains("$queue/jobs/+"));

	// All three match; the first registered is used
	let found = registry.find_match("jobs/7").unwrap();
	assert_eq!(found.wire_topic().as_str(), "jobs/+");
}
