//! `#[mqtt_subscriptions]` expanded on a real impl block and dispatched.

use std::sync::{Arc, Mutex};

use mqtt_topic_dispatch::errors::TransportError;
use mqtt_topic_dispatch::prelude::*;
use mqtt_topic_dispatch::{
	Dispatcher, IncomingMessage, SubscribeTransport, TransformRegistry,
	TransportEvent,
};
use serde::Deserialize;

#[derive(Clone, Default)]
struct MemoryTransport {
	subscribed: Arc<Mutex<Vec<(String, QoS)>>>,
}

impl SubscribeTransport for MemoryTransport {
	async fn subscribe(
		&self,
		wire_topic: ArcStr,
		qos: QoS,
	) -> Result<(), TransportError> {
		self.subscribed
			.lock()
			.unwrap()
			.push((wire_topic.to_string(), qos));
		Ok(())
	}
}

#[derive(Deserialize, Debug, PartialEq)]
struct Reading {
	celsius: f64,
}

#[derive(Default)]
struct Recorder {
	seen: Mutex<Vec<String>>,
}

impl Recorder {
	fn record(&self, entry: String) {
		self.seen.lock().unwrap().push(entry);
	}

	fn seen(&self) -> Vec<String> {
		self.seen.lock().unwrap().clone()
	}
}

#[mqtt_subscriptions]
impl Recorder {
	#[subscribe("sensors/+/temperature", transform = "json", qos = 2)]
	async fn on_temperature(
		&self,
		#[params] ids: Vec<String>,
		#[payload] reading: Json<Reading>,
	) -> Result<(), HandlerError> {
		self.record(format!("temp {} {}", ids[0], reading.celsius));
		Ok(())
	}

	#[subscribe(topics = ["{{site}}/logs/#", "audit/#"], queue)]
	async fn on_log(
		&self,
		#[topic] topic: ArcStr,
		#[payload(transform = "text")] line: String,
	) {
		self.record(format!("log {topic} {line}"));
	}

	#[subscribe("raw/+", no_share)]
	async fn on_raw(&self, #[payload] bytes: Bytes, #[packet] packet: PacketMeta) {
		self.record(format!("raw {} {}", bytes.len(), packet.topic));
	}

	#[subscribe("failing")]
	async fn on_failing(&self) -> Result<(), HandlerError> {
		Err(HandlerError::from("always fails"))
	}

	fn unrelated(&self) -> usize {
		self.seen().len()
	}
}

async fn deliver(
	dispatcher: &mut Dispatcher<MemoryTransport>,
	topic: &str,
	payload: &'static [u8],
) {
	let event =
		TransportEvent::MessageReceived(IncomingMessage::new(topic, payload));
	if let Some(task) = dispatcher.handle_event(event).await {
		task.await.unwrap();
	}
}

#[tokio::test]
async fn test_macro_generates_declarations() {
	let recorder = Arc::new(Recorder::default());
	let declarations = recorder.subscription_declarations().unwrap();
	assert_eq!(declarations.len(), 4);
	assert_eq!(declarations[0].qos(), Some(QoS::ExactlyOnce));
	assert_eq!(declarations[0].arity(), 2);
	assert_eq!(declarations[1].topics().len(), 2);
	assert!(declarations[0].owner().ends_with("Recorder"));
}

#[tokio::test]
async fn test_macro_handlers_dispatch() {
	let recorder = Arc::new(Recorder::default());
	let transport = MemoryTransport::default();
	let settings = RoutingSettings {
		share: Some("group".to_string()),
		..RoutingSettings::default()
	}
	.with_variable("site", "plant");
	let mut dispatcher = Dispatcher::new(
		transport.clone(),
		recorder.subscription_declarations().unwrap(),
		settings,
		TransformRegistry::new(),
	)
	.unwrap();

	dispatcher
		.handle_event(TransportEvent::Connected {
			session_present: false,
		})
		.await;
	let wire_topics: Vec<String> = transport
		.subscribed
		.lock()
		.unwrap()
		.iter()
		.map(|(topic, _)| topic.clone())
		.collect();
	assert_eq!(wire_topics, vec![
		"$share/group/sensors/+/temperature",
		"$queue/plant/logs/#",
		"$queue/audit/#",
		"raw/+",
		"$share/group/failing",
	]);

	deliver(&mut dispatcher, "sensors/s1/temperature", br#"{"celsius": 21.5}"#)
		.await;
	deliver(&mut dispatcher, "plant/logs/app", b"started").await;
	deliver(&mut dispatcher, "raw/x", b"\x00\x01\x02").await;
	deliver(&mut dispatcher, "failing", b"").await;
	deliver(&mut dispatcher, "audit/login", b"alice").await;

	assert_eq!(recorder.seen(), vec![
		"temp s1 21.5",
		"log plant/logs/app started",
		"raw 3 raw/x",
		"log audit/login alice",
	]);
	assert_eq!(recorder.unrelated(), 4);
}
