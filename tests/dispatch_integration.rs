//! Dispatcher driven through transport events with an in-memory transport.

use std::sync::{Arc, Mutex};

use mqtt_topic_dispatch::errors::TransportError;
use mqtt_topic_dispatch::{
	ArcStr, Dispatcher, DispatcherState, HandlerArgs, HandlerError,
	IncomingMessage, Json, QoS, RoutingSettings, SubscribeTransport,
	SubscriptionDeclaration, TransformRegistry, TransformSpec, TransportEvent,
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

#[derive(Clone, Default)]
struct MemoryTransport {
	subscribed: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
	fn subscribed(&self) -> Vec<String> {
		self.subscribed.lock().unwrap().clone()
	}
}

impl SubscribeTransport for MemoryTransport {
	async fn subscribe(
		&self,
		wire_topic: ArcStr,
		_qos: QoS,
	) -> Result<(), TransportError> {
		self.subscribed.lock().unwrap().push(wire_topic.to_string());
		Ok(())
	}
}

fn forwarding(
	template: &str,
	tag: &'static str,
	tx: &UnboundedSender<(&'static str, Vec<String>)>,
) -> SubscriptionDeclaration {
	let tx = tx.clone();
	SubscriptionDeclaration::builder(template.to_string())
		.params_at(0)
		.handler(move |mut args: HandlerArgs| {
			let tx = tx.clone();
			async move {
				let params: Vec<String> = args.extract(0)?;
				let _ = tx.send((tag, params));
				Ok::<(), HandlerError>(())
			}
		})
		.build()
		.unwrap()
}

async fn send(
	dispatcher: &mut Dispatcher<MemoryTransport>,
	event: TransportEvent,
) {
	if let Some(task) = dispatcher.handle_event(event).await {
		task.await.unwrap();
	}
}

fn message(topic: &str, payload: &'static [u8]) -> TransportEvent {
	TransportEvent::MessageReceived(IncomingMessage::new(topic, payload))
}

#[tokio::test]
async fn test_full_session_lifecycle() {
	let (tx, mut rx) = unbounded_channel();
	let transport = MemoryTransport::default();
	let settings = RoutingSettings {
		share: Some("workers".to_string()),
		..RoutingSettings::default()
	}
	.with_variable("site", "north");
	let declarations = vec![
		forwarding("{{site}}/devices/+/state", "state", &tx),
		forwarding("{{site}}/devices/#", "any", &tx),
	];
	let mut dispatcher = Dispatcher::new(
		transport.clone(),
		declarations,
		settings,
		TransformRegistry::new(),
	)
	.unwrap();
	assert_eq!(dispatcher.state(), DispatcherState::Idle);

	send(&mut dispatcher, TransportEvent::Connected {
		session_present: false,
	})
	.await;
	assert_eq!(dispatcher.state(), DispatcherState::Active);
	assert_eq!(transport.subscribed(), vec![
		"$share/workers/north/devices/+/state",
		"$share/workers/north/devices/#",
	]);

	send(&mut dispatcher, message("north/devices/7/state", b"on")).await;
	assert_eq!(rx.recv().await.unwrap(), ("state", vec!["7".to_string()]));

	send(&mut dispatcher, message("north/devices/7/battery", b"80")).await;
	assert_eq!(
		rx.recv().await.unwrap(),
		("any", vec!["/7/battery".to_string()])
	);

	send(&mut dispatcher, message("south/devices/7/state", b"on")).await;
	assert!(rx.try_recv().is_err());

	send(&mut dispatcher, TransportEvent::SubscribeResult {
		wire_topic: ArcStr::from("$share/workers/north/devices/#"),
		success: false,
	})
	.await;
	send(&mut dispatcher, TransportEvent::Connected {
		session_present: true,
	})
	.await;
	assert_eq!(transport.subscribed().len(), 2);
	assert_eq!(dispatcher.registry().len(), 2);
}

#[tokio::test]
async fn test_json_payload_reaches_handler() {
	let (tx, mut rx) = unbounded_channel();
	let declaration = SubscriptionDeclaration::builder("metrics/+")
		.transform(TransformSpec::Json)
		.params_at(0)
		.payload_at(1)
		.handler(move |mut args: HandlerArgs| {
			let tx = tx.clone();
			async move {
				let ids: Vec<String> = args.extract(0)?;
				let Json(value): Json<serde_json::Value> = args.extract(1)?;
				let _ = tx.send((ids, value));
				Ok::<(), HandlerError>(())
			}
		})
		.build()
		.unwrap();
	let mut dispatcher = Dispatcher::new(
		MemoryTransport::default(),
		[declaration],
		RoutingSettings::default(),
		TransformRegistry::new(),
	)
	.unwrap();
	send(&mut dispatcher, TransportEvent::Connected {
		session_present: false,
	})
	.await;

	send(&mut dispatcher, message("metrics/cpu", br#"{"load": 0.5}"#)).await;
	let (ids, value) = rx.recv().await.unwrap();
	assert_eq!(ids, vec!["cpu"]);
	assert_eq!(value["load"], 0.5);

	// Malformed JSON is dropped without stopping later deliveries
	send(&mut dispatcher, message("metrics/cpu", b"{oops")).await;
	send(&mut dispatcher, message("metrics/mem", br#"{"load": 1}"#)).await;
	let (ids, _) = rx.recv().await.unwrap();
	assert_eq!(ids, vec!["mem"]);
}
