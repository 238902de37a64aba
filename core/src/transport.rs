//! Boundary with the MQTT transport.
//!
//! The dispatcher consumes [`TransportEvent`]s and issues one command,
//! [`SubscribeTransport::subscribe`]. [`RumqttcTransport`] implements the
//! command over `rumqttc` and correlates SubAck packets back to wire topics.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::{AsyncClient, Publish, QoS, SubAck, SubscribeReasonCode};
use tracing::{debug, warn};

use crate::routing::error::TransportError;

/// Raw protocol packet handed to `packet` parameters.
pub type PacketMeta = Arc<Publish>;

/// A published message delivered by the transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
	/// Topic the message was published on
	pub topic: ArcStr,
	/// Untouched payload bytes
	pub payload: Bytes,
	/// Original packet
	pub packet: PacketMeta,
}

impl IncomingMessage {
	/// Builds a message with a synthetic QoS 0 packet.
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		let topic = topic.into();
		let payload = payload.into();
		let packet =
			Publish::new(topic.as_str(), QoS::AtMostOnce, payload.to_vec());
		Self {
			topic,
			payload,
			packet: Arc::new(packet),
		}
	}

	/// Wraps a received PUBLISH packet.
	pub fn from_publish(publish: Publish) -> Self {
		Self {
			topic: ArcStr::from(publish.topic.as_str()),
			payload: publish.payload.clone(),
			packet: Arc::new(publish),
		}
	}
}

/// Events the dispatcher reacts to.
#[derive(Debug, Clone)]
pub enum TransportEvent {
	/// Connection (or reconnection) acknowledged by the broker
	Connected {
		/// Broker kept the previous session
		session_present: bool,
	},
	/// A message was published on a subscribed topic
	MessageReceived(IncomingMessage),
	/// Broker answered a subscribe request
	SubscribeResult {
		/// Wire topic the answer refers to
		wire_topic: ArcStr,
		/// Whether the broker granted the subscription
		success: bool,
	},
}

/// Outbound subscribe command.
///
/// Returning `Ok` means the request was queued; the broker's answer arrives
/// later as [`TransportEvent::SubscribeResult`].
pub trait SubscribeTransport: Send + Sync + 'static {
	/// Requests a subscription to `wire_topic`.
	fn subscribe(
		&self,
		wire_topic: ArcStr,
		qos: QoS,
	) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Default)]
struct TrackerState {
	queued: VecDeque<ArcStr>,
	in_flight: HashMap<u16, ArcStr>,
}

/// Correlates subscribe requests with their SubAck packets.
///
/// rumqttc assigns packet ids when a request leaves the event loop, so wire
/// topics wait in FIFO order until `Outgoing::Subscribe(pkid)` is observed.
/// Every outgoing subscribe must therefore come from [`RumqttcTransport`].
#[derive(Debug, Default)]
pub struct SubscribeTracker {
	state: Mutex<TrackerState>,
}

impl SubscribeTracker {
	/// Creates an empty tracker.
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, TrackerState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Records a request handed to the client.
	pub fn queue(&self, wire_topic: ArcStr) {
		self.lock().queued.push_back(wire_topic);
	}

	/// Forgets the most recent request, which the client refused.
	pub fn cancel_last(&self) {
		self.lock().queued.pop_back();
	}

	/// Binds the oldest queued request to the packet id it was sent with.
	pub fn on_outgoing(&self, pkid: u16) {
		let mut state = self.lock();
		match state.queued.pop_front() {
			| Some(wire_topic) => {
				state.in_flight.insert(pkid, wire_topic);
			}
			| None => {
				debug!(pkid, "Outgoing subscribe not issued by the dispatcher");
			}
		}
	}

	/// Resolves a SubAck into `(wire_topic, success)`.
	pub fn on_suback(&self, ack: &SubAck) -> Option<(ArcStr, bool)> {
		let wire_topic = self.lock().in_flight.remove(&ack.pkid);
		let Some(wire_topic) = wire_topic else {
			warn!(pkid = ack.pkid, "SubAck for unknown subscribe request");
			return None;
		};
		let success = !ack.return_codes.is_empty()
			&& ack
				.return_codes
				.iter()
				.all(|code| matches!(code, SubscribeReasonCode::Success(_)));
		Some((wire_topic, success))
	}

	/// Drops sent requests whose SubAck can no longer arrive because the
	/// broker started a fresh session. Unsent requests stay queued.
	pub fn reset_in_flight(&self) -> usize {
		let dropped: Vec<ArcStr> =
			self.lock().in_flight.drain().map(|(_, topic)| topic).collect();
		for wire_topic in &dropped {
			warn!(wire_topic = %wire_topic, "Subscribe lost with the previous session");
		}
		dropped.len()
	}

	/// Number of requests without a SubAck yet.
	pub fn pending(&self) -> usize {
		let state = self.lock();
		state.queued.len() + state.in_flight.len()
	}
}

/// [`SubscribeTransport`] over a rumqttc client.
#[derive(Debug, Clone)]
pub struct RumqttcTransport {
	client: AsyncClient,
	tracker: Arc<SubscribeTracker>,
}

impl RumqttcTransport {
	/// Wraps a client; the event loop must feed `tracker()` with outgoing
	/// subscribe ids and SubAcks.
	pub fn new(client: AsyncClient) -> Self {
		Self {
			client,
			tracker: Arc::new(SubscribeTracker::new()),
		}
	}

	/// Shared request tracker.
	pub fn tracker(&self) -> &Arc<SubscribeTracker> {
		&self.tracker
	}

	/// Underlying rumqttc client.
	pub fn client(&self) -> &AsyncClient {
		&self.client
	}
}

impl SubscribeTransport for RumqttcTransport {
	async fn subscribe(
		&self,
		wire_topic: ArcStr,
		qos: QoS,
	) -> Result<(), TransportError> {
		self.tracker.queue(wire_topic.clone());
		if let Err(source) =
			self.client.subscribe(wire_topic.as_str(), qos).await
		{
			self.tracker.cancel_last();
			return Err(TransportError::Client { wire_topic, source });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn suback(pkid: u16, codes: Vec<SubscribeReasonCode>) -> SubAck {
		SubAck {
			pkid,
			return_codes: codes,
		}
	}

	#[test]
	fn test_incoming_message_from_publish() {
		let publish = Publish::new("a/b", QoS::AtLeastOnce, b"hi".to_vec());
		let message = IncomingMessage::from_publish(publish);
		assert_eq!(message.topic.as_str(), "a/b");
		assert_eq!(message.payload.as_ref(), b"hi");
		assert_eq!(message.packet.qos, QoS::AtLeastOnce);
	}

	#[test]
	fn test_tracker_correlates_in_order() {
		let tracker = SubscribeTracker::new();
		tracker.queue(ArcStr::from("a/+"));
		tracker.queue(ArcStr::from("$queue/b"));
		tracker.on_outgoing(7);
		tracker.on_outgoing(8);

		let (topic, ok) = tracker
			.on_suback(&suback(8, vec![SubscribeReasonCode::Failure]))
			.unwrap();
		assert_eq!(topic.as_str(), "$queue/b");
		assert!(!ok);

		let (topic, ok) = tracker
			.on_suback(&suback(
				7,
				vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)],
			))
			.unwrap();
		assert_eq!(topic.as_str(), "a/+");
		assert!(ok);
		assert_eq!(tracker.pending(), 0);
	}

	#[test]
	fn test_tracker_unknown_and_cancelled() {
		let tracker = SubscribeTracker::new();
		assert!(tracker.on_suback(&suback(1, vec![])).is_none());

		tracker.queue(ArcStr::from("x"));
		tracker.cancel_last();
		tracker.on_outgoing(3);
		assert!(tracker.on_suback(&suback(3, vec![])).is_none());
	}

	#[test]
	fn test_tracker_reset_keeps_unsent() {
		let tracker = SubscribeTracker::new();
		tracker.queue(ArcStr::from("sent/+"));
		tracker.queue(ArcStr::from("unsent/#"));
		tracker.on_outgoing(4);

		assert_eq!(tracker.reset_in_flight(), 1);
		assert_eq!(tracker.pending(), 1);
		assert!(tracker.on_suback(&suback(4, vec![])).is_none());

		// The unsent request gets the next packet id
		tracker.on_outgoing(1);
		let (topic, ok) = tracker
			.on_suback(&suback(
				1,
				vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
			))
			.unwrap();
		assert_eq!(topic.as_str(), "unsent/#");
		assert!(ok);
	}
}
