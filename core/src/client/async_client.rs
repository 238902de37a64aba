use std::time::Duration;

use rumqttc::Packet::{self, Disconnect, Publish, SubAck};
use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, EventLoop};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::config::RouterConfig;
use super::error::RouterError;
use crate::client::error::ConnectionEstablishmentError;
use crate::connection::RouterConnection;
use crate::routing::{
	Dispatcher, DispatcherActor, DispatcherHandle, ExploreReport,
	SubscriptionDeclaration,
};
use crate::transport::{
	IncomingMessage, RumqttcTransport, SubscribeTracker, TransportEvent,
};

/// MQTT client routing incoming messages to declared handlers.
///
/// Connection lifecycle is managed separately via `RouterConnection`.
#[derive(Clone, Debug)]
pub struct MqttRouter {
	client: AsyncClient,
	dispatcher: DispatcherHandle,
}

impl MqttRouter {
	/// Connect with default configuration.
	///
	/// Returns both router and connection handle. Keep the connection alive
	/// for the session duration, call `connection.shutdown()` when done.
	pub async fn connect(
		url: &str,
		declarations: impl IntoIterator<Item = SubscriptionDeclaration>,
	) -> Result<(Self, RouterConnection), RouterError> {
		let config = RouterConfig::from_url(url)?;
		Self::connect_with_config(config, declarations).await
	}

	/// Connect with custom configuration.
	///
	/// Every declaration is compiled before connecting, so an invalid
	/// template fails here without touching the network.
	pub async fn connect_with_config(
		config: RouterConfig,
		declarations: impl IntoIterator<Item = SubscriptionDeclaration>,
	) -> Result<(Self, RouterConnection), RouterError> {
		if config.settings.command_channel_capacity == 0 {
			return Err(RouterError::ConfigurationValue(
				"command_channel_capacity must be greater than 0".to_string(),
			));
		}
		let (client, new_event_loop) = AsyncClient::new(
			config.connection,
			config.settings.event_loop_capacity,
		);
		let transport = RumqttcTransport::new(client.clone());
		let tracker = transport.tracker().clone();
		let mut dispatcher = Dispatcher::new(
			transport,
			declarations,
			config.routing,
			config.transforms,
		)?;
		if let Some(hook) = config.before_handle {
			dispatcher = dispatcher.with_before_handle(hook);
		}

		let timeout_millis = config.settings.connection_timeout_millis;
		let connection_timeout = Duration::from_millis(timeout_millis);
		let (connected_event_loop, session_present) = tokio::time::timeout(
			connection_timeout,
			Self::establish_connection(new_event_loop),
		)
		.await
		.map_err(|_| ConnectionEstablishmentError::Timeout { timeout_millis })?
		.map_err(RouterError::ConnectionEstablishment)?;

		let (controller, handle) = DispatcherActor::spawn(
			dispatcher,
			config.settings.command_channel_capacity,
		);
		handle
			.send_event(TransportEvent::Connected { session_present })
			.await?;

		// The event loop terminates when it sees a Disconnect packet
		let handle_clone = handle.clone();
		let event_loop_handle = tokio::spawn(async move {
			Self::run(connected_event_loop, handle_clone, tracker).await;
		});
		let router = Self {
			client: client.clone(),
			dispatcher: handle,
		};
		let connection =
			RouterConnection::new(client, controller, event_loop_handle);
		Ok((router, connection))
	}

	async fn establish_connection(
		mut event_loop: EventLoop,
	) -> Result<(EventLoop, bool), ConnectionEstablishmentError> {
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					code,
					session_present,
				}))) => {
					if code == ConnectReturnCode::Success {
						debug!(session_present, "MQTT connection established successfully");
						return Ok((event_loop, session_present));
					} else {
						debug!(code = ?code, "MQTT connection rejected by broker");
						return Err(
							ConnectionEstablishmentError::BrokerRejected {
								code,
							},
						);
					}
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Bootstrap phase notification");
				}
				| Err(connection_err) => {
					debug!(error = %connection_err, "MQTT connection error during bootstrap phase");
					return Err(ConnectionEstablishmentError::Network(
						connection_err,
					));
				}
			}
		}
	}

	/// Translates rumqttc notifications into transport events.
	/// Terminates on a Disconnect packet (Incoming or Outgoing).
	async fn run(
		mut event_loop: EventLoop,
		dispatcher: DispatcherHandle,
		tracker: std::sync::Arc<SubscribeTracker>,
	) {
		let mut error_count = 0;
		const MAX_CONSECUTIVE_ERRORS: u32 = 10;
		const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
		const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

		loop {
			let event = match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					session_present,
					code: ConnectReturnCode::Success,
				}))) => {
					error_count = 0;
					info!(session_present, "MQTT reconnected");
					if !session_present {
						tracker.reset_in_flight();
					}
					TransportEvent::Connected { session_present }
				}
				| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
					warn!(code = ?code, "MQTT reconnect rejected by broker");
					continue;
				}
				| Ok(Incoming(Publish(p))) => {
					error_count = 0;
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
					TransportEvent::MessageReceived(IncomingMessage::from_publish(p))
				}
				| Ok(Incoming(SubAck(ack))) => {
					let Some((wire_topic, success)) = tracker.on_suback(&ack)
					else {
						continue;
					};
					TransportEvent::SubscribeResult {
						wire_topic,
						success,
					}
				}
				| Ok(Outgoing(rumqttc::Outgoing::Subscribe(pkid))) => {
					tracker.on_outgoing(pkid);
					continue;
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
					break;
				}
				| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					break;
				}
				| Ok(notification) => {
					error_count = 0;
					debug!(notification = ?notification, "Received OTHER MQTT notification");
					continue;
				}
				| Err(err) => {
					error_count += 1;
					error!(error_count = error_count, error = %err, "MQTT event loop error");

					if error_count >= MAX_CONSECUTIVE_ERRORS {
						error!(
							error_count = error_count,
							max_errors = MAX_CONSECUTIVE_ERRORS,
							"Too many consecutive errors, terminating event \
							 loop"
						);
						break;
					}

					let delay = INITIAL_RETRY_DELAY
						* 2_u32.pow((error_count - 1).min(10));
					let delay = delay.min(MAX_RETRY_DELAY);

					warn!(delay = ?delay, error_count = error_count, "Retrying MQTT connection");
					time::sleep(delay).await;
					continue;
				}
			};
			if let Err(err) = dispatcher.send_event(event).await {
				error!(error = %err, "Dispatcher stopped, terminating event loop");
				break;
			}
		}
		info!("MQTT event loop terminated");
	}

	/// Adds a declaration at runtime.
	///
	/// It is registered and subscribed immediately, and again on every
	/// later reconnection like the initial ones.
	pub async fn add_declaration(
		&self,
		declaration: SubscriptionDeclaration,
	) -> Result<ExploreReport, RouterError> {
		Ok(self.dispatcher.add_declaration(declaration).await??)
	}

	/// Underlying rumqttc client, e.g. for publishing.
	///
	/// Subscribing through it directly is not supported: SubAck correlation
	/// assumes every outgoing subscribe was issued by the dispatcher.
	pub fn client(&self) -> &AsyncClient {
		&self.client
	}
}
