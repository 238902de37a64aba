//! Dispatcher state machine: registers subscriptions on connect and routes
//! incoming messages to handlers.

use std::sync::Arc;

use arcstr::ArcStr;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::declaration::{ParameterKind, SubscriptionDeclaration};
use super::error::{DeclarationError, DispatchError};
use super::handler::{HandlerArg, HandlerArgs, HandlerFuture};
use super::settings::{BeforeHandle, RoutingSettings};
use super::subscriber::Subscriber;
use super::subscription_registry::SubscriptionRegistry;
use crate::payload_transform::TransformRegistry;
use crate::topic::{SubscriptionPolicy, TopicCompiler, substitute};
use crate::transport::{IncomingMessage, SubscribeTransport, TransportEvent};

/// Lifecycle of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
	/// No `connected` event seen yet
	Idle,
	/// Registering subscriptions after a `connected` event
	Exploring,
	/// Subscriptions registered, routing messages
	Active,
}

/// Outcome of one registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreReport {
	/// Subscribers newly inserted into the registry
	pub registered: usize,
	/// Wire topics a subscribe request was issued for
	pub subscribed: Vec<ArcStr>,
	/// Wire topics whose subscribe request could not be issued
	pub failed: Vec<ArcStr>,
}

/// A handler call with its arguments prepared.
pub struct PreparedCall {
	subscriber: Arc<Subscriber>,
	args: HandlerArgs,
}

impl PreparedCall {
	/// Subscriber that matched the message.
	pub fn subscriber(&self) -> &Arc<Subscriber> {
		&self.subscriber
	}

	/// Positional arguments.
	pub fn args(&self) -> &HandlerArgs {
		&self.args
	}

	/// Invokes the handler.
	pub fn invoke(self) -> HandlerFuture {
		self.subscriber.declaration().handler().call(self.args)
	}
}

/// Routes transport events to subscriptions and handlers.
///
/// Templates are compiled when the dispatcher is built so invalid ones are
/// reported before connecting. Registration into the registry happens on
/// every `connected` event and is idempotent.
pub struct Dispatcher<T> {
	transport: T,
	settings: RoutingSettings,
	policy: SubscriptionPolicy,
	compiler: TopicCompiler,
	compiled: Vec<Arc<Subscriber>>,
	registry: SubscriptionRegistry,
	transforms: TransformRegistry,
	before_handle: Option<BeforeHandle>,
	state: DispatcherState,
}

impl<T: SubscribeTransport> Dispatcher<T> {
	/// Compiles every declaration.
	pub fn new(
		transport: T,
		declarations: impl IntoIterator<Item = SubscriptionDeclaration>,
		settings: RoutingSettings,
		transforms: TransformRegistry,
	) -> Result<Self, DeclarationError> {
		let mut dispatcher = Self {
			transport,
			policy: settings.policy(),
			settings,
			compiler: TopicCompiler::new(),
			compiled: Vec::new(),
			registry: SubscriptionRegistry::new(),
			transforms,
			before_handle: None,
			state: DispatcherState::Idle,
		};
		for declaration in declarations {
			let subscribers = dispatcher.compile_declaration(declaration)?;
			dispatcher.compiled.extend(subscribers);
		}
		Ok(dispatcher)
	}

	/// Installs a hook run before every handler invocation.
	pub fn with_before_handle(mut self, hook: BeforeHandle) -> Self {
		self.before_handle = Some(hook);
		self
	}

	pub fn state(&self) -> DispatcherState {
		self.state
	}

	pub fn registry(&self) -> &SubscriptionRegistry {
		&self.registry
	}

	pub fn settings(&self) -> &RoutingSettings {
		&self.settings
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Number of compiled subscribers, registered or not.
	pub fn compiled_len(&self) -> usize {
		self.compiled.len()
	}

	fn compile_declaration(
		&mut self,
		declaration: SubscriptionDeclaration,
	) -> Result<Vec<Arc<Subscriber>>, DeclarationError> {
		let declaration = Arc::new(declaration);
		let policy = declaration.policy(&self.policy);
		declaration
			.topics()
			.iter()
			.map(|template| {
				let resolved = substitute(template, &self.settings.variables);
				let topic =
					self.compiler.compile(&resolved, &policy).map_err(
						|source| DeclarationError::Pattern {
							owner: declaration.owner(),
							template: resolved.to_string(),
							source,
						},
					)?;
				Ok(Arc::new(Subscriber::new(topic, Arc::clone(&declaration))))
			})
			.collect()
	}

	/// Dispatches one transport event.
	///
	/// Returns the spawned handler task when a message was routed.
	pub async fn handle_event(
		&mut self,
		event: TransportEvent,
	) -> Option<JoinHandle<()>> {
		match event {
			| TransportEvent::Connected { session_present } => {
				self.on_connected(session_present).await;
				None
			}
			| TransportEvent::MessageReceived(message) => {
				self.on_message(message)
			}
			| TransportEvent::SubscribeResult {
				wire_topic,
				success,
			} => {
				self.on_subscribe_result(&wire_topic, success);
				None
			}
		}
	}

	/// Registers every compiled subscriber and subscribes the new ones.
	///
	/// Safe to run on every (re)connection: known wire topics are neither
	/// duplicated nor subscribed again, unless the broker lost the session
	/// and `resubscribe_on_session_loss` is set.
	pub async fn on_connected(&mut self, session_present: bool) -> ExploreReport {
		let reconnect = self.state != DispatcherState::Idle;
		self.state = DispatcherState::Exploring;
		info!(
			reconnect,
			session_present,
			declarations = self.compiled.len(),
			"Registering subscriptions"
		);

		let fresh: Vec<Arc<Subscriber>> = self
			.compiled
			.iter()
			.filter(|subscriber| self.registry.register(Arc::clone(subscriber)))
			.cloned()
			.collect();
		let registered = fresh.len();

		let to_subscribe = if reconnect
			&& !session_present
			&& self.settings.resubscribe_on_session_loss
		{
			info!("Session lost, resubscribing to all wire topics");
			self.registry.iter().cloned().collect()
		} else {
			fresh
		};

		let mut report = self.subscribe_all(&to_subscribe).await;
		report.registered = registered;
		self.state = DispatcherState::Active;
		report
	}

	async fn subscribe_all(&self, subscribers: &[Arc<Subscriber>]) -> ExploreReport {
		let mut report = ExploreReport::default();
		for subscriber in subscribers {
			let wire_topic = subscriber.wire_topic().clone();
			let qos = subscriber
				.declaration()
				.qos()
				.unwrap_or(self.settings.default_qos);
			match self.transport.subscribe(wire_topic.clone(), qos).await {
				| Ok(()) => {
					debug!(wire_topic = %wire_topic, qos = ?qos, "Subscribe requested");
					report.subscribed.push(wire_topic);
				}
				| Err(err) => {
					error!(wire_topic = %wire_topic, error = %err, "Failed to request subscribe");
					report.failed.push(wire_topic);
				}
			}
		}
		report
	}

	/// Logs the broker's answer to a subscribe request.
	pub fn on_subscribe_result(&self, wire_topic: &str, success: bool) {
		if success {
			debug!(wire_topic = %wire_topic, "Subscribe topic success");
		} else {
			error!(wire_topic = %wire_topic, "Subscribe topic failed");
		}
	}

	/// Adds a declaration after construction.
	///
	/// It takes part in every later registration pass; if the dispatcher has
	/// already explored, it is registered and subscribed right away.
	pub async fn add_declaration(
		&mut self,
		declaration: SubscriptionDeclaration,
	) -> Result<ExploreReport, DeclarationError> {
		let subscribers = self.compile_declaration(declaration)?;
		self.compiled.extend(subscribers.iter().cloned());
		if self.state == DispatcherState::Idle {
			return Ok(ExploreReport::default());
		}
		let fresh: Vec<Arc<Subscriber>> = subscribers
			.into_iter()
			.filter(|subscriber| self.registry.register(Arc::clone(subscriber)))
			.collect();
		let mut report = self.subscribe_all(&fresh).await;
		report.registered = fresh.len();
		Ok(report)
	}

	/// Resolves the subscriber for `message` and builds its arguments.
	///
	/// `Ok(None)` means no subscriber matched.
	pub fn prepare(
		&self,
		message: &IncomingMessage,
	) -> Result<Option<PreparedCall>, DispatchError> {
		let Some(subscriber) = self.registry.find_match(&message.topic) else {
			return Ok(None);
		};
		if let Some(hook) = &self.before_handle {
			hook.call(message)
				.map_err(|err| DispatchError::before_handle(&message.topic, err))?;
		}

		let declaration = subscriber.declaration();
		let mut slots: Vec<Option<HandlerArg>> = vec![None; declaration.arity()];
		for parameter in declaration.parameters() {
			let arg = match parameter.kind {
				| ParameterKind::Payload => {
					let spec = declaration.payload_transform(parameter);
					let value = self
						.transforms
						.decode(spec, &message.payload)
						.map_err(|err| DispatchError::transform(&message.topic, err))?;
					HandlerArg::Payload(value)
				}
				| ParameterKind::Topic => HandlerArg::Topic(message.topic.clone()),
				| ParameterKind::Packet => {
					HandlerArg::Packet(Arc::clone(&message.packet))
				}
				| ParameterKind::Params => {
					HandlerArg::Params(subscriber.captures(&message.topic))
				}
			};
			if let Some(slot) = slots.get_mut(parameter.position) {
				*slot = Some(arg);
			}
		}
		Ok(Some(PreparedCall {
			subscriber: Arc::clone(subscriber),
			args: HandlerArgs::new(slots),
		}))
	}

	/// Routes one message and spawns its handler.
	///
	/// Failures are logged and never propagate; the returned task logs the
	/// handler's own error.
	pub fn on_message(&self, message: IncomingMessage) -> Option<JoinHandle<()>> {
		if self.state == DispatcherState::Idle {
			warn!(topic = %message.topic, "Message received before connect");
		}
		let call = match self.prepare(&message) {
			| Ok(Some(call)) => call,
			| Ok(None) => {
				trace!(topic = %message.topic, "No subscriber for topic");
				return None;
			}
			| Err(err) => {
				error!(topic = %message.topic, error = %err, "Dropping message");
				return None;
			}
		};
		let topic = message.topic;
		let wire_topic = call.subscriber().wire_topic().clone();
		let owner = call.subscriber().declaration().owner();
		Some(tokio::spawn(async move {
			if let Err(err) = call.invoke().await {
				error!(
					topic = %topic,
					wire_topic = %wire_topic,
					owner,
					error = %err,
					"Handler failed"
				);
			}
		}))
	}
}
