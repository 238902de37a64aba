//! Actor task owning the [`Dispatcher`].
//!
//! Transport events arrive one at a time over a command channel, so the
//! subscription registry is only ever touched by this task.

use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::declaration::SubscriptionDeclaration;
use super::dispatcher::{Dispatcher, ExploreReport};
use super::error::{DeclarationError, SendError};
use crate::transport::{SubscribeTransport, TransportEvent};

const HANDLER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

type AddDeclarationResponse =
	oneshot::Sender<Result<ExploreReport, DeclarationError>>;

#[derive(Debug)]
pub enum Command {
	Event(TransportEvent),
	AddDeclaration(Box<SubscriptionDeclaration>, AddDeclarationResponse),
}

pub struct DispatcherActor<T> {
	dispatcher: Dispatcher<T>,
	command_rx: Receiver<Command>,
	shutdown_rx: oneshot::Receiver<()>,
	in_flight: FuturesUnordered<JoinHandle<()>>,
}

impl<T: SubscribeTransport> DispatcherActor<T> {
	pub fn spawn(
		dispatcher: Dispatcher<T>,
		command_channel_capacity: usize,
	) -> (DispatcherController, DispatcherHandle) {
		let (command_tx, command_rx) = channel(command_channel_capacity);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let actor = Self {
			dispatcher,
			command_rx,
			shutdown_rx,
			in_flight: FuturesUnordered::new(),
		};
		let join_handle = tokio::spawn(async move { actor.run().await });

		let controller = DispatcherController {
			shutdown_tx,
			join_handle,
		};
		let handle = DispatcherHandle { command_tx };
		(controller, handle)
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("DispatcherActor: Shutdown signal received");
					break;
				}
				Some(finished) = self.in_flight.next() => {
					Self::handle_finished(finished);
				}
				cmd = self.command_rx.recv() => {
					match cmd {
						| Some(Command::Event(event)) => {
							if let Some(task) = self.dispatcher.handle_event(event).await {
								self.in_flight.push(task);
							}
						}
						| Some(Command::AddDeclaration(declaration, response_tx)) => {
							let result = self.dispatcher.add_declaration(*declaration).await;
							if response_tx.send(result).is_err() {
								warn!("Could not send add_declaration response (receiver dropped)");
							}
						}
						| None => {
							info!("DispatcherActor: Command channel closed, exiting");
							break;
						}
					}
				}
			}
		}
		info!("DispatcherActor: Exiting run loop");
		self.drain_in_flight().await;
	}

	fn handle_finished(finished: Result<(), JoinError>) {
		if let Err(err) = finished {
			if err.is_panic() {
				error!(error = ?err, "Handler panicked");
			} else {
				debug!(error = ?err, "Handler task cancelled");
			}
		}
	}

	/// Gives running handlers a short grace period before the actor exits.
	async fn drain_in_flight(&mut self) {
		let pending = self.in_flight.len();
		if pending == 0 {
			return;
		}
		debug!(pending, "Waiting for in-flight handlers");
		let drain = async {
			while let Some(finished) = self.in_flight.next().await {
				Self::handle_finished(finished);
			}
		};
		let res = tokio::time::timeout(HANDLER_DRAIN_TIMEOUT, drain).await;
		let _ = res.inspect_err(|_| {
			warn!(
				timeout_ms = HANDLER_DRAIN_TIMEOUT.as_millis() as u64,
				"DispatcherActor: handlers still running at shutdown"
			);
		});
	}
}

/// Stops the actor.
pub struct DispatcherController {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

impl DispatcherController {
	pub async fn shutdown(self) -> Result<(), JoinError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("DispatcherController: Shutdown signal already sent");
		});
		self.join_handle.await.inspect_err(|e| {
			warn!(error = ?e, "DispatcherController: Actor run failed");
		})
	}
}

/// Feeds the actor; cheap to clone.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
	command_tx: Sender<Command>,
}

impl DispatcherHandle {
	/// Queues a transport event.
	pub async fn send_event(&self, event: TransportEvent) -> Result<(), SendError> {
		self.command_tx
			.send(Command::Event(event))
			.await
			.map_err(|_| SendError::ChannelClosed)
	}

	/// Adds a declaration and waits for its registration report.
	pub async fn add_declaration(
		&self,
		declaration: SubscriptionDeclaration,
	) -> Result<Result<ExploreReport, DeclarationError>, SendError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::AddDeclaration(Box::new(declaration), tx))
			.await
			.map_err(|_| SendError::ChannelClosed)?;
		rx.await.map_err(|_| SendError::ResponseLost)
	}
}
