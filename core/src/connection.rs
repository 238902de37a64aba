//! Lifetime of the background tasks behind an [`MqttRouter`].
//!
//! [`MqttRouter`]: crate::MqttRouter

use rumqttc::AsyncClient;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::routing::DispatcherController;

/// Tasks spawned by `connect`, owned until [`RouterConnection::shutdown`].
struct BackgroundTasks {
	dispatcher: DispatcherController,
	event_loop: JoinHandle<()>,
}

/// Owns the dispatcher actor and the event-loop task of a connected router.
///
/// Await [`RouterConnection::shutdown`] to stop both. Dropping the value
/// leaves them running detached until the runtime stops.
pub struct RouterConnection {
	client: AsyncClient,
	tasks: Option<BackgroundTasks>,
}

impl RouterConnection {
	pub(crate) fn new(
		client: AsyncClient,
		dispatcher: DispatcherController,
		event_loop: JoinHandle<()>,
	) -> Self {
		Self {
			client,
			tasks: Some(BackgroundTasks {
				dispatcher,
				event_loop,
			}),
		}
	}

	/// Stops dispatching, then disconnects and waits for the event loop.
	///
	/// Handlers still running get the actor's drain window. The event loop
	/// exits once the Disconnect packet goes out. Failures along the way are
	/// logged and do not abort the remaining steps.
	pub async fn shutdown(mut self) -> Result<(), crate::RouterError> {
		let Some(tasks) = self.tasks.take() else {
			return Ok(());
		};

		if let Err(e) = tasks.dispatcher.shutdown().await {
			warn!(error = %e, "Dispatcher actor ended abnormally");
		}
		debug!("Dispatcher stopped, disconnecting");

		if let Err(e) = self.client.disconnect().await {
			warn!(error = %e, "Could not queue Disconnect");
		}
		if let Err(e) = tasks.event_loop.await {
			warn!(error = %e, "Event loop task ended abnormally");
		}

		info!("Router connection closed");
		Ok(())
	}
}

impl Drop for RouterConnection {
	fn drop(&mut self) {
		if self.tasks.is_some() {
			warn!(
				"RouterConnection released while running; dispatcher and \
				 event loop are left detached"
			);
		}
	}
}
