//! Configuration for router initialization

use std::path::Path;

use rumqttc::{MqttOptions, OptionError};

use super::error::ConfigError;
use crate::payload_transform::{PayloadDecoder, TransformRegistry};
use crate::routing::{BeforeHandle, RoutingSettings};

/// Client-level performance and behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Capacity of the rumqttc request channel
	pub event_loop_capacity: usize,
	/// Capacity of the dispatcher command channel (must be > 0)
	pub command_channel_capacity: usize,
	/// Time allowed for the first ConnAck
	pub connection_timeout_millis: u64,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			command_channel_capacity: 100,
			connection_timeout_millis: 5_000,
		}
	}
}

/// Configuration for router creation
#[derive(Debug, Clone)]
pub struct RouterConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Client-level performance and behavior settings
	pub settings: ClientSettings,
	/// Queue/share policy, placeholders and default QoS
	pub routing: RoutingSettings,
	/// Named payload transforms available to declarations
	pub transforms: TransformRegistry,
	/// Hook run before every handler invocation
	pub before_handle: Option<BeforeHandle>,
}

impl RouterConfig {
	/// Create config with default settings
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		Self::with_options(MqttOptions::new(client_id, host, port))
	}

	fn with_options(connection: MqttOptions) -> Self {
		Self {
			connection,
			settings: ClientSettings::default(),
			routing: RoutingSettings::default(),
			transforms: TransformRegistry::new(),
			before_handle: None,
		}
	}

	/// Parse configuration from MQTT URL
	///
	/// Supports: tcp://, mqtt://, ssl://, mqtts://, ws://, wss://
	pub fn from_url(url: &str) -> Result<Self, OptionError> {
		Ok(Self::with_options(MqttOptions::parse_url(url)?))
	}

	/// Create config for localhost:1883
	pub fn localhost(client_id: &str) -> Self {
		Self::new(client_id, "localhost", 1883)
	}

	/// Overlays routing settings from a JSON file.
	///
	/// ```rust,no_run
	/// # use mqtt_topic_dispatch_core::RouterConfig;
	/// let mut config = RouterConfig::localhost("worker-1");
	/// config.load_settings_file("routing.json")?;
	/// # Ok::<(), mqtt_topic_dispatch_core::client::error::ConfigError>(())
	/// ```
	pub fn load_settings_file(
		&mut self,
		path: impl AsRef<Path>,
	) -> Result<&mut Self, ConfigError> {
		self.routing = self.routing.load_file(path)?;
		Ok(self)
	}

	/// Registers a named payload transform.
	pub fn register_transform(
		&mut self,
		name: &str,
		decoder: impl PayloadDecoder,
	) -> &mut Self {
		self.transforms.register(name, decoder);
		self
	}

	/// Installs a before-handle hook.
	pub fn with_before_handle(&mut self, hook: BeforeHandle) -> &mut Self {
		self.before_handle = Some(hook);
		self
	}
}

impl RoutingSettings {
	/// Returns these settings overlaid with a JSON settings file.
	pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path).map_err(|source| {
			ConfigError::Io {
				path: path.to_path_buf(),
				source,
			}
		})?;
		self.overlay_json(&json).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}
}
