use std::path::PathBuf;

use rumqttc::{ClientError, OptionError};

use crate::routing::{DeclarationError, SendError};
use crate::topic::TopicPatternError;

/// Errors while waiting for the first ConnAck
#[derive(Debug, thiserror::Error)]
pub enum ConnectionEstablishmentError {
	/// Transport failed before the broker answered
	#[error("Network connection failed: {0}")]
	Network(#[from] rumqttc::ConnectionError),

	/// Broker answered with a non-success code
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected {
		/// Return code sent by the broker
		code: rumqttc::ConnectReturnCode,
	},

	/// No ConnAck within the configured timeout
	#[error("Connection establishment timed out after {timeout_millis}ms")]
	Timeout {
		/// Configured timeout
		timeout_millis: u64,
	},
}

/// Errors loading routing settings from a file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Settings file could not be read
	#[error("Failed to read settings file {path:?}: {source}")]
	Io {
		/// File path
		path: PathBuf,
		/// Read failure
		#[source]
		source: std::io::Error,
	},

	/// Settings file is not a valid settings object
	#[error("Invalid settings file {path:?}: {source}")]
	Parse {
		/// File path
		path: PathBuf,
		/// JSON failure
		#[source]
		source: serde_json::Error,
	},
}

/// Errors that can occur in router operations
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
	/// Connection-related errors from rumqttc
	#[error("Client operation failed: {0}")]
	ClientOperation(#[from] ClientError),

	/// Configuration errors when parsing MQTT options
	#[error("Configuration error: {0}")]
	Configuration(#[from] OptionError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Settings file errors
	#[error("Settings error: {0}")]
	Settings(#[from] ConfigError),

	/// Invalid subscription declaration
	#[error("Declaration error: {0}")]
	Declaration(#[from] DeclarationError),

	/// Topic pattern errors
	#[error("Topic pattern error: {0}")]
	TopicPattern(#[from] TopicPatternError),

	/// Dispatcher is no longer running
	#[error("Dispatcher unavailable: {0}")]
	Dispatcher(#[from] SendError),

	/// Connection establishment failed
	#[error("Failed to establish connection: {0}")]
	ConnectionEstablishment(#[from] ConnectionEstablishmentError),
}
