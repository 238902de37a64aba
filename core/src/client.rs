//! MQTT client module
//!
//! Router construction, configuration and client error types.

/// Router client over rumqttc
pub mod async_client;
pub mod config;
/// Client error types
pub mod error;

// Re-export commonly used types for convenience
pub use async_client::MqttRouter;
pub use config::{ClientSettings, RouterConfig};
pub use error::{ConfigError, ConnectionEstablishmentError, RouterError};

// Connection type is available from the root level
// Use: mqtt_topic_dispatch::RouterConnection
