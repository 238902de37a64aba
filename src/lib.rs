//! # MQTT Topic Dispatch
//!
//! Topic-pattern routing and handler dispatch for MQTT subscribers, with an
//! attribute macro that turns annotated `async fn` methods into subscription
//! declarations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mqtt_topic_dispatch::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Debug)]
//! struct Reading {
//!     celsius: f64,
//! }
//!
//! struct Thermostat;
//!
//! #[mqtt_subscriptions]
//! impl Thermostat {
//!     #[subscribe("sensors/+/temperature", transform = "json", qos = 1)]
//!     async fn on_temperature(
//!         &self,
//!         #[payload] reading: Json<Reading>,
//!         #[params] ids: Vec<String>,
//!     ) -> Result<(), HandlerError> {
//!         println!("{ids:?}: {}", reading.celsius);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let declarations = Arc::new(Thermostat).subscription_declarations()?;
//!     let (_router, connection) =
//!         MqttRouter::connect("mqtt://localhost:1883?client_id=thermostat", declarations)
//!             .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub use mqtt_topic_dispatch_core::*;
pub use mqtt_topic_dispatch_macros::mqtt_subscriptions;

// Types that appear in handler signatures
pub use arcstr::ArcStr;
pub use bytes::Bytes;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_topic_dispatch::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for declaring and running subscriptions

	pub use mqtt_topic_dispatch_core::prelude::*;

	pub use crate::{ArcStr, Bytes, mqtt_subscriptions};
}
