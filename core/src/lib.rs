//! # MQTT Topic Dispatch
//!
//! Topic-pattern routing and handler dispatch for MQTT subscribers.
//!
//! ## Features
//!
//! - **Pattern compilation**: `+` and trailing `/#` wildcards, `$queue/` and
//!   `$share/<group>/` prefixes, `{{name}}` placeholders
//! - **Idempotent registration**: subscriptions are registered on every
//!   (re)connection without duplicate broker subscribe requests
//! - **Positional handler arguments**: payload, topic, packet and wildcard
//!   captures, with pluggable payload transforms
//! - **Failure isolation**: a failing transform or handler drops one message,
//!   never the dispatch loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_topic_dispatch_core::{
//!     HandlerArgs, HandlerError, Json, MqttRouter, RouterConfig,
//!     SubscriptionDeclaration, TransformSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let declaration = SubscriptionDeclaration::builder("sensors/+/temperature")
//!         .transform(TransformSpec::Json)
//!         .payload_at(0)
//!         .params_at(1)
//!         .handler(|mut args: HandlerArgs| async move {
//!             let Json(reading): Json<serde_json::Value> = args.extract(0)?;
//!             let ids: Vec<String> = args.extract(1)?;
//!             println!("sensor {ids:?}: {reading}");
//!             Ok::<(), HandlerError>(())
//!         })
//!         .build()?;
//!
//!     let mut config = RouterConfig::localhost("dispatch-demo");
//!     config.routing.share = Some("workers".to_string());
//!
//!     let (_router, connection) =
//!         MqttRouter::connect_with_config(config, [declaration]).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one non-empty topic level
//! - a trailing `/#` matches the prefix alone or followed by `/` and anything
//! - when several registered patterns match, the earliest registered wins

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod connection;
pub mod payload_transform;
pub mod routing;
pub mod topic;
pub mod transport;

// === Core Public API ===
// Main client types
pub use client::{ClientSettings, MqttRouter, RouterConfig, RouterError};
pub use connection::RouterConnection;
// Declarations and handler arguments
pub use routing::{
	BeforeHandle, DeclarationBuilder, FromHandlerArg, HandlerArg, HandlerArgs,
	HandlerError, IntoHandlerResult, Json, MessageHandler, ParameterKind,
	ParameterSpec, RoutingSettings, SubscriptionDeclaration,
};
// Payload transforms
pub use payload_transform::{
	PayloadDecoder, PayloadValue, TransformError, TransformRegistry,
	TransformSpec,
};
// Transport boundary
pub use transport::{
	IncomingMessage, PacketMeta, RumqttcTransport, SubscribeTransport,
	TransportEvent,
};
// === Advanced API ===
pub use routing::{
	Dispatcher, DispatcherState, ExploreReport, SubscriptionRegistry,
};
// Re-export rumqttc types for advanced configuration
pub use rumqttc::MqttOptions;
// Essential external types
pub use rumqttc::QoS;
// Topic pattern types (for manual pattern handling)
pub use topic::{
	CompiledTopic, SubscriptionPolicy, TopicMatcher, TopicPatternError,
};

/// Result type alias for operations that may fail with RouterError
pub type Result<T> = std::result::Result<T, RouterError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_topic_dispatch_core::prelude::*;
/// ```
pub mod prelude {

	pub use crate::{
		HandlerArgs, HandlerError, Json, MqttRouter, PacketMeta, PayloadValue,
		QoS, RouterConfig, RouterConnection, RoutingSettings,
		SubscriptionDeclaration, TransformSpec,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_topic_dispatch_core::errors::*;
/// ```
pub mod errors {

	pub use crate::client::{
		ConfigError, ConnectionEstablishmentError, RouterError,
	};
	pub use crate::payload_transform::TransformError;
	pub use crate::routing::{
		ArgumentError, DeclarationError, DispatchError, HandlerError,
		SendError, TransportError,
	};
	pub use crate::topic::TopicPatternError;
}
