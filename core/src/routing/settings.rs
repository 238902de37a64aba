//! Routing-level settings shared by every declaration.

use std::fmt;
use std::sync::Arc;

use arcstr::ArcStr;
use rumqttc::QoS;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::handler::HandlerError;
use crate::topic::{SubscriptionPolicy, TopicVariables};
use crate::transport::IncomingMessage;

/// Global routing behaviour.
///
/// Deserializable so a JSON settings file can overlay the in-code values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
	/// Subscribe every declaration through `$queue/` unless it opts out
	pub queue: bool,
	/// Share group applied to declarations without their own
	pub share: Option<String>,
	/// Values for `{{name}}` placeholders in templates
	pub variables: TopicVariables,
	/// QoS for declarations without an explicit one
	#[serde(
		serialize_with = "serialize_qos",
		deserialize_with = "deserialize_qos"
	)]
	pub default_qos: QoS,
	/// Subscribe every known wire topic again when the broker reports a
	/// fresh session on reconnect
	pub resubscribe_on_session_loss: bool,
}

impl Default for RoutingSettings {
	fn default() -> Self {
		Self {
			queue: false,
			share: None,
			variables: TopicVariables::new(),
			default_qos: QoS::AtLeastOnce,
			resubscribe_on_session_loss: false,
		}
	}
}

impl RoutingSettings {
	/// Global queue/share policy.
	pub fn policy(&self) -> SubscriptionPolicy {
		SubscriptionPolicy {
			queue: self.queue,
			share: self.share.as_deref().map(ArcStr::from),
		}
	}

	/// Adds one placeholder value.
	pub fn with_variable(
		mut self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.variables.insert(key.into(), value.into());
		self
	}

	/// Returns these settings with the top-level keys of a JSON object
	/// replaced by the ones in `json`.
	pub fn overlay_json(&self, json: &str) -> Result<Self, serde_json::Error> {
		let overlay: serde_json::Value = serde_json::from_str(json)?;
		let mut merged = serde_json::to_value(self)?;
		match (&mut merged, overlay) {
			| (
				serde_json::Value::Object(base),
				serde_json::Value::Object(fields),
			) => base.extend(fields),
			| (_, other) => {
				return Err(serde_json::Error::custom(format!(
					"settings overlay must be a JSON object, got {other}"
				)));
			}
		}
		serde_json::from_value(merged)
	}
}

/// Maps a numeric QoS level.
pub fn qos_from_level(level: u8) -> Option<QoS> {
	match level {
		| 0 => Some(QoS::AtMostOnce),
		| 1 => Some(QoS::AtLeastOnce),
		| 2 => Some(QoS::ExactlyOnce),
		| _ => None,
	}
}

fn serialize_qos<S: Serializer>(
	qos: &QoS,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.serialize_u8(*qos as u8)
}

fn deserialize_qos<'de, D: Deserializer<'de>>(
	deserializer: D,
) -> Result<QoS, D::Error> {
	let level = u8::deserialize(deserializer)?;
	qos_from_level(level)
		.ok_or_else(|| D::Error::custom(format!("invalid QoS level {level}")))
}

type HookFn = dyn Fn(&IncomingMessage) -> Result<(), HandlerError> + Send + Sync;

/// Callback run before every handler invocation.
///
/// An error drops the message.
#[derive(Clone)]
pub struct BeforeHandle(Arc<HookFn>);

impl BeforeHandle {
	/// Wraps a hook.
	pub fn new<F>(hook: F) -> Self
	where F: Fn(&IncomingMessage) -> Result<(), HandlerError> + Send + Sync + 'static
	{
		Self(Arc::new(hook))
	}

	/// Runs the hook.
	pub fn call(&self, message: &IncomingMessage) -> Result<(), HandlerError> {
		(self.0)(message)
	}
}

impl fmt::Debug for BeforeHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("BeforeHandle(..)")
	}
}
