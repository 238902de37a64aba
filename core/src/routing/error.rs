use arcstr::ArcStr;
use thiserror::Error;

use super::handler::HandlerError;
use crate::payload_transform::TransformError;
use crate::topic::TopicPatternError;

/// Errors when sending commands to the dispatcher actor
#[derive(Debug, Error)]
pub enum SendError {
	/// Channel has been closed
	#[error("Channel has been closed")]
	ChannelClosed,
	/// Response from the dispatcher was lost
	#[error("Response from dispatcher was lost")]
	ResponseLost,
}

/// Per-message dispatch failure.
///
/// Always logged and swallowed; the dispatch loop keeps running.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// Payload transform could not be resolved or failed to decode
	#[error("Payload transform failed for topic '{topic}': {source}")]
	Transform {
		/// Incoming topic
		topic: ArcStr,
		/// Underlying transform failure
		#[source]
		source: TransformError,
	},

	/// The before-handle hook rejected the message
	#[error("Before-handle hook failed for topic '{topic}': {source}")]
	BeforeHandle {
		/// Incoming topic
		topic: ArcStr,
		/// Hook failure
		#[source]
		source: HandlerError,
	},
}

impl DispatchError {
	/// Creates a new Transform error
	pub fn transform(topic: &ArcStr, source: TransformError) -> Self {
		Self::Transform {
			topic: topic.clone(),
			source,
		}
	}

	/// Creates a new BeforeHandle error
	pub fn before_handle(topic: &ArcStr, source: HandlerError) -> Self {
		Self::BeforeHandle {
			topic: topic.clone(),
			source,
		}
	}
}

/// The outbound subscribe command could not be issued.
#[derive(Debug, Error)]
pub enum TransportError {
	/// Underlying MQTT client refused the request
	#[error("Failed to queue subscribe for '{wire_topic}': {source}")]
	Client {
		/// Wire topic being subscribed
		wire_topic: ArcStr,
		/// rumqttc failure
		#[source]
		source: rumqttc::ClientError,
	},

	/// Transport declined the request
	#[error("Subscribe to '{wire_topic}' rejected: {reason}")]
	Rejected {
		/// Wire topic being subscribed
		wire_topic: ArcStr,
		/// Why the transport declined
		reason: String,
	},
}

impl TransportError {
	pub fn rejected(wire_topic: &ArcStr, reason: impl Into<String>) -> Self {
		Self::Rejected {
			wire_topic: wire_topic.clone(),
			reason: reason.into(),
		}
	}
}

/// Invalid subscription declaration.
#[derive(Debug, Error)]
pub enum DeclarationError {
	/// Declaration carries no topic template
	#[error("Declaration '{owner}' has no topic template")]
	NoTopics {
		/// Owner type name
		owner: &'static str,
	},

	/// Two parameters claim the same position
	#[error("Declaration '{owner}' declares position {position} twice")]
	DuplicatePosition {
		/// Owner type name
		owner: &'static str,
		/// Duplicated position
		position: usize,
	},

	/// A parameter position is beyond the supported range
	#[error(
		"Declaration '{owner}' uses position {position}, the maximum is {max}"
	)]
	PositionOutOfRange {
		/// Owner type name
		owner: &'static str,
		/// Offending position
		position: usize,
		/// Highest accepted position
		max: usize,
	},

	/// Builder finished without a handler
	#[error("Declaration '{owner}' has no handler")]
	MissingHandler {
		/// Owner type name
		owner: &'static str,
	},

	/// A resolved template failed to compile
	#[error("Declaration '{owner}' has invalid topic '{template}': {source}")]
	Pattern {
		/// Owner type name
		owner: &'static str,
		/// Template after placeholder substitution
		template: String,
		/// Compile failure
		#[source]
		source: TopicPatternError,
	},
}
