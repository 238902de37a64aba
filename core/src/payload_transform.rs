//! Payload transforms: raw bytes → handler payload value.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use thiserror::Error;

/// Errors raised while decoding a payload.
#[derive(Debug, Error)]
pub enum TransformError {
	/// Payload is not valid UTF-8
	#[error("Payload is not valid UTF-8: {0}")]
	InvalidUtf8(#[from] std::str::Utf8Error),

	/// Payload text is not valid JSON
	#[error("Payload is not valid JSON: {0}")]
	InvalidJson(#[from] serde_json::Error),

	/// No transform registered under this name
	#[error("Unknown payload transform '{name}'")]
	UnknownTransform {
		/// Requested transform name
		name: ArcStr,
	},

	/// Custom decoder failure
	#[error("Payload transform failed: {0}")]
	Custom(String),
}

impl TransformError {
	/// Creates a Custom error
	pub fn custom(details: impl Into<String>) -> Self {
		Self::Custom(details.into())
	}
}

/// Decoded payload handed to a handler.
#[derive(Clone)]
pub enum PayloadValue {
	/// Raw bytes, untouched
	Raw(Bytes),
	/// UTF-8 text
	Text(String),
	/// Structured JSON data
	Json(serde_json::Value),
	/// Output of a custom transform
	Custom(Arc<dyn Any + Send + Sync>),
}

impl PayloadValue {
	/// Wraps any value produced by a custom transform.
	pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
		Self::Custom(Arc::new(value))
	}

	/// Raw bytes, if this is an untransformed payload.
	pub fn as_bytes(&self) -> Option<&Bytes> {
		match self {
			| PayloadValue::Raw(bytes) => Some(bytes),
			| _ => None,
		}
	}

	/// Text, if decoded as text.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			| PayloadValue::Text(text) => Some(text),
			| _ => None,
		}
	}

	/// JSON value, if decoded as JSON.
	pub fn as_json(&self) -> Option<&serde_json::Value> {
		match self {
			| PayloadValue::Json(value) => Some(value),
			| _ => None,
		}
	}

	/// Custom transform output downcast to `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			| PayloadValue::Custom(value) => value.downcast_ref::<T>(),
			| _ => None,
		}
	}
}

impl Debug for PayloadValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| PayloadValue::Raw(bytes) => {
				f.debug_tuple("Raw").field(bytes).finish()
			}
			| PayloadValue::Text(text) => {
				f.debug_tuple("Text").field(text).finish()
			}
			| PayloadValue::Json(value) => {
				f.debug_tuple("Json").field(value).finish()
			}
			| PayloadValue::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

/// Trait for decoding MQTT message payloads.
///
/// Implement this trait (or pass a closure) to plug in custom formats.
pub trait PayloadDecoder: Send + Sync + 'static {
	/// Convert bytes from MQTT into a payload value
	fn decode(&self, payload: &Bytes) -> Result<PayloadValue, TransformError>;
}

impl<F> PayloadDecoder for F
where F: Fn(&Bytes) -> Result<PayloadValue, TransformError> + Send + Sync + 'static
{
	fn decode(&self, payload: &Bytes) -> Result<PayloadValue, TransformError> {
		self(payload)
	}
}

/// Identity transform: bytes are passed through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDecoder;

impl PayloadDecoder for RawDecoder {
	fn decode(&self, payload: &Bytes) -> Result<PayloadValue, TransformError> {
		Ok(PayloadValue::Raw(payload.clone()))
	}
}

/// UTF-8 text transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextDecoder;

impl PayloadDecoder for TextDecoder {
	fn decode(&self, payload: &Bytes) -> Result<PayloadValue, TransformError> {
		let text = std::str::from_utf8(payload)?;
		Ok(PayloadValue::Text(text.to_owned()))
	}
}

/// JSON transform: UTF-8 text first, then structured data.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
	fn decode(&self, payload: &Bytes) -> Result<PayloadValue, TransformError> {
		let text = std::str::from_utf8(payload)?;
		Ok(PayloadValue::Json(serde_json::from_str(text)?))
	}
}

/// Which transform to apply to a payload.
#[derive(Clone)]
pub enum TransformSpec {
	/// Pass raw bytes through
	Raw,
	/// Decode as UTF-8 text
	Text,
	/// Decode as JSON
	Json,
	/// Transform registered by name in a [`TransformRegistry`]
	Named(ArcStr),
	/// Caller-supplied decoder, used as-is
	Custom(Arc<dyn PayloadDecoder>),
}

impl TransformSpec {
	/// Wraps a custom decoder.
	pub fn custom(decoder: impl PayloadDecoder) -> Self {
		Self::Custom(Arc::new(decoder))
	}

	/// Maps `"json"`, `"text"`, `"raw"` to built-ins, anything else to a
	/// named transform.
	pub fn from_name(name: &str) -> Self {
		match name {
			| "json" => TransformSpec::Json,
			| "text" => TransformSpec::Text,
			| "raw" | "" => TransformSpec::Raw,
			| other => TransformSpec::Named(ArcStr::from(other)),
		}
	}
}

impl FromStr for TransformSpec {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::from_name(s))
	}
}

impl Debug for TransformSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| TransformSpec::Raw => f.write_str("Raw"),
			| TransformSpec::Text => f.write_str("Text"),
			| TransformSpec::Json => f.write_str("Json"),
			| TransformSpec::Named(name) => {
				f.debug_tuple("Named").field(name).finish()
			}
			| TransformSpec::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

/// Resolves transform specs to decoders.
///
/// Built-ins are always available; extra transforms can be registered by
/// name.
#[derive(Clone, Default)]
pub struct TransformRegistry {
	named: HashMap<ArcStr, Arc<dyn PayloadDecoder>>,
}

impl TransformRegistry {
	/// Creates a registry holding only the built-ins.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers (or replaces) a named transform.
	pub fn register(
		&mut self,
		name: impl Into<ArcStr>,
		decoder: impl PayloadDecoder,
	) -> &mut Self {
		self.named.insert(name.into(), Arc::new(decoder));
		self
	}

	/// Resolves a spec; an absent spec is the identity transform.
	pub fn resolve(
		&self,
		spec: Option<&TransformSpec>,
	) -> Result<Arc<dyn PayloadDecoder>, TransformError> {
		let decoder: Arc<dyn PayloadDecoder> = match spec {
			| None | Some(TransformSpec::Raw) => Arc::new(RawDecoder),
			| Some(TransformSpec::Text) => Arc::new(TextDecoder),
			| Some(TransformSpec::Json) => Arc::new(JsonDecoder),
			| Some(TransformSpec::Custom(decoder)) => Arc::clone(decoder),
			| Some(TransformSpec::Named(name)) => self
				.named
				.get(name)
				.cloned()
				.ok_or_else(|| TransformError::UnknownTransform {
					name: name.clone(),
				})?,
		};
		Ok(decoder)
	}

	/// Resolves and applies a spec in one step.
	pub fn decode(
		&self,
		spec: Option<&TransformSpec>,
		payload: &Bytes,
	) -> Result<PayloadValue, TransformError> {
		self.resolve(spec)?.decode(payload)
	}
}

impl Debug for TransformRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransformRegistry")
			.field("named", &self.named.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bytes(data: &'static [u8]) -> Bytes {
		Bytes::from_static(data)
	}

	#[test]
	fn test_absent_spec_is_identity() {
		let registry = TransformRegistry::new();
		let value = registry.decode(None, &bytes(b"\xff\x00raw")).unwrap();
		assert_eq!(value.as_bytes().unwrap().as_ref(), b"\xff\x00raw");
	}

	#[test]
	fn test_text_transform() {
		let registry = TransformRegistry::new();
		let value = registry
			.decode(Some(&TransformSpec::Text), &bytes("héllo".as_bytes()))
			.unwrap();
		assert_eq!(value.as_text(), Some("héllo"));
	}

	#[test]
	fn test_json_transform() {
		let registry = TransformRegistry::new();
		let value = registry
			.decode(Some(&TransformSpec::Json), &bytes(br#"{"a":1}"#))
			.unwrap();
		assert_eq!(value.as_json().unwrap()["a"], 1);
	}

	#[test]
	fn test_json_transform_errors() {
		let registry = TransformRegistry::new();
		let json = Some(&TransformSpec::Json);
		assert!(matches!(
			registry.decode(json, &bytes(b"\xff\xfe")),
			Err(TransformError::InvalidUtf8(_))
		));
		assert!(matches!(
			registry.decode(json, &bytes(b"{not json")),
			Err(TransformError::InvalidJson(_))
		));
	}

	#[test]
	fn test_custom_transform_is_used_as_is() {
		let registry = TransformRegistry::new();
		let spec = TransformSpec::custom(
			|payload: &Bytes| -> Result<PayloadValue, TransformError> {
				Ok(PayloadValue::custom(payload.len()))
			},
		);
		let value = registry.decode(Some(&spec), &bytes(b"12345")).unwrap();
		assert_eq!(value.downcast_ref::<usize>(), Some(&5));
	}

	#[test]
	fn test_named_transform() {
		let mut registry = TransformRegistry::new();
		registry.register(
			"upper",
			|payload: &Bytes| -> Result<PayloadValue, TransformError> {
				let text = std::str::from_utf8(payload)?;
				Ok(PayloadValue::Text(text.to_uppercase()))
			},
		);
		let value = registry
			.decode(Some(&TransformSpec::from_name("upper")), &bytes(b"on"))
			.unwrap();
		assert_eq!(value.as_text(), Some("ON"));
	}

	#[test]
	fn test_unknown_named_transform() {
		let registry = TransformRegistry::new();
		let result = registry.resolve(Some(&TransformSpec::from_name("xml")));
		assert!(matches!(
			result,
			Err(TransformError::UnknownTransform { name }) if name.as_str() == "xml"
		));
	}

	#[test]
	fn test_spec_from_name() {
		assert!(matches!(TransformSpec::from_name("json"), TransformSpec::Json));
		assert!(matches!(TransformSpec::from_name("text"), TransformSpec::Text));
		assert!(matches!(TransformSpec::from_name("raw"), TransformSpec::Raw));
		assert!(matches!(
			"cbor".parse::<TransformSpec>(),
			Ok(TransformSpec::Named(_))
		));
	}
}
