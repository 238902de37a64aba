//! Handler invocation: positional arguments, typed extraction and the
//! handler trait itself.

use std::fmt::{self, Display};
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::payload_transform::PayloadValue;
use crate::transport::PacketMeta;

/// Errors converting a positional slot into a typed handler argument.
#[derive(Debug, Error)]
pub enum ArgumentError {
	/// Nothing was declared at this position
	#[error("No argument at position {position}")]
	Missing {
		/// Argument position
		position: usize,
	},

	/// The slot holds a different kind of value
	#[error("Argument at position {position} is {found}, expected {expected}")]
	Mismatch {
		/// Argument position
		position: usize,
		/// What the handler asked for
		expected: &'static str,
		/// What the slot actually holds
		found: &'static str,
	},

	/// Structured payload did not deserialize into the requested type
	#[error("Argument at position {position} failed to deserialize: {source}")]
	Deserialize {
		/// Argument position
		position: usize,
		/// serde_json failure
		#[source]
		source: serde_json::Error,
	},
}

/// Failure reported by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
	/// Building a typed argument failed
	#[error("Invalid handler argument: {0}")]
	Argument(#[from] ArgumentError),

	/// Error returned by the handler body
	#[error("{0}")]
	Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
	/// Wraps any error returned by user code.
	pub fn failed(
		err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		Self::Failed(err.into())
	}
}

impl From<String> for HandlerError {
	fn from(message: String) -> Self {
		Self::failed(message)
	}
}

impl From<&str> for HandlerError {
	fn from(message: &str) -> Self {
		Self::failed(message)
	}
}

impl From<serde_json::Error> for HandlerError {
	fn from(err: serde_json::Error) -> Self {
		Self::failed(err)
	}
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HandlerError {
	fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
		Self::Failed(err)
	}
}

/// One positional handler argument.
#[derive(Debug, Clone)]
pub enum HandlerArg {
	/// Transformed payload
	Payload(PayloadValue),
	/// Incoming topic, verbatim
	Topic(ArcStr),
	/// Raw protocol packet
	Packet(PacketMeta),
	/// Wildcard captures in order
	Params(Vec<String>),
}

impl HandlerArg {
	fn kind_name(&self) -> &'static str {
		match self {
			| HandlerArg::Payload(PayloadValue::Raw(_)) => "raw payload",
			| HandlerArg::Payload(PayloadValue::Text(_)) => "text payload",
			| HandlerArg::Payload(PayloadValue::Json(_)) => "json payload",
			| HandlerArg::Payload(PayloadValue::Custom(_)) => "custom payload",
			| HandlerArg::Topic(_) => "topic",
			| HandlerArg::Packet(_) => "packet",
			| HandlerArg::Params(_) => "params",
		}
	}
}

/// Positional argument list; positions with no declared parameter are `None`.
#[derive(Debug, Clone, Default)]
pub struct HandlerArgs {
	slots: Vec<Option<HandlerArg>>,
}

impl HandlerArgs {
	/// Wraps prepared slots.
	pub fn new(slots: Vec<Option<HandlerArg>>) -> Self {
		Self { slots }
	}

	/// Number of positions (highest declared position + 1).
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Returns true if no argument was declared.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Borrows the slot at `position`.
	pub fn get(&self, position: usize) -> Option<&HandlerArg> {
		self.slots.get(position).and_then(Option::as_ref)
	}

	/// Moves the slot at `position` out, leaving `None` behind.
	pub fn take(&mut self, position: usize) -> Option<HandlerArg> {
		self.slots.get_mut(position).and_then(Option::take)
	}

	/// Moves the slot at `position` out as a typed value.
	pub fn extract<T: FromHandlerArg>(
		&mut self,
		position: usize,
	) -> Result<T, ArgumentError> {
		T::from_handler_arg(position, self.take(position))
	}

	/// Iterates over all slots in position order.
	pub fn iter(&self) -> impl Iterator<Item = Option<&HandlerArg>> {
		self.slots.iter().map(Option::as_ref)
	}

	/// Consumes the list into its slots.
	pub fn into_inner(self) -> Vec<Option<HandlerArg>> {
		self.slots
	}
}

/// Conversion from one positional slot into a handler parameter type.
pub trait FromHandlerArg: Sized {
	/// Converts the slot at `position`.
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError>;
}

fn mismatch(
	position: usize,
	expected: &'static str,
	found: &HandlerArg,
) -> ArgumentError {
	ArgumentError::Mismatch {
		position,
		expected,
		found: found.kind_name(),
	}
}

fn required(
	position: usize,
	arg: Option<HandlerArg>,
) -> Result<HandlerArg, ArgumentError> {
	arg.ok_or(ArgumentError::Missing { position })
}

impl FromHandlerArg for HandlerArg {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		required(position, arg)
	}
}

impl<T: FromHandlerArg> FromHandlerArg for Option<T> {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match arg {
			| None => Ok(None),
			| Some(arg) => T::from_handler_arg(position, Some(arg)).map(Some),
		}
	}
}

impl FromHandlerArg for PayloadValue {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Payload(value) => Ok(value),
			| other => Err(mismatch(position, "payload", &other)),
		}
	}
}

impl FromHandlerArg for Bytes {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Payload(PayloadValue::Raw(bytes)) => Ok(bytes),
			| HandlerArg::Payload(PayloadValue::Text(text)) => {
				Ok(Bytes::from(text))
			}
			| other => Err(mismatch(position, "raw payload", &other)),
		}
	}
}

impl FromHandlerArg for String {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Payload(PayloadValue::Text(text)) => Ok(text),
			| HandlerArg::Topic(topic) => Ok(topic.to_string()),
			| other => Err(mismatch(position, "text payload or topic", &other)),
		}
	}
}

impl FromHandlerArg for ArcStr {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Topic(topic) => Ok(topic),
			| other => Err(mismatch(position, "topic", &other)),
		}
	}
}

impl FromHandlerArg for PacketMeta {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Packet(packet) => Ok(packet),
			| other => Err(mismatch(position, "packet", &other)),
		}
	}
}

impl FromHandlerArg for Vec<String> {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Params(params) => Ok(params),
			| other => Err(mismatch(position, "params", &other)),
		}
	}
}

impl FromHandlerArg for serde_json::Value {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		match required(position, arg)? {
			| HandlerArg::Payload(PayloadValue::Json(value)) => Ok(value),
			| other => Err(mismatch(position, "json payload", &other)),
		}
	}
}

/// Payload deserialized into `T` with serde.
///
/// Accepts a JSON-transformed payload as well as raw bytes or text, which
/// are parsed on the spot.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
	/// Unwraps the inner value.
	pub fn into_inner(self) -> T {
		self.0
	}
}

impl<T> Deref for Json<T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.0
	}
}

impl<T: DeserializeOwned> FromHandlerArg for Json<T> {
	fn from_handler_arg(
		position: usize,
		arg: Option<HandlerArg>,
	) -> Result<Self, ArgumentError> {
		let parsed = match required(position, arg)? {
			| HandlerArg::Payload(PayloadValue::Json(value)) => {
				serde_json::from_value(value)
			}
			| HandlerArg::Payload(PayloadValue::Text(text)) => {
				serde_json::from_str(&text)
			}
			| HandlerArg::Payload(PayloadValue::Raw(bytes)) => {
				serde_json::from_slice(&bytes)
			}
			| other => return Err(mismatch(position, "json payload", &other)),
		};
		parsed
			.map(Json)
			.map_err(|source| ArgumentError::Deserialize { position, source })
	}
}

/// Normalises handler return values.
pub trait IntoHandlerResult {
	/// Converts into the dispatcher's result type.
	fn into_handler_result(self) -> Result<(), HandlerError>;
}

impl IntoHandlerResult for () {
	fn into_handler_result(self) -> Result<(), HandlerError> {
		Ok(())
	}
}

impl<E: Into<HandlerError>> IntoHandlerResult for Result<(), E> {
	fn into_handler_result(self) -> Result<(), HandlerError> {
		self.map_err(Into::into)
	}
}

/// Future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A subscription handler.
///
/// The dispatcher spawns the returned future and does not wait for it
/// before processing the next message.
pub trait MessageHandler: Send + Sync + 'static {
	/// Invokes the handler with positional arguments.
	fn call(&self, args: HandlerArgs) -> HandlerFuture;
}

/// Handler built from a free closure.
pub struct HandlerFn<F>(pub F);

impl<F, Fut, R> MessageHandler for HandlerFn<F>
where
	F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = R> + Send + 'static,
	R: IntoHandlerResult + 'static,
{
	fn call(&self, args: HandlerArgs) -> HandlerFuture {
		(self.0)(args).map(IntoHandlerResult::into_handler_result).boxed()
	}
}

/// Handler bound to an owner, the receiver of every invocation.
pub struct BoundHandler<O, F> {
	owner: Arc<O>,
	method: F,
}

impl<O, F> BoundHandler<O, F> {
	/// Binds `method` to `owner`.
	pub fn new(owner: Arc<O>, method: F) -> Self {
		Self { owner, method }
	}

	/// The owner every call is bound to.
	pub fn owner(&self) -> &Arc<O> {
		&self.owner
	}
}

impl<O, F, Fut, R> MessageHandler for BoundHandler<O, F>
where
	O: Send + Sync + 'static,
	F: Fn(Arc<O>, HandlerArgs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = R> + Send + 'static,
	R: IntoHandlerResult + 'static,
{
	fn call(&self, args: HandlerArgs) -> HandlerFuture {
		(self.method)(Arc::clone(&self.owner), args)
			.map(IntoHandlerResult::into_handler_result)
			.boxed()
	}
}

impl Display for HandlerArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[")?;
		for (i, slot) in self.slots.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			match slot {
				| Some(arg) => write!(f, "{}", arg.kind_name())?,
				| None => write!(f, "null")?,
			}
		}
		write!(f, "]")
	}
}
