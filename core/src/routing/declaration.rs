//! Static subscription declarations and their builder.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arcstr::ArcStr;
use rumqttc::QoS;
use smallvec::SmallVec;

use super::error::DeclarationError;
use super::handler::{
	BoundHandler, HandlerArgs, HandlerFn, IntoHandlerResult, MessageHandler,
};
use crate::payload_transform::TransformSpec;
use crate::topic::SubscriptionPolicy;

/// Highest argument position a declaration may use.
pub const MAX_ARGUMENT_POSITION: usize = 63;

/// What a positional handler argument is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
	/// Transformed payload
	Payload,
	/// Incoming topic, verbatim
	Topic,
	/// Raw protocol packet
	Packet,
	/// Wildcard captures
	Params,
}

/// One positional handler argument.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
	/// Argument position, unique per declaration
	pub position: usize,
	/// Source of the argument
	pub kind: ParameterKind,
	/// Payload transform overriding the declaration's own
	pub transform: Option<TransformSpec>,
}

impl ParameterSpec {
	/// Parameter without its own transform.
	pub fn new(position: usize, kind: ParameterKind) -> Self {
		Self {
			position,
			kind,
			transform: None,
		}
	}
}

/// Static description of one handler's subscription intent.
///
/// Immutable once built. A declaration with several templates produces one
/// subscriber per template, all sharing this declaration.
#[derive(Clone)]
pub struct SubscriptionDeclaration {
	topics: SmallVec<[ArcStr; 2]>,
	queue: Option<bool>,
	share: Option<ArcStr>,
	transform: Option<TransformSpec>,
	qos: Option<QoS>,
	parameters: Vec<ParameterSpec>,
	handler: Arc<dyn MessageHandler>,
	owner: &'static str,
}

impl SubscriptionDeclaration {
	/// Starts a declaration for one template.
	pub fn builder(topic: impl Into<ArcStr>) -> DeclarationBuilder {
		DeclarationBuilder::new().also_topic(topic)
	}

	/// Starts a declaration for several templates.
	pub fn builder_for_topics<I, S>(topics: I) -> DeclarationBuilder
	where
		I: IntoIterator<Item = S>,
		S: Into<ArcStr>,
	{
		topics
			.into_iter()
			.fold(DeclarationBuilder::new(), DeclarationBuilder::also_topic)
	}

	/// Topic templates, placeholders not yet substituted.
	pub fn topics(&self) -> &[ArcStr] {
		&self.topics
	}

	/// Declared parameters, in declaration order.
	pub fn parameters(&self) -> &[ParameterSpec] {
		&self.parameters
	}

	/// Number of positional arguments the handler receives.
	pub fn arity(&self) -> usize {
		self.parameters
			.iter()
			.map(|p| p.position.saturating_add(1))
			.max()
			.unwrap_or(0)
	}

	/// Declaration-level payload transform.
	pub fn transform(&self) -> Option<&TransformSpec> {
		self.transform.as_ref()
	}

	/// Transform for a payload parameter; its own transform wins.
	pub fn payload_transform<'a>(
		&'a self,
		parameter: &'a ParameterSpec,
	) -> Option<&'a TransformSpec> {
		parameter.transform.as_ref().or(self.transform.as_ref())
	}

	/// Explicit QoS, if any.
	pub fn qos(&self) -> Option<QoS> {
		self.qos
	}

	/// Handler invoked for matching messages.
	pub fn handler(&self) -> &Arc<dyn MessageHandler> {
		&self.handler
	}

	/// Name of the type owning the handler.
	pub fn owner(&self) -> &'static str {
		self.owner
	}

	/// Resolves queue/share against the global policy.
	///
	/// Unset values inherit; an explicit empty share disables sharing.
	pub fn policy(&self, global: &SubscriptionPolicy) -> SubscriptionPolicy {
		SubscriptionPolicy {
			queue: self.queue.unwrap_or(global.queue),
			share: match &self.share {
				| Some(group) => Some(group.clone()),
				| None => global.share.clone(),
			},
		}
	}
}

impl fmt::Debug for SubscriptionDeclaration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubscriptionDeclaration")
			.field("topics", &self.topics)
			.field("queue", &self.queue)
			.field("share", &self.share)
			.field("transform", &self.transform)
			.field("qos", &self.qos)
			.field("parameters", &self.parameters)
			.field("owner", &self.owner)
			.finish_non_exhaustive()
	}
}

/// Builder for [`SubscriptionDeclaration`].
#[must_use]
pub struct DeclarationBuilder {
	topics: SmallVec<[ArcStr; 2]>,
	queue: Option<bool>,
	share: Option<ArcStr>,
	transform: Option<TransformSpec>,
	qos: Option<QoS>,
	parameters: Vec<ParameterSpec>,
	handler: Option<Arc<dyn MessageHandler>>,
	owner: &'static str,
}

impl DeclarationBuilder {
	fn new() -> Self {
		Self {
			topics: SmallVec::new(),
			queue: None,
			share: None,
			transform: None,
			qos: None,
			parameters: Vec::new(),
			handler: None,
			owner: "<anonymous>",
		}
	}

	/// Adds another template.
	pub fn also_topic(mut self, topic: impl Into<ArcStr>) -> Self {
		self.topics.push(topic.into());
		self
	}

	/// Overrides the global queue flag.
	pub fn queue(mut self, queue: bool) -> Self {
		self.queue = Some(queue);
		self
	}

	/// Overrides the global share group.
	pub fn share(mut self, group: impl Into<ArcStr>) -> Self {
		self.share = Some(group.into());
		self
	}

	/// Disables sharing even if a global group is configured.
	pub fn no_share(self) -> Self {
		self.share("")
	}

	/// Declaration-level payload transform.
	pub fn transform(mut self, spec: TransformSpec) -> Self {
		self.transform = Some(spec);
		self
	}

	/// Subscribe QoS for this declaration.
	pub fn qos(mut self, qos: QoS) -> Self {
		self.qos = Some(qos);
		self
	}

	/// Names the owner in logs and errors.
	pub fn owner(mut self, owner: &'static str) -> Self {
		self.owner = owner;
		self
	}

	/// Adds a parameter.
	pub fn param(mut self, parameter: ParameterSpec) -> Self {
		self.parameters.push(parameter);
		self
	}

	/// Payload at `position`, using the declaration transform.
	pub fn payload_at(self, position: usize) -> Self {
		self.param(ParameterSpec::new(position, ParameterKind::Payload))
	}

	/// Payload at `position` with its own transform.
	pub fn payload_with(self, position: usize, spec: TransformSpec) -> Self {
		self.param(ParameterSpec {
			position,
			kind: ParameterKind::Payload,
			transform: Some(spec),
		})
	}

	/// Incoming topic at `position`.
	pub fn topic_at(self, position: usize) -> Self {
		self.param(ParameterSpec::new(position, ParameterKind::Topic))
	}

	/// Raw packet at `position`.
	pub fn packet_at(self, position: usize) -> Self {
		self.param(ParameterSpec::new(position, ParameterKind::Packet))
	}

	/// Wildcard captures at `position`.
	pub fn params_at(self, position: usize) -> Self {
		self.param(ParameterSpec::new(position, ParameterKind::Params))
	}

	/// Uses a free closure as handler.
	pub fn handler<F, Fut, R>(mut self, handler: F) -> Self
	where
		F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = R> + Send + 'static,
		R: IntoHandlerResult + 'static,
	{
		self.handler = Some(Arc::new(HandlerFn(handler)));
		self
	}

	/// Binds `method` to `owner`; the owner's type names the declaration.
	pub fn bound_handler<O, F, Fut, R>(mut self, owner: Arc<O>, method: F) -> Self
	where
		O: Send + Sync + 'static,
		F: Fn(Arc<O>, HandlerArgs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = R> + Send + 'static,
		R: IntoHandlerResult + 'static,
	{
		self.owner = std::any::type_name::<O>();
		self.handler = Some(Arc::new(BoundHandler::new(owner, method)));
		self
	}

	/// Uses an existing handler object.
	pub fn handler_object(mut self, handler: Arc<dyn MessageHandler>) -> Self {
		self.handler = Some(handler);
		self
	}

	/// Validates and finishes the declaration.
	pub fn build(self) -> Result<SubscriptionDeclaration, DeclarationError> {
		let owner = self.owner;
		if self.topics.is_empty() {
			return Err(DeclarationError::NoTopics { owner });
		}
		if let Some(parameter) = self
			.parameters
			.iter()
			.find(|p| p.position > MAX_ARGUMENT_POSITION)
		{
			return Err(DeclarationError::PositionOutOfRange {
				owner,
				position: parameter.position,
				max: MAX_ARGUMENT_POSITION,
			});
		}
		let mut seen = HashSet::with_capacity(self.parameters.len());
		if let Some(duplicate) =
			self.parameters.iter().find(|p| !seen.insert(p.position))
		{
			return Err(DeclarationError::DuplicatePosition {
				owner,
				position: duplicate.position,
			});
		}
		let handler = self
			.handler
			.ok_or(DeclarationError::MissingHandler { owner })?;
		Ok(SubscriptionDeclaration {
			topics: self.topics,
			queue: self.queue,
			share: self.share,
			transform: self.transform,
			qos: self.qos,
			parameters: self.parameters,
			handler,
			owner,
		})
	}
}
