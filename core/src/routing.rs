//! Message routing module
//!
//! Declarations, the subscription registry, handler invocation and the
//! dispatcher state machine that ties them to transport events.

pub mod declaration;
pub mod dispatcher;
mod dispatcher_actor;
/// Routing error types
pub mod error;
pub mod handler;
pub mod settings;
/// Runtime registration of one compiled template
pub mod subscriber;
pub mod subscription_registry;

#[cfg(test)]
mod subscription_registry_tests;

// Re-export commonly used types for convenience
pub use declaration::{
	DeclarationBuilder, MAX_ARGUMENT_POSITION, ParameterKind, ParameterSpec,
	SubscriptionDeclaration,
};
pub use dispatcher::{Dispatcher, DispatcherState, ExploreReport, PreparedCall};
pub use error::{DeclarationError, DispatchError, SendError, TransportError};
pub use handler::{
	ArgumentError, BoundHandler, FromHandlerArg, HandlerArg, HandlerArgs,
	HandlerError, HandlerFn, HandlerFuture, IntoHandlerResult, Json,
	MessageHandler,
};
pub use settings::{BeforeHandle, RoutingSettings, qos_from_level};
pub use subscriber::Subscriber;
pub use subscription_registry::SubscriptionRegistry;

// Re-export for internal crate usage only
pub(crate) use dispatcher_actor::{
	DispatcherActor, DispatcherController, DispatcherHandle,
};
