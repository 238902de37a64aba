//! Code generation logic
//!
//! Turns the analyzed handlers into a `subscription_declarations` constructor
//! and re-emits the impl block with the marker attributes removed.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ImplItem};

use crate::analysis::{
	ArgKind, HandlerArg, HandlerMethod, ImplAnalysisContext, ShareOption,
	find_subscribe_attr, is_param_attr,
};

/// Handles all code generation for an annotated impl block
pub struct CodeGenerator {
	context: ImplAnalysisContext,
}

impl CodeGenerator {
	pub fn new(context: ImplAnalysisContext) -> Self {
		Self { context }
	}

	/// Generate the cleaned impl block plus the declaration constructor
	pub fn generate_complete_implementation(
		&self,
		item_impl: &syn::ItemImpl,
	) -> TokenStream {
		let cleaned = strip_marker_attributes(item_impl.clone());
		let constructor = self.generate_declarations_fn();
		let (impl_generics, _, where_clause) = item_impl.generics.split_for_impl();
		let self_ty = &item_impl.self_ty;

		quote! {
			#cleaned

			impl #impl_generics #self_ty #where_clause {
				#constructor
			}
		}
	}

	/// Generate `subscription_declarations(self: &Arc<Self>)`
	pub fn generate_declarations_fn(&self) -> TokenStream {
		let count = self.context.handlers.len();
		let declarations = self
			.context
			.handlers
			.iter()
			.map(generate_declaration);

		quote! {
			/// Subscription declarations for every `#[subscribe]` method,
			/// each bound to this instance.
			pub fn subscription_declarations(self: &::std::sync::Arc<Self>) -> ::std::result::Result<
				::std::vec::Vec<::mqtt_topic_dispatch::SubscriptionDeclaration>,
				::mqtt_topic_dispatch::errors::DeclarationError,
			> {
				let mut declarations = ::std::vec::Vec::with_capacity(#count);
				#(declarations.push(#declarations);)*
				::std::result::Result::Ok(declarations)
			}
		}
	}
}

fn generate_declaration(handler: &HandlerMethod) -> TokenStream {
	let topics = &handler.subscribe.topics;
	let options = generate_options(handler);
	let parameters = handler.args.iter().map(generate_parameter);
	let invoke = generate_handler_closure(handler);

	quote! {
		::mqtt_topic_dispatch::SubscriptionDeclaration::builder_for_topics([#(#topics),*])
			#options
			#(#parameters)*
			.bound_handler(::std::sync::Arc::clone(self), #invoke)
			.build()?
	}
}

fn generate_options(handler: &HandlerMethod) -> TokenStream {
	let subscribe = &handler.subscribe;
	let queue = subscribe.queue.map(|queue| quote! { .queue(#queue) });
	let share = subscribe.share.as_ref().map(|share| match share {
		| ShareOption::Group(group) => quote! { .share(#group) },
		| ShareOption::Disabled => quote! { .no_share() },
	});
	let transform = subscribe.transform.as_ref().map(|name| {
		quote! { .transform(::mqtt_topic_dispatch::TransformSpec::from_name(#name)) }
	});
	let qos = subscribe.qos.map(|level| {
		let qos = qos_tokens(level);
		quote! { .qos(#qos) }
	});
	quote! { #queue #share #transform #qos }
}

fn qos_tokens(level: u8) -> TokenStream {
	match level {
		| 0 => quote! { ::mqtt_topic_dispatch::QoS::AtMostOnce },
		| 1 => quote! { ::mqtt_topic_dispatch::QoS::AtLeastOnce },
		| _ => quote! { ::mqtt_topic_dispatch::QoS::ExactlyOnce },
	}
}

fn generate_parameter(arg: &HandlerArg) -> TokenStream {
	let position = arg.position;
	match (arg.kind, &arg.transform) {
		| (ArgKind::Payload, Some(name)) => quote! {
			.payload_with(
				#position,
				::mqtt_topic_dispatch::TransformSpec::from_name(#name),
			)
		},
		| (ArgKind::Payload, None) => quote! { .payload_at(#position) },
		| (ArgKind::Topic, _) => quote! { .topic_at(#position) },
		| (ArgKind::Packet, _) => quote! { .packet_at(#position) },
		| (ArgKind::Params, _) => quote! { .params_at(#position) },
	}
}

/// `move |this, args| async move { this.method(args.extract(0)?, ..).await }`
fn generate_handler_closure(handler: &HandlerMethod) -> TokenStream {
	let method = &handler.ident;
	let bindings: Vec<_> = handler
		.args
		.iter()
		.map(|arg| format_ident!("__arg{}", arg.position))
		.collect();
	let extractions = handler.args.iter().zip(&bindings).map(|(arg, binding)| {
		let ty = &arg.ty;
		let position = arg.position;
		quote! { let #binding: #ty = args.extract(#position)?; }
	});
	let args_pat = if handler.args.is_empty() {
		quote! { _args }
	} else {
		quote! { mut args }
	};

	quote! {
		|this: ::std::sync::Arc<Self>, #args_pat: ::mqtt_topic_dispatch::HandlerArgs| async move {
			#(#extractions)*
			::mqtt_topic_dispatch::IntoHandlerResult::into_handler_result(
				this.#method(#(#bindings),*).await,
			)
		}
	}
}

/// Removes `#[subscribe]` and argument source attributes, which are not
/// real attributes outside this macro.
pub fn strip_marker_attributes(mut item_impl: syn::ItemImpl) -> syn::ItemImpl {
	for item in &mut item_impl.items {
		let ImplItem::Fn(method) = item else {
			continue;
		};
		if find_subscribe_attr(method).is_none() {
			continue;
		}
		method
			.attrs
			.retain(|attr| !attr.path().is_ident(crate::analysis::SUBSCRIBE_ATTR));
		for input in &mut method.sig.inputs {
			if let FnArg::Typed(pat_type) = input {
				pat_type.attrs.retain(|attr| !is_param_attr(attr));
			}
		}
	}
	item_impl
}
