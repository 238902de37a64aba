//! Impl block analysis and validation logic
//!
//! Walks an `impl` block, collects every method carrying `#[subscribe(..)]`,
//! and validates its templates, options and handler arguments before any
//! code is generated.

use mqtt_topic_dispatch_core::topic::{CompiledTopic, SubscriptionPolicy};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{FnArg, ImplItem, ImplItemFn, LitBool, LitInt, LitStr, Token};

pub const SUBSCRIBE_ATTR: &str = "subscribe";
pub const PARAM_ATTRS: [&str; 4] = ["payload", "topic", "packet", "params"];

/// Which part of the message a handler argument receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
	Payload,
	Topic,
	Packet,
	Params,
}

impl ArgKind {
	fn from_attr_name(name: &str) -> Option<Self> {
		match name {
			| "payload" => Some(Self::Payload),
			| "topic" => Some(Self::Topic),
			| "packet" => Some(Self::Packet),
			| "params" => Some(Self::Params),
			| _ => None,
		}
	}
}

/// One annotated handler argument
#[derive(Debug, Clone)]
pub struct HandlerArg {
	/// Position among the method's non-receiver arguments
	pub position: usize,
	pub kind: ArgKind,
	pub ty: syn::Type,
	/// `#[payload(transform = "...")]`
	pub transform: Option<LitStr>,
}

/// Sharing option of a `#[subscribe]` attribute
#[derive(Debug, Clone)]
pub enum ShareOption {
	Group(LitStr),
	Disabled,
}

/// Parsed `#[subscribe(..)]` attribute arguments
#[derive(Debug, Clone, Default)]
pub struct SubscribeArgs {
	pub topics: Vec<LitStr>,
	pub queue: Option<bool>,
	pub share: Option<ShareOption>,
	pub transform: Option<LitStr>,
	pub qos: Option<u8>,
}

/// Everything the code generator needs for one handler method
#[derive(Debug, Clone)]
pub struct HandlerMethod {
	pub ident: syn::Ident,
	pub subscribe: SubscribeArgs,
	pub args: Vec<HandlerArg>,
}

/// Validated handlers of one impl block
#[derive(Debug)]
pub struct ImplAnalysisContext {
	pub handlers: Vec<HandlerMethod>,
}

impl ImplAnalysisContext {
	/// Analyze the impl block, returning a context for code generation
	/// # Validation Rules
	/// 1. Must be an inherent impl (no trait)
	/// 2. At least one method carries `#[subscribe(..)]`
	/// 3. Handlers are `async fn` taking `&self`
	/// 4. Every other argument has exactly one of `#[payload]`, `#[topic]`,
	///    `#[packet]`, `#[params]` and an owned type
	/// 5. Every topic template compiles
	pub fn analyze(item_impl: &syn::ItemImpl) -> Result<Self, syn::Error> {
		if let Some((_, trait_path, _)) = &item_impl.trait_ {
			return Err(syn::Error::new_spanned(
				trait_path,
				"mqtt_subscriptions can only be applied to inherent impl blocks",
			));
		}

		let mut handlers = Vec::new();
		for item in &item_impl.items {
			let ImplItem::Fn(method) = item else {
				continue;
			};
			let Some(attr) = find_subscribe_attr(method) else {
				continue;
			};
			let subscribe = attr.parse_args::<SubscribeArgs>()?;
			validate_subscribe(attr, &subscribe)?;
			validate_signature(method)?;
			let args = analyze_arguments(method)?;
			handlers.push(HandlerMethod {
				ident: method.sig.ident.clone(),
				subscribe,
				args,
			});
		}

		if handlers.is_empty() {
			return Err(syn::Error::new_spanned(
				&item_impl.self_ty,
				"mqtt_subscriptions requires at least one #[subscribe(..)] method",
			));
		}
		Ok(Self { handlers })
	}
}

pub fn find_subscribe_attr(method: &ImplItemFn) -> Option<&syn::Attribute> {
	method
		.attrs
		.iter()
		.find(|attr| attr.path().is_ident(SUBSCRIBE_ATTR))
}

pub fn is_param_attr(attr: &syn::Attribute) -> bool {
	PARAM_ATTRS.iter().any(|name| attr.path().is_ident(name))
}

fn validate_subscribe(
	attr: &syn::Attribute,
	args: &SubscribeArgs,
) -> Result<(), syn::Error> {
	if args.topics.is_empty() {
		return Err(syn::Error::new_spanned(
			attr,
			"#[subscribe] needs a topic template, e.g. #[subscribe(\"a/+\")]",
		));
	}
	for topic in &args.topics {
		validate_template(topic)?;
	}
	if let Some(ShareOption::Group(group)) = &args.share {
		if group.value().is_empty() {
			return Err(syn::Error::new_spanned(
				group,
				"share group must not be empty, use `no_share` to disable \
				 sharing",
			));
		}
	}
	Ok(())
}

/// Compiles the template with every placeholder replaced by a dummy level,
/// so syntax errors surface at compile time.
pub fn validate_template(topic: &LitStr) -> Result<(), syn::Error> {
	let template = fill_placeholders(&topic.value());
	CompiledTopic::compile(&template, &SubscriptionPolicy::plain())
		.map(|_| ())
		.map_err(|err| {
			syn::Error::new_spanned(
				topic,
				format!("Topic pattern error: {err}"),
			)
		})
}

fn fill_placeholders(template: &str) -> String {
	let mut filled = String::with_capacity(template.len());
	let mut rest = template;
	while let Some(open) = rest.find("{{") {
		let Some(close) = rest[open ..].find("}}") else {
			break;
		};
		filled.push_str(&rest[.. open]);
		filled.push_str("placeholder");
		rest = &rest[open + close + 2 ..];
	}
	filled.push_str(rest);
	filled
}

fn validate_signature(method: &ImplItemFn) -> Result<(), syn::Error> {
	let sig = &method.sig;
	if sig.asyncness.is_none() {
		return Err(syn::Error::new_spanned(
			sig.fn_token,
			"subscription handlers must be `async fn`",
		));
	}
	if !sig.generics.params.is_empty() {
		return Err(syn::Error::new_spanned(
			&sig.generics,
			"subscription handlers cannot be generic",
		));
	}
	match sig.inputs.first() {
		| Some(FnArg::Receiver(receiver))
			if receiver.reference.is_some() && receiver.mutability.is_none() =>
		{
			Ok(())
		}
		| Some(FnArg::Receiver(receiver)) => Err(syn::Error::new_spanned(
			receiver,
			"subscription handlers must take `&self`",
		)),
		| _ => Err(syn::Error::new_spanned(
			&sig.ident,
			"subscription handlers must take `&self` as first argument",
		)),
	}
}

fn analyze_arguments(method: &ImplItemFn) -> Result<Vec<HandlerArg>, syn::Error> {
	let mut args = Vec::new();
	for (position, input) in method.sig.inputs.iter().skip(1).enumerate() {
		let FnArg::Typed(pat_type) = input else {
			continue;
		};
		let mut found = None;
		for attr in pat_type.attrs.iter().filter(|a| is_param_attr(a)) {
			if found.is_some() {
				return Err(syn::Error::new_spanned(
					attr,
					"handler argument has more than one source attribute",
				));
			}
			found = Some(parse_param_attr(attr)?);
		}
		let Some((kind, transform)) = found else {
			return Err(syn::Error::new_spanned(
				pat_type,
				"handler argument needs one of #[payload], #[topic], \
				 #[packet] or #[params]",
			));
		};
		validate_arg_type(&pat_type.ty)?;
		args.push(HandlerArg {
			position,
			kind,
			ty: (*pat_type.ty).clone(),
			transform,
		});
	}
	Ok(args)
}

fn parse_param_attr(
	attr: &syn::Attribute,
) -> Result<(ArgKind, Option<LitStr>), syn::Error> {
	let name = attr
		.path()
		.get_ident()
		.map(ToString::to_string)
		.unwrap_or_default();
	let kind = ArgKind::from_attr_name(&name)
		.ok_or_else(|| syn::Error::new_spanned(attr, "unknown attribute"))?;
	match &attr.meta {
		| syn::Meta::Path(_) => Ok((kind, None)),
		| syn::Meta::List(_) if kind == ArgKind::Payload => {
			let mut transform = None;
			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("transform") {
					transform = Some(meta.value()?.parse::<LitStr>()?);
					Ok(())
				} else {
					Err(meta.error("expected `transform = \"...\"`"))
				}
			})?;
			Ok((kind, transform))
		}
		| _ => Err(syn::Error::new_spanned(
			attr,
			format!("#[{name}] takes no arguments"),
		)),
	}
}

fn validate_arg_type(ty: &syn::Type) -> Result<(), syn::Error> {
	match ty {
		| syn::Type::Reference(_) => Err(syn::Error::new_spanned(
			ty,
			"handler arguments must be owned types",
		)),
		| syn::Type::ImplTrait(_) => Err(syn::Error::new_spanned(
			ty,
			"handler arguments cannot be `impl Trait`",
		)),
		| _ => Ok(()),
	}
}

impl Parse for SubscribeArgs {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let mut args = SubscribeArgs::default();
		if input.peek(LitStr) {
			args.topics.push(input.parse()?);
			if !input.is_empty() {
				input.parse::<Token![,]>()?;
			}
		}

		while !input.is_empty() {
			let key: syn::Ident = input.parse()?;
			match key.to_string().as_str() {
				| "queue" => {
					args.queue = Some(parse_optional_bool(input)?);
				}
				| "no_share" => {
					args.share = Some(ShareOption::Disabled);
				}
				| "share" => {
					input.parse::<Token![=]>()?;
					args.share = Some(ShareOption::Group(input.parse()?));
				}
				| "transform" => {
					input.parse::<Token![=]>()?;
					args.transform = Some(input.parse()?);
				}
				| "qos" => {
					input.parse::<Token![=]>()?;
					let level: LitInt = input.parse()?;
					let value = level.base10_parse::<u8>()?;
					if value > 2 {
						return Err(syn::Error::new(
							level.span(),
							"qos must be 0, 1 or 2",
						));
					}
					args.qos = Some(value);
				}
				| "topics" => {
					input.parse::<Token![=]>()?;
					let content;
					syn::bracketed!(content in input);
					let topics =
						Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
					args.topics.extend(topics);
				}
				| other => {
					return Err(syn::Error::new(
						key.span(),
						format!("unknown #[subscribe] option `{other}`"),
					));
				}
			}
			if !input.is_empty() {
				input.parse::<Token![,]>()?;
			}
		}
		Ok(args)
	}
}

fn parse_optional_bool(input: ParseStream) -> syn::Result<bool> {
	if input.peek(Token![=]) {
		input.parse::<Token![=]>()?;
		let value: LitBool = input.parse()?;
		Ok(value.value)
	} else {
		Ok(true)
	}
}
