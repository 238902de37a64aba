//! Attribute macro generating subscription declarations from an impl block.
//!
//! ```ignore
//! #[mqtt_subscriptions]
//! impl Service {
//!     #[subscribe("sensors/+/temperature", transform = "json", qos = 1)]
//!     async fn on_temperature(
//!         &self,
//!         #[payload] reading: Json<Reading>,
//!         #[params] ids: Vec<String>,
//!     ) -> Result<(), HandlerError> {
//!         Ok(())
//!     }
//! }
//!
//! let declarations = Arc::new(service).subscription_declarations()?;
//! ```

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod analysis;
mod codegen;

#[cfg(test)]
mod analysis_test;

use analysis::ImplAnalysisContext;
use codegen::CodeGenerator;

/// Collects every `#[subscribe(..)]` method of an inherent impl block.
///
/// `#[subscribe]` options:
/// - a leading template string and/or `topics = ["a/+", "b/#"]`
/// - `queue` / `queue = false`
/// - `share = "group"` / `no_share`
/// - `transform = "json" | "text" | "raw" | "<registered name>"`
/// - `qos = 0 | 1 | 2`
///
/// Each handler argument after `&self` takes its value from exactly one of
/// `#[payload]`, `#[payload(transform = "..")]`, `#[topic]`, `#[packet]` or
/// `#[params]`, by position.
///
/// Templates are validated while compiling; `{{name}}` placeholders are
/// checked as a single plain level.
#[proc_macro_attribute]
pub fn mqtt_subscriptions(args: TokenStream, input: TokenStream) -> TokenStream {
	let args = proc_macro2::TokenStream::from(args);
	let item_impl = parse_macro_input!(input as syn::ItemImpl);

	let result = (|| -> Result<proc_macro2::TokenStream, syn::Error> {
		if !args.is_empty() {
			return Err(syn::Error::new_spanned(
				args,
				"mqtt_subscriptions takes no arguments",
			));
		}
		let context = ImplAnalysisContext::analyze(&item_impl)?;
		let generator = CodeGenerator::new(context);
		Ok(generator.generate_complete_implementation(&item_impl))
	})();
	match result {
		| Ok(tokens) => tokens.into(),
		| Err(err) => err.to_compile_error().into(),
	}
}
