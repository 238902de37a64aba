//! Tests for impl block analysis and validation logic

use quote::quote;
use syn::parse_quote;

use super::analysis::*;

/// Test case for impl analysis
struct AnalysisTestCase {
	name: &'static str,
	items: proc_macro2::TokenStream,
	expected_result: AnalysisResult,
}

/// Expected result of analysis
#[derive(Debug)]
enum AnalysisResult {
	Success {
		handler_count: usize,
		/// Argument kinds of the first handler, in position order
		first_kinds: Vec<ArgKind>,
	},
	Error {
		error_contains: &'static str,
	},
}

fn create_test_impl(items: proc_macro2::TokenStream) -> syn::ItemImpl {
	parse_quote! {
		impl Service {
			#items
		}
	}
}

fn run_analysis_test(test_case: AnalysisTestCase) {
	let item_impl = create_test_impl(test_case.items);
	let result = ImplAnalysisContext::analyze(&item_impl);

	match test_case.expected_result {
		| AnalysisResult::Success {
			handler_count,
			first_kinds,
		} => {
			let context = result.unwrap_or_else(|err| {
				panic!("Test '{}' should succeed but failed: {err}", test_case.name)
			});
			assert_eq!(
				context.handlers.len(),
				handler_count,
				"Test '{}': handler count mismatch",
				test_case.name
			);
			let kinds: Vec<ArgKind> =
				context.handlers[0].args.iter().map(|arg| arg.kind).collect();
			assert_eq!(
				kinds, first_kinds,
				"Test '{}': argument kinds mismatch",
				test_case.name
			);
		}
		| AnalysisResult::Error { error_contains } => {
			let error = match result {
				| Ok(_) => panic!(
					"Test '{}' should fail but succeeded",
					test_case.name
				),
				| Err(err) => err,
			};
			let error_msg = error.to_string();
			assert!(
				error_msg.contains(error_contains),
				"Test '{}': error message '{}' should contain '{}'",
				test_case.name,
				error_msg,
				error_contains
			);
		}
	}
}

#[test]
fn test_impl_analysis() {
	let test_cases = vec![
		AnalysisTestCase {
			name: "single handler with every source",
			items: quote! {
				#[subscribe("sensors/+/temperature", transform = "json")]
				async fn on_temp(
					&self,
					#[payload] reading: Json<Reading>,
					#[params] ids: Vec<String>,
					#[topic] topic: ArcStr,
					#[packet] packet: PacketMeta,
				) {}
			},
			expected_result: AnalysisResult::Success {
				handler_count: 1,
				first_kinds: vec![
					ArgKind::Payload,
					ArgKind::Params,
					ArgKind::Topic,
					ArgKind::Packet,
				],
			},
		},
		AnalysisTestCase {
			name: "plain methods are ignored",
			items: quote! {
				fn helper(&self) -> u32 { 1 }
				#[subscribe("a")]
				async fn on_a(&self) {}
				#[subscribe(topics = ["b/+", "c/#"], queue)]
				async fn on_bc(&self, #[params] p: Vec<String>) {}
			},
			expected_result: AnalysisResult::Success {
				handler_count: 2,
				first_kinds: vec![],
			},
		},
		AnalysisTestCase {
			name: "placeholder template",
			items: quote! {
				#[subscribe("{{prefix}}/status/+")]
				async fn on_status(&self, #[params] p: Vec<String>) {}
			},
			expected_result: AnalysisResult::Success {
				handler_count: 1,
				first_kinds: vec![ArgKind::Params],
			},
		},
		AnalysisTestCase {
			name: "no subscribe methods",
			items: quote! {
				fn helper(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "at least one #[subscribe(..)] method",
			},
		},
		AnalysisTestCase {
			name: "missing template",
			items: quote! {
				#[subscribe(queue)]
				async fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "needs a topic template",
			},
		},
		AnalysisTestCase {
			name: "invalid template",
			items: quote! {
				#[subscribe("a/b#/c")]
				async fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "Topic pattern error",
			},
		},
		AnalysisTestCase {
			name: "sync handler",
			items: quote! {
				#[subscribe("a")]
				fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "must be `async fn`",
			},
		},
		AnalysisTestCase {
			name: "mutable receiver",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(&mut self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "must take `&self`",
			},
		},
		AnalysisTestCase {
			name: "associated function",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(#[payload] p: String) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "`&self` as first argument",
			},
		},
		AnalysisTestCase {
			name: "unannotated argument",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(&self, payload: String) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "needs one of #[payload]",
			},
		},
		AnalysisTestCase {
			name: "two source attributes",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(&self, #[payload] #[topic] value: String) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "more than one source attribute",
			},
		},
		AnalysisTestCase {
			name: "borrowed argument",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(&self, #[topic] topic: &str) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "must be owned types",
			},
		},
		AnalysisTestCase {
			name: "qos out of range",
			items: quote! {
				#[subscribe("a", qos = 3)]
				async fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "qos must be 0, 1 or 2",
			},
		},
		AnalysisTestCase {
			name: "unknown option",
			items: quote! {
				#[subscribe("a", retain)]
				async fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "unknown #[subscribe] option `retain`",
			},
		},
		AnalysisTestCase {
			name: "empty share group",
			items: quote! {
				#[subscribe("a", share = "")]
				async fn on_a(&self) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "share group must not be empty",
			},
		},
		AnalysisTestCase {
			name: "transform on topic argument",
			items: quote! {
				#[subscribe("a")]
				async fn on_a(&self, #[topic(transform = "json")] t: String) {}
			},
			expected_result: AnalysisResult::Error {
				error_contains: "#[topic] takes no arguments",
			},
		},
	];

	for test_case in test_cases {
		run_analysis_test(test_case);
	}
}

#[test]
fn test_trait_impl_rejected() {
	let item_impl: syn::ItemImpl = parse_quote! {
		impl Handler for Service {
			#[subscribe("a")]
			async fn on_a(&self) {}
		}
	};
	let err = ImplAnalysisContext::analyze(&item_impl).unwrap_err();
	assert!(err.to_string().contains("inherent impl blocks"));
}

#[test]
fn test_subscribe_args_parsing() {
	let args: SubscribeArgs = syn::parse_quote! {
		"a/+", topics = ["b", "c/#"], queue = false, no_share,
		transform = "text", qos = 2
	};
	let topics: Vec<String> = args.topics.iter().map(|t| t.value()).collect();
	assert_eq!(topics, vec!["a/+", "b", "c/#"]);
	assert_eq!(args.queue, Some(false));
	assert!(matches!(args.share, Some(ShareOption::Disabled)));
	assert_eq!(args.transform.map(|t| t.value()).as_deref(), Some("text"));
	assert_eq!(args.qos, Some(2));
}

#[test]
fn test_payload_transform_argument() {
	let item_impl = create_test_impl(quote! {
		#[subscribe("a/+")]
		async fn on_a(
			&self,
			#[params] ids: Vec<String>,
			#[payload(transform = "upper")] text: String,
		) {}
	});
	let context = ImplAnalysisContext::analyze(&item_impl).unwrap();
	let payload = &context.handlers[0].args[1];
	assert_eq!(payload.position, 1);
	assert_eq!(payload.kind, ArgKind::Payload);
	assert_eq!(
		payload.transform.as_ref().map(|t| t.value()).as_deref(),
		Some("upper")
	);
}

#[test]
fn test_validate_template() {
	let ok: syn::LitStr = parse_quote!("$share/g/{{site}}/logs/#");
	assert!(validate_template(&ok).is_ok());
	let bad: syn::LitStr = parse_quote!("a/+x");
	assert!(validate_template(&bad).is_err());
}
