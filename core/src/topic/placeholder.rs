//! `{{name}}` placeholder substitution for topic templates.
//!
//! Substitution runs once per template, before compilation. Unknown keys are
//! left in place untouched and values are never scanned for placeholders.

use std::borrow::Cow;
use std::collections::HashMap;

/// Variable mapping used to resolve `{{name}}` placeholders.
pub type TopicVariables = HashMap<String, String>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replaces every `{{key}}` whose key is present in `variables`.
///
/// Returns the template unchanged (borrowed) when nothing can be replaced.
///
/// ```
/// use mqtt_topic_dispatch_core::topic::placeholder::{substitute, TopicVariables};
///
/// let vars = TopicVariables::from([("id".to_string(), "5".to_string())]);
/// assert_eq!(substitute("room/{{id}}/status", &vars), "room/5/status");
/// ```
pub fn substitute<'a>(
	template: &'a str,
	variables: &TopicVariables,
) -> Cow<'a, str> {
	if variables.is_empty() || !template.contains(OPEN) {
		return Cow::Borrowed(template);
	}

	let mut resolved = String::with_capacity(template.len());
	let mut rest = template;
	while let Some(open) = rest.find(OPEN) {
		resolved.push_str(&rest[.. open]);
		let after_open = &rest[open + OPEN.len() ..];
		let Some(close) = after_open.find(CLOSE) else {
			// Unterminated placeholder, keep the tail verbatim
			resolved.push_str(&rest[open ..]);
			return Cow::Owned(resolved);
		};
		let key = &after_open[.. close];
		match variables.get(key) {
			| Some(value) => resolved.push_str(value),
			| None => {
				resolved.push_str(OPEN);
				resolved.push_str(key);
				resolved.push_str(CLOSE);
			}
		}
		rest = &after_open[close + CLOSE.len() ..];
	}
	resolved.push_str(rest);
	Cow::Owned(resolved)
}

/// Applies [`substitute`] to each template of a declaration.
pub fn substitute_all<'a, I>(templates: I, variables: &TopicVariables) -> Vec<String>
where I: IntoIterator<Item = &'a str> {
	templates
		.into_iter()
		.map(|template| substitute(template, variables).into_owned())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vars(pairs: &[(&str, &str)]) -> TopicVariables {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn test_single_placeholder() {
		let resolved = substitute("room/{{id}}/status", &vars(&[("id", "5")]));
		assert_eq!(resolved, "room/5/status");
	}

	#[test]
	fn test_every_occurrence_is_replaced() {
		let resolved =
			substitute("{{site}}/a/{{site}}/b", &vars(&[("site", "hq")]));
		assert_eq!(resolved, "hq/a/hq/b");
	}

	#[test]
	fn test_unknown_keys_untouched() {
		let resolved = substitute(
			"{{tenant}}/devices/{{id}}",
			&vars(&[("tenant", "acme")]),
		);
		assert_eq!(resolved, "acme/devices/{{id}}");
	}

	#[test]
	fn test_empty_variables_is_identity() {
		let template = "room/{{id}}/status";
		let resolved = substitute(template, &TopicVariables::new());
		assert!(matches!(resolved, Cow::Borrowed(_)));
		assert_eq!(resolved, template);
	}

	#[test]
	fn test_values_are_not_rescanned() {
		let resolved = substitute(
			"{{a}}/{{b}}",
			&vars(&[("a", "{{b}}"), ("b", "x")]),
		);
		assert_eq!(resolved, "{{b}}/x");
	}

	#[test]
	fn test_unterminated_placeholder_kept() {
		let resolved = substitute("room/{{id", &vars(&[("id", "5")]));
		assert_eq!(resolved, "room/{{id");
	}

	#[test]
	fn test_substitute_all_topics() {
		let resolved = substitute_all(
			["a/{{x}}", "b/{{x}}/+"],
			&vars(&[("x", "1")]),
		);
		assert_eq!(resolved, vec!["a/1".to_string(), "b/1/+".to_string()]);
	}
}
