//! Tests for TopicPatternItem functionality

use arcstr::{ArcStr, Substr};

use super::{TopicPatternError, TopicPatternItem};

#[test]
fn test_literal_string_item() {
	let item = TopicPatternItem::try_from(Substr::from("sensors")).unwrap();

	assert_eq!(item, TopicPatternItem::Str(Substr::from("sensors")));
	assert_eq!(item.as_str(), "sensors");
	assert!(!item.is_wildcard());
}

#[test]
fn test_plus_and_hash_wildcards() {
	let plus = TopicPatternItem::try_from(Substr::from("+")).unwrap();
	let hash = TopicPatternItem::try_from(Substr::from("#")).unwrap();

	assert_eq!(plus, TopicPatternItem::Plus);
	assert_eq!(hash, TopicPatternItem::Hash);
	assert!(plus.is_wildcard());
	assert!(hash.is_wildcard());
}

#[test]
fn test_invalid_wildcard_with_text() {
	for segment in ["text+more", "text#more", "++", "##", "+#"] {
		let result = TopicPatternItem::try_from(Substr::from(segment));
		assert!(
			matches!(result, Err(TopicPatternError::WildcardUsage { .. })),
			"segment '{segment}' should be rejected"
		);
	}
}

#[test]
fn test_placeholder_braces_are_literal() {
	let item = TopicPatternItem::try_from(Substr::from("{{id}}")).unwrap();
	assert_eq!(item.as_str(), "{{id}}");
	assert!(!item.is_wildcard());
}

#[test]
fn test_unicode_support() {
	let item = TopicPatternItem::try_from(Substr::from("сенсори")).unwrap();
	assert_eq!(item.as_str(), "сенсори");
	assert!(!item.is_wildcard());
}

#[test]
fn test_display_implementation() {
	assert_eq!(TopicPatternItem::Str(Substr::from("a")).to_string(), "a");
	assert_eq!(TopicPatternItem::Plus.to_string(), "+");
	assert_eq!(TopicPatternItem::Hash.to_string(), "#");
}

#[test]
fn test_parse_route_segments() {
	let route = ArcStr::from("sensors/+/data/#");
	let segments = TopicPatternItem::parse_route(&route).unwrap();

	assert_eq!(segments.len(), 4);
	assert_eq!(segments[0].as_str(), "sensors");
	assert_eq!(segments[1], TopicPatternItem::Plus);
	assert_eq!(segments[3], TopicPatternItem::Hash);
}

#[test]
fn test_parse_route_keeps_empty_levels() {
	let route = ArcStr::from("/a//b");
	let segments = TopicPatternItem::parse_route(&route).unwrap();
	let rendered: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();
	assert_eq!(rendered, vec!["", "a", "", "b"]);
}

#[test]
fn test_parse_route_errors() {
	assert_eq!(
		TopicPatternItem::parse_route(&ArcStr::from("")),
		Err(TopicPatternError::EmptyTopic)
	);
	assert_eq!(
		TopicPatternItem::parse_route(&ArcStr::from("   ")),
		Err(TopicPatternError::EmptyTopic)
	);
	assert!(matches!(
		TopicPatternItem::parse_route(&ArcStr::from("a/#/b")),
		Err(TopicPatternError::HashPosition { .. })
	));
	assert!(matches!(
		TopicPatternItem::parse_route(&ArcStr::from("a/\0")),
		Err(TopicPatternError::NullCharacter { .. })
	));

	let long = ArcStr::from("a".repeat(70_000));
	assert!(matches!(
		TopicPatternItem::parse_route(&long),
		Err(TopicPatternError::TooLong { .. })
	));
}
