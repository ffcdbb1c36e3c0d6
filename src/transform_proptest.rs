//! Property-based tests for the field value transforms.
//!
//! These tests use proptest to generate random names, ranks and tags and
//! verify that the transforms keep their invariants for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::transform::{offset_rank, with_marker, NameTransform};
    use crate::value::Value;
    use proptest::prelude::*;
    use serde_json::json;

    // ============================================================================
    // NameTransform::strip property tests
    // ============================================================================

    proptest! {
        /// Property: no whole-word "template" survives, whatever its case
        #[test]
        fn strip_removes_every_template_word(
            before in "[a-z ]{0,12}",
            word in "(?i)template",
            after in "[a-z ]{0,12}",
        ) {
            let names = NameTransform::new().unwrap();
            let input = format!("{} {} {}", before, word, after);
            let result = names.strip(&input);
            for token in result.split_whitespace() {
                prop_assert_ne!(token.to_lowercase(), "template");
            }
        }

        /// Property: a leading "Template:" style prefix leaves no separator behind
        #[test]
        fn strip_drops_prefix_separator(
            sep in "[:|\\-–]",
            rest in "[a-su-z][a-su-z ]{0,20}",
        ) {
            let names = NameTransform::new().unwrap();
            let result = names.strip(&format!("Template{} {}", sep, rest));
            prop_assert_eq!(result, rest.trim());
        }

        /// Property: stripping is idempotent
        #[test]
        fn strip_is_idempotent(input in ".{0,40}") {
            let names = NameTransform::new().unwrap();
            let once = names.strip(&input);
            let twice = names.strip(&once);
            prop_assert_eq!(once, twice);
        }

        /// Property: names without the word only lose surrounding whitespace
        #[test]
        fn strip_leaves_other_names_alone(input in "[a-su-z0-9 ]{0,30}") {
            let names = NameTransform::new().unwrap();
            prop_assert_eq!(names.strip(&input), input.trim());
        }
    }

    // ============================================================================
    // offset_rank property tests
    // ============================================================================

    proptest! {
        /// Property: integer ranks are shifted by exactly the offset
        #[test]
        fn offset_rank_adds_offset(rank in -1_000_000i64..1_000_000, offset in 0i64..100_000) {
            let result = offset_rank(Some(&Value::Scalar(json!(rank))), offset);
            prop_assert_eq!(result, Value::Scalar(json!(rank + offset)));
        }

        /// Property: non-numeric ranks count as zero
        #[test]
        fn offset_rank_of_text_is_offset(text in ".*", offset in 0i64..100_000) {
            let result = offset_rank(Some(&Value::text(text)), offset);
            prop_assert_eq!(result, Value::Scalar(json!(offset)));
        }
    }

    // ============================================================================
    // with_marker property tests
    // ============================================================================

    proptest! {
        /// Property: appending the marker is idempotent
        #[test]
        fn with_marker_is_idempotent(tag in ".{0,20}") {
            let once = with_marker(Some(&tag), " [cloned]");
            let twice = with_marker(Some(&once), " [cloned]");
            prop_assert_eq!(once, twice);
        }

        /// Property: the result always carries the marker and keeps the tag
        #[test]
        fn with_marker_keeps_tag(tag in "[a-z]{1,20}") {
            let result = with_marker(Some(&tag), " [cloned]");
            prop_assert!(result.starts_with(&tag));
            prop_assert!(result.contains("[cloned]"));
        }
    }
}
