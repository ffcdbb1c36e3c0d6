//! Value transforms applied while copying template fields.

use regex::Regex;
use serde_json::Number;

use crate::error::Result;
use crate::value::Value;

/// Removes the word "template" from entity names, together with a
/// separator (`:`, `-`, `–` or `|`) attached to it.
#[derive(Debug, Clone)]
pub struct NameTransform {
    pattern: Regex,
}

impl NameTransform {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"(?i)\s*[:|\-–]?\s*\btemplate\b\s*[:|\-–]?\s*")?,
        })
    }

    /// Drop every whole-word, case-insensitive "template" and trim.
    ///
    /// `"Onboarding TEMPLATE"` becomes `"Onboarding"` and `"Template: Launch"`
    /// becomes `"Launch"`; `"Templates"` is kept.
    pub fn strip(&self, name: &str) -> String {
        self.pattern.replace_all(name, " ").trim().to_string()
    }
}

/// Shift a rank so clones sort after their siblings. A missing or
/// non-numeric rank counts as zero.
pub fn offset_rank(rank: Option<&Value>, offset: i64) -> Value {
    let number = match rank {
        Some(Value::Scalar(serde_json::Value::Number(n))) => match n.as_i64() {
            Some(n) => n
                .checked_add(offset)
                .map(Number::from)
                .or_else(|| Number::from_f64(n as f64 + offset as f64)),
            None => n.as_f64().and_then(|n| Number::from_f64(n + offset as f64)),
        },
        _ => None,
    };
    Value::Scalar(serde_json::Value::Number(
        number.unwrap_or_else(|| Number::from(offset)),
    ))
}

/// Append the suppression marker to a tag unless it is already there.
pub fn with_marker(tag: Option<&str>, marker: &str) -> String {
    let tag = tag.unwrap_or_default();
    let trimmed = marker.trim();
    if trimmed.is_empty() || tag.contains(trimmed) {
        tag.to_string()
    } else if tag.is_empty() {
        trimmed.to_string()
    } else {
        format!("{}{}", tag, marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_template_word() {
        let names = NameTransform::new().unwrap();
        assert_eq!(names.strip("Onboarding TEMPLATE"), "Onboarding");
        assert_eq!(names.strip("Template: Launch"), "Launch");
        assert_eq!(names.strip("Launch - template"), "Launch");
        assert_eq!(names.strip("Sales | Template | Q3"), "Sales Q3");
        assert_eq!(names.strip("My Template Task"), "My Task");
        assert_eq!(names.strip("template"), "");
    }

    #[test]
    fn test_strip_keeps_longer_words() {
        let names = NameTransform::new().unwrap();
        assert_eq!(names.strip("Templates overview"), "Templates overview");
        assert_eq!(names.strip("Untemplated"), "Untemplated");
    }

    #[test]
    fn test_offset_rank() {
        assert_eq!(offset_rank(Some(&Value::Scalar(json!(5))), 10_000), Value::Scalar(json!(10_005)));
        assert_eq!(offset_rank(None, 10_000), Value::Scalar(json!(10_000)));
        assert_eq!(
            offset_rank(Some(&Value::text("high")), 10_000),
            Value::Scalar(json!(10_000))
        );
        assert_eq!(
            offset_rank(Some(&Value::Scalar(json!(1.5))), 10),
            Value::Scalar(json!(11.5))
        );
    }

    #[test]
    fn test_with_marker() {
        assert_eq!(with_marker(None, " [cloned]"), "[cloned]");
        assert_eq!(with_marker(Some("sync"), " [cloned]"), "sync [cloned]");
        assert_eq!(with_marker(Some("sync [cloned]"), " [cloned]"), "sync [cloned]");
        assert_eq!(with_marker(Some("sync"), ""), "sync");
    }
}
