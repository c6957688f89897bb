// 🧼 Sanitizer - lowercase + strip punctuation
//
// "Canon PowerShot SD-1300 IS" → "canon powershot sd1300 is"
//
// Punctuation is removed, not replaced: hyphenated model codes collapse into
// one token, which is what the substring matcher relies on.

use crate::error::{LinkageError, Result};
use serde_json::Value;

/// Lowercase `text` and remove every ASCII punctuation character
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Borrow the text of a raw JSON value, rejecting anything that is not a string
pub fn require_text<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::String(text) => Ok(text),
        Value::Null => Err(LinkageError::MissingKey(field.to_string())),
        other => Err(LinkageError::NotAString {
            field: field.to_string(),
            found: other.to_string(),
        }),
    }
}

/// True if `text` contains at least one decimal digit
pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_lowercases_and_strips_punctuation() {
        assert_eq!(sanitize("Canon PowerShot SD-1300 IS"), "canon powershot sd1300 is");
        assert_eq!(sanitize("Fujifilm, Inc."), "fujifilm inc");
        assert_eq!(sanitize("DMC-FZ40/K (Black)"), "dmcfz40k black");
    }

    #[test]
    fn test_sanitize_keeps_whitespace_and_non_ascii() {
        assert_eq!(sanitize("Appareil Photo  Numérique"), "appareil photo  numérique");
    }

    #[test]
    fn test_require_text_rejects_non_strings() {
        let value = json!("X-100");
        assert_eq!(sanitize(require_text("model", &value).unwrap()), "x100");

        let err = require_text("model", &json!(100)).unwrap_err();
        assert!(matches!(err, LinkageError::NotAString { .. }));

        let err = require_text("model", &Value::Null).unwrap_err();
        assert!(matches!(err, LinkageError::MissingKey(_)));
    }

    #[test]
    fn test_has_digit() {
        assert!(has_digit("sd1300"));
        assert!(!has_digit("powershot"));
    }
}
