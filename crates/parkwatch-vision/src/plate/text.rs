//! Plate text normalization and format validation.

use std::sync::LazyLock;

use regex::Regex;

/// Plate layouts accepted without falling back to the letter+digit rule.
pub const DEFAULT_PLATE_PATTERNS: &[&str] = &[
    r"^[A-Z]{1,3}\s?\d{1,4}\s?[A-Z]{0,3}$",
    r"^\d{1,2}\s?[A-Z]{1,3}\s?\d{1,4}$",
    r"^[A-Z]{2}\s?\d{2}\s?[A-Z]{1,3}\s?\d{1,4}$",
];

static DEFAULT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_PLATE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("default plate pattern must compile"))
        .collect()
});

/// Normalize OCR output.
///
/// Drops everything except ASCII letters, digits and whitespace, upper-cases,
/// and collapses whitespace runs into single spaces.
pub fn clean_plate_text(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    filtered
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accepts cleaned plate text.
#[derive(Debug, Clone)]
pub struct PlateValidator {
    patterns: Vec<Regex>,
    min_fallback_len: usize,
}

impl Default for PlateValidator {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
            min_fallback_len: 4,
        }
    }
}

impl PlateValidator {
    /// Validator with custom patterns, tried in order.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            min_fallback_len: 4,
        })
    }

    /// A text passes when it matches any pattern, or failing that contains at
    /// least one letter and one digit and is at least four characters long.
    pub fn is_valid(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.patterns.iter().any(|p| p.is_match(text)) {
            return true;
        }

        let has_letter = text.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = text.chars().any(|c| c.is_ascii_digit());
        has_letter && has_digit && text.chars().count() >= self.min_fallback_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_and_uppercases() {
        assert_eq!(clean_plate_text("ka-01 ab.1234"), "KA01 AB1234");
        assert_eq!(clean_plate_text("  mh  12\tde 1433 "), "MH 12 DE 1433");
        assert_eq!(clean_plate_text("#@!"), "");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let samples = ["ka-01 ab.1234", "  x  y  ", "ÅBC 123", "a\u{3000}b 9", "", "KA01AB1234"];
        for raw in samples {
            let once = clean_plate_text(raw);
            assert_eq!(clean_plate_text(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_default_patterns_accept_common_layouts() {
        let validator = PlateValidator::default();
        assert!(validator.is_valid("KA01AB1234"));
        assert!(validator.is_valid("KA 01 AB 1234"));
        assert!(validator.is_valid("ABC 123"));
        assert!(validator.is_valid("12 AB 345"));
    }

    #[test]
    fn test_fallback_rule() {
        let validator = PlateValidator::with_patterns(Vec::<&str>::new()).unwrap();
        assert!(validator.is_valid("X1Y2"));
        assert!(!validator.is_valid("X1Y"));
        assert!(!validator.is_valid("ABCDEFG"));
        assert!(!validator.is_valid("123456"));
        assert!(!validator.is_valid(""));
    }

    #[test]
    fn test_invalid_custom_pattern() {
        assert!(PlateValidator::with_patterns(["^[A-Z"]).is_err());
    }
}
