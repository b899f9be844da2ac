//! Item normalization ahead of interning.
//!
//! Raw items are canonicalized before they touch the symbol table:
//! whitespace runs collapse to single spaces, case folds to lowercase,
//! and items that would be ambiguous or unrepresentable are rejected.

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Result};

/// Canonicalizes raw item strings per the database configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    normalize_whitespace: bool,
    case_insensitive: bool,
    item_separator: String,
}

impl Normalizer {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            normalize_whitespace: config.normalize_whitespace,
            case_insensitive: config.case_insensitive,
            item_separator: config.item_separator.clone(),
        }
    }

    /// Normalize one raw item to its canonical text form.
    ///
    /// Rejects items that are empty after normalization and items
    /// containing the configured item separator, which would make
    /// joined string outputs ambiguous.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let mut text = if self.normalize_whitespace {
            collapse_whitespace(raw)
        } else {
            raw.to_string()
        };
        if self.case_insensitive {
            text = text.to_lowercase();
        }
        if text.is_empty() {
            return Err(DatabaseError::InvalidItem(
                "items must not be empty".to_string(),
            ));
        }
        if text.contains(&self.item_separator) {
            return Err(DatabaseError::InvalidItem(format!(
                "item '{text}' contains the reserved separator '{}'",
                self.item_separator
            )));
        }
        Ok(text)
    }
}

fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::from_config(&DatabaseConfig::default())
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(normalizer().normalize("  a   b\tc\n").unwrap(), "a b c");
    }

    #[test]
    fn test_case_folds() {
        assert_eq!(normalizer().normalize("BREAD").unwrap(), "bread");
        assert_eq!(normalizer().normalize("Straße").unwrap(), "straße");
    }

    #[test]
    fn test_case_preserved_when_sensitive() {
        let config = DatabaseConfig::default().with_case_insensitive(false);
        let normalizer = Normalizer::from_config(&config);
        assert_eq!(normalizer.normalize("Bread").unwrap(), "Bread");
    }

    #[test]
    fn test_whitespace_preserved_when_disabled() {
        let config = DatabaseConfig::default().with_normalize_whitespace(false);
        let normalizer = Normalizer::from_config(&config);
        assert_eq!(normalizer.normalize("a  b").unwrap(), "a  b");
    }

    #[test]
    fn test_empty_item_rejected() {
        assert!(matches!(
            normalizer().normalize("   "),
            Err(DatabaseError::InvalidItem(_))
        ));
        assert!(matches!(
            normalizer().normalize(""),
            Err(DatabaseError::InvalidItem(_))
        ));
    }

    #[test]
    fn test_separator_bearing_item_rejected() {
        let err = normalizer().normalize("a ∪ b").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidItem(_)));
    }
}
