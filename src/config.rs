//! Database construction parameters.

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};

/// Default separator used when itemsets are rendered as a single string.
pub const DEFAULT_ITEM_SEPARATOR: &str = " ∪ ";

/// Default separator between column name and value in tabular input.
pub const DEFAULT_COLUMN_VALUE_SEPARATOR: &str = "=";

/// Construction parameters for a [`Database`](crate::database::Database).
///
/// Built with `with_*` methods:
///
/// ```
/// use minero::config::DatabaseConfig;
///
/// let config = DatabaseConfig::new(["bread"])
///     .with_max_antecedents_length(3)
///     .with_item_alphabet("abcdefghijklmnopqrstuvwxyz =0123456789");
/// assert_eq!(config.max_itemset_length(), Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The consequents of interest, in declared order. May be empty, but
    /// rule derivation and prediction then fail.
    pub consequents: Vec<String>,
    /// Cap on the number of antecedents per stored itemset. `None` means
    /// unbounded.
    pub max_antecedents_length: Option<usize>,
    /// Fold item case during normalization.
    pub case_insensitive: bool,
    /// Trim items and collapse whitespace runs during normalization.
    pub normalize_whitespace: bool,
    /// Character set for the item codec. `None` disables compression.
    pub item_alphabet: Option<String>,
    /// Reject transactions wider than the maximum itemset length instead
    /// of silently storing only the bounded subsets.
    pub strict_transaction_length: bool,
    /// Separator used when itemsets are rendered as strings. Items
    /// containing it are rejected.
    pub item_separator: String,
    /// Separator between column name and value for tabular input rows.
    pub column_value_separator: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            consequents: Vec::new(),
            max_antecedents_length: None,
            case_insensitive: true,
            normalize_whitespace: true,
            item_alphabet: None,
            strict_transaction_length: false,
            item_separator: DEFAULT_ITEM_SEPARATOR.to_string(),
            column_value_separator: DEFAULT_COLUMN_VALUE_SEPARATOR.to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration with the given consequents and defaults
    /// for everything else.
    pub fn new<I, S>(consequents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            consequents: consequents.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_max_antecedents_length(mut self, max: usize) -> Self {
        self.max_antecedents_length = Some(max);
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_normalize_whitespace(mut self, normalize_whitespace: bool) -> Self {
        self.normalize_whitespace = normalize_whitespace;
        self
    }

    pub fn with_item_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.item_alphabet = Some(alphabet.into());
        self
    }

    pub fn with_strict_transaction_length(mut self, strict: bool) -> Self {
        self.strict_transaction_length = strict;
        self
    }

    pub fn with_item_separator(mut self, separator: impl Into<String>) -> Self {
        self.item_separator = separator.into();
        self
    }

    pub fn with_column_value_separator(mut self, separator: impl Into<String>) -> Self {
        self.column_value_separator = separator.into();
        self
    }

    /// Maximum stored itemset length: antecedent cap plus the number of
    /// declared consequents. `None` when antecedents are unbounded.
    pub fn max_itemset_length(&self) -> Option<usize> {
        self.max_antecedents_length
            .map(|max| max + self.consequents.len())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for consequent in &self.consequents {
            if consequent.trim().is_empty() {
                return Err(DatabaseError::InvalidConfig(
                    "consequents must be non-empty strings".to_string(),
                ));
            }
        }
        if self.item_separator.is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "item_separator must not be empty".to_string(),
            ));
        }
        if let Some(alphabet) = &self.item_alphabet {
            if alphabet.is_empty() {
                return Err(DatabaseError::InvalidConfig(
                    "item_alphabet must contain at least one character".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Check the fields that must agree for two databases to be merged.
    /// Returns a description of the first mismatch.
    pub(crate) fn merge_compatible(&self, other: &Self) -> std::result::Result<(), String> {
        if self.consequents != other.consequents {
            return Err("consequents differ".to_string());
        }
        if self.case_insensitive != other.case_insensitive {
            return Err("case_insensitive differs".to_string());
        }
        if self.normalize_whitespace != other.normalize_whitespace {
            return Err("normalize_whitespace differs".to_string());
        }
        if self.item_alphabet != other.item_alphabet {
            return Err("item_alphabet differs".to_string());
        }
        if self.max_antecedents_length != other.max_antecedents_length {
            return Err("max_antecedents_length differs".to_string());
        }
        Ok(())
    }
}
