//! The transaction database: ingestion surface, derivation surface,
//! merging and persistence.
//!
//! A `Database` owns its symbol table, its itemset trie and its
//! common-sense list exclusively. Every public call is synchronous and
//! runs to completion; distinct instances are independent and may live
//! on separate threads. Failed calls leave the database in its
//! pre-call state — a transaction either lands completely or not at
//! all.
//!
//! ```
//! use minero::{Database, DatabaseConfig, RuleQuery};
//!
//! # fn main() -> minero::Result<()> {
//! let mut database = Database::new(DatabaseConfig::new(["bread"]))?;
//! database.insert_transaction(["milk", "bread"])?;
//! database.insert_transaction(["milk", "bread", "butter"])?;
//! database.insert_transaction(["butter"])?;
//!
//! let rules = database.derive_rules(&RuleQuery::new().with_min_confidence(0.9))?;
//! assert_eq!(rules[0].antecedents, vec!["milk"]);
//! assert_eq!(rules[0].consequents, vec!["bread"]);
//! assert_eq!(rules[0].confidence, 1.0);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use rand::Rng;

use crate::codec::AlphabetCodec;
use crate::common_sense::{CommonSenseRule, CommonSenseStore};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Result};
use crate::ingest;
use crate::itemsets::{self, FrequentItemset, ItemsetQuery, TrieWalk};
use crate::merge;
use crate::normalize::Normalizer;
use crate::ordering::ItemOrder;
use crate::persistence;
use crate::predict::{self, Prediction};
use crate::rules::{self, Rule, RuleQuery};
use crate::symbols::{SymbolId, SymbolTable};
use crate::trie::Trie;

/// In-memory transaction database for mining association rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    config: DatabaseConfig,
    codec: AlphabetCodec,
    normalizer: Normalizer,
    symbols: SymbolTable,
    trie: Trie,
    common_sense: CommonSenseStore,
    /// Ids of the declared consequents, in declared order. They are
    /// interned before anything else, so they always occupy the lowest
    /// ids and sort to the front of every path.
    consequent_ids: Vec<SymbolId>,
}

impl Database {
    /// Build an empty database from the given configuration.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let codec = match &config.item_alphabet {
            Some(alphabet) => AlphabetCodec::from_alphabet(alphabet)?,
            None => AlphabetCodec::disabled(),
        };
        let normalizer = Normalizer::from_config(&config);
        let mut database = Self {
            config,
            codec,
            normalizer,
            symbols: SymbolTable::new(),
            trie: Trie::new(),
            common_sense: CommonSenseStore::new(),
            consequent_ids: Vec::new(),
        };
        for consequent in database.config.consequents.clone() {
            let id = database.intern_item(&consequent).map_err(|err| {
                DatabaseError::InvalidConfig(format!("invalid consequent '{consequent}': {err}"))
            })?;
            if database.consequent_ids.contains(&id) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "consequent '{consequent}' duplicates an earlier consequent after normalization"
                )));
            }
            database.consequent_ids.push(id);
        }
        Ok(database)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn common_sense(&self) -> &CommonSenseStore {
        &self.common_sense
    }

    /// Declared consequent ids, in declared order.
    pub fn consequent_ids(&self) -> &[SymbolId] {
        &self.consequent_ids
    }

    /// Number of ingested transactions.
    pub fn transaction_count(&self) -> u64 {
        self.trie.transaction_count()
    }

    /// Number of trie nodes, root included.
    pub fn node_count(&self) -> usize {
        self.trie.node_count()
    }

    // --- ingestion ---------------------------------------------------

    /// Insert one transaction. Duplicate items collapse to a set; every
    /// subset within the antecedent cap is counted.
    pub fn insert_transaction<I, S>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert_transaction_inner(items, 1.0, &mut rand::thread_rng())
    }

    /// Insert a batch of transactions. Stops at the first failing
    /// transaction; previously inserted ones remain.
    pub fn insert_transactions<I, T, S>(&mut self, transactions: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for transaction in transactions {
            self.insert_transaction(transaction)?;
        }
        Ok(())
    }

    /// Insert a batch of transactions, keeping each enumerated subset
    /// only with probability `sampling_ratio`. Counters become
    /// downward-biased estimates; the root transaction counter stays
    /// exact.
    pub fn insert_transactions_sampled<I, T, S>(
        &mut self,
        transactions: I,
        sampling_ratio: f64,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !(sampling_ratio > 0.0 && sampling_ratio <= 1.0) {
            return Err(DatabaseError::InvalidConfig(format!(
                "sampling_ratio must be within (0, 1], got {sampling_ratio}"
            )));
        }
        let mut rng = rand::thread_rng();
        for transaction in transactions {
            self.insert_transaction_inner(transaction, sampling_ratio, &mut rng)?;
        }
        Ok(())
    }

    /// Insert rows of `(column, value)` pairs, forming one item
    /// `column<sep>value` per pair. `input_columns` restricts which
    /// columns contribute.
    pub fn insert_from_tabular_rows<'a, R, Row>(
        &mut self,
        rows: R,
        input_columns: Option<&[&str]>,
    ) -> Result<()>
    where
        R: IntoIterator<Item = Row>,
        Row: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for row in rows {
            let items: Vec<String> = row
                .into_iter()
                .filter(|(column, _)| {
                    input_columns.map_or(true, |columns| columns.contains(column))
                })
                .map(|(column, value)| {
                    format!("{column}{}{value}", self.config.column_value_separator)
                })
                .collect();
            self.insert_transaction(items)?;
        }
        Ok(())
    }

    fn insert_transaction_inner<I, S, R>(
        &mut self,
        items: I,
        sampling_ratio: f64,
        rng: &mut R,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        R: Rng,
    {
        let mark = self.symbols.len();
        let layout = match self.normalize_transaction(items) {
            Ok(layout) => layout,
            Err(err) => {
                self.symbols.truncate(mark);
                return Err(err);
            }
        };
        if self.config.strict_transaction_length {
            if let Some(max_length) = self.config.max_itemset_length() {
                if layout.len() > max_length {
                    self.symbols.truncate(mark);
                    return Err(DatabaseError::MaxLengthExceeded {
                        length: layout.len(),
                        max_length,
                    });
                }
            }
        }
        self.trie.record_transactions(1);
        ingest::insert_subsets(
            &mut self.trie,
            &layout,
            self.config.max_antecedents_length,
            sampling_ratio,
            rng,
        );
        tracing::trace!(items = layout.len(), "ingested transaction");
        Ok(())
    }

    /// Normalize, dedup and lay out a transaction: ascending symbol
    /// ids, which puts consequents first because they hold the lowest
    /// ids.
    fn normalize_transaction<I, S>(&mut self, items: I) -> Result<Vec<(SymbolId, bool)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        for raw in items {
            ids.insert(self.intern_item(raw.as_ref())?);
        }
        Ok(ids
            .into_iter()
            .map(|id| (id, self.is_consequent(id)))
            .collect())
    }

    pub(crate) fn intern_item(&mut self, raw: &str) -> Result<SymbolId> {
        let text = self.normalizer.normalize(raw)?;
        let key = self.codec.encode(&text)?;
        Ok(self.symbols.intern(&key, &text))
    }

    /// Resolve an item to its symbol id without interning it.
    pub(crate) fn lookup_item(&self, raw: &str) -> Result<Option<SymbolId>> {
        let text = self.normalizer.normalize(raw)?;
        let key = self.codec.encode(&text)?;
        Ok(self.symbols.lookup(&key))
    }

    fn is_consequent(&self, id: SymbolId) -> bool {
        id.index() < self.consequent_ids.len()
    }

    // --- common sense ------------------------------------------------

    /// Declare that `antecedents` alone already explain `consequents`.
    /// Matching rules (and any superset elaborations of them) are
    /// suppressed during rule derivation.
    pub fn insert_common_sense_rule<A, K, S, T>(
        &mut self,
        antecedents: A,
        consequents: K,
    ) -> Result<()>
    where
        A: IntoIterator<Item = S>,
        K: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mark = self.symbols.len();
        let interned: Result<(Vec<SymbolId>, Vec<SymbolId>)> = (|| {
            let mut antecedent_ids = Vec::new();
            for item in antecedents {
                antecedent_ids.push(self.intern_item(item.as_ref())?);
            }
            let mut consequent_ids = Vec::new();
            for item in consequents {
                consequent_ids.push(self.intern_item(item.as_ref())?);
            }
            Ok((antecedent_ids, consequent_ids))
        })();
        match interned {
            Ok((antecedent_ids, consequent_ids)) => {
                self.common_sense
                    .insert(CommonSenseRule::new(antecedent_ids, consequent_ids));
                Ok(())
            }
            Err(err) => {
                self.symbols.truncate(mark);
                Err(err)
            }
        }
    }

    /// The stored common-sense entries as (antecedents, consequents)
    /// item texts.
    pub fn common_sense_rules(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.common_sense
            .iter()
            .map(|rule| {
                (
                    self.decode_symbols(rule.antecedents()),
                    self.decode_symbols(rule.consequents()),
                )
            })
            .collect()
    }

    pub fn clear_common_sense_rules(&mut self) {
        self.common_sense.clear();
    }

    // --- derivation --------------------------------------------------

    /// Every stored itemset passing the query filters, with occurrence
    /// count and support.
    pub fn derive_frequent_itemsets(&self, query: &ItemsetQuery) -> Result<Vec<FrequentItemset>> {
        query.validate()?;
        let Some(filters) = itemsets::resolve_filters(query, |item| self.lookup_item(item))?
        else {
            // the consequent filter names an item that was never seen
            return Ok(Vec::new());
        };
        let order = self.item_order();
        let total = self.trie.transaction_count();
        let rows: Vec<FrequentItemset> = TrieWalk::new(&self.trie, &order, filters)
            .map(|item| FrequentItemset {
                itemset: self.decode_itemset(&item.path, item.consequents_count),
                occurrences: item.occurrences,
                support: if total == 0 {
                    0.0
                } else {
                    item.occurrences as f64 / total as f64
                },
                itemset_length: item.path.len(),
            })
            .collect();
        tracing::debug!(itemsets = rows.len(), "derived frequent itemsets");
        Ok(rows)
    }

    /// Occurrence count of one exact itemset, 0 when it was never
    /// stored. The empty itemset yields the transaction count.
    pub fn itemset_occurrences<I, S>(&self, items: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        for raw in items {
            match self.lookup_item(raw.as_ref())? {
                Some(id) => {
                    ids.insert(id);
                }
                None => return Ok(0),
            }
        }
        let path: Vec<SymbolId> = ids.into_iter().collect();
        Ok(self.trie.occurrences_of(&path))
    }

    /// Every rule passing the query filters, minus redundant
    /// generalizations and common-sense matches. The collection is
    /// unordered.
    pub fn derive_rules(&self, query: &RuleQuery) -> Result<Vec<Rule>> {
        rules::derive(self, query)
    }

    /// Score each declared consequent against the given antecedents by
    /// conditional frequency, descending.
    pub fn predict_consequents<I, S>(
        &self,
        antecedents: I,
        skip_unknown_antecedents: bool,
    ) -> Result<Vec<Prediction>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.consequent_ids.is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "cannot predict without declared consequents".to_string(),
            ));
        }
        predict::predict(self, antecedents, skip_unknown_antecedents)
    }

    /// Merge two databases into a fresh one holding the combined
    /// counts, as if the concatenated transaction streams had been
    /// ingested into a single database. Both inputs are left
    /// untouched.
    pub fn merge(&self, other: &Database) -> Result<Database> {
        merge::merge(self, other)
    }

    // --- persistence -------------------------------------------------

    /// Serialize the whole database to a versioned byte blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        persistence::to_bytes(self)
    }

    /// Reconstruct a database from [`Database::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Database> {
        persistence::from_bytes(bytes)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Database> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    // --- rendering and internals ------------------------------------

    /// Debug rendering of the trie: one line per stored itemset.
    pub fn render_trie(&self) -> String {
        self.trie.render(&self.symbols, &self.item_order())
    }

    /// Join items with the configured separator.
    pub fn format_itemset(&self, items: &[String]) -> String {
        items.join(&self.config.item_separator)
    }

    /// The current derivation-time item order, recomputed from the
    /// depth-1 counters on every call.
    pub(crate) fn item_order(&self) -> ItemOrder {
        ItemOrder::compute(
            self.symbols.len(),
            self.consequent_ids.len(),
            &self.trie.depth1_counts(),
        )
    }

    pub(crate) fn decode_symbols(&self, ids: &[SymbolId]) -> Vec<String> {
        ids.iter()
            .map(|id| self.symbols.text(*id).to_string())
            .collect()
    }

    /// Item texts of a path: consequents in declared order, then
    /// antecedents sorted lexicographically.
    fn decode_itemset(&self, path: &[SymbolId], consequents_count: usize) -> Vec<String> {
        let mut items = self.decode_symbols(&path[..consequents_count]);
        let mut antecedents = self.decode_symbols(&path[consequents_count..]);
        antecedents.sort();
        items.extend(antecedents);
        items
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub(crate) fn trie_mut(&mut self) -> &mut Trie {
        &mut self.trie
    }

    pub(crate) fn common_sense_mut(&mut self) -> &mut CommonSenseStore {
        &mut self.common_sense
    }

    /// Rebuild the symbol table from persisted keys. The table must
    /// currently hold exactly the interned consequents, which the blob
    /// stores as its first entries.
    pub(crate) fn restore_symbols(&mut self, keys: &[Vec<u8>]) -> Result<()> {
        if keys.len() < self.consequent_ids.len() {
            return Err(DatabaseError::SchemaMismatch(
                "symbol table is smaller than the declared consequent set".to_string(),
            ));
        }
        for (index, id) in self.consequent_ids.iter().enumerate() {
            if keys[index] != self.symbols.key(*id) {
                return Err(DatabaseError::SchemaMismatch(
                    "persisted symbol table does not start with the declared consequents"
                        .to_string(),
                ));
            }
        }
        for key in &keys[self.consequent_ids.len()..] {
            let text = self.codec.decode(key).map_err(|err| {
                DatabaseError::SchemaMismatch(format!("corrupt symbol key: {err}"))
            })?;
            self.symbols.intern(key, &text);
        }
        // duplicate keys would silently shift every later id
        if self.symbols.len() != keys.len() {
            return Err(DatabaseError::SchemaMismatch(
                "persisted symbol table contains duplicate keys".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn restore_common_sense_rule(
        &mut self,
        antecedents: Vec<SymbolId>,
        consequents: Vec<SymbolId>,
    ) {
        self.common_sense
            .insert(CommonSenseRule::new(antecedents, consequents));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket_database() -> Database {
        let mut database = Database::new(DatabaseConfig::new(["bread"])).unwrap();
        database
            .insert_transactions([
                vec!["milk", "bread"],
                vec!["butter"],
                vec!["beer", "diapers"],
                vec!["milk", "bread", "butter"],
                vec!["bread"],
            ])
            .unwrap();
        database
    }

    #[test]
    fn test_consequents_intern_first() {
        let database = Database::new(DatabaseConfig::new(["a", "b"])).unwrap();
        assert_eq!(database.consequent_ids().len(), 2);
        assert_eq!(database.symbols().len(), 2);
        assert_eq!(database.symbols().text(database.consequent_ids()[0]), "a");
    }

    #[test]
    fn test_duplicate_consequents_rejected() {
        // the two spellings collapse under case folding
        let err = Database::new(DatabaseConfig::new(["Bread", "bread"])).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfig(_)));
    }

    #[test]
    fn test_consequent_outside_alphabet_rejected() {
        let config = DatabaseConfig::new(["bread"]).with_item_alphabet("xyz");
        let err = Database::new(config).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicates_within_transaction_collapse() {
        let mut database = Database::new(DatabaseConfig::new(["a"])).unwrap();
        database
            .insert_transaction(["b", "b", "B", " b "])
            .unwrap();
        assert_eq!(database.transaction_count(), 1);
        // a single item b, normalized, with one occurrence
        assert_eq!(database.node_count(), 2);
    }

    #[test]
    fn test_failed_transaction_leaves_state_untouched() {
        let mut database = basket_database();
        let nodes = database.node_count();
        let symbols = database.symbols().len();
        let transactions = database.transaction_count();

        let err = database
            .insert_transaction(["new item", ""])
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidItem(_)));
        assert_eq!(database.node_count(), nodes);
        assert_eq!(database.symbols().len(), symbols);
        assert_eq!(database.transaction_count(), transactions);
        assert!(database.lookup_item("new item").unwrap().is_none());
    }

    #[test]
    fn test_strict_transaction_length() {
        let config = DatabaseConfig::new(["a"])
            .with_max_antecedents_length(2)
            .with_strict_transaction_length(true);
        let mut database = Database::new(config).unwrap();
        database.insert_transaction(["a", "b", "c"]).unwrap();
        let err = database
            .insert_transaction(["a", "b", "c", "d"])
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MaxLengthExceeded { .. }));
        assert_eq!(database.transaction_count(), 1);
    }

    #[test]
    fn test_sampling_ratio_validation() {
        let mut database = Database::new(DatabaseConfig::new(["a"])).unwrap();
        for ratio in [0.0, -0.5, 1.5] {
            let err = database
                .insert_transactions_sampled([["a", "b"]], ratio)
                .unwrap_err();
            assert!(matches!(err, DatabaseError::InvalidConfig(_)));
        }
        database
            .insert_transactions_sampled([["a", "b"]], 0.5)
            .unwrap();
        assert_eq!(database.transaction_count(), 1);
    }

    #[test]
    fn test_tabular_rows_form_column_value_items() {
        let mut database = Database::new(DatabaseConfig::new(["survived=1"])).unwrap();
        database
            .insert_from_tabular_rows(
                [
                    vec![("survived", "1"), ("class", "3"), ("sex", "male")],
                    vec![("survived", "0"), ("class", "1"), ("sex", "female")],
                ],
                Some(&["survived", "class"]),
            )
            .unwrap();
        assert_eq!(database.transaction_count(), 2);
        assert!(database.lookup_item("class=3").unwrap().is_some());
        // the sex column was not selected
        assert!(database.lookup_item("sex=male").unwrap().is_none());
    }

    #[test]
    fn test_grocery_itemset_counts() {
        let database = basket_database();
        let itemsets = database
            .derive_frequent_itemsets(&ItemsetQuery::new())
            .unwrap();
        let occurrences = |items: &[&str]| {
            itemsets
                .iter()
                .find(|row| row.itemset == items)
                .map(|row| row.occurrences)
        };
        assert_eq!(occurrences(&["bread"]), Some(3));
        assert_eq!(occurrences(&["bread", "milk"]), Some(2));
        assert_eq!(occurrences(&["butter"]), Some(2));
        assert_eq!(occurrences(&["beer", "diapers"]), Some(1));
    }

    #[test]
    fn test_grocery_rule_measures() {
        let database = basket_database();
        let rules = database.derive_rules(&RuleQuery::new()).unwrap();
        let milk_bread = rules
            .iter()
            .find(|rule| rule.antecedents == ["milk"] && rule.consequents == ["bread"])
            .expect("milk ⇒ bread should be derived");
        assert_eq!(milk_bread.occurrences, 2);
        assert_eq!(milk_bread.confidence, 1.0);
        assert_eq!(milk_bread.support, 0.4);
        assert!((milk_bread.lift - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(milk_bread.rule_length, 2);
    }

    #[test]
    fn test_rules_require_consequents() {
        let mut database = Database::new(DatabaseConfig::default()).unwrap();
        database.insert_transaction(["a", "b"]).unwrap();
        let err = database.derive_rules(&RuleQuery::new()).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfig(_)));
    }

    #[test]
    fn test_render_trie_shows_counts() {
        let database = basket_database();
        let rendered = database.render_trie();
        assert!(rendered.contains("(bread)"));
        assert!(rendered.contains("transactions: 5"));
    }

    #[test]
    fn test_format_itemset_uses_configured_separator() {
        let database = basket_database();
        assert_eq!(
            database.format_itemset(&["a".to_string(), "b".to_string()]),
            "a ∪ b"
        );
    }
}
