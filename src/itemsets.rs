//! Frequent-itemset enumeration.
//!
//! A lazy preorder walk over the trie yields one hit per surviving
//! node. Counters never increase along a path, so `min_occurrences`
//! and `min_support` prune whole subtrees; the antecedent count never
//! decreases, so `max_antecedents_length` prunes too. The same walk
//! backs rule derivation.

use serde::Serialize;

use crate::common_sense::is_subset;
use crate::error::{DatabaseError, Result};
use crate::ordering::ItemOrder;
use crate::symbols::SymbolId;
use crate::trie::{NodeId, Trie};

/// Filters for deriving frequent itemsets.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemsetQuery {
    /// Minimum occurrence count, at least 1.
    pub min_occurrences: u64,
    pub max_occurrences: Option<u64>,
    pub min_support: f64,
    pub max_support: f64,
    /// Minimum itemset cardinality.
    pub min_length: usize,
    pub max_length: Option<usize>,
    /// Cap on the non-consequent share of an itemset.
    pub max_antecedents_length: Option<usize>,
    /// Keep only itemsets whose consequents contain all given items.
    pub filter_to_consequents: Option<Vec<String>>,
}

impl Default for ItemsetQuery {
    fn default() -> Self {
        Self {
            min_occurrences: 1,
            max_occurrences: None,
            min_support: 0.0,
            max_support: 1.0,
            min_length: 0,
            max_length: None,
            max_antecedents_length: None,
            filter_to_consequents: None,
        }
    }
}

impl ItemsetQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_occurrences(mut self, min: u64) -> Self {
        self.min_occurrences = min;
        self
    }

    pub fn with_max_occurrences(mut self, max: u64) -> Self {
        self.max_occurrences = Some(max);
        self
    }

    pub fn with_min_support(mut self, min: f64) -> Self {
        self.min_support = min;
        self
    }

    pub fn with_max_support(mut self, max: f64) -> Self {
        self.max_support = max;
        self
    }

    pub fn with_min_length(mut self, min: usize) -> Self {
        self.min_length = min;
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn with_max_antecedents_length(mut self, max: usize) -> Self {
        self.max_antecedents_length = Some(max);
        self
    }

    pub fn with_filter_to_consequents<I, S>(mut self, consequents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_to_consequents = Some(consequents.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_occurrences == 0 {
            return Err(DatabaseError::InvalidConfig(
                "min_occurrences must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_support) || !(0.0..=1.0).contains(&self.max_support) {
            return Err(DatabaseError::InvalidConfig(
                "support thresholds must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// One derived frequent itemset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequentItemset {
    /// Item texts, consequents first.
    pub itemset: Vec<String>,
    pub occurrences: u64,
    pub support: f64,
    pub itemset_length: usize,
}

/// Node-level filters evaluated during the walk.
#[derive(Debug, Clone)]
pub(crate) struct WalkFilters {
    pub min_occurrences: u64,
    pub max_occurrences: Option<u64>,
    pub min_support: f64,
    pub max_support: f64,
    pub min_length: usize,
    pub max_length: Option<usize>,
    pub max_antecedents: Option<usize>,
    /// Containment filter on the consequent prefix (sorted ids).
    pub required_consequents: Option<Vec<SymbolId>>,
    /// Skip subtrees without a single consequent (used by the rule
    /// deriver; sound because consequents always form the path prefix).
    pub consequents_only: bool,
}

impl WalkFilters {
    pub(crate) fn unfiltered() -> Self {
        Self {
            min_occurrences: 0,
            max_occurrences: None,
            min_support: 0.0,
            max_support: 1.0,
            min_length: 0,
            max_length: None,
            max_antecedents: None,
            required_consequents: None,
            consequents_only: false,
        }
    }

    fn from_query(query: &ItemsetQuery, required: Option<Vec<SymbolId>>) -> Self {
        Self {
            min_occurrences: query.min_occurrences,
            max_occurrences: query.max_occurrences,
            min_support: query.min_support,
            max_support: query.max_support,
            min_length: query.min_length,
            max_length: query.max_length,
            max_antecedents: query.max_antecedents_length,
            required_consequents: required,
            consequents_only: false,
        }
    }
}

/// A surviving node together with its full path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WalkItem {
    pub path: Vec<SymbolId>,
    pub occurrences: u64,
    /// Length of the consequent prefix of `path`.
    pub consequents_count: usize,
}

struct Frame {
    children: Vec<NodeId>,
    next: usize,
}

/// Lazy filtered preorder walk over the trie. Children are visited in
/// the supplied item order.
pub(crate) struct TrieWalk<'a> {
    trie: &'a Trie,
    order: &'a ItemOrder,
    filters: WalkFilters,
    root_occurrences: u64,
    stack: Vec<Frame>,
    path: Vec<SymbolId>,
}

impl<'a> TrieWalk<'a> {
    pub(crate) fn new(trie: &'a Trie, order: &'a ItemOrder, filters: WalkFilters) -> Self {
        let root_frame = Frame {
            children: trie.children_sorted(Trie::ROOT, order),
            next: 0,
        };
        Self {
            trie,
            order,
            filters,
            root_occurrences: trie.transaction_count(),
            stack: vec![root_frame],
            path: Vec::new(),
        }
    }

    fn support(&self, occurrences: u64) -> f64 {
        if self.root_occurrences == 0 {
            0.0
        } else {
            occurrences as f64 / self.root_occurrences as f64
        }
    }
}

impl Iterator for TrieWalk<'_> {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.next >= frame.children.len() {
                self.stack.pop();
                if !self.stack.is_empty() {
                    self.path.pop();
                }
                continue;
            }
            let child = frame.children[frame.next];
            frame.next += 1;

            let node = self.trie.node(child);
            let symbol = node.symbol.expect("non-root node has a symbol");
            self.path.push(symbol);
            let depth = self.path.len();
            let consequents_count = node.consequents_count as usize;
            let filters = &self.filters;

            // Subtree prunes: every condition here is monotone along
            // the path, so nothing below this node can pass either.
            let support = self.support(node.occurrences);
            let consequents_fixed = consequents_count < depth;
            let required_ok = filters.required_consequents.as_ref().map_or(true, |req| {
                is_subset(req, &self.path[..consequents_count])
            });
            let prune = node.occurrences < filters.min_occurrences
                || support < filters.min_support
                || (filters.consequents_only && consequents_count == 0)
                || filters
                    .max_antecedents
                    .is_some_and(|max| depth - consequents_count > max)
                || (consequents_fixed && !required_ok);
            if prune {
                self.path.pop();
                continue;
            }

            let descend = filters.max_length.map_or(true, |max| depth < max)
                && node.child_count() > 0;
            let emit = depth >= filters.min_length
                && filters.max_length.map_or(true, |max| depth <= max)
                && filters.max_occurrences.map_or(true, |max| node.occurrences <= max)
                && support <= filters.max_support
                && required_ok;

            let item = emit.then(|| WalkItem {
                path: self.path.clone(),
                occurrences: node.occurrences,
                consequents_count,
            });

            if descend {
                self.stack.push(Frame {
                    children: self.trie.children_sorted(child, self.order),
                    next: 0,
                });
            } else {
                self.path.pop();
            }

            if let Some(item) = item {
                return Some(item);
            }
        }
    }
}

/// Resolve a query into walk filters, translating the consequent
/// filter to sorted symbol ids. `None` means the filter can never
/// match (an item in it has never been seen).
pub(crate) fn resolve_filters(
    query: &ItemsetQuery,
    resolve: impl Fn(&str) -> Result<Option<SymbolId>>,
) -> Result<Option<WalkFilters>> {
    let required = match &query.filter_to_consequents {
        None => None,
        Some(items) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match resolve(item)? {
                    Some(id) => ids.push(id),
                    None => return Ok(None),
                }
            }
            ids.sort_unstable();
            ids.dedup();
            Some(ids)
        }
    };
    Ok(Some(WalkFilters::from_query(query, required)))
}
