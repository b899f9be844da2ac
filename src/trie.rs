//! Arena-allocated trie counting every ingested itemset.
//!
//! Each node represents one itemset: the symbols along the path from
//! the root. Its `occurrences` counter is the number of ingested
//! transactions containing that itemset as a subset. Because consequent
//! symbols are interned before everything else, they carry the smallest
//! ids, and a path laid out in ascending id order automatically starts
//! with its consequents:
//!
//! ```text
//! (root)
//! ├── (bread)            occurrences: 3
//! │   ├── milk           occurrences: 2
//! │   │   └── butter     occurrences: 1
//! │   └── butter         occurrences: 1
//! ├── milk               occurrences: 2
//! │   └── butter         occurrences: 1
//! └── butter             occurrences: 2
//! ```
//!
//! Nodes live in a dense `Vec` arena keyed by [`NodeId`]; child maps
//! hold symbol→id edges. Counters are monotone under ingestion and
//! addition-only under merge; nodes are never deleted.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::ordering::ItemOrder;
use crate::symbols::{SymbolId, SymbolTable};

/// Dense id of a trie node. The root is [`Trie::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One itemset node.
#[derive(Debug, Clone, PartialEq)]
pub struct TrieNode {
    /// Symbol on the edge from the parent; `None` only for the root.
    pub symbol: Option<SymbolId>,
    /// Number of ingested transactions containing this node's itemset.
    pub occurrences: u64,
    /// Itemset cardinality (distance from the root).
    pub depth: u32,
    /// How many of the path symbols are consequents. Consequents form
    /// a prefix of every path, so this fixes once a non-consequent
    /// edge appears.
    pub consequents_count: u32,
    children: HashMap<SymbolId, NodeId>,
}

impl TrieNode {
    pub fn children(&self) -> impl Iterator<Item = (SymbolId, NodeId)> + '_ {
        self.children.iter().map(|(symbol, id)| (*symbol, *id))
    }

    pub fn child(&self, symbol: SymbolId) -> Option<NodeId> {
        self.children.get(&symbol).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Antecedent symbols on the path (those not in the consequent
    /// prefix).
    pub fn antecedents_length(&self) -> usize {
        (self.depth - self.consequents_count) as usize
    }
}

/// The itemset arena. The root node always exists and its counter is
/// the number of ingested transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode {
                symbol: None,
                occurrences: 0,
                depth: 0,
                consequents_count: 0,
                children: HashMap::new(),
            }],
        }
    }

    pub fn node(&self, id: NodeId) -> &TrieNode {
        &self.nodes[id.index()]
    }

    /// Total nodes including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of ingested transactions (the root counter).
    pub fn transaction_count(&self) -> u64 {
        self.nodes[Self::ROOT.index()].occurrences
    }

    pub(crate) fn record_transactions(&mut self, count: u64) {
        self.nodes[Self::ROOT.index()].occurrences += count;
    }

    pub(crate) fn add_occurrences(&mut self, id: NodeId, by: u64) {
        self.nodes[id.index()].occurrences += by;
    }

    /// Walk the edge `parent → symbol`, creating the child if missing.
    /// Counters are untouched.
    pub(crate) fn get_or_create_child(
        &mut self,
        parent: NodeId,
        symbol: SymbolId,
        is_consequent: bool,
    ) -> NodeId {
        if let Some(child) = self.nodes[parent.index()].children.get(&symbol) {
            return *child;
        }
        let child = NodeId(self.nodes.len() as u32);
        let node = TrieNode {
            symbol: Some(symbol),
            occurrences: 0,
            depth: self.nodes[parent.index()].depth + 1,
            consequents_count: self.nodes[parent.index()].consequents_count
                + u32::from(is_consequent),
            children: HashMap::new(),
        };
        self.nodes.push(node);
        self.nodes[parent.index()].children.insert(symbol, child);
        child
    }

    /// Walk/extend the trie along `path` and add `occurrences` at the
    /// terminal node. Intermediate nodes are created as needed but not
    /// counted; every subset receives its own addition during ingestion
    /// and merge.
    pub(crate) fn add_at_path(&mut self, path: &[(SymbolId, bool)], occurrences: u64) -> NodeId {
        let mut current = Self::ROOT;
        for (symbol, is_consequent) in path {
            current = self.get_or_create_child(current, *symbol, *is_consequent);
        }
        self.add_occurrences(current, occurrences);
        current
    }

    /// Exact path lookup. Empty paths resolve to the root.
    pub fn get(&self, path: &[SymbolId]) -> Option<NodeId> {
        let mut current = Self::ROOT;
        for symbol in path {
            current = self.nodes[current.index()].children.get(symbol).copied()?;
        }
        Some(current)
    }

    /// Occurrences of the itemset at `path`, 0 when the path is not
    /// stored. The empty path yields the transaction count.
    pub fn occurrences_of(&self, path: &[SymbolId]) -> u64 {
        self.get(path)
            .map_or(0, |id| self.nodes[id.index()].occurrences)
    }

    /// Iterate every node with its id, root included.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &TrieNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index as u32), node))
    }

    /// Child ids of a node, sorted by the given item order.
    pub fn children_sorted(&self, id: NodeId, order: &ItemOrder) -> Vec<NodeId> {
        let mut children: Vec<(SymbolId, NodeId)> =
            self.nodes[id.index()].children().collect();
        children.sort_by_key(|(symbol, _)| order.rank(*symbol));
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Depth-1 occurrence counts, the input to [`ItemOrder::compute`].
    pub fn depth1_counts(&self) -> Vec<(SymbolId, u64)> {
        self.nodes[Self::ROOT.index()]
            .children()
            .map(|(symbol, child)| (symbol, self.nodes[child.index()].occurrences))
            .collect()
    }

    /// Render the trie for debugging: one line per node with its
    /// occurrence count and path, consequents parenthesized.
    pub fn render(&self, symbols: &SymbolTable, order: &ItemOrder) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Occurrences | Path");
        let _ = writeln!(out, "{}", "-".repeat(60));
        let mut stack = vec![(Self::ROOT, Vec::new())];
        while let Some((id, path)) = stack.pop() {
            let node = self.node(id);
            if let Some(symbol) = node.symbol {
                let mut rendered: Vec<String> = Vec::with_capacity(path.len() + 1);
                for (position, sym) in path.iter().chain([&symbol]).enumerate() {
                    let text = symbols.text(*sym);
                    if (position as u32) < node.consequents_count {
                        rendered.push(format!("({text})"));
                    } else {
                        rendered.push(text.to_string());
                    }
                }
                let indent = "  ".repeat(node.depth as usize - 1);
                let _ = writeln!(
                    out,
                    "{:>11} | {indent}{}",
                    node.occurrences,
                    rendered.join(" ")
                );
            }
            let mut child_path = path.clone();
            if let Some(symbol) = node.symbol {
                child_path.push(symbol);
            }
            for child in self.children_sorted(id, order).into_iter().rev() {
                stack.push((child, child_path.clone()));
            }
        }
        let _ = writeln!(out, "\ntransactions: {}", self.transaction_count());
        let _ = writeln!(out, "nodes (incl. root): {}", self.node_count());
        out
    }
}
