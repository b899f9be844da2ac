//! Frequency-based item ordering used at derivation time.
//!
//! Paths in the trie are keyed by ascending symbol id, which is stable
//! but arbitrary. Whenever a derivation runs, a fresh permutation is
//! computed from the depth-1 counters: consequents first in declared
//! order, then the remaining symbols by descending occurrence count
//! with ties broken by ascending symbol id. Sorting each node's child
//! view by that permutation makes high-frequency subtrees come first,
//! so walks under a `min_occurrences` prune terminate earlier.
//!
//! The order is a pure function of the counters and the declared
//! consequents; it is never cached across mutations.

use std::cmp::Reverse;

use crate::symbols::SymbolId;

/// A total order over symbols, materialized as a rank per symbol id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOrder {
    ranks: Vec<u32>,
}

impl ItemOrder {
    /// Compute the order for `symbol_count` symbols of which the first
    /// `consequent_count` are consequents, from the given depth-1
    /// occurrence counts (symbols absent from `depth1_counts` count 0).
    pub fn compute(
        symbol_count: usize,
        consequent_count: usize,
        depth1_counts: &[(SymbolId, u64)],
    ) -> Self {
        let mut frequencies = vec![0u64; symbol_count];
        for (symbol, occurrences) in depth1_counts {
            frequencies[symbol.index()] = *occurrences;
        }
        let mut rest: Vec<usize> = (consequent_count..symbol_count).collect();
        rest.sort_by_key(|index| (Reverse(frequencies[*index]), *index));

        let mut ranks = vec![0u32; symbol_count];
        for (rank, index) in (0..consequent_count).chain(rest).enumerate() {
            ranks[index] = rank as u32;
        }
        Self { ranks }
    }

    pub fn rank(&self, symbol: SymbolId) -> u32 {
        self.ranks[symbol.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> SymbolId {
        SymbolId::from_index(index)
    }

    #[test]
    fn test_consequents_keep_declared_order() {
        // symbols 0 and 1 are consequents; give 1 a much higher count
        let order = ItemOrder::compute(4, 2, &[(id(0), 1), (id(1), 100), (id(2), 5), (id(3), 9)]);
        assert_eq!(order.rank(id(0)), 0);
        assert_eq!(order.rank(id(1)), 1);
    }

    #[test]
    fn test_non_consequents_sort_by_descending_frequency() {
        let order = ItemOrder::compute(4, 1, &[(id(1), 2), (id(2), 9), (id(3), 5)]);
        assert_eq!(order.rank(id(0)), 0);
        assert_eq!(order.rank(id(2)), 1);
        assert_eq!(order.rank(id(3)), 2);
        assert_eq!(order.rank(id(1)), 3);
    }

    #[test]
    fn test_frequency_ties_break_by_symbol_id() {
        let order = ItemOrder::compute(4, 0, &[(id(0), 3), (id(1), 3), (id(2), 3), (id(3), 3)]);
        for index in 0..4 {
            assert_eq!(order.rank(id(index)), index as u32);
        }
    }

    #[test]
    fn test_unseen_symbols_rank_last() {
        // symbol 2 has no depth-1 counter yet
        let order = ItemOrder::compute(3, 0, &[(id(0), 1), (id(1), 4)]);
        assert_eq!(order.rank(id(1)), 0);
        assert_eq!(order.rank(id(0)), 1);
        assert_eq!(order.rank(id(2)), 2);
    }
}
