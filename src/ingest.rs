//! Subset enumeration and insertion for one transaction.
//!
//! A transaction of `n` items produces up to `2^n - 1` itemsets; each
//! one is a trie path whose counter is incremented. The enumeration is
//! iterative: a stack of `(node, next index, antecedent count)` frames
//! extends every reachable prefix by each later item, so no per-subset
//! allocation happens and the trie path doubles as the subset buffer.
//! A frame is only pushed while its antecedent count is below the
//! configured cap, which is what keeps the stored paths within
//! `max_antecedents_length + |consequents|`.

use rand::Rng;

use crate::symbols::SymbolId;
use crate::trie::{NodeId, Trie};

/// Insert every bounded subset of the laid-out transaction, counting
/// each at its trie path.
///
/// `layout` is the canonical transaction layout: deduplicated symbols
/// in ascending id order, each tagged with its consequent flag. With
/// `sampling_ratio < 1` each subset keeps its count only on a biased
/// coin flip; nodes are still created so deeper subsets stay
/// reachable, at the documented cost of counter exactness.
pub(crate) fn insert_subsets<R: Rng>(
    trie: &mut Trie,
    layout: &[(SymbolId, bool)],
    max_antecedents: Option<usize>,
    sampling_ratio: f64,
    rng: &mut R,
) {
    let mut stack: Vec<(NodeId, usize, usize)> = vec![(Trie::ROOT, 0, 0)];
    while let Some((node, start, antecedents)) = stack.pop() {
        for index in start..layout.len() {
            let (symbol, is_consequent) = layout[index];
            let child = trie.get_or_create_child(node, symbol, is_consequent);
            if sampling_ratio >= 1.0 || rng.gen::<f64>() < sampling_ratio {
                trie.add_occurrences(child, 1);
            }
            let next_antecedents = antecedents + usize::from(!is_consequent);
            if max_antecedents.map_or(true, |max| next_antecedents < max) {
                stack.push((child, index + 1, next_antecedents));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn id(index: usize) -> SymbolId {
        SymbolId::from_index(index)
    }

    fn rng() -> StepRng {
        StepRng::new(0, 0)
    }

    fn ingest(trie: &mut Trie, layout: &[(SymbolId, bool)], max_antecedents: Option<usize>) {
        trie.record_transactions(1);
        insert_subsets(trie, layout, max_antecedents, 1.0, &mut rng());
    }

    #[test]
    fn test_all_subsets_of_three_items() {
        let mut trie = Trie::new();
        ingest(
            &mut trie,
            &[(id(0), false), (id(1), false), (id(2), false)],
            None,
        );
        // 2^3 - 1 itemsets plus the root
        assert_eq!(trie.node_count(), 8);
        for path in [
            vec![id(0)],
            vec![id(1)],
            vec![id(2)],
            vec![id(0), id(1)],
            vec![id(0), id(2)],
            vec![id(1), id(2)],
            vec![id(0), id(1), id(2)],
        ] {
            assert_eq!(trie.occurrences_of(&path), 1, "path {path:?}");
        }
    }

    #[test]
    fn test_repeated_ingestion_accumulates() {
        let mut trie = Trie::new();
        let layout = [(id(0), true), (id(1), false)];
        ingest(&mut trie, &layout, None);
        ingest(&mut trie, &layout, None);
        assert_eq!(trie.transaction_count(), 2);
        assert_eq!(trie.occurrences_of(&[id(0)]), 2);
        assert_eq!(trie.occurrences_of(&[id(0), id(1)]), 2);
    }

    #[test]
    fn test_antecedent_cap_bounds_paths() {
        let mut trie = Trie::new();
        // consequent a plus antecedents b..e, cap of 2 antecedents
        let layout = [
            (id(0), true),
            (id(1), false),
            (id(2), false),
            (id(3), false),
            (id(4), false),
        ];
        ingest(&mut trie, &layout, Some(2));
        // the consequent plus two antecedents is storable
        assert_eq!(trie.occurrences_of(&[id(0), id(1), id(2)]), 1);
        // three antecedents is not, with or without the consequent
        assert!(trie.get(&[id(1), id(2), id(3)]).is_none());
        assert!(trie.get(&[id(0), id(1), id(2), id(3)]).is_none());
        // no stored path exceeds cap + consequent count
        for (_, node) in trie.iter_nodes() {
            assert!(node.depth <= 3);
        }
    }

    #[test]
    fn test_cap_applies_to_antecedents_not_consequents() {
        let mut trie = Trie::new();
        // two consequents, cap of 1 antecedent
        let layout = [(id(0), true), (id(1), true), (id(2), false)];
        ingest(&mut trie, &layout, Some(1));
        assert_eq!(trie.occurrences_of(&[id(0), id(1), id(2)]), 1);
    }

    #[test]
    fn test_sampling_keeps_structure() {
        // StepRng yields 0.0 from gen::<f64>(), so every coin lands heads
        // at ratio 0.5; the structural claim is what matters here.
        let mut trie = Trie::new();
        trie.record_transactions(1);
        insert_subsets(
            &mut trie,
            &[(id(0), false), (id(1), false)],
            None,
            0.5,
            &mut rng(),
        );
        assert_eq!(trie.node_count(), 4);
    }
}
