//! Structural union of two databases.
//!
//! Merging builds a fresh database and replays both inputs into it:
//! symbol tables are re-interned (first input in id order, then the
//! second), every source node's itemset is re-laid-out under the
//! target's ids, and occurrence counters add up. Re-interning in id
//! order reproduces exactly the ids a single database would have
//! assigned when ingesting the concatenated streams, which makes the
//! merge observationally equal to that database.

use crate::common_sense::CommonSenseRule;
use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::symbols::SymbolId;
use crate::trie::Trie;

pub(crate) fn merge(first: &Database, second: &Database) -> Result<Database> {
    first
        .config()
        .merge_compatible(second.config())
        .map_err(DatabaseError::IncompatibleMerge)?;

    let mut target = Database::new(first.config().clone())?;
    let first_map = translate_symbols(first, &mut target);
    let second_map = translate_symbols(second, &mut target);

    for (source, map) in [(first, &first_map), (second, &second_map)] {
        copy_counters(source, map, &mut target);
        for rule in source.common_sense().iter() {
            let antecedents = rule.antecedents().iter().map(|id| map[id.index()]).collect();
            let consequents = rule.consequents().iter().map(|id| map[id.index()]).collect();
            target
                .common_sense_mut()
                .insert(CommonSenseRule::new(antecedents, consequents));
        }
    }

    tracing::debug!(
        transactions = target.transaction_count(),
        nodes = target.node_count(),
        "merged databases"
    );
    Ok(target)
}

/// Intern every source symbol into the target, in source id order, and
/// return the source-id → target-id map.
fn translate_symbols(source: &Database, target: &mut Database) -> Vec<SymbolId> {
    source
        .symbols()
        .iter()
        .map(|(_, key, text)| target.symbols_mut().intern(key, text))
        .collect()
}

/// Add every source itemset's count at its re-laid-out target path.
fn copy_counters(source: &Database, map: &[SymbolId], target: &mut Database) {
    let consequent_count = target.consequent_ids().len();
    let source_trie = source.trie();
    target
        .trie_mut()
        .record_transactions(source_trie.transaction_count());

    let mut stack = vec![(Trie::ROOT, Vec::<SymbolId>::new())];
    while let Some((id, path)) = stack.pop() {
        let node = source_trie.node(id);
        if node.symbol.is_some() {
            // paths are keyed by instance-local ids, so the translated
            // itemset must be re-sorted before insertion
            let mut translated = path.clone();
            translated.sort_unstable();
            let layout: Vec<(SymbolId, bool)> = translated
                .into_iter()
                .map(|symbol| (symbol, symbol.index() < consequent_count))
                .collect();
            target.trie_mut().add_at_path(&layout, node.occurrences);
        }
        for (symbol, child) in node.children() {
            let mut child_path = path.clone();
            child_path.push(map[symbol.index()]);
            stack.push((child, child_path));
        }
    }
}
