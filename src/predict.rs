//! Consequent scoring for a partial transaction.
//!
//! Given a set of observed antecedents, each declared consequent is
//! scored by the conditional frequency `occ(antecedents ∪ {k}) /
//! occ(antecedents)`, both read from exact trie lookups. No smoothing:
//! a path that was never stored scores 0.

use serde::Serialize;

use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::symbols::SymbolId;

/// Score of one consequent for the queried antecedents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub consequent: String,
    pub score: f64,
}

pub(crate) fn predict<I, S>(
    database: &Database,
    antecedents: I,
    skip_unknown_antecedents: bool,
) -> Result<Vec<Prediction>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut query: Vec<SymbolId> = Vec::new();
    for raw in antecedents {
        let raw = raw.as_ref();
        match database.lookup_item(raw)? {
            Some(id) => query.push(id),
            None if skip_unknown_antecedents => continue,
            None => return Err(DatabaseError::UnknownAntecedent(raw.to_string())),
        }
    }
    query.sort_unstable();
    query.dedup();

    let trie = database.trie();
    let occurrences_query = trie.occurrences_of(&query);

    let mut predictions: Vec<Prediction> = database
        .consequent_ids()
        .iter()
        .map(|consequent| {
            let mut with_consequent = query.clone();
            if let Err(position) = with_consequent.binary_search(consequent) {
                with_consequent.insert(position, *consequent);
            }
            let score = if occurrences_query == 0 {
                0.0
            } else {
                trie.occurrences_of(&with_consequent) as f64 / occurrences_query as f64
            };
            Prediction {
                consequent: database.symbols().text(*consequent).to_string(),
                score,
            }
        })
        .collect();

    // stable sort keeps declared consequent order within equal scores
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(predictions)
}
