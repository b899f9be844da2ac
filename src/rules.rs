//! Rule derivation: antecedents ⇒ consequents with support, confidence
//! and lift.
//!
//! Every trie node whose path contains a consequent is a candidate
//! rule: the consequent prefix is the right-hand side, the remaining
//! symbols the left-hand side. Candidates pass the user's threshold
//! filters, then the common-sense filter, then a minimality pass that
//! drops any rule whose antecedents can be shrunk without losing
//! confidence. The result is an unordered collection of rows.

use std::collections::HashMap;

use serde::Serialize;

use crate::common_sense::is_subset;
use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::itemsets::{TrieWalk, WalkFilters};
use crate::symbols::SymbolId;

/// Filters for rule derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleQuery {
    /// Minimum occurrence count of the full rule itemset, at least 1.
    pub min_occurrences: u64,
    pub max_occurrences: Option<u64>,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub min_lift: Option<f64>,
    pub max_lift: Option<f64>,
    pub min_support: Option<f64>,
    pub max_support: Option<f64>,
    /// Cap on the number of antecedents.
    pub max_antecedents_length: Option<usize>,
    /// Also emit antecedent-free rows describing raw consequent
    /// frequencies.
    pub non_antecedents_rules: bool,
    /// Keep redundant generalizations instead of suppressing them.
    pub show_generalizations: bool,
    /// Emit only rules whose consequent set equals the given items.
    pub filter_to_consequents: Option<Vec<String>>,
}

impl Default for RuleQuery {
    fn default() -> Self {
        Self {
            min_occurrences: 1,
            max_occurrences: None,
            min_confidence: 0.0,
            max_confidence: 1.0,
            min_lift: None,
            max_lift: None,
            min_support: None,
            max_support: None,
            max_antecedents_length: None,
            non_antecedents_rules: false,
            show_generalizations: false,
            filter_to_consequents: None,
        }
    }
}

impl RuleQuery {
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

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = min;
        self
    }

    pub fn with_max_confidence(mut self, max: f64) -> Self {
        self.max_confidence = max;
        self
    }

    pub fn with_min_lift(mut self, min: f64) -> Self {
        self.min_lift = Some(min);
        self
    }

    pub fn with_max_lift(mut self, max: f64) -> Self {
        self.max_lift = Some(max);
        self
    }

    pub fn with_min_support(mut self, min: f64) -> Self {
        self.min_support = Some(min);
        self
    }

    pub fn with_max_support(mut self, max: f64) -> Self {
        self.max_support = Some(max);
        self
    }

    pub fn with_max_antecedents_length(mut self, max: usize) -> Self {
        self.max_antecedents_length = Some(max);
        self
    }

    pub fn with_non_antecedents_rules(mut self, enabled: bool) -> Self {
        self.non_antecedents_rules = enabled;
        self
    }

    pub fn with_show_generalizations(mut self, enabled: bool) -> Self {
        self.show_generalizations = enabled;
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
        for (name, value) in [
            ("min_confidence", Some(self.min_confidence)),
            ("max_confidence", Some(self.max_confidence)),
            ("min_support", self.min_support),
            ("max_support", self.max_support),
        ] {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(DatabaseError::InvalidConfig(format!(
                        "{name} must be within [0, 1]"
                    )));
                }
            }
        }
        if self.min_confidence > self.max_confidence {
            return Err(DatabaseError::InvalidConfig(
                "min_confidence exceeds max_confidence".to_string(),
            ));
        }
        Ok(())
    }
}

/// One derived rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Antecedent item texts, sorted lexicographically.
    pub antecedents: Vec<String>,
    /// Consequent item texts, in declared order.
    pub consequents: Vec<String>,
    /// Occurrences of the full rule itemset.
    pub occurrences: u64,
    /// Occurrences of the antecedents alone (total transactions when
    /// there are none).
    pub occurrences_antecedents: u64,
    /// Occurrences of the consequents alone.
    pub occurrences_consequents: u64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    /// Total items in the rule.
    pub rule_length: usize,
}

struct Candidate {
    consequents: Vec<SymbolId>,
    antecedents: Vec<SymbolId>,
    occurrences: u64,
    occurrences_antecedents: u64,
    occurrences_consequents: u64,
    support: f64,
    confidence: f64,
    lift: f64,
}

pub(crate) fn derive(database: &Database, query: &RuleQuery) -> Result<Vec<Rule>> {
    query.validate()?;
    if database.consequent_ids().is_empty() {
        return Err(DatabaseError::InvalidConfig(
            "cannot derive rules without declared consequents".to_string(),
        ));
    }

    let required = match resolve_consequent_filter(database, query)? {
        ConsequentFilter::NeverMatches => return Ok(Vec::new()),
        ConsequentFilter::Ids(ids) => ids,
    };

    let order = database.item_order();
    let trie = database.trie();
    let total = trie.transaction_count();
    let filters = WalkFilters {
        min_occurrences: query.min_occurrences,
        min_support: query.min_support.unwrap_or(0.0),
        max_antecedents: query.max_antecedents_length,
        consequents_only: true,
        ..WalkFilters::unfiltered()
    };

    let mut candidates = Vec::new();
    for item in TrieWalk::new(trie, &order, filters) {
        let consequents = &item.path[..item.consequents_count];
        let antecedents = &item.path[item.consequents_count..];
        if antecedents.is_empty() && !query.non_antecedents_rules {
            continue;
        }
        if let Some(required) = &required {
            if consequents != required.as_slice() {
                continue;
            }
        }

        let occurrences_antecedents = trie.occurrences_of(antecedents);
        let occurrences_consequents = trie.occurrences_of(consequents);
        let support = ratio(item.occurrences, total);
        let confidence = ratio(item.occurrences, occurrences_antecedents);
        let support_antecedents = ratio(occurrences_antecedents, total);
        let support_consequents = ratio(occurrences_consequents, total);
        let lift = if support_antecedents == 0.0 || support_consequents == 0.0 {
            0.0
        } else {
            support / (support_antecedents * support_consequents)
        };

        if confidence < query.min_confidence || confidence > query.max_confidence {
            continue;
        }
        if query.min_lift.is_some_and(|min| lift < min)
            || query.max_lift.is_some_and(|max| lift > max)
        {
            continue;
        }
        if query.min_support.is_some_and(|min| support < min)
            || query.max_support.is_some_and(|max| support > max)
        {
            continue;
        }
        if query.max_occurrences.is_some_and(|max| item.occurrences > max) {
            continue;
        }
        if database.common_sense().suppresses(antecedents, consequents) {
            continue;
        }

        candidates.push(Candidate {
            consequents: consequents.to_vec(),
            antecedents: antecedents.to_vec(),
            occurrences: item.occurrences,
            occurrences_antecedents,
            occurrences_consequents,
            support,
            confidence,
            lift,
        });
    }

    let keep = if query.show_generalizations {
        vec![true; candidates.len()]
    } else {
        minimality_mask(&candidates)
    };

    let rules: Vec<Rule> = candidates
        .iter()
        .zip(&keep)
        .filter(|(_, keep)| **keep)
        .map(|(candidate, _)| to_rule(database, candidate))
        .collect();

    tracing::debug!(
        candidates = candidates.len(),
        emitted = rules.len(),
        "derived rules"
    );
    Ok(rules)
}

/// Suppress every candidate that has an already-kept strict antecedent
/// subset with at least its confidence, per consequent group. Walking
/// in (antecedent length, descending confidence) order guarantees a
/// potential generalization is examined before its specializations.
fn minimality_mask(candidates: &[Candidate]) -> Vec<bool> {
    let mut keep = vec![false; candidates.len()];
    let mut groups: HashMap<&[SymbolId], Vec<usize>> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        groups
            .entry(candidate.consequents.as_slice())
            .or_default()
            .push(index);
    }
    for indices in groups.values_mut() {
        indices.sort_by(|a, b| {
            let (a, b) = (&candidates[*a], &candidates[*b]);
            a.antecedents
                .len()
                .cmp(&b.antecedents.len())
                .then(b.confidence.total_cmp(&a.confidence))
        });
        let mut kept: Vec<usize> = Vec::new();
        for index in indices.iter().copied() {
            let candidate = &candidates[index];
            let redundant = kept.iter().any(|other| {
                let other = &candidates[*other];
                other.antecedents.len() < candidate.antecedents.len()
                    && is_subset(&other.antecedents, &candidate.antecedents)
                    && other.confidence >= candidate.confidence
            });
            if !redundant {
                keep[index] = true;
                kept.push(index);
            }
        }
    }
    keep
}

fn to_rule(database: &Database, candidate: &Candidate) -> Rule {
    let mut antecedents = database.decode_symbols(&candidate.antecedents);
    antecedents.sort();
    Rule {
        antecedents,
        consequents: database.decode_symbols(&candidate.consequents),
        occurrences: candidate.occurrences,
        occurrences_antecedents: candidate.occurrences_antecedents,
        occurrences_consequents: candidate.occurrences_consequents,
        support: candidate.support,
        confidence: candidate.confidence,
        lift: candidate.lift,
        rule_length: candidate.antecedents.len() + candidate.consequents.len(),
    }
}

enum ConsequentFilter {
    /// The filter names an item that was never seen; nothing matches.
    NeverMatches,
    Ids(Option<Vec<SymbolId>>),
}

fn resolve_consequent_filter(
    database: &Database,
    query: &RuleQuery,
) -> Result<ConsequentFilter> {
    let Some(items) = &query.filter_to_consequents else {
        return Ok(ConsequentFilter::Ids(None));
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        match database.lookup_item(item)? {
            Some(id) => ids.push(id),
            None => return Ok(ConsequentFilter::NeverMatches),
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ConsequentFilter::Ids(Some(ids)))
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(antecedents: Vec<usize>, confidence: f64) -> Candidate {
        Candidate {
            consequents: vec![SymbolId::from_index(0)],
            antecedents: antecedents.into_iter().map(SymbolId::from_index).collect(),
            occurrences: 1,
            occurrences_antecedents: 1,
            occurrences_consequents: 1,
            support: 0.1,
            confidence,
            lift: 1.0,
        }
    }

    #[test]
    fn test_minimality_drops_superset_without_gain() {
        let candidates = vec![
            candidate(vec![1], 1.0),
            candidate(vec![1, 2], 1.0),
            candidate(vec![1, 3], 0.5),
        ];
        let keep = minimality_mask(&candidates);
        assert_eq!(keep, vec![true, false, true]);
    }

    #[test]
    fn test_minimality_keeps_superset_with_confidence_gain() {
        let candidates = vec![candidate(vec![1], 0.5), candidate(vec![1, 2], 0.9)];
        let keep = minimality_mask(&candidates);
        assert_eq!(keep, vec![true, true]);
    }

    #[test]
    fn test_minimality_is_per_consequent_group() {
        let mut other_group = candidate(vec![1, 2], 0.4);
        other_group.consequents = vec![SymbolId::from_index(9)];
        let candidates = vec![candidate(vec![1], 1.0), other_group];
        let keep = minimality_mask(&candidates);
        assert_eq!(keep, vec![true, true]);
    }

    #[test]
    fn test_minimality_chain_of_subsets() {
        // {1} at 0.8 shadows {1,2} at 0.8 which would shadow {1,2,3};
        // the survivor set is exactly the minimal frontier
        let candidates = vec![
            candidate(vec![1], 0.8),
            candidate(vec![1, 2], 0.8),
            candidate(vec![1, 2, 3], 0.9),
            candidate(vec![2, 3], 0.1),
        ];
        let keep = minimality_mask(&candidates);
        assert_eq!(keep, vec![true, false, true, true]);
    }

    #[test]
    fn test_empty_antecedents_shadow_weaker_rules() {
        let candidates = vec![candidate(vec![], 0.6), candidate(vec![1], 0.5)];
        let keep = minimality_mask(&candidates);
        assert_eq!(keep, vec![true, false]);
    }

    #[test]
    fn test_query_validation() {
        assert!(RuleQuery::new().validate().is_ok());
        assert!(RuleQuery::new().with_min_occurrences(0).validate().is_err());
        assert!(RuleQuery::new().with_min_confidence(1.2).validate().is_err());
        assert!(RuleQuery::new()
            .with_min_confidence(0.9)
            .with_max_confidence(0.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
