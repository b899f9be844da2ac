//! Minero - association rule mining over categorical transactions
//!
//! This library ingests transactions (unordered sets of string items)
//! into a subset-counting trie and derives frequent itemsets, scored
//! association rules, and consequent predictions from it. Databases
//! built in separate processes can be merged, and the whole state
//! round-trips through a versioned byte blob.

pub mod codec;
pub mod common_sense;
pub mod config;
pub mod database;
pub mod error;
mod ingest;
pub mod itemsets;
mod merge;
pub mod normalize;
pub mod ordering;
mod persistence;
pub mod predict;
pub mod rules;
pub mod symbols;
pub mod trie;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{DatabaseError, Result};
pub use itemsets::{FrequentItemset, ItemsetQuery};
pub use predict::Prediction;
pub use rules::{Rule, RuleQuery};
