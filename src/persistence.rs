//! Versioned binary persistence of the whole database.
//!
//! Blob layout, all integers little-endian:
//!
//! ```text
//! magic "AMBR" | schema version u32
//! config section: u32 length + JSON
//! symbol table:  u32 count, then per symbol u32 key length + key bytes
//! common sense:  u32 count, then per entry two u32-prefixed id lists
//! transactions:  u64
//! trie:          u32 root child count, then preorder records of
//!                (symbol id u32, occurrences u64, child count u32)
//! ```
//!
//! The symbol table is written in id order, so loading re-interns the
//! exact same ids and every stored path stays valid. Loading a blob
//! with an unknown schema version fails; so does any truncated or
//! inconsistent buffer.

use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::symbols::SymbolId;
use crate::trie::{NodeId, Trie};

pub(crate) const MAGIC: [u8; 4] = *b"AMBR";
pub(crate) const SCHEMA_VERSION: u32 = 1;

pub(crate) fn to_bytes(database: &Database) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());

    let config = serde_json::to_vec(database.config())?;
    write_u32(&mut out, config.len() as u32);
    out.extend_from_slice(&config);

    let symbols = database.symbols();
    write_u32(&mut out, symbols.len() as u32);
    for (_, key, _) in symbols.iter() {
        write_u32(&mut out, key.len() as u32);
        out.extend_from_slice(key);
    }

    let common_sense = database.common_sense();
    write_u32(&mut out, common_sense.len() as u32);
    for rule in common_sense.iter() {
        write_ids(&mut out, rule.antecedents());
        write_ids(&mut out, rule.consequents());
    }

    let trie = database.trie();
    out.extend_from_slice(&trie.transaction_count().to_le_bytes());
    write_subtree(&mut out, trie, Trie::ROOT);
    Ok(out)
}

pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Database> {
    let mut reader = Reader::new(bytes);
    let magic = reader.take(4)?;
    if magic != MAGIC {
        return Err(DatabaseError::SchemaMismatch(
            "bad magic, not a minero database blob".to_string(),
        ));
    }
    let version = reader.u32()?;
    if version != SCHEMA_VERSION {
        return Err(DatabaseError::SchemaMismatch(format!(
            "unsupported schema version {version}, expected {SCHEMA_VERSION}"
        )));
    }

    let config_len = reader.u32()? as usize;
    let config_bytes = reader.take(config_len)?;
    let config = serde_json::from_slice(config_bytes)
        .map_err(|err| DatabaseError::SchemaMismatch(format!("corrupt config section: {err}")))?;
    let mut database = Database::new(config)?;

    let symbol_count = reader.u32()? as usize;
    let mut keys = Vec::with_capacity(symbol_count);
    for _ in 0..symbol_count {
        let key_len = reader.u32()? as usize;
        keys.push(reader.take(key_len)?.to_vec());
    }
    database.restore_symbols(&keys)?;

    let rule_count = reader.u32()? as usize;
    for _ in 0..rule_count {
        let antecedents = read_ids(&mut reader, symbol_count)?;
        let consequents = read_ids(&mut reader, symbol_count)?;
        database.restore_common_sense_rule(antecedents, consequents);
    }

    let transactions = reader.u64()?;
    database.trie_mut().record_transactions(transactions);
    read_subtree(&mut reader, &mut database, symbol_count)?;
    if !reader.is_empty() {
        return Err(DatabaseError::SchemaMismatch(
            "trailing bytes after trie section".to_string(),
        ));
    }
    Ok(database)
}

/// Preorder-emit the subtree below `root`, children sorted by symbol
/// id so equal databases produce identical bytes.
fn write_subtree(out: &mut Vec<u8>, trie: &Trie, root: NodeId) {
    let sorted_children = |id: NodeId| {
        let mut children: Vec<(SymbolId, NodeId)> = trie.node(id).children().collect();
        children.sort_by_key(|(symbol, _)| *symbol);
        children
    };

    write_u32(out, trie.node(root).child_count() as u32);
    let mut stack = sorted_children(root);
    stack.reverse();
    while let Some((symbol, id)) = stack.pop() {
        let node = trie.node(id);
        write_u32(out, symbol.raw());
        out.extend_from_slice(&node.occurrences.to_le_bytes());
        write_u32(out, node.child_count() as u32);
        let mut children = sorted_children(id);
        children.reverse();
        stack.extend(children);
    }
}

fn read_subtree(reader: &mut Reader, database: &mut Database, symbol_count: usize) -> Result<()> {
    let consequent_count = database.consequent_ids().len();
    let root_children = reader.u32()?;
    let mut stack: Vec<(NodeId, u32)> = vec![(Trie::ROOT, root_children)];
    while let Some((parent, remaining)) = stack.last_mut() {
        if *remaining == 0 {
            stack.pop();
            continue;
        }
        *remaining -= 1;
        let parent = *parent;

        let symbol = read_symbol(reader, symbol_count)?;
        let occurrences = reader.u64()?;
        let child_count = reader.u32()?;
        let is_consequent = symbol.index() < consequent_count;
        let node = database
            .trie_mut()
            .get_or_create_child(parent, symbol, is_consequent);
        database.trie_mut().add_occurrences(node, occurrences);
        if child_count > 0 {
            stack.push((node, child_count));
        }
    }
    Ok(())
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_ids(out: &mut Vec<u8>, ids: &[SymbolId]) {
    write_u32(out, ids.len() as u32);
    for id in ids {
        write_u32(out, id.raw());
    }
}

fn read_ids(reader: &mut Reader, symbol_count: usize) -> Result<Vec<SymbolId>> {
    let count = reader.u32()? as usize;
    let mut ids = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        ids.push(read_symbol(reader, symbol_count)?);
    }
    Ok(ids)
}

fn read_symbol(reader: &mut Reader, symbol_count: usize) -> Result<SymbolId> {
    let raw = reader.u32()? as usize;
    if raw >= symbol_count {
        return Err(DatabaseError::SchemaMismatch(format!(
            "symbol id {raw} exceeds the symbol table ({symbol_count} entries)"
        )));
    }
    Ok(SymbolId::from_index(raw))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DatabaseError::SchemaMismatch(
                "unexpected end of database blob".to_string(),
            )),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(array))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_underrun() {
        let mut reader = Reader::new(&[1, 2]);
        assert!(matches!(
            reader.u32(),
            Err(DatabaseError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_reader_sequencing() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 7);
        bytes.extend_from_slice(&9u64.to_le_bytes());
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.u32().unwrap(), 7);
        assert_eq!(reader.u64().unwrap(), 9);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let err = from_bytes(b"NOPE\x01\x00\x00\x00").unwrap_err();
        assert!(matches!(err, DatabaseError::SchemaMismatch(_)));
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        write_u32(&mut bytes, 99);
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DatabaseError::SchemaMismatch(_)));
        assert!(err.to_string().contains("99"));
    }
}
