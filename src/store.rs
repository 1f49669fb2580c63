//! Durable key-value persistence for ledger blocks
//!
//! The store is keyed by block height. Absence of a key is reported as
//! `None`, never as an error; only medium failures surface as
//! [`NotaryError::Store`].

use crate::block::Block;
use crate::error::{NotaryError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Abstraction for ledger persistence backends. `count()` doubles as the
/// next height to assign, since heights start at 0 with no gaps.
pub trait LedgerStore: Send + Sync {
    fn put(&self, height: u64, block: &Block) -> Result<()>;
    fn get(&self, height: u64) -> Result<Option<Block>>;
    fn count(&self) -> Result<u64>;
    /// Every persisted entry; iteration order is unspecified.
    fn scan(&self) -> Result<Vec<(u64, Block)>>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| NotaryError::Store(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                height INTEGER PRIMARY KEY,
                record TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| NotaryError::Store(format!("Failed to create blocks table: {}", e)))?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| NotaryError::Store("Mutex poisoned".to_string()))
    }
}

impl LedgerStore for SqliteStore {
    fn put(&self, height: u64, block: &Block) -> Result<()> {
        let record = serde_json::to_string(block)
            .map_err(|e| NotaryError::Store(format!("Failed to serialize block: {}", e)))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO blocks (height, record) VALUES (?1, ?2)",
            params![height as i64, record],
        )
        .map_err(|e| NotaryError::Store(format!("Failed to save block {}: {}", height, e)))?;

        Ok(())
    }

    fn get(&self, height: u64) -> Result<Option<Block>> {
        let conn = self.conn()?;
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM blocks WHERE height = ?1",
                params![height as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| NotaryError::Store(format!("Failed to read block {}: {}", height, e)))?;

        match record {
            Some(record) => {
                let block: Block = serde_json::from_str(&record).map_err(|e| {
                    NotaryError::Store(format!("Failed to deserialize block {}: {}", height, e))
                })?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
            .map_err(|e| NotaryError::Store(format!("Failed to count blocks: {}", e)))?;
        Ok(count as u64)
    }

    fn scan(&self) -> Result<Vec<(u64, Block)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT height, record FROM blocks")
            .map_err(|e| NotaryError::Store(format!("Failed to prepare scan: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let height: i64 = row.get(0)?;
                let record: String = row.get(1)?;
                Ok((height, record))
            })
            .map_err(|e| NotaryError::Store(format!("Failed to scan blocks: {}", e)))?;

        let mut entries = Vec::new();
        for row_result in rows {
            let (height, record) = row_result
                .map_err(|e| NotaryError::Store(format!("Failed to read row: {}", e)))?;
            let block: Block = serde_json::from_str(&record).map_err(|e| {
                NotaryError::Store(format!("Failed to deserialize block {}: {}", height, e))
            })?;
            entries.push((height as u64, block));
        }
        Ok(entries)
    }
}

/// Simple in-memory store useful for tests and ephemeral runs. Clones share
/// the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blocks: Arc<Mutex<BTreeMap<u64, Block>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blocks(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, Block>>> {
        self.blocks
            .lock()
            .map_err(|_| NotaryError::Store("Mutex poisoned".to_string()))
    }
}

impl LedgerStore for MemoryStore {
    fn put(&self, height: u64, block: &Block) -> Result<()> {
        self.blocks()?.insert(height, block.clone());
        Ok(())
    }

    fn get(&self, height: u64) -> Result<Option<Block>> {
        Ok(self.blocks()?.get(&height).cloned())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.blocks()?.len() as u64)
    }

    fn scan(&self) -> Result<Vec<(u64, Block)>> {
        Ok(self
            .blocks()?
            .iter()
            .map(|(height, block)| (*height, block.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(store: &dyn LedgerStore) {
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get(0).unwrap().is_none());

        let genesis = Block::genesis().unwrap();
        store.put(0, &genesis).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(0).unwrap().unwrap(), genesis);
        assert!(store.get(1).unwrap().is_none());

        let entries = store.scan().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 0);
        assert_eq!(entries[0].1, genesis);
    }

    #[test]
    fn test_memory_store_round_trip() {
        round_trip(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        round_trip(&SqliteStore::open(":memory:").unwrap());
    }

    #[test]
    fn test_put_overwrites_existing_height() {
        let store = SqliteStore::open(":memory:").unwrap();
        let genesis = Block::genesis().unwrap();
        store.put(0, &genesis).unwrap();

        let mut tampered = genesis.clone();
        tampered.hash = "00".repeat(32);
        store.put(0, &tampered).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(0).unwrap().unwrap().hash, tampered.hash);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let view = store.clone();
        store.put(0, &Block::genesis().unwrap()).unwrap();
        assert_eq!(view.count().unwrap(), 1);
    }
}
