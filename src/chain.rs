//! Chain manager: genesis bootstrap, serialized append, validation traversal
//!
//! Height is always derived from a live `count()` on the store; the chain
//! never caches an authoritative height across calls. Appends are serialized
//! behind a single async mutex so concurrent callers cannot race the
//! count/fetch/build/put sequence onto the same height.

use crate::block::{unix_time, Block, BlockBody};
use crate::error::{NotaryError, Result};
use crate::store::LedgerStore;
use tokio::sync::Mutex;

pub struct Chain {
    store: Box<dyn LedgerStore>,
    append_lock: Mutex<()>,
}

impl Chain {
    /// Open a chain over the given store, creating the genesis block if the
    /// store has none. The check is against key 0 itself rather than the
    /// entry count, so a partially initialized store is never given a second
    /// genesis.
    pub fn open(store: Box<dyn LedgerStore>) -> Result<Self> {
        let chain = Chain {
            store,
            append_lock: Mutex::new(()),
        };

        if chain.store.get(0)?.is_none() {
            let genesis = Block::genesis()?;
            chain.store.put(0, &genesis)?;
            tracing::info!(hash = %genesis.hash, "genesis block created");
        }

        Ok(chain)
    }

    /// Append a payload as the next block and return the persisted block.
    ///
    /// A genesis-tagged payload is persisted directly at key 0, bypassing
    /// chaining. Any other payload is chained onto the current tip; a
    /// missing predecessor is [`NotaryError::ChainCorruption`].
    pub async fn append(&self, body: BlockBody) -> Result<Block> {
        let _guard = self.append_lock.lock().await;

        if matches!(body, BlockBody::Marker(_)) {
            let block = Block::sealed(0, unix_time(), body, String::new())?;
            self.store.put(0, &block)?;
            return Ok(block);
        }

        let height = self.store.count()?;
        let previous = match height.checked_sub(1) {
            Some(prev_height) => self.store.get(prev_height)?.ok_or_else(|| {
                NotaryError::ChainCorruption(format!(
                    "store reports {} blocks but block {} is missing",
                    height, prev_height
                ))
            })?,
            None => {
                return Err(NotaryError::ChainCorruption(
                    "cannot append a claim to an empty ledger".to_string(),
                ))
            }
        };

        let block = Block::sealed(height, unix_time(), body, previous.hash.clone())?;
        self.store.put(height, &block)?;
        tracing::info!(height, hash = %block.hash, "block appended");
        Ok(block)
    }

    /// Number of persisted blocks; also the next height to assign.
    pub fn height_count(&self) -> Result<u64> {
        self.store.count()
    }

    pub fn get_by_height(&self, height: u64) -> Result<Option<Block>> {
        self.store.get(height)
    }

    /// Full scan; returns the first block whose stored hash matches.
    pub fn get_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        Ok(self
            .store
            .scan()?
            .into_iter()
            .map(|(_, block)| block)
            .find(|block| block.hash == hash))
    }

    /// Every claim block owned by `address`, ascending by height.
    pub fn get_by_owner(&self, address: &str) -> Result<Vec<Block>> {
        let mut blocks: Vec<Block> = self
            .store
            .scan()?
            .into_iter()
            .map(|(_, block)| block)
            .filter(|block| block.owner_address() == Some(address))
            .collect();
        blocks.sort_by_key(|block| block.height);
        Ok(blocks)
    }

    /// True iff the block at `height` exists and its stored hash matches the
    /// recomputed digest.
    pub fn validate_block_at(&self, height: u64) -> Result<bool> {
        match self.store.get(height)? {
            Some(block) => Ok(block.digest()? == block.hash),
            None => Ok(false),
        }
    }

    /// Walk the whole chain and report every failed check. The own-hash
    /// check and the link check are independent detectors: the link check
    /// compares the stored `previousBlockHash` against the predecessor's
    /// hash as persisted, not recomputed. Does not short-circuit, so
    /// multiple independent tamperings all appear in one report.
    pub fn validate_chain(&self) -> Result<Vec<String>> {
        let count = self.store.count()?;
        let mut report = Vec::new();

        for height in 0..count {
            if !self.validate_block_at(height)? {
                report.push(format!("Block @ height {}", height));
            }

            if height > 0 {
                let current = self.store.get(height)?;
                let previous = self.store.get(height - 1)?;
                let linked = match (&current, &previous) {
                    (Some(current), Some(previous)) => {
                        current.previous_block_hash == previous.hash
                    }
                    _ => false,
                };
                if !linked {
                    report.push(format!("Block {} link to Block {}", height, height - 1));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ClaimRecord, StarRecord};
    use crate::store::MemoryStore;

    fn claim(address: &str, story: &str) -> BlockBody {
        BlockBody::Claim(ClaimRecord {
            address: address.to_string(),
            star: StarRecord {
                ra: "16h 29m 1.0s".to_string(),
                dec: "68 52 56.9".to_string(),
                mag: None,
                cen: None,
                story: hex::encode(story),
            },
        })
    }

    fn open_chain() -> (Chain, MemoryStore) {
        let store = MemoryStore::new();
        let chain = Chain::open(Box::new(store.clone())).unwrap();
        (chain, store)
    }

    #[tokio::test]
    async fn test_bootstrap_creates_single_genesis() {
        let (chain, store) = open_chain();
        assert_eq!(chain.height_count().unwrap(), 1);

        let genesis = store.get(0).unwrap().unwrap();
        assert!(genesis.is_genesis());

        // Re-opening an already-populated store must not add a second genesis.
        let reopened = Chain::open(Box::new(store.clone())).unwrap();
        assert_eq!(reopened.height_count().unwrap(), 1);
        assert_eq!(store.get(0).unwrap().unwrap(), genesis);
    }

    #[tokio::test]
    async fn test_appends_are_strictly_sequential() {
        let (chain, _store) = open_chain();

        for i in 0..4u64 {
            let block = chain.append(claim("a1", &format!("star {}", i))).await.unwrap();
            assert_eq!(block.height, i + 1);
        }

        assert_eq!(chain.height_count().unwrap(), 5);
        for h in 1..5u64 {
            let block = chain.get_by_height(h).unwrap().unwrap();
            let prev = chain.get_by_height(h - 1).unwrap().unwrap();
            assert_eq!(block.previous_block_hash, prev.hash);
        }
    }

    #[tokio::test]
    async fn test_append_fails_on_missing_predecessor() {
        let (chain, store) = open_chain();
        chain.append(claim("a1", "one")).await.unwrap();

        // Fake a store that claims 3 entries but is missing height 2.
        let filler = store.get(1).unwrap().unwrap();
        store.put(5, &filler).unwrap();

        let err = chain.append(claim("a1", "two")).await.unwrap_err();
        assert!(matches!(err, NotaryError::ChainCorruption(_)));
    }

    #[tokio::test]
    async fn test_get_by_hash_and_owner() {
        let (chain, _store) = open_chain();
        let b1 = chain.append(claim("alice", "first")).await.unwrap();
        let b2 = chain.append(claim("bob", "second")).await.unwrap();
        let b3 = chain.append(claim("alice", "third")).await.unwrap();

        assert_eq!(chain.get_by_hash(&b2.hash).unwrap().unwrap(), b2);
        assert!(chain.get_by_hash(&"00".repeat(32)).unwrap().is_none());

        let alice_blocks = chain.get_by_owner("alice").unwrap();
        assert_eq!(alice_blocks, vec![b1, b3]);
        assert!(chain.get_by_owner("carol").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_detects_tampered_body() {
        let (chain, store) = open_chain();
        chain.append(claim("a1", "original story")).await.unwrap();

        assert!(chain.validate_block_at(1).unwrap());
        assert!(chain.validate_chain().unwrap().is_empty());

        let mut tampered = store.get(1).unwrap().unwrap();
        tampered.body = claim("a1", "rewritten story");
        store.put(1, &tampered).unwrap();

        assert!(!chain.validate_block_at(1).unwrap());
        let report = chain.validate_chain().unwrap();
        assert_eq!(report, vec!["Block @ height 1".to_string()]);
    }

    #[tokio::test]
    async fn test_validate_reports_link_failures_independently() {
        let (chain, store) = open_chain();
        chain.append(claim("a1", "one")).await.unwrap();
        chain.append(claim("a1", "two")).await.unwrap();

        // Corrupting the stored hash of the genesis block breaks both its
        // own-hash check and block 1's forward link, but not block 2's.
        let mut genesis = store.get(0).unwrap().unwrap();
        genesis.hash = "00".repeat(32);
        store.put(0, &genesis).unwrap();

        let report = chain.validate_chain().unwrap();
        assert_eq!(
            report,
            vec![
                "Block @ height 0".to_string(),
                "Block 1 link to Block 0".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_genesis_payload_bypasses_chaining() {
        let (chain, store) = open_chain();
        chain.append(claim("a1", "one")).await.unwrap();

        let replacement = chain
            .append(BlockBody::Marker("Genesis".to_string()))
            .await
            .unwrap();
        assert_eq!(replacement.height, 0);
        assert_eq!(store.get(0).unwrap().unwrap(), replacement);
        assert_eq!(chain.height_count().unwrap(), 2);
    }
}
