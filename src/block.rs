//! Block model: canonical representation and digest of a ledger entry
//!
//! Field order of [`Block`] is fixed by the struct declaration and is the
//! canonical hashing order. The digest covers every field except `hash`,
//! which is serialized as the empty string in the pre-image.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Body marker of the first block in the ledger.
pub const GENESIS_MARKER: &str = "Genesis";

/// Current wall-clock time in whole seconds since the Unix epoch.
pub(crate) fn unix_time() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// A registered star. `story` is held hex-encoded once admitted; the decoded
/// text is only materialized on API responses, never persisted or hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarRecord {
    pub ra: String,
    pub dec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cen: Option<String>,
    pub story: String,
}

/// An ownership claim: the owner's wallet address plus the star data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub address: String,
    pub star: StarRecord,
}

/// Block payload: either the genesis marker string or a claim record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockBody {
    Claim(ClaimRecord),
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub height: u64,
    pub time: u64,
    pub body: BlockBody,
    pub previous_block_hash: String,
    pub hash: String,
}

impl Block {
    /// Build a block and seal it with its own digest.
    pub fn sealed(
        height: u64,
        time: u64,
        body: BlockBody,
        previous_block_hash: String,
    ) -> Result<Self> {
        let mut block = Block {
            height,
            time,
            body,
            previous_block_hash,
            hash: String::new(),
        };
        block.hash = block.digest()?;
        Ok(block)
    }

    /// The genesis block: height 0, no predecessor, fixed marker body.
    pub fn genesis() -> Result<Self> {
        Self::sealed(
            0,
            unix_time(),
            BlockBody::Marker(GENESIS_MARKER.to_string()),
            String::new(),
        )
    }

    /// Deterministic JSON pre-image: all fields in declaration order with
    /// `hash` cleared.
    pub fn canonical_json(&self) -> Result<String> {
        let mut pre_image = self.clone();
        pre_image.hash = String::new();
        Ok(serde_json::to_string(&pre_image)?)
    }

    /// Hex SHA-256 over the canonical JSON pre-image.
    pub fn digest(&self) -> Result<String> {
        let canonical = self.canonical_json()?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.body, BlockBody::Marker(_))
    }

    /// The claiming wallet address, if this block carries a claim.
    pub fn owner_address(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Claim(claim) => Some(&claim.address),
            BlockBody::Marker(_) => None,
        }
    }
}
