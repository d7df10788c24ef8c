//! Block files: JSON descriptions of full blocks or trusted headers.

use std::path::{Path, PathBuf};

use anyhow::Context;
use bitcoin::{BlockHash, TxMerkleNode, Txid};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zoro_merkle_proof::MemoryChain;

/// A block as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFile {
    /// Block hash
    pub hash: BlockHash,
    /// Merkle root from the block header, required for header-only entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<TxMerkleNode>,
    /// Transaction ids in block order, empty for header-only entries
    #[serde(default)]
    pub tx: Vec<Txid>,
}

/// Read a single block file
pub fn load_block_file(path: &Path) -> anyhow::Result<BlockFile> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read block file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse block file {}", path.display()))
}

/// Load block files in chain order into an in-memory chain
pub fn load_chain(paths: &[PathBuf]) -> anyhow::Result<MemoryChain> {
    let mut chain = MemoryChain::new();
    for path in paths {
        let BlockFile {
            hash,
            merkle_root,
            tx,
        } = load_block_file(path)?;

        if tx.is_empty() {
            let merkle_root = merkle_root.ok_or_else(|| {
                anyhow::anyhow!(
                    "{}: block has neither transactions nor a merkle root",
                    path.display()
                )
            })?;
            chain.push_header(hash, merkle_root);
            continue;
        }

        let tx_count = tx.len();
        let computed = chain.push_block(hash, tx)?;
        if let Some(expected) = merkle_root {
            if expected != computed {
                anyhow::bail!(
                    "{}: merkle root mismatch, header commits to {} but transactions hash to {}",
                    path.display(),
                    expected,
                    computed
                );
            }
        }
        debug!("Loaded block {} with {} transactions", hash, tx_count);
    }
    Ok(chain)
}
