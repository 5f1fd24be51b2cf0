//! On-disk chain persistence.
//!
//! Layout under `storage_path/`:
//!
//! - `chain.json`: JSON array of blocks
//! - `pending_transactions.json`: JSON array of transactions
//! - `signer_key.json`: the ledger's Ed25519 seed, hex
//!
//! Writes go to a `.tmp` sibling first and land with an atomic rename, so a
//! crash mid-write can never leave a half-written chain behind.

use crate::domain::block::TrailBlock;
use crate::domain::keys::TrailSigner;
use crate::domain::transaction::TrailTransaction;
use crate::error::TrailError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const CHAIN_FILE: &str = "chain.json";
const PENDING_FILE: &str = "pending_transactions.json";
const SIGNER_FILE: &str = "signer_key.json";

#[derive(Serialize, Deserialize)]
struct PersistedKey {
    seed: String,
}

/// File-backed store for one chain.
#[derive(Debug, Clone)]
pub struct ChainStore {
    dir: PathBuf,
}

impl ChainStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn ensure_dir(&self) -> Result<(), TrailError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error(&self.dir, e))
    }

    /// Load the persisted chain. `Ok(None)` when no chain file exists yet;
    /// `Err` when the file exists but cannot be read or parsed.
    pub async fn load_chain(&self) -> Result<Option<Vec<TrailBlock>>, TrailError> {
        self.load_json(CHAIN_FILE).await
    }

    pub async fn save_chain(&self, blocks: &[TrailBlock]) -> Result<(), TrailError> {
        self.save_json(CHAIN_FILE, blocks).await
    }

    pub async fn load_pending(&self) -> Result<Option<Vec<TrailTransaction>>, TrailError> {
        self.load_json(PENDING_FILE).await
    }

    pub async fn save_pending(&self, pending: &[TrailTransaction]) -> Result<(), TrailError> {
        self.save_json(PENDING_FILE, pending).await
    }

    /// Load the ledger's signing identity, generating and persisting a new
    /// one when none exists.
    pub async fn load_or_generate_signer(&self) -> Result<TrailSigner, TrailError> {
        if let Some(persisted) = self.load_json::<PersistedKey>(SIGNER_FILE).await? {
            let bytes = hex::decode(&persisted.seed)
                .map_err(|e| TrailError::Serde(format!("signer seed: {}", e)))?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| TrailError::Serde("signer seed must be 32 bytes".to_string()))?;
            return Ok(TrailSigner::from_seed(seed));
        }

        let signer = TrailSigner::generate();
        self.save_json(
            SIGNER_FILE,
            &PersistedKey {
                seed: hex::encode(signer.seed()),
            },
        )
        .await?;
        debug!("generated fresh ledger signing key");
        Ok(signer)
    }

    async fn load_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, TrailError> {
        let path = self.dir.join(file);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| TrailError::Serde(format!("{}: {}", file, e)))
    }

    async fn save_json<T: Serialize + ?Sized>(
        &self,
        file: &str,
        value: &T,
    ) -> Result<(), TrailError> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        let raw =
            serde_json::to_vec_pretty(value).map_err(|e| TrailError::Serde(e.to_string()))?;

        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| self.io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| self.io_error(&path, e))
    }

    fn io_error(&self, path: &Path, error: std::io::Error) -> TrailError {
        TrailError::Io {
            path: path.display().to_string(),
            detail: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chain_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path().to_path_buf());
        store.ensure_dir().await.expect("dir");

        assert!(store.load_chain().await.expect("load").is_none());

        let blocks = vec![TrailBlock::genesis(2)];
        store.save_chain(&blocks).await.expect("save");
        let loaded = store.load_chain().await.expect("load").expect("present");
        assert_eq!(loaded, blocks);
        assert!(!dir.path().join("chain.json.tmp").exists(), "tmp renamed away");
    }

    #[tokio::test]
    async fn test_corrupt_chain_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path().to_path_buf());
        store.ensure_dir().await.expect("dir");

        tokio::fs::write(dir.path().join("chain.json"), b"{not json")
            .await
            .expect("write");
        assert!(store.load_chain().await.is_err());
    }

    #[tokio::test]
    async fn test_signer_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path().to_path_buf());
        store.ensure_dir().await.expect("dir");

        let first = store.load_or_generate_signer().await.expect("generate");
        let second = store.load_or_generate_signer().await.expect("reload");
        assert_eq!(first.seed(), second.seed());
    }
}
