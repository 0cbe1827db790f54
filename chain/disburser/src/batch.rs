//! Payout Batch: the batch authority's working set
//!
//! Validates a payout list, builds the tree over it and hands out proofs.
//! The batch is exported as a JSON artifact which the authority keeps for
//! as long as any payout in it may still be claimed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use payout_types::hash::Hash256;
use payout_types::numeric::Nonce;
use payout_types::payout::PayoutRecord;

use crate::errors::{BatchError, MerkleError};
use crate::leaf::{EncodedLeaf, LeafFormat};
use crate::merkle::{Keccak256Hasher, MerkleHasher, MerkleTree};
use crate::proof::{process_proof, MerkleProof};

/// Serialized form of a batch: root, records and one proof per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchArtifact {
    pub root: Hash256,
    #[serde(default)]
    pub leaf_format: LeafFormat,
    pub records: Vec<PayoutRecord>,
    pub proofs: Vec<MerkleProof>,
}

#[derive(Debug, Clone)]
pub struct PayoutBatch<H: MerkleHasher = Keccak256Hasher> {
    records: Vec<PayoutRecord>,
    leaf_format: LeafFormat,
    tree: MerkleTree<H>,
    by_nonce: HashMap<Nonce, usize>,
}

impl<H: MerkleHasher> PayoutBatch<H> {
    pub fn new(records: Vec<PayoutRecord>) -> Result<Self, BatchError> {
        Self::with_format(records, LeafFormat::default())
    }

    /// Build a batch whose leaves use `leaf_format`.
    ///
    /// Nonces must be unique within the batch. Uniqueness across batches is
    /// the authority's responsibility; the engine rejects any reuse at claim
    /// time.
    pub fn with_format(
        records: Vec<PayoutRecord>,
        leaf_format: LeafFormat,
    ) -> Result<Self, BatchError> {
        if records.is_empty() {
            return Err(MerkleError::EmptyBatch.into());
        }

        let mut by_nonce = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if by_nonce.insert(record.nonce, i).is_some() {
                return Err(BatchError::DuplicateNonce {
                    nonce: record.nonce,
                });
            }
        }

        let leaves: Vec<EncodedLeaf> = records
            .iter()
            .map(|r| EncodedLeaf::encode(r, leaf_format))
            .collect();
        let tree = MerkleTree::build(&leaves)?;

        info!(
            root = %tree.root(),
            payouts = records.len(),
            hasher = H::NAME,
            leaf_format = ?leaf_format,
            "Payout batch built"
        );

        Ok(Self {
            records,
            leaf_format,
            tree,
            by_nonce,
        })
    }

    /// Root to publish to the engine.
    pub fn root(&self) -> Hash256 {
        self.tree.root()
    }

    pub fn records(&self) -> &[PayoutRecord] {
        &self.records
    }

    pub fn tree(&self) -> &MerkleTree<H> {
        &self.tree
    }

    pub fn leaf_format(&self) -> LeafFormat {
        self.leaf_format
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_for_nonce(&self, nonce: &Nonce) -> Option<&PayoutRecord> {
        self.by_nonce.get(nonce).map(|&i| &self.records[i])
    }

    pub fn proof_for_index(&self, index: usize) -> Result<MerkleProof, BatchError> {
        Ok(self.tree.proof(index)?)
    }

    pub fn proof_for_nonce(&self, nonce: &Nonce) -> Result<MerkleProof, BatchError> {
        let index = self
            .by_nonce
            .get(nonce)
            .copied()
            .ok_or(BatchError::UnknownNonce { nonce: *nonce })?;
        self.proof_for_index(index)
    }

    /// Proofs for every record, in record order.
    pub fn proofs(&self) -> Result<Vec<MerkleProof>, BatchError> {
        (0..self.records.len())
            .map(|i| self.proof_for_index(i))
            .collect()
    }

    // ───────────────────────── Artifact ─────────────────────────

    pub fn to_artifact(&self) -> Result<BatchArtifact, BatchError> {
        Ok(BatchArtifact {
            root: self.root(),
            leaf_format: self.leaf_format,
            records: self.records.clone(),
            proofs: self.proofs()?,
        })
    }

    /// Rebuild a batch from an artifact, checking the stored root and every
    /// stored proof against the recomputed tree.
    pub fn from_artifact(artifact: BatchArtifact) -> Result<Self, BatchError> {
        let batch = Self::with_format(artifact.records, artifact.leaf_format)?;
        let computed = batch.root();
        if computed != artifact.root {
            return Err(BatchError::ArtifactMismatch {
                expected: artifact.root,
                computed,
            });
        }

        if artifact.proofs.len() != batch.len() {
            return Err(BatchError::ProofCountMismatch {
                expected: batch.len(),
                actual: artifact.proofs.len(),
            });
        }

        for (i, proof) in artifact.proofs.iter().enumerate() {
            let leaf_hash = batch.tree.leaf_hash(i).ok_or(MerkleError::NotFound {
                index: i,
                leaf_count: batch.len(),
            })?;
            let folded = process_proof::<H>(leaf_hash, proof);
            if folded != artifact.root {
                return Err(BatchError::ArtifactMismatch {
                    expected: artifact.root,
                    computed: folded,
                });
            }
        }
        Ok(batch)
    }

    pub fn to_json(&self) -> Result<String, BatchError> {
        let artifact = self.to_artifact()?;
        serde_json::to_string_pretty(&artifact)
            .map_err(|e| BatchError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, BatchError> {
        let artifact: BatchArtifact =
            serde_json::from_str(json).map_err(|e| BatchError::Serialization(e.to_string()))?;
        Self::from_artifact(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::Sha256Hasher;
    use crate::proof::verify;
    use payout_types::address::Address;
    use payout_types::numeric::{parse_ether, U256};

    fn vault() -> Address {
        Address::from_low_u64(0x5afe)
    }

    fn records() -> Vec<PayoutRecord> {
        ["0.0001", "0.0002", "0.0003", "0.0004", "0.0005"]
            .iter()
            .enumerate()
            .map(|(i, a)| PayoutRecord::native(vault(), parse_ether(a).unwrap(), (i + 1) as u64))
            .collect()
    }

    #[test]
    fn test_empty_batch_rejected() {
        let result = PayoutBatch::<Keccak256Hasher>::new(vec![]);
        assert_eq!(result.unwrap_err(), BatchError::Merkle(MerkleError::EmptyBatch));
    }

    #[test]
    fn test_duplicate_nonce_rejected() {
        let mut list = records();
        list[3].nonce = U256::from(2u64);
        let result = PayoutBatch::<Keccak256Hasher>::new(list);
        assert_eq!(
            result.unwrap_err(),
            BatchError::DuplicateNonce {
                nonce: U256::from(2u64)
            }
        );
    }

    #[test]
    fn test_proofs_verify_against_root() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        for (i, proof) in batch.proofs().unwrap().iter().enumerate() {
            let leaf_hash = batch.tree().leaf_hash(i).unwrap();
            assert!(verify::<Keccak256Hasher>(leaf_hash, proof, batch.root()));
        }
    }

    #[test]
    fn test_proof_for_nonce() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let by_nonce = batch.proof_for_nonce(&U256::from(3u64)).unwrap();
        assert_eq!(by_nonce, batch.proof_for_index(2).unwrap());
        assert_eq!(
            batch.proof_for_nonce(&U256::from(99u64)),
            Err(BatchError::UnknownNonce {
                nonce: U256::from(99u64)
            })
        );
        assert_eq!(
            batch.record_for_nonce(&U256::from(5u64)).map(|r| r.amount),
            Some(parse_ether("0.0005").unwrap())
        );
    }

    #[test]
    fn test_json_artifact_roundtrip() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let json = batch.to_json().unwrap();
        let loaded: PayoutBatch = PayoutBatch::from_json(&json).unwrap();
        assert_eq!(loaded.root(), batch.root());
        assert_eq!(loaded.records(), batch.records());
    }

    #[test]
    fn test_artifact_with_tampered_record() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let mut artifact = batch.to_artifact().unwrap();
        artifact.records[0].amount = parse_ether("1").unwrap();

        let result = PayoutBatch::<Keccak256Hasher>::from_artifact(artifact);
        assert!(matches!(result, Err(BatchError::ArtifactMismatch { .. })));
    }

    #[test]
    fn test_artifact_with_tampered_proof() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let mut artifact = batch.to_artifact().unwrap();
        artifact.proofs.swap(0, 1);

        let result = PayoutBatch::<Keccak256Hasher>::from_artifact(artifact);
        assert!(matches!(
            result,
            Err(BatchError::ArtifactMismatch { expected, .. }) if expected == batch.root()
        ));
    }

    #[test]
    fn test_artifact_with_missing_proofs() {
        let batch: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let mut artifact = batch.to_artifact().unwrap();
        artifact.proofs.truncate(3);
        let short = PayoutBatch::<Keccak256Hasher>::from_artifact(artifact.clone());
        assert_eq!(
            short.unwrap_err(),
            BatchError::ProofCountMismatch {
                expected: 5,
                actual: 3
            }
        );

        artifact.proofs.clear();
        let empty = PayoutBatch::<Keccak256Hasher>::from_artifact(artifact);
        assert!(matches!(empty, Err(BatchError::ProofCountMismatch { actual: 0, .. })));
    }

    #[test]
    fn test_malformed_json() {
        let result = PayoutBatch::<Keccak256Hasher>::from_json("{\"root\": 7}");
        assert!(matches!(result, Err(BatchError::Serialization(_))));
    }

    #[test]
    fn test_hasher_changes_root() {
        let keccak: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let sha = PayoutBatch::<Sha256Hasher>::new(records()).unwrap();
        assert_ne!(keccak.root(), sha.root());
    }

    #[test]
    fn test_leaf_format_changes_root() {
        let with_vault: PayoutBatch = PayoutBatch::new(records()).unwrap();
        let compact: PayoutBatch =
            PayoutBatch::with_format(records(), LeafFormat::Compact).unwrap();
        assert_ne!(with_vault.root(), compact.root());
        assert_eq!(compact.leaf_format(), LeafFormat::Compact);
    }
}
