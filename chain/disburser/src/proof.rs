//! Proof Generator and verifier
//!
//! A proof is the list of sibling digests on the path from a leaf to the
//! root, bottom-up. Levels where the path node was promoted unpaired
//! contribute no entry, so proofs can be shorter than the tree depth.

use serde::{Deserialize, Serialize};
use tracing::debug;

use payout_types::errors::ParseError;
use payout_types::hash::Hash256;

use crate::errors::MerkleError;
use crate::merkle::{MerkleHasher, MerkleTree};

/// Ordered sibling hashes from leaf level to just below the root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof(Vec<Hash256>);

impl MerkleProof {
    pub fn new(siblings: Vec<Hash256>) -> Self {
        Self(siblings)
    }

    /// Parse a proof from hex digests, e.g. as printed by a batch tool.
    pub fn from_hex<I, S>(siblings: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        siblings
            .into_iter()
            .map(|s| s.as_ref().parse::<Hash256>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn siblings(&self) -> &[Hash256] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Hash256> {
        self.0
    }

    /// Hex form of every sibling.
    pub fn to_hex(&self) -> Vec<String> {
        self.0.iter().map(|h| h.to_string()).collect()
    }
}

impl From<Vec<Hash256>> for MerkleProof {
    fn from(siblings: Vec<Hash256>) -> Self {
        Self(siblings)
    }
}

/// Derive the inclusion proof for the leaf at `leaf_index`.
pub fn prove_inclusion<H: MerkleHasher>(
    tree: &MerkleTree<H>,
    leaf_index: usize,
) -> Result<MerkleProof, MerkleError> {
    if leaf_index >= tree.leaf_count() {
        return Err(MerkleError::NotFound {
            index: leaf_index,
            leaf_count: tree.leaf_count(),
        });
    }

    let levels = tree.levels();
    let mut index = leaf_index;
    let mut siblings = Vec::with_capacity(tree.depth());

    for level in &levels[..levels.len() - 1] {
        if let Some(sibling) = level.get(index ^ 1) {
            siblings.push(*sibling);
        }
        index /= 2;
    }

    debug!(
        leaf_index,
        proof_len = siblings.len(),
        "Inclusion proof generated"
    );

    Ok(MerkleProof(siblings))
}

/// Fold a proof upward from a leaf hash, returning the candidate root.
pub fn process_proof<H: MerkleHasher>(leaf_hash: Hash256, proof: &MerkleProof) -> Hash256 {
    proof
        .siblings()
        .iter()
        .fold(leaf_hash, |acc, sibling| H::hash_pair(&acc, sibling))
}

/// True when `proof` takes `leaf_hash` to `root`.
pub fn verify<H: MerkleHasher>(leaf_hash: Hash256, proof: &MerkleProof, root: Hash256) -> bool {
    process_proof::<H>(leaf_hash, proof) == root
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Inclusion proof for the leaf at `leaf_index`.
    pub fn proof(&self, leaf_index: usize) -> Result<MerkleProof, MerkleError> {
        prove_inclusion(self, leaf_index)
    }
}
