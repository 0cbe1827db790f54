//! Merkle Tree Builder: pair-sorted binary tree over encoded payouts
//!
//! Construction rules:
//! - Leaf hash is `H(encoded_leaf)`.
//! - Internal node is `H(min(a, b) ‖ max(a, b))`, so a verifier only needs
//!   the sibling digest, never its side.
//! - An unpaired trailing node is promoted to the next level unchanged.
//! - A single leaf is its own root.
//!
//! The default hasher is Keccak-256, which yields roots an EVM verifier
//! using sorted-pair hashing accepts. SHA-256 is available for off-chain
//! deployments.

use sha2::Sha256;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::debug;

use payout_types::hash::Hash256;

use crate::errors::MerkleError;
use crate::leaf::EncodedLeaf;

/// Hash function used for leaves and internal nodes.
pub trait MerkleHasher {
    /// Short name for logs and artifacts
    const NAME: &'static str;

    /// Hash arbitrary bytes into a digest.
    fn hash(data: &[u8]) -> Hash256;

    /// Commutative node hash: `H(min(a, b) ‖ max(a, b))`.
    fn hash_pair(a: &Hash256, b: &Hash256) -> Hash256 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(lo.as_bytes());
        data[32..].copy_from_slice(hi.as_bytes());
        Self::hash(&data)
    }
}

/// Keccak-256 (the EVM `keccak256`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keccak256Hasher;

impl MerkleHasher for Keccak256Hasher {
    const NAME: &'static str = "keccak256";

    fn hash(data: &[u8]) -> Hash256 {
        let digest: [u8; 32] = Keccak256::digest(data).into();
        Hash256::new(digest)
    }
}

/// SHA-256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl MerkleHasher for Sha256Hasher {
    const NAME: &'static str = "sha256";

    fn hash(data: &[u8]) -> Hash256 {
        let digest: [u8; 32] = Sha256::digest(data).into();
        Hash256::new(digest)
    }
}

/// Hash two nodes with the default hasher.
pub fn hash_pair(a: &Hash256, b: &Hash256) -> Hash256 {
    Keccak256Hasher::hash_pair(a, b)
}

/// A fully built tree. All levels are retained for proof queries.
#[derive(Debug, Clone)]
pub struct MerkleTree<H: MerkleHasher = Keccak256Hasher> {
    leaves: Vec<EncodedLeaf>,
    /// `levels[0]` holds leaf hashes, the last level holds only the root
    levels: Vec<Vec<Hash256>>,
    root: Hash256,
    _hasher: PhantomData<H>,
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Build a tree over an ordered batch of leaves.
    ///
    /// Fails on an empty batch and on any two byte-identical leaves: the
    /// engine could only ever honor one of them.
    pub fn build(leaves: &[EncodedLeaf]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyBatch);
        }

        let mut seen: HashMap<&[u8], usize> = HashMap::with_capacity(leaves.len());
        for (index, leaf) in leaves.iter().enumerate() {
            if let Some(&first) = seen.get(leaf.as_bytes()) {
                return Err(MerkleError::DuplicateLeaf {
                    first,
                    second: index,
                });
            }
            seen.insert(leaf.as_bytes(), index);
        }

        let mut levels = vec![leaves.iter().map(|l| l.hash::<H>()).collect::<Vec<_>>()];
        loop {
            let current = match levels.last() {
                Some(level) if level.len() > 1 => level,
                _ => break,
            };
            let next = next_level::<H>(current);
            levels.push(next);
        }

        let root = levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .ok_or(MerkleError::EmptyBatch)?;

        debug!(
            hasher = H::NAME,
            leaf_count = leaves.len(),
            depth = levels.len() - 1,
            root = %root,
            "Merkle tree built"
        );

        Ok(Self {
            leaves: leaves.to_vec(),
            levels,
            root,
            _hasher: PhantomData,
        })
    }

    pub fn root(&self) -> Hash256 {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaves(&self) -> &[EncodedLeaf] {
        &self.leaves
    }

    pub fn levels(&self) -> &[Vec<Hash256>] {
        &self.levels
    }

    pub fn leaf_hash(&self, index: usize) -> Option<Hash256> {
        self.levels[0].get(index).copied()
    }

    /// Position of a leaf in the batch.
    pub fn position(&self, leaf: &EncodedLeaf) -> Option<usize> {
        self.leaves.iter().position(|l| l == leaf)
    }
}

fn next_level<H: MerkleHasher>(level: &[Hash256]) -> Vec<Hash256> {
    level
        .chunks(2)
        .map(|pair| match pair.get(1) {
            Some(right) => H::hash_pair(&pair[0], right),
            None => pair[0],
        })
        .collect()
}
