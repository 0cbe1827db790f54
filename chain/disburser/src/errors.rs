//! Disburser-specific error types
//!
//! Error taxonomy for tree building, batch handling, the allowance bridge
//! and the claim engine.

use payout_types::address::Address;
use payout_types::hash::Hash256;
use payout_types::numeric::{Amount, Nonce};
use thiserror::Error;

/// Tree builder and proof generator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MerkleError {
    #[error("Empty batch: no leaves to build a tree from")]
    EmptyBatch,

    #[error("Duplicate leaf: positions {first} and {second} encode identical payouts")]
    DuplicateLeaf { first: usize, second: usize },

    #[error("Leaf not found: index {index} out of range for {leaf_count} leaves")]
    NotFound { index: usize, leaf_count: usize },
}

/// Batch authority errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Nonce {nonce} appears more than once in the batch")]
    DuplicateNonce { nonce: Nonce },

    #[error("No payout with nonce {nonce} in the batch")]
    UnknownNonce { nonce: Nonce },

    #[error("Artifact root mismatch: stored {expected}, recomputed {computed}")]
    ArtifactMismatch { expected: Hash256, computed: Hash256 },

    #[error("Artifact carries {actual} proofs for {expected} records")]
    ProofCountMismatch { expected: usize, actual: usize },

    #[error("Artifact serialization failed: {0}")]
    Serialization(String),
}

/// Custody allowance bridge errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllowanceError {
    #[error("Unauthorized: caller is not the vault")]
    Unauthorized,

    #[error("Allowance module is paused")]
    Paused,

    #[error("Unknown delegate: {delegate}")]
    UnknownDelegate { delegate: Address },

    #[error("Invalid delegate: the zero address cannot be a delegate")]
    InvalidDelegate,

    #[error("No allowance for delegate {delegate} on asset {asset}")]
    NoAllowance { delegate: Address, asset: Address },

    #[error("Insufficient allowance: requested {requested}, remaining {remaining}")]
    InsufficientAllowance { requested: Amount, remaining: Amount },

    #[error("Insufficient vault balance for {asset}: requested {requested}, available {available}")]
    InsufficientVaultBalance {
        asset: Address,
        requested: Amount,
        available: Amount,
    },

    #[error("Arithmetic overflow in allowance accounting")]
    Overflow,
}

/// Claim engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisburserError {
    #[error("Unauthorized: caller is not the owner")]
    Unauthorized,

    #[error("Invalid proof: leaf does not resolve to the current root")]
    InvalidProof,

    #[error("Payout already claimed: nonce {nonce}")]
    AlreadyClaimed { nonce: Nonce },

    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: AllowanceError },

    #[error("Engine lock poisoned")]
    LockPoisoned,
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(String),
}
