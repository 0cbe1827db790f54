//! Merkle-Proof-Gated Disbursement Engine
//!
//! A batch authority commits to a set of payouts by publishing a single
//! Merkle root. Claimants then pull individual payouts by presenting the
//! payout fields and an inclusion proof; the engine verifies the proof,
//! consumes the payout's nonce and draws the funds from the vault through
//! a capped delegate allowance.
//!
//! # Modules
//! - `leaf`: Canonical payout encoding
//! - `merkle`: Hashers and the sorted-pair tree builder
//! - `proof`: Inclusion proof generation and verification
//! - `batch`: The batch authority's payout set and its JSON artifact
//! - `engine`: Root publication and proof-gated claims
//! - `allowance`: Vault delegate/allowance model and the `CustodyBridge` seam
//! - `shared`: Thread-safe engine handle
//! - `config`: Nonce policy and leaf format selection
//! - `security`: Ownership, pause switch, nonce set
//! - `events`: Event log entries
//! - `errors`: Error taxonomy
//!
//! # Version
//! v0.1.0

pub mod allowance;
pub mod batch;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod leaf;
pub mod merkle;
pub mod proof;
pub mod security;
pub mod shared;

pub use allowance::{AllowanceModule, CustodyBridge, TransferReceipt};
pub use batch::{BatchArtifact, PayoutBatch};
pub use config::{DisburserConfig, NoncePolicy};
pub use engine::{ClaimReceipt, ClaimRequest, Disburser};
pub use leaf::{EncodedLeaf, LeafFormat};
pub use merkle::{Keccak256Hasher, MerkleHasher, MerkleTree, Sha256Hasher};
pub use proof::MerkleProof;
pub use shared::SharedDisburser;

/// Leaf encoding version. Roots built under one version never verify
/// under another.
pub const LEAF_ENCODING_VERSION: &str = "1.0.0";
