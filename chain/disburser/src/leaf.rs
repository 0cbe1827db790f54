//! Leaf Encoder: canonical byte layout of a payout
//!
//! Every field is fixed width, so the encoding is injective without any
//! length prefixes or delimiters:
//!
//! | format     | layout                                              | bytes |
//! |------------|-----------------------------------------------------|-------|
//! | `WithVault`| vault(20) ‖ asset(20) ‖ amount(32 BE) ‖ nonce(32 BE) | 104   |
//! | `Compact`  | asset(20) ‖ amount(32 BE) ‖ nonce(32 BE)            | 84    |
//!
//! `Compact` is the single-vault layout where the vault is implied by the
//! engine. Whoever builds the tree and whoever verifies claims must agree on
//! the format, otherwise every proof silently fails.

use serde::{Deserialize, Serialize};
use std::fmt;

use payout_types::address::{Address, ADDRESS_LEN};
use payout_types::hash::Hash256;
use payout_types::numeric::{to_be_bytes32, Amount, Nonce};
use payout_types::payout::PayoutRecord;

use crate::merkle::MerkleHasher;

/// Encoded length of a `Compact` leaf.
pub const COMPACT_LEAF_LEN: usize = ADDRESS_LEN + 32 + 32;

/// Encoded length of a `WithVault` leaf.
pub const WITH_VAULT_LEAF_LEN: usize = ADDRESS_LEN + COMPACT_LEAF_LEN;

/// Which fields go into a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafFormat {
    /// Vault address included; supports batches spanning several vaults
    #[default]
    WithVault,
    /// Asset, amount and nonce only
    Compact,
}

/// Canonical encoding of one payout, ready to be hashed as a tree leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedLeaf(Vec<u8>);

impl EncodedLeaf {
    /// Encode a payout record in the given format.
    pub fn encode(record: &PayoutRecord, format: LeafFormat) -> Self {
        match format {
            LeafFormat::WithVault => Self::with_vault(record),
            LeafFormat::Compact => Self::compact(&record.asset, &record.amount, &record.nonce),
        }
    }

    /// `vault ‖ asset ‖ amount ‖ nonce`
    pub fn with_vault(record: &PayoutRecord) -> Self {
        let mut bytes = Vec::with_capacity(WITH_VAULT_LEAF_LEN);
        bytes.extend_from_slice(record.recipient_vault.as_bytes());
        push_compact(&mut bytes, &record.asset, &record.amount, &record.nonce);
        Self(bytes)
    }

    /// `asset ‖ amount ‖ nonce`
    pub fn compact(asset: &Address, amount: &Amount, nonce: &Nonce) -> Self {
        let mut bytes = Vec::with_capacity(COMPACT_LEAF_LEN);
        push_compact(&mut bytes, asset, amount, nonce);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leaf hash `H(encoding)`.
    pub fn hash<H: MerkleHasher>(&self) -> Hash256 {
        H::hash(&self.0)
    }
}

impl AsRef<[u8]> for EncodedLeaf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EncodedLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

fn push_compact(bytes: &mut Vec<u8>, asset: &Address, amount: &Amount, nonce: &Nonce) {
    bytes.extend_from_slice(asset.as_bytes());
    bytes.extend_from_slice(&to_be_bytes32(amount));
    bytes.extend_from_slice(&to_be_bytes32(nonce));
}

/// Compact encoding of `(asset, amount, nonce)`, as produced by the
/// single-vault contract helper of the same name.
pub fn encode_transaction_data(asset: &Address, amount: &Amount, nonce: &Nonce) -> EncodedLeaf {
    EncodedLeaf::compact(asset, amount, nonce)
}
