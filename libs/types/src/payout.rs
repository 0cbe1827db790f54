//! Payout record: the unit of value committed to by a Merkle root

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::numeric::{Amount, Nonce};

/// One pre-committed disbursement from a vault.
///
/// Created by the batch authority and never mutated afterwards. Two records
/// are distinguished only by their fields, so the authority must never
/// reuse a nonce over the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutRecord {
    /// Vault the funds are drawn from
    pub recipient_vault: Address,
    /// Asset address (zero = native currency)
    pub asset: Address,
    /// Amount in the asset's smallest unit
    pub amount: Amount,
    /// Replay-protection nonce
    pub nonce: Nonce,
}

impl PayoutRecord {
    pub fn new(
        recipient_vault: Address,
        asset: Address,
        amount: Amount,
        nonce: impl Into<Nonce>,
    ) -> Self {
        Self {
            recipient_vault,
            asset,
            amount,
            nonce: nonce.into(),
        }
    }

    /// A payout of native currency.
    pub fn native(recipient_vault: Address, amount: Amount, nonce: impl Into<Nonce>) -> Self {
        Self::new(recipient_vault, Address::ZERO, amount, nonce)
    }

    /// True when the payout moves native currency rather than a token.
    pub fn is_native(&self) -> bool {
        self.asset.is_native()
    }
}
