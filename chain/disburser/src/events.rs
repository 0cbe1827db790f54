//! Contract events
//!
//! Immutable records emitted by the engine and the allowance module. Each
//! component keeps its own append-only log and exposes `events()` /
//! `drain_events()`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use payout_types::address::Address;
use payout_types::hash::Hash256;
use payout_types::numeric::{Amount, Nonce};

/// A new root replaced the current one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPublished {
    pub previous: Option<Hash256>,
    pub root: Hash256,
    pub publisher: Address,
}

/// A payout was claimed and its transfer executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutClaimed {
    pub claim_id: Uuid,
    pub asset: Address,
    pub amount: Amount,
    pub nonce: Nonce,
    pub recipient: Address,
}

/// Engine ownership handed over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferred {
    pub previous: Address,
    pub new_owner: Address,
}

/// Delegate registered with the allowance module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateAdded {
    pub delegate: Address,
}

/// Delegate and all of its allowances removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateRemoved {
    pub delegate: Address,
}

/// Allowance cap set or changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSet {
    pub delegate: Address,
    pub asset: Address,
    pub amount: Amount,
    pub reset_time_min: u64,
}

/// Spent counter of an allowance cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceReset {
    pub delegate: Address,
    pub asset: Address,
}

/// Allowance removed entirely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceDeleted {
    pub delegate: Address,
    pub asset: Address,
}

/// A delegate moved funds out of the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferExecuted {
    pub transfer_id: Uuid,
    pub delegate: Address,
    pub asset: Address,
    pub amount: Amount,
    pub to: Address,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    RootPublished(RootPublished),
    PayoutClaimed(PayoutClaimed),
    OwnershipTransferred(OwnershipTransferred),
    DelegateAdded(DelegateAdded),
    DelegateRemoved(DelegateRemoved),
    AllowanceSet(AllowanceSet),
    AllowanceReset(AllowanceReset),
    AllowanceDeleted(AllowanceDeleted),
    TransferExecuted(TransferExecuted),
}
