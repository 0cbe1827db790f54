//! Shared security primitives for the engine and the allowance module
//!
//! Ownership checks, the pause switch, and the lifetime nonce set used for
//! replay protection.

use std::collections::HashSet;

use payout_types::address::Address;
use payout_types::numeric::Nonce;

/// Single-owner access control.
///
/// The owner is the vault itself, acting through its own quorum; anything
/// that reaches here as `caller == owner` has already cleared that quorum.
#[derive(Debug, Clone)]
pub struct Ownership {
    owner: Address,
}

impl Ownership {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.owner == *caller
    }

    /// Hand ownership to `new_owner`. Returns `false` if `caller` is not
    /// the current owner.
    pub fn transfer(&mut self, caller: &Address, new_owner: Address) -> bool {
        if !self.is_owner(caller) {
            return false;
        }
        self.owner = new_owner;
        true
    }

    pub fn owner(&self) -> Address {
        self.owner
    }
}

/// Composable pause switch.
#[derive(Debug, Clone, Default)]
pub struct PauseGuard {
    paused: bool,
}

impl PauseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Nonces consumed over the whole lifetime of an engine.
///
/// Independent of any root: a nonce consumed under one root stays consumed
/// under every later root.
#[derive(Debug, Clone, Default)]
pub struct NonceSet {
    consumed: HashSet<Nonce>,
}

impl NonceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_consumed(&self, nonce: &Nonce) -> bool {
        self.consumed.contains(nonce)
    }

    /// Atomically check and mark. Returns `false` if already consumed.
    pub fn consume(&mut self, nonce: Nonce) -> bool {
        self.consumed.insert(nonce)
    }

    /// Undo a consumption made earlier in the same call.
    ///
    /// Only the claim path uses this, to revert its own insertion when the
    /// transfer that followed it was rejected.
    pub(crate) fn revert(&mut self, nonce: &Nonce) {
        self.consumed.remove(nonce);
    }

    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}
