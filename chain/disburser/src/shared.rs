//! Thread-safe engine handle
//!
//! One mutex guards the engine together with its bridge. Every operation
//! holds the lock for its whole duration, so a claim's nonce check, nonce
//! insertion and transfer form one critical section, and a verification
//! never observes a root mid-replacement.

use std::sync::{Arc, Mutex, MutexGuard};

use payout_types::address::Address;
use payout_types::hash::Hash256;
use payout_types::numeric::Nonce;

use crate::allowance::CustodyBridge;
use crate::engine::{ClaimReceipt, ClaimRequest, Disburser};
use crate::errors::DisburserError;
use crate::events::ContractEvent;
use crate::merkle::{Keccak256Hasher, MerkleHasher};

struct Inner<B, H: MerkleHasher> {
    engine: Disburser<H>,
    bridge: B,
}

/// Cloneable handle to an engine and the bridge it draws funds through.
pub struct SharedDisburser<B, H: MerkleHasher = Keccak256Hasher> {
    inner: Arc<Mutex<Inner<B, H>>>,
}

impl<B, H: MerkleHasher> Clone for SharedDisburser<B, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CustodyBridge, H: MerkleHasher> SharedDisburser<B, H> {
    pub fn new(engine: Disburser<H>, bridge: B) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { engine, bridge })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<B, H>>, DisburserError> {
        self.inner.lock().map_err(|_| DisburserError::LockPoisoned)
    }

    pub fn claim(
        &self,
        caller: &Address,
        request: &ClaimRequest,
        current_time: i64,
    ) -> Result<ClaimReceipt, DisburserError> {
        let mut guard = self.lock()?;
        let Inner { engine, bridge } = &mut *guard;
        engine.claim(bridge, caller, request, current_time)
    }

    pub fn publish_root(
        &self,
        caller: &Address,
        root: Hash256,
    ) -> Result<ContractEvent, DisburserError> {
        self.lock()?.engine.publish_root(caller, root)
    }

    pub fn test_claim(&self, request: &ClaimRequest) -> Result<bool, DisburserError> {
        Ok(self.lock()?.engine.test_claim(request))
    }

    pub fn merkle_root(&self) -> Result<Option<Hash256>, DisburserError> {
        Ok(self.lock()?.engine.merkle_root())
    }

    pub fn is_claimed(&self, nonce: &Nonce) -> Result<bool, DisburserError> {
        Ok(self.lock()?.engine.is_claimed(nonce))
    }

    /// Run `f` against the engine under the lock.
    pub fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut Disburser<H>) -> R,
    ) -> Result<R, DisburserError> {
        Ok(f(&mut self.lock()?.engine))
    }

    /// Run `f` against the bridge under the lock, e.g. for vault
    /// administration between claims.
    pub fn with_bridge<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, DisburserError> {
        Ok(f(&mut self.lock()?.bridge))
    }
}
