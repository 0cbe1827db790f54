//! Disbursement Engine: root publication and proof-gated claims
//!
//! The engine stores one current Merkle root and the set of nonces ever
//! consumed. The vault (owner) publishes roots; anyone holding a payout and
//! its proof can claim it, and the engine then draws the funds through its
//! delegate allowance on the vault.
//!
//! Claim ordering is checks-effects-interactions: proof and nonce checks,
//! nonce insertion, then the single external call to the bridge. The bridge
//! is borrowed mutably for the duration of the call and has no path back
//! into the engine, so a claim cannot be re-entered.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{info, warn};
use uuid::Uuid;

use payout_types::address::Address;
use payout_types::hash::Hash256;
use payout_types::numeric::{Amount, Nonce};
use payout_types::payout::PayoutRecord;

use crate::allowance::{CustodyBridge, TransferReceipt};
use crate::config::{DisburserConfig, NoncePolicy};
use crate::errors::DisburserError;
use crate::events::{ContractEvent, OwnershipTransferred, PayoutClaimed, RootPublished};
use crate::leaf::EncodedLeaf;
use crate::merkle::{Keccak256Hasher, MerkleHasher};
use crate::proof::{process_proof, MerkleProof};
use crate::security::{NonceSet, Ownership};

/// What a claimant submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub asset: Address,
    pub amount: Amount,
    pub nonce: Nonce,
    pub proof: MerkleProof,
}

impl ClaimRequest {
    pub fn new(
        asset: Address,
        amount: Amount,
        nonce: impl Into<Nonce>,
        proof: MerkleProof,
    ) -> Self {
        Self {
            asset,
            amount,
            nonce: nonce.into(),
            proof,
        }
    }

    /// Claim for a record taken from a published batch.
    pub fn for_record(record: &PayoutRecord, proof: MerkleProof) -> Self {
        Self::new(record.asset, record.amount, record.nonce, proof)
    }
}

/// Outcome of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub claim_id: Uuid,
    pub asset: Address,
    pub amount: Amount,
    pub nonce: Nonce,
    pub recipient: Address,
    pub transfer: TransferReceipt,
}

/// The engine state: owner, current root, consumed nonces.
#[derive(Debug)]
pub struct Disburser<H: MerkleHasher = Keccak256Hasher> {
    /// Vault whose payouts this engine disburses
    vault: Address,
    /// Delegate identity the engine presents to the bridge
    engine_address: Address,
    ownership: Ownership,
    merkle_root: Option<Hash256>,
    nonces: NonceSet,
    config: DisburserConfig,
    events: Vec<ContractEvent>,
    _hasher: PhantomData<H>,
}

impl<H: MerkleHasher> Disburser<H> {
    /// Create an engine for `vault`, owned by the vault, using the default
    /// configuration.
    pub fn new(vault: Address, engine_address: Address) -> Self {
        Self::with_config(vault, engine_address, DisburserConfig::default())
    }

    pub fn with_config(vault: Address, engine_address: Address, config: DisburserConfig) -> Self {
        info!(
            vault = %vault,
            engine = %engine_address,
            hasher = H::NAME,
            nonce_policy = ?config.nonce_policy,
            leaf_format = ?config.leaf_format,
            "Disburser initialized"
        );
        Self {
            vault,
            engine_address,
            ownership: Ownership::new(vault),
            merkle_root: None,
            nonces: NonceSet::new(),
            config,
            events: Vec::new(),
            _hasher: PhantomData,
        }
    }

    // ───────────────────────── Root ─────────────────────────

    /// Replace the current root. Owner-only.
    ///
    /// Nothing about the tree can be checked from the root alone; the owner
    /// is trusted here. Unclaimed payouts of the previous root become
    /// unclaimable unless the new batch includes them again.
    pub fn publish_root(
        &mut self,
        caller: &Address,
        root: Hash256,
    ) -> Result<ContractEvent, DisburserError> {
        if !self.ownership.is_owner(caller) {
            warn!(caller = %caller, "Unauthorized root publication rejected");
            return Err(DisburserError::Unauthorized);
        }

        let previous = self.merkle_root.replace(root);
        info!(
            root = %root,
            previous = ?previous.map(|r| r.to_string()),
            "Merkle root published"
        );

        let event = ContractEvent::RootPublished(RootPublished {
            previous,
            root,
            publisher: *caller,
        });
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn merkle_root(&self) -> Option<Hash256> {
        self.merkle_root
    }

    // ───────────────────────── Claims ─────────────────────────

    /// Leaf for `(asset, amount, nonce)` drawn from this engine's vault.
    pub fn encode_leaf(&self, asset: &Address, amount: &Amount, nonce: &Nonce) -> EncodedLeaf {
        let record = PayoutRecord::new(self.vault, *asset, *amount, *nonce);
        EncodedLeaf::encode(&record, self.config.leaf_format)
    }

    /// Verify a claim against the current root without touching any state.
    pub fn test_claim(&self, request: &ClaimRequest) -> bool {
        self.check_proof(request).is_ok()
    }

    /// Run every check `claim` runs before moving funds, without mutating.
    /// Returns the leaf hash on success.
    pub fn verify_claim(&self, request: &ClaimRequest) -> Result<Hash256, DisburserError> {
        let leaf_hash = self.check_proof(request)?;
        if self.nonces.is_consumed(&request.nonce) {
            return Err(DisburserError::AlreadyClaimed {
                nonce: request.nonce,
            });
        }
        Ok(leaf_hash)
    }

    /// Claim a payout and transfer it to `caller`.
    ///
    /// Any error leaves the engine as it was, except a failed transfer under
    /// `NoncePolicy::ConsumeBeforeTransfer`, which keeps the nonce consumed.
    pub fn claim<B: CustodyBridge>(
        &mut self,
        bridge: &mut B,
        caller: &Address,
        request: &ClaimRequest,
        current_time: i64,
    ) -> Result<ClaimReceipt, DisburserError> {
        if let Err(err) = self.check_proof(request) {
            warn!(caller = %caller, nonce = %request.nonce, "Claim rejected: invalid proof");
            return Err(err);
        }

        // Effects before the interaction
        if !self.nonces.consume(request.nonce) {
            warn!(
                caller = %caller,
                nonce = %request.nonce,
                "Claim rejected: nonce already consumed"
            );
            return Err(DisburserError::AlreadyClaimed {
                nonce: request.nonce,
            });
        }

        let transfer = match bridge.transfer(
            &self.engine_address,
            &request.asset,
            request.amount,
            caller,
            current_time,
        ) {
            Ok(receipt) => receipt,
            Err(reason) => {
                let released = self.config.nonce_policy == NoncePolicy::ConsumeOnSuccess;
                if released {
                    self.nonces.revert(&request.nonce);
                }
                warn!(
                    caller = %caller,
                    nonce = %request.nonce,
                    amount = %request.amount,
                    nonce_released = released,
                    error = %reason,
                    "Claim rejected: transfer failed"
                );
                return Err(DisburserError::TransferFailed { reason });
            }
        };

        let receipt = ClaimReceipt {
            claim_id: Uuid::now_v7(),
            asset: request.asset,
            amount: request.amount,
            nonce: request.nonce,
            recipient: *caller,
            transfer,
        };

        info!(
            claim_id = %receipt.claim_id,
            recipient = %caller,
            asset = %request.asset,
            amount = %request.amount,
            nonce = %request.nonce,
            "Payout claimed"
        );

        self.events.push(ContractEvent::PayoutClaimed(PayoutClaimed {
            claim_id: receipt.claim_id,
            asset: receipt.asset,
            amount: receipt.amount,
            nonce: receipt.nonce,
            recipient: receipt.recipient,
        }));
        Ok(receipt)
    }

    pub fn is_claimed(&self, nonce: &Nonce) -> bool {
        self.nonces.is_consumed(nonce)
    }

    /// Number of nonces consumed over the engine's lifetime.
    pub fn claimed_count(&self) -> usize {
        self.nonces.len()
    }

    // ───────────────────────── Ownership ─────────────────────────

    pub fn owner(&self) -> Address {
        self.ownership.owner()
    }

    /// Hand root publication rights to `new_owner`. Owner-only.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), DisburserError> {
        let previous = self.ownership.owner();
        if !self.ownership.transfer(caller, new_owner) {
            return Err(DisburserError::Unauthorized);
        }
        info!(previous = %previous, new_owner = %new_owner, "Ownership transferred");
        self.events
            .push(ContractEvent::OwnershipTransferred(OwnershipTransferred {
                previous,
                new_owner,
            }));
        Ok(())
    }

    // ───────────────────────── Accessors ─────────────────────────

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn engine_address(&self) -> Address {
        self.engine_address
    }

    pub fn config(&self) -> &DisburserConfig {
        &self.config
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    /// Recompute the root from the request and compare with the current one.
    fn check_proof(&self, request: &ClaimRequest) -> Result<Hash256, DisburserError> {
        let root = self.merkle_root.ok_or(DisburserError::InvalidProof)?;
        let leaf_hash = self
            .encode_leaf(&request.asset, &request.amount, &request.nonce)
            .hash::<H>();

        if process_proof::<H>(leaf_hash, &request.proof) != root {
            return Err(DisburserError::InvalidProof);
        }
        Ok(leaf_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowance::AllowanceModule;
    use crate::errors::AllowanceError;
    use crate::merkle::MerkleTree;
    use payout_types::numeric::{parse_ether, U256};

    const T0: i64 = 1_700_000_000;

    fn vault() -> Address {
        Address::from_low_u64(0x5afe)
    }

    fn engine_addr() -> Address {
        Address::from_low_u64(0xd15b)
    }

    fn claimant() -> Address {
        Address::from_low_u64(0xbeef)
    }

    fn eth(s: &str) -> Amount {
        parse_ether(s).unwrap()
    }

    fn payouts() -> Vec<PayoutRecord> {
        ["0.0001", "0.0002", "0.0003", "0.0004"]
            .iter()
            .enumerate()
            .map(|(i, amount)| PayoutRecord::native(vault(), eth(amount), (i + 1) as u64))
            .collect()
    }

    fn build_tree(records: &[PayoutRecord]) -> MerkleTree {
        let leaves: Vec<EncodedLeaf> = records.iter().map(EncodedLeaf::with_vault).collect();
        MerkleTree::build(&leaves).unwrap()
    }

    fn bridge(cap: &str) -> AllowanceModule {
        let mut module = AllowanceModule::new(vault());
        module.fund(Address::ZERO, eth("1")).unwrap();
        module.add_delegate(&vault(), engine_addr()).unwrap();
        module
            .set_allowance(&vault(), engine_addr(), Address::ZERO, eth(cap), 0, 0, T0)
            .unwrap();
        module
    }

    fn setup(config: DisburserConfig) -> (Disburser, MerkleTree, Vec<PayoutRecord>) {
        let records = payouts();
        let tree = build_tree(&records);
        let mut engine = Disburser::with_config(vault(), engine_addr(), config);
        engine.publish_root(&vault(), tree.root()).unwrap();
        (engine, tree, records)
    }

    fn request(tree: &MerkleTree, records: &[PayoutRecord], i: usize) -> ClaimRequest {
        ClaimRequest::for_record(&records[i], tree.proof(i).unwrap())
    }

    #[test]
    fn test_publish_root_owner_only() {
        let mut engine: Disburser = Disburser::new(vault(), engine_addr());
        let result = engine.publish_root(&claimant(), Hash256::new([1u8; 32]));
        assert_eq!(result, Err(DisburserError::Unauthorized));
        assert_eq!(engine.merkle_root(), None);
    }

    #[test]
    fn test_publish_root_replaces_previous() {
        let mut engine: Disburser = Disburser::new(vault(), engine_addr());
        let first = Hash256::new([1u8; 32]);
        let second = Hash256::new([2u8; 32]);
        engine.publish_root(&vault(), first).unwrap();
        let event = engine.publish_root(&vault(), second).unwrap();

        assert_eq!(engine.merkle_root(), Some(second));
        match event {
            ContractEvent::RootPublished(e) => assert_eq!(e.previous, Some(first)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_claim_success() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");

        let receipt = engine
            .claim(&mut module, &claimant(), &request(&tree, &records, 0), T0)
            .unwrap();

        assert_eq!(receipt.amount, eth("0.0001"));
        assert_eq!(receipt.recipient, claimant());
        assert_eq!(module.balance_of(&claimant(), &Address::ZERO), eth("0.0001"));
        assert!(engine.is_claimed(&U256::one()));
        assert_eq!(engine.claimed_count(), 1);
        assert!(matches!(
            engine.events().last(),
            Some(ContractEvent::PayoutClaimed(_))
        ));
    }

    #[test]
    fn test_claim_replay_rejected() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");
        let req = request(&tree, &records, 0);

        engine.claim(&mut module, &claimant(), &req, T0).unwrap();
        let result = engine.claim(&mut module, &claimant(), &req, T0);
        assert_eq!(
            result,
            Err(DisburserError::AlreadyClaimed { nonce: U256::one() })
        );
        assert_eq!(engine.claimed_count(), 1);
        assert_eq!(module.balance_of(&claimant(), &Address::ZERO), eth("0.0001"));
    }

    #[test]
    fn test_claim_with_wrong_proof() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");
        let req = ClaimRequest::for_record(&records[0], tree.proof(1).unwrap());

        let result = engine.claim(&mut module, &claimant(), &req, T0);
        assert_eq!(result, Err(DisburserError::InvalidProof));
        assert_eq!(engine.claimed_count(), 0);
    }

    #[test]
    fn test_claim_with_inflated_amount() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");
        let mut req = request(&tree, &records, 0);
        req.amount = eth("0.5");

        let result = engine.claim(&mut module, &claimant(), &req, T0);
        assert_eq!(result, Err(DisburserError::InvalidProof));
    }

    #[test]
    fn test_claim_without_root() {
        let records = payouts();
        let tree = build_tree(&records);
        let mut engine: Disburser = Disburser::new(vault(), engine_addr());
        let mut module = bridge("1");

        let result = engine.claim(&mut module, &claimant(), &request(&tree, &records, 0), T0);
        assert_eq!(result, Err(DisburserError::InvalidProof));
    }

    #[test]
    fn test_transfer_failure_releases_nonce_by_default() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("0.0003");
        let req = request(&tree, &records, 3);

        let result = engine.claim(&mut module, &claimant(), &req, T0);
        assert_eq!(
            result,
            Err(DisburserError::TransferFailed {
                reason: AllowanceError::InsufficientAllowance {
                    requested: eth("0.0004"),
                    remaining: eth("0.0003"),
                }
            })
        );
        assert!(!engine.is_claimed(&req.nonce));

        // Vault tops up the allowance; the same claim now goes through
        module
            .set_allowance(&vault(), engine_addr(), Address::ZERO, eth("1"), 0, 0, T0)
            .unwrap();
        engine.claim(&mut module, &claimant(), &req, T0).unwrap();
        assert!(engine.is_claimed(&req.nonce));
    }

    #[test]
    fn test_transfer_failure_strands_nonce_when_consumed_first() {
        let config = DisburserConfig {
            nonce_policy: NoncePolicy::ConsumeBeforeTransfer,
            ..DisburserConfig::default()
        };
        let (mut engine, tree, records) = setup(config);
        let mut module = bridge("0.0003");
        let req = request(&tree, &records, 3);

        assert!(matches!(
            engine.claim(&mut module, &claimant(), &req, T0),
            Err(DisburserError::TransferFailed { .. })
        ));
        assert!(engine.is_claimed(&req.nonce));
        assert_eq!(
            engine.claim(&mut module, &claimant(), &req, T0),
            Err(DisburserError::AlreadyClaimed { nonce: req.nonce })
        );
    }

    #[test]
    fn test_claim_check_is_read_only() {
        let (engine, tree, records) = setup(DisburserConfig::default());
        let good = request(&tree, &records, 2);
        let bad = ClaimRequest::for_record(&records[2], tree.proof(0).unwrap());

        assert!(engine.test_claim(&good));
        assert!(!engine.test_claim(&bad));
        assert_eq!(engine.claimed_count(), 0);
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn test_verify_claim_reports_consumed_nonce() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");
        let req = request(&tree, &records, 1);

        let leaf_hash = engine.verify_claim(&req).unwrap();
        assert_eq!(leaf_hash, tree.leaf_hash(1).unwrap());

        engine.claim(&mut module, &claimant(), &req, T0).unwrap();
        assert!(engine.test_claim(&req), "proof stays valid after claiming");
        assert!(matches!(
            engine.verify_claim(&req),
            Err(DisburserError::AlreadyClaimed { .. })
        ));
    }

    #[test]
    fn test_nonce_survives_new_root() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        let mut module = bridge("1");
        let req = request(&tree, &records, 0);
        engine.claim(&mut module, &claimant(), &req, T0).unwrap();

        // Same leaves republished under a fresh root
        let mut next = records.clone();
        next.push(PayoutRecord::native(vault(), eth("0.0005"), 5u64));
        let next_tree = build_tree(&next);
        engine.publish_root(&vault(), next_tree.root()).unwrap();

        let replay = ClaimRequest::for_record(&next[0], next_tree.proof(0).unwrap());
        assert!(engine.test_claim(&replay));
        assert_eq!(
            engine.claim(&mut module, &claimant(), &replay, T0),
            Err(DisburserError::AlreadyClaimed { nonce: U256::one() })
        );
    }

    #[test]
    fn test_old_proofs_invalid_after_new_root() {
        let (mut engine, tree, records) = setup(DisburserConfig::default());
        engine
            .publish_root(&vault(), Hash256::new([0xee; 32]))
            .unwrap();
        assert!(!engine.test_claim(&request(&tree, &records, 0)));
    }

    #[test]
    fn test_compact_leaf_format() {
        let records = payouts();
        let leaves: Vec<EncodedLeaf> = records
            .iter()
            .map(|r| crate::leaf::encode_transaction_data(&r.asset, &r.amount, &r.nonce))
            .collect();
        let tree = MerkleTree::<Keccak256Hasher>::build(&leaves).unwrap();

        let mut engine: Disburser =
            Disburser::with_config(vault(), engine_addr(), DisburserConfig::observed());
        engine.publish_root(&vault(), tree.root()).unwrap();
        assert!(engine.test_claim(&request(&tree, &records, 2)));
    }

    #[test]
    fn test_leaf_bound_to_engine_vault() {
        let records = payouts();
        let tree = build_tree(&records);
        let other_vault = Address::from_low_u64(0x0bad);
        let mut engine: Disburser = Disburser::new(other_vault, engine_addr());
        engine.publish_root(&other_vault, tree.root()).unwrap();

        assert!(!engine.test_claim(&request(&tree, &records, 0)));
    }

    #[test]
    fn test_transfer_ownership() {
        let mut engine: Disburser = Disburser::new(vault(), engine_addr());
        let successor = Address::from_low_u64(0x2);

        assert_eq!(
            engine.transfer_ownership(&claimant(), successor),
            Err(DisburserError::Unauthorized)
        );
        engine.transfer_ownership(&vault(), successor).unwrap();
        assert_eq!(engine.owner(), successor);
        assert_eq!(
            engine.publish_root(&vault(), Hash256::ZERO),
            Err(DisburserError::Unauthorized)
        );
        assert!(engine.publish_root(&successor, Hash256::ZERO).is_ok());
    }
}
