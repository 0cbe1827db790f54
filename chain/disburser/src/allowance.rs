//! Custody Allowance Bridge: delegate spending caps on a vault
//!
//! The engine never touches vault funds directly. It is registered as a
//! delegate of the vault and granted a capped, optionally periodic
//! allowance per asset; every transfer it asks for is checked against and
//! charged to that allowance here, independently of the Merkle root.
//!
//! `CustodyBridge` is the only capability the engine consumes.
//! `AllowanceModule` is an in-process model of the vault's allowance
//! module: vault-side administration (`add_delegate`, `set_allowance`, ...)
//! requires `caller == vault`, the vault's own quorum being out of scope.
//!
//! Reset semantics follow the usual allowance-module rules, in whole
//! minutes: once `reset_time_min` minutes have passed since
//! `last_reset_min`, `spent` drops back to zero and `last_reset_min`
//! advances by whole periods.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use payout_types::address::Address;
use payout_types::numeric::Amount;

use crate::errors::AllowanceError;
use crate::events::{
    AllowanceDeleted, AllowanceReset, AllowanceSet, ContractEvent, DelegateAdded, DelegateRemoved,
    TransferExecuted,
};
use crate::security::{Ownership, PauseGuard};

/// The capability the engine needs from custody: move funds as a delegate.
pub trait CustodyBridge {
    /// Transfer `amount` of `asset` from the vault to `to`, charged to
    /// `delegate`'s allowance. A failure must leave the bridge unchanged.
    fn transfer(
        &mut self,
        delegate: &Address,
        asset: &Address,
        amount: Amount,
        to: &Address,
        current_time: i64,
    ) -> Result<TransferReceipt, AllowanceError>;
}

/// Proof of an executed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub delegate: Address,
    pub asset: Address,
    pub amount: Amount,
    pub to: Address,
}

/// Spending right of one delegate on one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Allowance {
    /// Cap per period (or in total when `reset_time_min == 0`)
    pub amount: Amount,
    /// Spent in the current period
    pub spent: Amount,
    /// Period length in minutes, 0 = never resets
    pub reset_time_min: u64,
    /// Start of the current period, in minutes since the epoch; `None`
    /// until the allowance is first set
    pub last_reset_min: Option<u64>,
    /// Number of transfers executed against this allowance
    pub nonce: u64,
}

impl Allowance {
    /// Cap minus spent, saturating at zero.
    pub fn remaining(&self) -> Amount {
        self.amount.saturating_sub(self.spent)
    }

    /// Copy with any elapsed reset periods applied.
    fn refreshed(mut self, current_min: u64) -> Self {
        if self.reset_time_min == 0 {
            return self;
        }
        let Some(start) = self.last_reset_min else {
            return self;
        };
        let elapsed = current_min
            .checked_sub(self.reset_time_min)
            .is_some_and(|threshold| start <= threshold);
        if elapsed {
            self.spent = Amount::zero();
            self.last_reset_min =
                Some(current_min - ((current_min - start) % self.reset_time_min));
        }
        self
    }
}

fn to_minutes(current_time: i64) -> u64 {
    u64::try_from(current_time / 60).unwrap_or(0)
}

/// In-process vault allowance module.
#[derive(Debug)]
pub struct AllowanceModule {
    /// The vault; sole administrator of delegates and allowances
    vault: Ownership,
    /// Funds held by the vault: asset -> amount
    vault_balances: HashMap<Address, Amount>,
    /// Funds paid out: (holder, asset) -> amount
    balances: HashMap<(Address, Address), Amount>,
    delegates: HashSet<Address>,
    /// (delegate, asset) -> allowance
    allowances: HashMap<(Address, Address), Allowance>,
    pause_guard: PauseGuard,
    events: Vec<ContractEvent>,
}

impl AllowanceModule {
    /// Create a module administered by `vault`.
    pub fn new(vault: Address) -> Self {
        Self {
            vault: Ownership::new(vault),
            vault_balances: HashMap::new(),
            balances: HashMap::new(),
            delegates: HashSet::new(),
            allowances: HashMap::new(),
            pause_guard: PauseGuard::new(),
            events: Vec::new(),
        }
    }

    pub fn vault(&self) -> Address {
        self.vault.owner()
    }

    // ───────────────────────── Vault Funds ─────────────────────────

    /// Credit the vault with `amount` of `asset`.
    pub fn fund(&mut self, asset: Address, amount: Amount) -> Result<(), AllowanceError> {
        let current = self.vault_balances.entry(asset).or_default();
        *current = current
            .checked_add(amount)
            .ok_or(AllowanceError::Overflow)?;
        Ok(())
    }

    pub fn vault_balance(&self, asset: &Address) -> Amount {
        self.vault_balances.get(asset).copied().unwrap_or_default()
    }

    /// Funds received by `holder` through delegate transfers.
    pub fn balance_of(&self, holder: &Address, asset: &Address) -> Amount {
        self.balances
            .get(&(*holder, *asset))
            .copied()
            .unwrap_or_default()
    }

    // ───────────────────────── Delegates ─────────────────────────

    /// Register a delegate. Vault-only.
    pub fn add_delegate(
        &mut self,
        caller: &Address,
        delegate: Address,
    ) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        if delegate.is_zero() {
            return Err(AllowanceError::InvalidDelegate);
        }

        if self.delegates.insert(delegate) {
            info!(vault = %self.vault(), delegate = %delegate, "Delegate added");
            self.events
                .push(ContractEvent::DelegateAdded(DelegateAdded { delegate }));
        }
        Ok(())
    }

    /// Unregister a delegate and delete all of its allowances. Vault-only.
    pub fn remove_delegate(
        &mut self,
        caller: &Address,
        delegate: &Address,
    ) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        if !self.delegates.remove(delegate) {
            return Err(AllowanceError::UnknownDelegate {
                delegate: *delegate,
            });
        }

        self.allowances.retain(|(d, _), _| d != delegate);
        info!(vault = %self.vault(), delegate = %delegate, "Delegate removed");
        self.events.push(ContractEvent::DelegateRemoved(DelegateRemoved {
            delegate: *delegate,
        }));
        Ok(())
    }

    pub fn is_delegate(&self, delegate: &Address) -> bool {
        self.delegates.contains(delegate)
    }

    // ───────────────────────── Allowances ─────────────────────────

    /// Set the cap for `delegate` on `asset`. Vault-only.
    ///
    /// `reset_time_min == 0` makes the cap a lifetime total. A non-zero
    /// `reset_base_min` aligns period boundaries to that minute; otherwise
    /// the first period starts now. `spent` is preserved across updates.
    #[allow(clippy::too_many_arguments)]
    pub fn set_allowance(
        &mut self,
        caller: &Address,
        delegate: Address,
        asset: Address,
        amount: Amount,
        reset_time_min: u64,
        reset_base_min: u64,
        current_time: i64,
    ) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        self.check_delegate(&delegate)?;

        let current_min = to_minutes(current_time);
        let mut allowance = self
            .allowances
            .get(&(delegate, asset))
            .copied()
            .unwrap_or_default();

        if reset_time_min > 0 && reset_base_min > 0 && reset_base_min <= current_min {
            allowance.last_reset_min =
                Some(current_min - ((current_min - reset_base_min) % reset_time_min));
        } else if allowance.last_reset_min.is_none() {
            allowance.last_reset_min = Some(current_min);
        }
        allowance.reset_time_min = reset_time_min;
        allowance.amount = amount;

        self.allowances.insert((delegate, asset), allowance);

        info!(
            delegate = %delegate,
            asset = %asset,
            amount = %amount,
            reset_time_min,
            "Allowance set"
        );
        self.events.push(ContractEvent::AllowanceSet(AllowanceSet {
            delegate,
            asset,
            amount,
            reset_time_min,
        }));
        Ok(())
    }

    /// Clear the spent counter. Vault-only.
    pub fn reset_allowance(
        &mut self,
        caller: &Address,
        delegate: &Address,
        asset: &Address,
    ) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        let allowance = self
            .allowances
            .get_mut(&(*delegate, *asset))
            .ok_or(AllowanceError::NoAllowance {
                delegate: *delegate,
                asset: *asset,
            })?;
        allowance.spent = Amount::zero();

        info!(delegate = %delegate, asset = %asset, "Allowance reset");
        self.events.push(ContractEvent::AllowanceReset(AllowanceReset {
            delegate: *delegate,
            asset: *asset,
        }));
        Ok(())
    }

    /// Remove an allowance entirely. Vault-only.
    pub fn delete_allowance(
        &mut self,
        caller: &Address,
        delegate: &Address,
        asset: &Address,
    ) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        if self.allowances.remove(&(*delegate, *asset)).is_none() {
            return Err(AllowanceError::NoAllowance {
                delegate: *delegate,
                asset: *asset,
            });
        }

        info!(delegate = %delegate, asset = %asset, "Allowance deleted");
        self.events
            .push(ContractEvent::AllowanceDeleted(AllowanceDeleted {
                delegate: *delegate,
                asset: *asset,
            }));
        Ok(())
    }

    /// Allowance of `delegate` on `asset` for `vault` as seen at
    /// `current_time`, with elapsed periods applied. Zero for unknown
    /// vaults, delegates or assets.
    pub fn get_token_allowance(
        &self,
        vault: &Address,
        delegate: &Address,
        asset: &Address,
        current_time: i64,
    ) -> Allowance {
        if !self.vault.is_owner(vault) {
            return Allowance::default();
        }
        self.allowances
            .get(&(*delegate, *asset))
            .map(|a| a.refreshed(to_minutes(current_time)))
            .unwrap_or_default()
    }

    /// Amount `delegate` could still move at `current_time`, with elapsed
    /// periods taken into account.
    pub fn remaining(&self, delegate: &Address, asset: &Address, current_time: i64) -> Amount {
        self.allowances
            .get(&(*delegate, *asset))
            .map(|a| a.refreshed(to_minutes(current_time)).remaining())
            .unwrap_or_default()
    }

    // ───────────────────────── Pause ─────────────────────────

    /// Stop all delegate transfers. Vault-only.
    pub fn pause(&mut self, caller: &Address) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        self.pause_guard.pause();
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<(), AllowanceError> {
        self.check_vault(caller)?;
        self.pause_guard.unpause();
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.pause_guard.is_paused()
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    fn check_vault(&self, caller: &Address) -> Result<(), AllowanceError> {
        if !self.vault.is_owner(caller) {
            return Err(AllowanceError::Unauthorized);
        }
        Ok(())
    }

    fn check_delegate(&self, delegate: &Address) -> Result<(), AllowanceError> {
        if !self.delegates.contains(delegate) {
            return Err(AllowanceError::UnknownDelegate {
                delegate: *delegate,
            });
        }
        Ok(())
    }

    /// All checks and arithmetic happen before any write, so an error
    /// leaves the module untouched.
    fn execute_transfer(
        &mut self,
        delegate: &Address,
        asset: &Address,
        amount: Amount,
        to: &Address,
        current_time: i64,
    ) -> Result<TransferReceipt, AllowanceError> {
        if self.pause_guard.is_paused() {
            return Err(AllowanceError::Paused);
        }
        self.check_delegate(delegate)?;

        let allowance = self
            .allowances
            .get(&(*delegate, *asset))
            .copied()
            .ok_or(AllowanceError::NoAllowance {
                delegate: *delegate,
                asset: *asset,
            })?
            .refreshed(to_minutes(current_time));

        let new_spent = allowance
            .spent
            .checked_add(amount)
            .ok_or(AllowanceError::Overflow)?;
        if new_spent > allowance.amount {
            return Err(AllowanceError::InsufficientAllowance {
                requested: amount,
                remaining: allowance.remaining(),
            });
        }

        let available = self.vault_balance(asset);
        if available < amount {
            return Err(AllowanceError::InsufficientVaultBalance {
                asset: *asset,
                requested: amount,
                available,
            });
        }
        let recipient_balance = self
            .balance_of(to, asset)
            .checked_add(amount)
            .ok_or(AllowanceError::Overflow)?;

        // Effects
        self.allowances.insert(
            (*delegate, *asset),
            Allowance {
                spent: new_spent,
                nonce: allowance.nonce + 1,
                ..allowance
            },
        );
        self.vault_balances.insert(*asset, available - amount);
        self.balances.insert((*to, *asset), recipient_balance);

        let receipt = TransferReceipt {
            transfer_id: Uuid::now_v7(),
            delegate: *delegate,
            asset: *asset,
            amount,
            to: *to,
        };
        self.events
            .push(ContractEvent::TransferExecuted(TransferExecuted {
                transfer_id: receipt.transfer_id,
                delegate: *delegate,
                asset: *asset,
                amount,
                to: *to,
            }));
        Ok(receipt)
    }
}

impl CustodyBridge for AllowanceModule {
    fn transfer(
        &mut self,
        delegate: &Address,
        asset: &Address,
        amount: Amount,
        to: &Address,
        current_time: i64,
    ) -> Result<TransferReceipt, AllowanceError> {
        match self.execute_transfer(delegate, asset, amount, to, current_time) {
            Ok(receipt) => {
                info!(
                    transfer_id = %receipt.transfer_id,
                    delegate = %delegate,
                    asset = %asset,
                    amount = %amount,
                    to = %to,
                    "Delegate transfer executed"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(
                    delegate = %delegate,
                    asset = %asset,
                    amount = %amount,
                    error = %err,
                    "Delegate transfer rejected"
                );
                Err(err)
            }
        }
    }
}
