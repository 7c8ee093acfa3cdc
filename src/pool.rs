//! Per-instrument collateral escrow.
//!
//! Every collateral token the engine holds for an instrument sits at the custody
//! address on the token ledger. The pool splits that balance into two buckets:
//! unallocated collateral (tracked per user in their accounts) and locked collateral
//! (tracked here, in aggregate). The pool also counts the position tokens issued by
//! minting so redemption and settlement can never burn more than exists.
//!
//! Before settlement, `locked == (open long contracts + outstanding long tokens) *
//! total_collateral_per_unit`. Once every holder has closed at the settlement price,
//! `locked` is exactly zero.

use crate::types::{Amount, MathError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralPool {
    locked_collateral: Amount,
    long_tokens_outstanding: i128,
    short_tokens_outstanding: i128,
    collateral_fees_collected: Amount,
}

impl CollateralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked_collateral(&self) -> Amount {
        self.locked_collateral
    }

    pub fn long_tokens_outstanding(&self) -> i128 {
        self.long_tokens_outstanding
    }

    pub fn short_tokens_outstanding(&self) -> i128 {
        self.short_tokens_outstanding
    }

    pub fn collateral_fees_collected(&self) -> Amount {
        self.collateral_fees_collected
    }

    /// Apply a trade's aggregate collateral movement in one step.
    pub fn rebalance(&mut self, released: Amount, locked: Amount) -> Result<(), PoolError> {
        let freed = self.release_amount(released)?;
        self.locked_collateral = freed.checked_add(locked)?;
        Ok(())
    }

    pub fn lock(&mut self, amount: Amount) -> Result<(), PoolError> {
        self.locked_collateral = self.locked_collateral.checked_add(amount)?;
        Ok(())
    }

    pub fn release(&mut self, amount: Amount) -> Result<(), PoolError> {
        self.locked_collateral = self.release_amount(amount)?;
        Ok(())
    }

    pub fn issue_tokens(&mut self, qty: i128) -> Result<(), PoolError> {
        self.long_tokens_outstanding = self
            .long_tokens_outstanding
            .checked_add(qty)
            .ok_or(MathError::Overflow)?;
        self.short_tokens_outstanding = self
            .short_tokens_outstanding
            .checked_add(qty)
            .ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub fn burn_tokens(&mut self, long_qty: i128, short_qty: i128) -> Result<(), PoolError> {
        if long_qty > self.long_tokens_outstanding || short_qty > self.short_tokens_outstanding {
            return Err(PoolError::TokenSupplyExceeded {
                long_requested: long_qty,
                short_requested: short_qty,
                long_outstanding: self.long_tokens_outstanding,
                short_outstanding: self.short_tokens_outstanding,
            });
        }
        self.long_tokens_outstanding -= long_qty;
        self.short_tokens_outstanding -= short_qty;
        Ok(())
    }

    pub fn record_collateral_fee(&mut self, fee: Amount) -> Result<(), PoolError> {
        self.collateral_fees_collected = self.collateral_fees_collected.checked_add(fee)?;
        Ok(())
    }

    fn release_amount(&self, amount: Amount) -> Result<Amount, PoolError> {
        if amount > self.locked_collateral {
            return Err(PoolError::InsufficientLockedCollateral {
                requested: amount,
                locked: self.locked_collateral,
            });
        }
        Ok(self.locked_collateral.checked_sub(amount)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Cannot release {requested}: only {locked} locked")]
    InsufficientLockedCollateral { requested: Amount, locked: Amount },

    #[error(
        "Token burn exceeds supply: long {long_requested}/{long_outstanding}, short {short_requested}/{short_outstanding}"
    )]
    TokenSupplyExceeded {
        long_requested: i128,
        short_requested: i128,
        long_outstanding: i128,
        short_outstanding: i128,
    },

    #[error(transparent)]
    Math(#[from] MathError),
}
