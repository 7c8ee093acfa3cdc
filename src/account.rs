//! Per-instrument user accounts.
//!
//! An account exists for every address that has touched an instrument. It tracks the
//! unallocated collateral (deposited but not locked), the LIFO position stack built
//! by trading, and the long/short position tokens created by minting. Locked
//! collateral is not stored per user; it lives in the instrument's pool.

use crate::position::{FillReport, PositionStack};
use crate::types::{Address, Amount, MathError, Price, SignedQty};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub owner: Address,
    pub unallocated: Amount,
    pub positions: PositionStack,
    pub long_tokens: i128,
    pub short_tokens: i128,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    pub realized_pnl: Amount,
}

impl UserAccount {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            unallocated: Amount::zero(),
            positions: PositionStack::new(),
            long_tokens: 0,
            short_tokens: 0,
            total_deposited: Amount::zero(),
            total_withdrawn: Amount::zero(),
            realized_pnl: Amount::zero(),
        }
    }

    pub fn net_position(&self) -> SignedQty {
        self.positions.net_position()
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.unallocated = self.unallocated.checked_add(amount)?;
        self.total_deposited = self.total_deposited.checked_add(amount)?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.ensure_available(amount)?;
        self.unallocated = self.unallocated.checked_sub(amount)?;
        self.total_withdrawn = self.total_withdrawn.checked_add(amount)?;
        Ok(())
    }

    /// Move unallocated collateral into the pool's locked bucket.
    pub fn reserve_collateral(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.ensure_available(amount)?;
        self.unallocated = self.unallocated.checked_sub(amount)?;
        Ok(())
    }

    pub fn return_collateral(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.unallocated = self.unallocated.checked_add(amount)?;
        Ok(())
    }

    /// Net `released - locked` into the balance in one step, so a trade that
    /// frees collateral on one lot can fund the next.
    pub fn rebalance(&mut self, released: Amount, locked: Amount) -> Result<(), AccountError> {
        let available = self.unallocated.checked_add(released)?;
        if available < locked {
            return Err(AccountError::InsufficientBalance {
                requested: locked,
                available,
            });
        }
        self.unallocated = available.checked_sub(locked)?;
        Ok(())
    }

    pub fn apply_fill(&mut self, price: Price, fill: SignedQty) -> FillReport {
        self.positions.apply_fill(price, fill)
    }

    pub fn record_realized_pnl(&mut self, pnl: Amount) -> Result<(), AccountError> {
        self.realized_pnl = self.realized_pnl.checked_add(pnl)?;
        Ok(())
    }

    pub fn issue_tokens(&mut self, qty: i128) -> Result<(), AccountError> {
        self.long_tokens = self.long_tokens.checked_add(qty).ok_or(MathError::Overflow)?;
        self.short_tokens = self.short_tokens.checked_add(qty).ok_or(MathError::Overflow)?;
        Ok(())
    }

    // one-sided credit, the counterpart of a burn on the sending account
    pub fn receive_tokens(&mut self, long_qty: i128, short_qty: i128) -> Result<(), AccountError> {
        self.long_tokens = self.long_tokens.checked_add(long_qty).ok_or(MathError::Overflow)?;
        self.short_tokens = self.short_tokens.checked_add(short_qty).ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub fn burn_tokens(&mut self, long_qty: i128, short_qty: i128) -> Result<(), AccountError> {
        if long_qty > self.long_tokens {
            return Err(AccountError::InsufficientPositionTokens {
                requested: long_qty,
                available: self.long_tokens,
            });
        }
        if short_qty > self.short_tokens {
            return Err(AccountError::InsufficientPositionTokens {
                requested: short_qty,
                available: self.short_tokens,
            });
        }
        self.long_tokens -= long_qty;
        self.short_tokens -= short_qty;
        Ok(())
    }

    fn ensure_available(&self, amount: Amount) -> Result<(), AccountError> {
        if amount > self.unallocated {
            return Err(AccountError::InsufficientBalance {
                requested: amount,
                available: self.unallocated,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Insufficient position tokens: requested {requested}, available {available}")]
    InsufficientPositionTokens { requested: i128, available: i128 },

    #[error(transparent)]
    Math(#[from] MathError),
}
