// 9.2 token.rs: MOCKED. balance changes only, no chain.
// the engine talks to token balances through TokenLedger; InMemoryLedger is the
// reference implementation used by the simulator and the tests.

use crate::types::{Address, Amount};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Insufficient token balance for {owner}: requested {requested}, available {available}")]
    InsufficientBalance {
        owner: Address,
        requested: Amount,
        available: Amount,
    },

    #[error("Insufficient allowance from {owner} to {spender}: requested {requested}, approved {approved}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        requested: Amount,
        approved: Amount,
    },

    #[error("Token amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("Token balance overflow")]
    Overflow,
}

/// The fungible-token operations the engine needs.
pub trait TokenLedger {
    fn balance_of(&self, owner: Address) -> Amount;

    fn allowance(&self, owner: Address, spender: Address) -> Amount;

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError>;

    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Read-only pre-check for `transfer_from`. Lets callers validate every pull of
    /// an operation before moving anything.
    fn check_transfer_from(&self, spender: Address, from: Address, amount: Amount) -> Result<(), TokenError> {
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                requested: amount,
                approved,
            });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from,
                requested: amount,
                available,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    symbol: String,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    total_supply: Amount,
}

impl InMemoryLedger {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    // faucet for simulations and tests
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<(), TokenError> {
        ensure_positive(amount)?;
        let balance = self.balance_of(to);
        let updated = balance.checked_add(amount).map_err(|_| TokenError::Overflow)?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .map_err(|_| TokenError::Overflow)?;
        self.balances.insert(to, updated);
        Ok(())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                owner: from,
                requested: amount,
                available,
            });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .map_err(|_| TokenError::Overflow)?;
        if from == to {
            return Ok(());
        }
        self.balances
            .insert(from, Amount::new(available.value() - amount.value()));
        self.balances.insert(to, credited);
        Ok(())
    }
}

impl TokenLedger for InMemoryLedger {
    fn balance_of(&self, owner: Address) -> Amount {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError> {
        if amount.is_negative() {
            return Err(TokenError::InvalidAmount(amount));
        }
        self.allowances.insert((owner, spender), amount);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        ensure_positive(amount)?;
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        ensure_positive(amount)?;
        self.check_transfer_from(spender, from, amount)?;
        self.move_balance(from, to, amount)?;
        let approved = self.allowance(from, spender);
        self.allowances
            .insert((from, spender), Amount::new(approved.value() - amount.value()));
        Ok(())
    }
}

fn ensure_positive(amount: Amount) -> Result<(), TokenError> {
    if !amount.is_positive() {
        return Err(TokenError::InvalidAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn mint_and_transfer() {
        let mut ledger = InMemoryLedger::new("USDC");
        ledger.mint(addr(1), Amount::new(1_000)).unwrap();
        ledger.transfer(addr(1), addr(2), Amount::new(400)).unwrap();

        assert_eq!(ledger.balance_of(addr(1)).value(), 600);
        assert_eq!(ledger.balance_of(addr(2)).value(), 400);
        assert_eq!(ledger.total_supply().value(), 1_000);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut ledger = InMemoryLedger::new("USDC");
        ledger.mint(addr(1), Amount::new(1_000)).unwrap();
        ledger.approve(addr(1), addr(9), Amount::new(300)).unwrap();

        ledger
            .transfer_from(addr(9), addr(1), addr(9), Amount::new(200))
            .unwrap();
        assert_eq!(ledger.allowance(addr(1), addr(9)).value(), 100);
        assert_eq!(ledger.balance_of(addr(9)).value(), 200);

        let result = ledger.transfer_from(addr(9), addr(1), addr(9), Amount::new(101));
        assert!(matches!(result, Err(TokenError::InsufficientAllowance { .. })));
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let mut ledger = InMemoryLedger::new("USDC");
        ledger.mint(addr(1), Amount::new(50)).unwrap();
        ledger.approve(addr(1), addr(9), Amount::new(500)).unwrap();

        let result = ledger.transfer_from(addr(9), addr(1), addr(2), Amount::new(51));
        assert!(matches!(result, Err(TokenError::InsufficientBalance { .. })));
        assert_eq!(ledger.balance_of(addr(1)).value(), 50);
        assert_eq!(ledger.allowance(addr(1), addr(9)).value(), 500);
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let mut ledger = InMemoryLedger::new("USDC");
        assert_eq!(
            ledger.transfer(addr(1), addr(2), Amount::zero()),
            Err(TokenError::InvalidAmount(Amount::zero()))
        );
        assert!(ledger.approve(addr(1), addr(2), Amount::new(-1)).is_err());
    }
}
