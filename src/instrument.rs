//! Instrument configuration and per-instrument runtime state.
//!
//! An instrument is one configured contract: price band, multiplier, contract kind,
//! fee rates and expiration. Its runtime state (accounts, fill counters, escrow and
//! settlement record) lives in [`InstrumentState`], owned by the engine and passed
//! by reference into every operation.

use crate::account::UserAccount;
use crate::pool::CollateralPool;
use crate::settlement::SettlementController;
use crate::types::{Address, Amount, InstrumentId, Price, Timestamp};
use crate::validator::OrderFillState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Largest supported `price_decimal_places` (10^18 still fits a u64 scale).
pub const MAX_PRICE_DECIMAL_PLACES: u32 = 18;

/// How collateral and payouts are derived from a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Collateral is linear in the distance to the floor/cap.
    Linear,
    /// Collateral uses reciprocal prices (m / price).
    Inverse,
}

/// Static instrument configuration (immutable after creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Human-readable name (e.g., "ETH-USD-LIN")
    pub name: String,
    pub price_floor: Price,
    pub price_cap: Price,
    /// Raw prices are scaled by 10^price_decimal_places
    pub price_decimal_places: u32,
    /// Collateral units per raw price unit per contract
    pub qty_multiplier: i128,
    pub kind: ContractKind,
    /// Charged in collateral per unit minted when not paying in the reward token
    pub collateral_fee_per_unit: Amount,
    /// Charged in the reward token per unit minted
    pub reward_fee_per_unit: Amount,
    pub expiration: Timestamp,
}

impl Instrument {
    pub fn linear(
        id: InstrumentId,
        name: &str,
        price_floor: Price,
        price_cap: Price,
        price_decimal_places: u32,
        qty_multiplier: i128,
        expiration: Timestamp,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            price_floor,
            price_cap,
            price_decimal_places,
            qty_multiplier,
            kind: ContractKind::Linear,
            collateral_fee_per_unit: Amount::zero(),
            reward_fee_per_unit: Amount::zero(),
            expiration,
        }
    }

    pub fn inverse(
        id: InstrumentId,
        name: &str,
        price_floor: Price,
        price_cap: Price,
        price_decimal_places: u32,
        qty_multiplier: i128,
        expiration: Timestamp,
    ) -> Self {
        Self {
            kind: ContractKind::Inverse,
            ..Self::linear(
                id,
                name,
                price_floor,
                price_cap,
                price_decimal_places,
                qty_multiplier,
                expiration,
            )
        }
    }

    pub fn with_fees(mut self, collateral_fee_per_unit: Amount, reward_fee_per_unit: Amount) -> Self {
        self.collateral_fee_per_unit = collateral_fee_per_unit;
        self.reward_fee_per_unit = reward_fee_per_unit;
        self
    }

    /// ETH-USD linear contract: band $1,000.00 - $5,000.00, 2 decimals, multiplier 10.
    pub fn eth_linear(id: InstrumentId, expiration: Timestamp) -> Self {
        Self::linear(
            id,
            "ETH-USD-LIN",
            Price::new_unchecked(100_000),
            Price::new_unchecked(500_000),
            2,
            10,
            expiration,
        )
    }

    /// BTC inverse contract: band 14,000 - 30,000 at 8 decimals, multiplier 1e23.
    pub fn btc_inverse(id: InstrumentId, expiration: Timestamp) -> Self {
        Self::inverse(
            id,
            "BTC-USD-INV",
            Price::new_unchecked(1_400_000_000_000),
            Price::new_unchecked(3_000_000_000_000),
            8,
            100_000_000_000_000_000_000_000,
            expiration,
        )
    }

    pub fn is_inverse(&self) -> bool {
        self.kind == ContractKind::Inverse
    }

    pub fn contains_price(&self, price: Price) -> bool {
        price >= self.price_floor && price <= self.price_cap
    }

    pub fn clamp_price(&self, price: Price) -> Price {
        price.clamp(self.price_floor, self.price_cap)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiration
    }

    /// Checks that do not depend on the clock.
    pub fn validate_bounds(&self) -> Result<(), InstrumentError> {
        if self.price_floor.value() <= 0 || self.price_floor >= self.price_cap {
            return Err(InstrumentError::InvalidBounds {
                floor: self.price_floor,
                cap: self.price_cap,
            });
        }
        if self.qty_multiplier <= 0 {
            return Err(InstrumentError::InvalidMultiplier(self.qty_multiplier));
        }
        if self.price_decimal_places > MAX_PRICE_DECIMAL_PLACES {
            return Err(InstrumentError::InvalidDecimalPlaces(self.price_decimal_places));
        }
        for fee in [self.collateral_fee_per_unit, self.reward_fee_per_unit] {
            if fee.is_negative() {
                return Err(InstrumentError::NegativeFee(fee));
            }
        }
        Ok(())
    }

    /// Construction-time validation, including the bounded expiration window.
    pub fn validate(&self, now: Timestamp, max_expiration_window_ms: i64) -> Result<(), InstrumentError> {
        self.validate_bounds()?;
        if self.expiration <= now {
            return Err(InstrumentError::ExpirationInPast {
                expiration: self.expiration,
                now,
            });
        }
        let limit = now.plus_millis(max_expiration_window_ms);
        if self.expiration > limit {
            return Err(InstrumentError::ExpirationTooFar {
                expiration: self.expiration,
                limit,
            });
        }
        Ok(())
    }
}

/// Runtime state of one instrument. Mutated only through engine operations.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub instrument: Instrument,
    /// Registry verdict; deposits and mints require it
    pub whitelisted: bool,
    pub settlement: SettlementController,
    pub fills: OrderFillState,
    pub pool: CollateralPool,
    pub(crate) accounts: HashMap<Address, UserAccount>,
}

impl InstrumentState {
    pub fn new(instrument: Instrument, whitelisted: bool, withdrawal_delay_ms: i64) -> Self {
        Self {
            instrument,
            whitelisted,
            settlement: SettlementController::new(withdrawal_delay_ms),
            fills: OrderFillState::new(),
            pool: CollateralPool::new(),
            accounts: HashMap::new(),
        }
    }

    pub fn id(&self) -> InstrumentId {
        self.instrument.id
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    pub fn account(&self, owner: Address) -> Option<&UserAccount> {
        self.accounts.get(&owner)
    }

    pub fn accounts_iter(&self) -> impl Iterator<Item = (&Address, &UserAccount)> {
        self.accounts.iter()
    }

    #[cfg(test)]
    pub(crate) fn account_mut(&mut self, owner: Address) -> &mut UserAccount {
        self.accounts
            .entry(owner)
            .or_insert_with(|| UserAccount::new(owner))
    }

    /// Sum of every account's unallocated balance.
    pub fn total_unallocated(&self) -> Amount {
        Amount::new(self.accounts.values().map(|a| a.unallocated.value()).sum())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    #[error("Price floor {floor} must be below cap {cap}")]
    InvalidBounds { floor: Price, cap: Price },

    #[error("Quantity multiplier must be positive, got {0}")]
    InvalidMultiplier(i128),

    #[error("Unsupported price decimal places: {0}")]
    InvalidDecimalPlaces(u32),

    #[error("Fee per unit cannot be negative: {0}")]
    NegativeFee(Amount),

    #[error("Expiration {expiration} is not after now ({now})")]
    ExpirationInPast { expiration: Timestamp, now: Timestamp },

    #[error("Expiration {expiration} is beyond the allowed window ending {limit}")]
    ExpirationTooFar { expiration: Timestamp, limit: Timestamp },
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    #[test]
    fn presets_are_valid() {
        let now = Timestamp::from_millis(0);
        let eth = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(DAY_MS));
        assert!(eth.validate(now, 30 * DAY_MS).is_ok());
        assert!(!eth.is_inverse());

        let btc = Instrument::btc_inverse(InstrumentId(2), Timestamp::from_millis(DAY_MS));
        assert!(btc.validate(now, 30 * DAY_MS).is_ok());
        assert!(btc.is_inverse());
    }

    #[test]
    fn floor_must_be_below_cap() {
        let mut inst = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(DAY_MS));
        inst.price_cap = inst.price_floor;
        assert!(matches!(
            inst.validate_bounds(),
            Err(InstrumentError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn expiration_window_is_bounded() {
        let inst = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(60 * DAY_MS));
        let result = inst.validate(Timestamp::from_millis(0), 30 * DAY_MS);
        assert!(matches!(result, Err(InstrumentError::ExpirationTooFar { .. })));

        let result = inst.validate(Timestamp::from_millis(60 * DAY_MS), 30 * DAY_MS);
        assert!(matches!(result, Err(InstrumentError::ExpirationInPast { .. })));
    }

    #[test]
    fn negative_fee_rejected() {
        let inst = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(DAY_MS))
            .with_fees(Amount::new(-1), Amount::zero());
        assert!(matches!(inst.validate_bounds(), Err(InstrumentError::NegativeFee(_))));
    }

    #[test]
    fn clamp_into_band() {
        let inst = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(DAY_MS));
        assert_eq!(inst.clamp_price(Price::new_unchecked(1)), inst.price_floor);
        assert_eq!(inst.clamp_price(Price::new_unchecked(900_000)), inst.price_cap);
        let mid = Price::new_unchecked(300_000);
        assert_eq!(inst.clamp_price(mid), mid);
        assert!(inst.contains_price(mid));
    }
}
