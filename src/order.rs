//! Signed off-book orders.
//!
//! A maker signs an order off-line; any eligible taker can then fill it (partially
//! or fully) against the engine. An order has no nonce: its identity is the hash
//! of every field, so the same parameters always name the same logical order and
//! the fill counter keyed by that hash provides replay protection.

use crate::types::{Address, Amount, InstrumentId, OrderHash, Price, Side, SignedQty, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Position of each entry in the `[maker, taker, fee_recipient]` tuple.
pub const ADDR_MAKER: usize = 0;
pub const ADDR_TAKER: usize = 1;
pub const ADDR_FEE_RECIPIENT: usize = 2;

/// Position of each entry in the `[maker_fee, taker_fee, price, expiration, salt]` tuple.
pub const VAL_MAKER_FEE: usize = 0;
pub const VAL_TAKER_FEE: usize = 1;
pub const VAL_PRICE: usize = 2;
pub const VAL_EXPIRATION: usize = 3;
pub const VAL_SALT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub instrument_id: InstrumentId,
    pub maker: Address,
    /// Zero address = open to any taker
    pub taker: Address,
    /// Zero address = no fees collected
    pub fee_recipient: Address,
    /// Flat fee owed by the maker for a complete fill
    pub maker_fee: Amount,
    /// Flat fee owed by the taker for a complete fill
    pub taker_fee: Amount,
    pub price: Price,
    pub expiration: Timestamp,
    pub salt: u64,
    /// Signed from the maker's point of view: positive = maker buys
    pub quantity: SignedQty,
}

impl Order {
    pub fn new(
        instrument_id: InstrumentId,
        maker: Address,
        price: Price,
        quantity: SignedQty,
        expiration: Timestamp,
    ) -> Self {
        Self {
            instrument_id,
            maker,
            taker: Address::ZERO,
            fee_recipient: Address::ZERO,
            maker_fee: Amount::zero(),
            taker_fee: Amount::zero(),
            price,
            expiration,
            salt: 0,
            quantity,
        }
    }

    pub fn with_taker(mut self, taker: Address) -> Self {
        self.taker = taker;
        self
    }

    pub fn with_fees(mut self, fee_recipient: Address, maker_fee: Amount, taker_fee: Amount) -> Self {
        self.fee_recipient = fee_recipient;
        self.maker_fee = maker_fee;
        self.taker_fee = taker_fee;
        self
    }

    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = salt;
        self
    }

    /// Build an order from its wire tuples. Rejects negative fees, non-positive
    /// prices and out-of-range expiration/salt values.
    pub fn from_parts(
        instrument_id: InstrumentId,
        addresses: [Address; 3],
        values: [i128; 5],
        quantity: i128,
    ) -> Result<Self, OrderError> {
        let maker_fee = Amount::new(values[VAL_MAKER_FEE]);
        let taker_fee = Amount::new(values[VAL_TAKER_FEE]);
        for fee in [maker_fee, taker_fee] {
            if fee.is_negative() {
                return Err(OrderError::NegativeFee(fee));
            }
        }

        let price = Price::new(values[VAL_PRICE]).ok_or(OrderError::InvalidPrice(values[VAL_PRICE]))?;
        let expiration = i64::try_from(values[VAL_EXPIRATION])
            .map_err(|_| OrderError::InvalidExpiration(values[VAL_EXPIRATION]))?;
        let salt =
            u64::try_from(values[VAL_SALT]).map_err(|_| OrderError::InvalidSalt(values[VAL_SALT]))?;

        Ok(Self {
            instrument_id,
            maker: addresses[ADDR_MAKER],
            taker: addresses[ADDR_TAKER],
            fee_recipient: addresses[ADDR_FEE_RECIPIENT],
            maker_fee,
            taker_fee,
            price,
            expiration: Timestamp::from_millis(expiration),
            salt,
            quantity: SignedQty::new(quantity),
        })
    }

    pub fn addresses(&self) -> [Address; 3] {
        [self.maker, self.taker, self.fee_recipient]
    }

    pub fn values(&self) -> [i128; 5] {
        [
            self.maker_fee.value(),
            self.taker_fee.value(),
            self.price.value(),
            i128::from(self.expiration.as_millis()),
            i128::from(self.salt),
        ]
    }

    /// Canonical identity: SHA-256 over the big-endian encoding of the instrument id,
    /// the address tuple, the value tuple and the signed quantity.
    pub fn hash(&self) -> OrderHash {
        let mut hasher = Sha256::new();
        hasher.update(self.instrument_id.0.to_be_bytes());
        for address in self.addresses() {
            hasher.update(address.as_bytes());
        }
        for value in self.values() {
            hasher.update(value.to_be_bytes());
        }
        hasher.update(self.quantity.value().to_be_bytes());
        OrderHash(hasher.finalize().into())
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration <= now
    }

    pub fn maker_side(&self) -> Option<Side> {
        self.quantity.side()
    }

    pub fn is_open_to(&self, caller: Address) -> bool {
        self.taker.is_zero() || self.taker == caller
    }

    pub fn charges_fees(&self) -> bool {
        !self.fee_recipient.is_zero() && (self.maker_fee.is_positive() || self.taker_fee.is_positive())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order fee cannot be negative: {0}")]
    NegativeFee(Amount),

    #[error("Order price must be positive, got {0}")]
    InvalidPrice(i128),

    #[error("Order expiration out of range: {0}")]
    InvalidExpiration(i128),

    #[error("Order salt out of range: {0}")]
    InvalidSalt(i128),
}
