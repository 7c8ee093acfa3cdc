// 1.0: all the primitives live here. nothing in the core works without these types.
// IDs, addresses, prices, amounts, quantities, timestamps. each is a newtype so the
// compiler catches mixups. every number is an integer: no floats anywhere in the math.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub u32);

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 20-byte account identity. derived from a secp256k1 public key (see signature.rs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    // handy for custody/fee addresses that never sign anything
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHash(pub [u8; 32]);

impl OrderHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// Long = gains when price goes up. Short = gains when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> i128 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,
}

// 1.1: signed quantity: positive = long, negative = short. core to all ledger math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SignedQty(i128);

impl SignedQty {
    pub fn new(qty: i128) -> Self {
        Self(qty)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn from_side(side: Side, abs_qty: i128) -> Self {
        Self(side.sign() * abs_qty.saturating_abs())
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    // saturates: i128::MIN reads as i128::MAX
    pub fn abs(&self) -> i128 {
        self.0.saturating_abs()
    }

    pub fn signum(&self) -> i128 {
        self.0.signum()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_long(&self) -> bool {
        self.0 > 0
    }

    pub fn is_short(&self) -> bool {
        self.0 < 0
    }

    pub fn side(&self) -> Option<Side> {
        if self.is_long() {
            Some(Side::Long)
        } else if self.is_short() {
            Some(Side::Short)
        } else {
            None
        }
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    // true when both are non-zero and point in opposite directions
    pub fn opposes(&self, other: SignedQty) -> bool {
        (self.is_long() && other.is_short()) || (self.is_short() && other.is_long())
    }

    // magnitude `abs_qty` carrying this quantity's sign
    pub fn with_magnitude(&self, abs_qty: i128) -> Self {
        Self(self.signum() * abs_qty.saturating_abs())
    }

    pub fn checked_add(&self, other: SignedQty) -> Result<Self, MathError> {
        self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
    }
}

impl fmt::Display for SignedQty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: raw integer price, scaled by 10^price_decimal_places of its instrument. always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(i128);

impl Price {
    #[must_use]
    pub fn new(raw: i128) -> Option<Self> {
        if raw > 0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub fn new_unchecked(raw: i128) -> Self {
        debug_assert!(raw > 0);
        Self(raw)
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    /// Scale an oracle decimal price into raw units. The fractional remainder beyond
    /// `decimal_places` is truncated toward zero, never rounded.
    pub fn from_decimal(value: Decimal, decimal_places: u32) -> Option<Self> {
        let scale = Decimal::from(10u64.checked_pow(decimal_places)?);
        let scaled = value.checked_mul(scale)?.trunc();
        Self::new(scaled.to_i128()?)
    }

    pub fn to_decimal(&self, decimal_places: u32) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(self.0, decimal_places).ok()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: collateral token base units. every operation is checked and division truncates
// toward zero (i128 `/` semantics), so a remainder is dropped, never rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: i128) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(&self, other: Amount) -> Result<Self, MathError> {
        self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(&self, other: Amount) -> Result<Self, MathError> {
        self.0.checked_sub(other.0).map(Self).ok_or(MathError::Overflow)
    }

    pub fn checked_mul(&self, factor: i128) -> Result<Self, MathError> {
        self.0.checked_mul(factor).map(Self).ok_or(MathError::Overflow)
    }

    pub fn div_trunc(&self, divisor: i128) -> Result<Self, MathError> {
        if divisor == 0 {
            return Err(MathError::DivisionByZero);
        }
        self.0.checked_div(divisor).map(Self).ok_or(MathError::Overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus_millis(&self, ms: i64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
