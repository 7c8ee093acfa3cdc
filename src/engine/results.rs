// 8.0.2: result types and errors for engine operations.

use crate::account::AccountError;
use crate::config::ConfigError;
use crate::instrument::InstrumentError;
use crate::order::OrderError;
use crate::pool::PoolError;
use crate::settlement::SettlementError;
use crate::token::TokenError;
use crate::types::{Address, Amount, InstrumentId, MathError, OrderHash, Price, SignedQty};
use crate::validator::{ErrorCode, ValidationError};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeResult {
    pub order_hash: OrderHash,
    // maker's point of view; zero when the order was rejected
    pub filled: SignedQty,
    pub maker_fee_paid: Amount,
    pub taker_fee_paid: Amount,
    pub error: Option<ErrorCode>,
}

impl TradeResult {
    pub(super) fn rejected(order_hash: OrderHash, code: ErrorCode) -> Self {
        Self {
            order_hash,
            filled: SignedQty::zero(),
            maker_fee_paid: Amount::zero(),
            taker_fee_paid: Amount::zero(),
            error: Some(code),
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.filled.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelResult {
    pub order_hash: OrderHash,
    pub cancelled: SignedQty,
    pub error: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub quantity: i128,
    pub collateral_locked: Amount,
    pub fee_paid: Amount,
    pub fee_in_reward_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemResult {
    pub quantity: i128,
    pub collateral_released: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub long_quantity: i128,
    pub short_quantity: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleResult {
    pub settlement_price: Price,
    pub long_quantity: i128,
    pub short_quantity: i128,
    pub payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSettleResult {
    pub settlement_price: Price,
    pub quantity: SignedQty,
    pub payout: Amount,
    pub realized_pnl: Amount,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Instrument {0} not found")]
    InstrumentNotFound(InstrumentId),

    #[error("Instrument {0} already listed")]
    InstrumentExists(InstrumentId),

    #[error("Instrument {0} is not whitelisted")]
    NotWhitelisted(InstrumentId),

    #[error("Order price {price} outside [{floor}, {cap}]")]
    PriceOutOfBounds { price: Price, floor: Price, cap: Price },

    #[error("Oracle price {0} cannot be represented")]
    InvalidOraclePrice(Decimal),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i128),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("Zero address not allowed")]
    ZeroAddress,

    #[error("Cannot transfer position tokens from {0} to itself")]
    SelfTransfer(Address),

    #[error("No open position for {owner} on instrument {instrument}")]
    NoOpenPosition { instrument: InstrumentId, owner: Address },

    #[error("Instrument error: {0}")]
    Instrument(#[from] InstrumentError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}
