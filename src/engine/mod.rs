// 8.0: clearing engine. coordinates order validation, LIFO position netting,
// collateral locking, minting/redemption and settlement for every listed instrument.
// deterministic and event-driven; token balances are reached through TokenLedger.

mod collateral;
mod config;
mod core;
mod positions;
mod results;
mod settlement;
mod trading;

pub use config::{EngineConfig, DAY_MS, HOUR_MS};
pub use core::Engine;
pub use results::{
    CancelResult, EngineError, MintResult, PositionSettleResult, RedeemResult, SettleResult,
    TradeResult, TransferResult,
};
