// clearing-core: margin-based derivatives clearing engine.
// fully collateralized contracts with a price floor and cap: every long/short pair is
// backed by exactly cap - floor worth of collateral, so the engine can never go short.
// all computation is deterministic integer math with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: InstrumentId, Address, Price, Amount, SignedQty
//   2.x  order.rs: signed off-book orders, canonical hash
//   2.1  signature.rs: secp256k1 signing and signer recovery
//   2.2  validator.rs: fill/cancel validation, replay protection
//   3.x  collateral_math.rs: per-unit collateral, fees, payouts (linear + inverse)
//   4.x  position.rs: LIFO position stack
//   5.x  instrument.rs: contract definition + per-instrument runtime state
//   6.x  pool.rs: locked collateral escrow, position token supply
//   7.x  config.rs: engine knobs, listings, env presets
//   8.x  engine/: trading, collateral, settlement
//   9.x  price_feed.rs: oracle sources (mocked)
//   9.1  settlement.rs: settlement state machine
//   9.2  token.rs: collateral/reward token ledgers (mocked)
//   10.x account.rs: per-instrument user accounts
//   11.x events.rs: state transition events for audit

// core clearing modules
pub mod account;
pub mod collateral_math;
pub mod engine;
pub mod events;
pub mod instrument;
pub mod order;
pub mod pool;
pub mod position;
pub mod signature;
pub mod types;
pub mod validator;

// integration modules
pub mod config;
pub mod price_feed;
pub mod settlement;
pub mod token;

// re exports for convenience
pub use account::*;
pub use collateral_math::*;
pub use engine::*;
pub use events::*;
pub use instrument::*;
pub use order::*;
pub use pool::*;
pub use position::*;
pub use types::*;
pub use validator::*;
pub use config::{ClearingConfig, ConfigError, Environment, InstrumentListing};
pub use price_feed::{MockPriceFeed, PriceSource, PriceSourceId, PriceUpdate, ScriptedPriceFeed};
pub use settlement::{
    PriceOutcome, SettlementController, SettlementError, SettlementRecord, SettlementState,
    SettlementTrigger,
};
pub use signature::{Signature, SignatureError, Wallet};
pub use token::{InMemoryLedger, TokenError, TokenLedger};
