// 11.0: every state change produces an event. used for audit trails and for
// notifying whoever watches the engine. the EventPayload enum lists all event types.

use crate::settlement::SettlementTrigger;
use crate::types::{Address, Amount, InstrumentId, OrderHash, Price, SignedQty, Timestamp};
use crate::validator::ErrorCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn instrument(&self) -> InstrumentId {
        self.payload.instrument()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    TradeExecuted(TradeExecutedEvent),
    OrderCancelled(OrderCancelledEvent),
    Error(OrderErrorEvent),

    // Token events
    TokensMinted(TokensMintedEvent),
    TokensRedeemed(TokensRedeemedEvent),
    TokensTransferred(TokensTransferredEvent),
    TokensSettled(TokensSettledEvent),
    PositionSettled(PositionSettledEvent),

    // Settlement events
    PriceRecorded(PriceRecordedEvent),
    ContractSettled(ContractSettledEvent),

    // Account events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
}

impl EventPayload {
    pub fn instrument(&self) -> InstrumentId {
        match self {
            EventPayload::TradeExecuted(e) => e.instrument,
            EventPayload::OrderCancelled(e) => e.instrument,
            EventPayload::Error(e) => e.instrument,
            EventPayload::TokensMinted(e) => e.instrument,
            EventPayload::TokensRedeemed(e) => e.instrument,
            EventPayload::TokensTransferred(e) => e.instrument,
            EventPayload::TokensSettled(e) => e.instrument,
            EventPayload::PositionSettled(e) => e.instrument,
            EventPayload::PriceRecorded(e) => e.instrument,
            EventPayload::ContractSettled(e) => e.instrument,
            EventPayload::Deposit(e) => e.instrument,
            EventPayload::Withdrawal(e) => e.instrument,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecutedEvent {
    pub instrument: InstrumentId,
    pub order_hash: OrderHash,
    pub maker: Address,
    pub taker: Address,
    pub price: Price,
    // maker's point of view
    pub quantity: SignedQty,
    pub maker_fee_paid: Amount,
    pub taker_fee_paid: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub instrument: InstrumentId,
    pub order_hash: OrderHash,
    pub maker: Address,
    pub quantity: SignedQty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderErrorEvent {
    pub instrument: InstrumentId,
    pub order_hash: OrderHash,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensMintedEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub quantity: i128,
    pub collateral_locked: Amount,
    pub fee_paid: Amount,
    pub fee_in_reward_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensRedeemedEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub quantity: i128,
    pub collateral_released: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensTransferredEvent {
    pub instrument: InstrumentId,
    pub from: Address,
    pub to: Address,
    pub long_quantity: i128,
    pub short_quantity: i128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensSettledEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub long_quantity: i128,
    pub short_quantity: i128,
    pub payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSettledEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub quantity: SignedQty,
    pub settlement_price: Price,
    pub payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecordedEvent {
    pub instrument: InstrumentId,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSettledEvent {
    pub instrument: InstrumentId,
    pub settlement_price: Price,
    pub settled_at: Timestamp,
    pub trigger: SettlementTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub instrument: InstrumentId,
    pub owner: Address,
    pub amount: Amount,
    pub new_balance: Amount,
}
