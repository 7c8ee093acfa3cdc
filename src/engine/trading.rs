//! Order execution and cancellation.

use super::core::Engine;
use super::positions::plan_leg;
use super::results::{CancelResult, EngineError, TradeResult};
use crate::collateral_math::pro_rata_fee;
use crate::events::{EventPayload, OrderCancelledEvent, OrderErrorEvent, TradeExecutedEvent};
use crate::order::Order;
use crate::signature::Signature;
use crate::token::TokenLedger;
use crate::types::{Address, Amount, InstrumentId, OrderHash, SignedQty};
use crate::validator::{ErrorCode, Validation};
use tracing::{debug, warn};

impl<T: TokenLedger> Engine<T> {
    /// Fill up to `requested` of a maker's signed order against `caller`.
    ///
    /// The maker's leg carries the order's sign, the taker's leg the opposite sign, both
    /// at the order price. An expired or exhausted order is not an error: the result
    /// carries the code, an `Error` event is logged and nothing else changes. Every
    /// other failure aborts the whole trade before any state moves.
    pub fn trade_order(
        &mut self,
        order: &Order,
        requested: SignedQty,
        signature: &Signature,
        caller: Address,
    ) -> Result<TradeResult, EngineError> {
        let id = order.instrument_id;
        let now = self.current_time;
        let state = self.state(id)?;
        state.settlement.ensure_open()?;

        let instrument = &state.instrument;
        if !instrument.contains_price(order.price) {
            return Err(EngineError::PriceOutOfBounds {
                price: order.price,
                floor: instrument.price_floor,
                cap: instrument.price_cap,
            });
        }

        let (hash, quantity) = match state.fills.validate_fill(order, requested, signature, caller, now)? {
            Validation::Accepted { hash, quantity } => (hash, quantity),
            Validation::Rejected { hash, code } => return Ok(self.reject(id, hash, code, TradeResult::rejected)),
        };

        let maker_leg = plan_leg(state, order.maker, quantity, order.price)?;
        let taker_leg = plan_leg(state, caller, quantity.negate(), order.price)?;

        let released = maker_leg.released.checked_add(taker_leg.released)?;
        let locked = maker_leg.locked.checked_add(taker_leg.locked)?;
        let mut pool = state.pool.clone();
        pool.rebalance(released, locked)?;

        // fees follow the filled share of the order, paid in the reward token
        let (maker_fee, taker_fee) = if order.fee_recipient.is_zero() {
            (Amount::zero(), Amount::zero())
        } else {
            let order_abs = order.quantity.abs();
            (
                pro_rata_fee(order.maker_fee, quantity.abs(), order_abs)?,
                pro_rata_fee(order.taker_fee, quantity.abs(), order_abs)?,
            )
        };
        let custody = self.config.custody;
        let fee_pulls = [(order.maker, maker_fee), (caller, taker_fee)];
        for (payer, fee) in fee_pulls {
            if fee.is_positive() {
                self.reward_token.check_transfer_from(custody, payer, fee)?;
            }
        }

        // commit
        for (payer, fee) in fee_pulls {
            if fee.is_positive() {
                self.reward_token
                    .transfer_from(custody, payer, order.fee_recipient, fee)?;
            }
        }

        debug!(
            instrument = %id,
            order = %hash,
            maker_closed = %maker_leg.closed,
            maker_opened = %maker_leg.opened,
            taker_closed = %taker_leg.closed,
            taker_opened = %taker_leg.opened,
            released = %released,
            locked = %locked,
            "trade planned"
        );

        let state = self.state_mut(id)?;
        state.pool = pool;
        for leg in [maker_leg, taker_leg] {
            debug_assert!(!leg.fill.is_zero());
            state.accounts.insert(leg.owner, leg.account);
        }
        state.fills.record(hash, quantity);

        self.emit_event(EventPayload::TradeExecuted(TradeExecutedEvent {
            instrument: id,
            order_hash: hash,
            maker: order.maker,
            taker: caller,
            price: order.price,
            quantity,
            maker_fee_paid: maker_fee,
            taker_fee_paid: taker_fee,
        }));

        Ok(TradeResult {
            order_hash: hash,
            filled: quantity,
            maker_fee_paid: maker_fee,
            taker_fee_paid: taker_fee,
            error: None,
        })
    }

    /// Withdraw up to `requested` of an order from the market. Maker only, no signature.
    pub fn cancel_order(
        &mut self,
        order: &Order,
        requested: SignedQty,
        caller: Address,
    ) -> Result<CancelResult, EngineError> {
        let id = order.instrument_id;
        let now = self.current_time;
        let state = self.state(id)?;
        state.settlement.ensure_open()?;

        let (hash, quantity) = match state.fills.validate_cancel(order, requested, caller, now)? {
            Validation::Accepted { hash, quantity } => (hash, quantity),
            Validation::Rejected { hash, code } => {
                return Ok(self.reject(id, hash, code, |order_hash, code| CancelResult {
                    order_hash,
                    cancelled: SignedQty::zero(),
                    error: Some(code),
                }))
            }
        };

        self.state_mut(id)?.fills.record(hash, quantity);
        debug!(instrument = %id, order = %hash, cancelled = %quantity, "order cancelled");

        self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
            instrument: id,
            order_hash: hash,
            maker: order.maker,
            quantity,
        }));

        Ok(CancelResult {
            order_hash: hash,
            cancelled: quantity,
            error: None,
        })
    }

    /// `trade_order` over the wire layout: `[maker, taker, fee_recipient]` and
    /// `[maker_fee, taker_fee, price, expiration, salt]`.
    #[allow(clippy::too_many_arguments)]
    pub fn trade_order_parts(
        &mut self,
        instrument: InstrumentId,
        addresses: [Address; 3],
        values: [i128; 5],
        quantity: i128,
        fill_qty: i128,
        signature: &Signature,
        caller: Address,
    ) -> Result<TradeResult, EngineError> {
        let order = Order::from_parts(instrument, addresses, values, quantity)?;
        self.trade_order(&order, SignedQty::new(fill_qty), signature, caller)
    }

    pub fn cancel_order_parts(
        &mut self,
        instrument: InstrumentId,
        addresses: [Address; 3],
        values: [i128; 5],
        quantity: i128,
        cancel_qty: i128,
        caller: Address,
    ) -> Result<CancelResult, EngineError> {
        let order = Order::from_parts(instrument, addresses, values, quantity)?;
        self.cancel_order(&order, SignedQty::new(cancel_qty), caller)
    }

    // non-fatal rejection: log, emit, report
    fn reject<R>(
        &mut self,
        id: InstrumentId,
        hash: OrderHash,
        code: ErrorCode,
        result: impl FnOnce(OrderHash, ErrorCode) -> R,
    ) -> R {
        warn!(instrument = %id, order = %hash, code = code.code(), "order rejected: {:?}", code);
        self.emit_event(EventPayload::Error(OrderErrorEvent {
            instrument: id,
            order_hash: hash,
            code,
        }));
        result(hash, code)
    }
}
