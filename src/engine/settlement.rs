// 8.4 engine/settlement.rs: price pushes and closing out after settlement.
// a push at or past expiration, or at/through either band edge, freezes the settlement
// price. once the withdrawal delay has passed, token holders and position holders
// collect exactly what their side is worth at that price.

use super::core::Engine;
use super::positions::close_out_pnl;
use super::results::{EngineError, PositionSettleResult, SettleResult};
use crate::collateral_math::settlement_payout;
use crate::events::{
    ContractSettledEvent, EventPayload, PositionSettledEvent, PriceRecordedEvent, TokensSettledEvent,
};
use crate::price_feed::PriceSource;
use crate::settlement::PriceOutcome;
use crate::token::TokenLedger;
use crate::types::{Address, InstrumentId, Price, SignedQty};
use tracing::{debug, info};

impl<T: TokenLedger> Engine<T> {
    /// 8.4.1: feed one raw price observation at the engine clock.
    pub fn push_price(&mut self, id: InstrumentId, price: Price) -> Result<PriceOutcome, EngineError> {
        let now = self.current_time;
        let state = self.state_mut(id)?;
        let outcome = state.settlement.push_price(&state.instrument, price, now);

        match outcome {
            PriceOutcome::Recorded(price) => {
                debug!(instrument = %id, price = %price, "price recorded");
                self.emit_event(EventPayload::PriceRecorded(PriceRecordedEvent {
                    instrument: id,
                    price,
                }));
            }
            PriceOutcome::Settled { record, trigger } => {
                info!(
                    instrument = %id,
                    price = %record.settlement_price,
                    trigger = ?trigger,
                    "contract settled"
                );
                self.emit_event(EventPayload::ContractSettled(ContractSettledEvent {
                    instrument: id,
                    settlement_price: record.settlement_price,
                    settled_at: record.settled_at,
                    trigger,
                }));
            }
            PriceOutcome::Ignored => {
                debug!(instrument = %id, price = %price, "price ignored, already settled");
            }
        }
        Ok(outcome)
    }

    /// 8.4.2: ask a price source for an update and push it. `None` when the source
    /// had nothing to offer.
    pub fn poll_price_source<S: PriceSource + ?Sized>(
        &mut self,
        id: InstrumentId,
        source: &mut S,
    ) -> Result<Option<PriceOutcome>, EngineError> {
        let places = self.state(id)?.instrument.price_decimal_places;
        let Some(update) = source.fetch_or_push(self.current_time) else {
            return Ok(None);
        };
        let price = Price::from_decimal(update.price, places)
            .ok_or(EngineError::InvalidOraclePrice(update.price))?;
        self.push_price(id, price).map(Some)
    }

    /// 8.4.3: burn settled long/short tokens and pay out their value at the
    /// settlement price. Long tokens pay the long side, short tokens the short side.
    pub fn settle_and_close(
        &mut self,
        id: InstrumentId,
        user: Address,
        long_qty: i128,
        short_qty: i128,
    ) -> Result<SettleResult, EngineError> {
        if long_qty < 0 || (long_qty == 0 && short_qty == 0) {
            return Err(EngineError::InvalidQuantity(long_qty));
        }
        if short_qty < 0 {
            return Err(EngineError::InvalidQuantity(short_qty));
        }
        let now = self.current_time;
        let state = self.state(id)?;
        let record = state.settlement.ensure_withdrawable(now)?;
        let price = record.settlement_price;

        let instrument = &state.instrument;
        let payout = settlement_payout(instrument, SignedQty::new(long_qty), price)?
            .checked_add(settlement_payout(instrument, SignedQty::new(-short_qty), price)?)?;

        let mut account = state
            .account(user)
            .cloned()
            .ok_or(EngineError::NoOpenPosition { instrument: id, owner: user })?;
        account.burn_tokens(long_qty, short_qty)?;
        account.return_collateral(payout)?;

        let mut pool = state.pool.clone();
        pool.burn_tokens(long_qty, short_qty)?;
        pool.release(payout)?;

        let state = self.state_mut(id)?;
        state.pool = pool;
        state.accounts.insert(user, account);

        info!(instrument = %id, user = %user, long = %long_qty, short = %short_qty, payout = %payout, "tokens settled");
        self.emit_event(EventPayload::TokensSettled(TokensSettledEvent {
            instrument: id,
            owner: user,
            long_quantity: long_qty,
            short_quantity: short_qty,
            payout,
        }));

        Ok(SettleResult {
            settlement_price: price,
            long_quantity: long_qty,
            short_quantity: short_qty,
            payout,
        })
    }

    /// 8.4.4: close a trader's whole net position at the settlement price. The
    /// stack is emptied and its collateral value returned as unallocated.
    pub fn settle_and_close_position(
        &mut self,
        id: InstrumentId,
        user: Address,
    ) -> Result<PositionSettleResult, EngineError> {
        let now = self.current_time;
        let state = self.state(id)?;
        let record = state.settlement.ensure_withdrawable(now)?;
        let price = record.settlement_price;

        let mut account = match state.account(user) {
            Some(account) if !account.net_position().is_zero() => account.clone(),
            _ => return Err(EngineError::NoOpenPosition { instrument: id, owner: user }),
        };
        let quantity = account.net_position();
        let payout = settlement_payout(&state.instrument, quantity, price)?;
        let pnl = close_out_pnl(&state.instrument, &account, price)?;

        account.positions.clear();
        account.record_realized_pnl(pnl)?;
        account.return_collateral(payout)?;

        let mut pool = state.pool.clone();
        pool.release(payout)?;

        let state = self.state_mut(id)?;
        state.pool = pool;
        state.accounts.insert(user, account);

        info!(instrument = %id, user = %user, qty = %quantity, payout = %payout, pnl = %pnl, "position settled");
        self.emit_event(EventPayload::PositionSettled(PositionSettledEvent {
            instrument: id,
            owner: user,
            quantity,
            settlement_price: price,
            payout,
        }));

        Ok(PositionSettleResult {
            settlement_price: price,
            quantity,
            payout,
            realized_pnl: pnl,
        })
    }
}
