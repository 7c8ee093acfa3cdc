//! Position netting and collateral planning for trade legs.
//!
//! A leg is planned against a copy of the party's account: the LIFO stack takes the
//! fill, the closed lots release collateral at the trade price, the opened remainder
//! locks collateral at the trade price, and realized PnL is booked. Nothing touches
//! the live account until the whole trade has been planned.

use super::core::Engine;
use super::results::EngineError;
use crate::account::UserAccount;
use crate::collateral_math::{collateral_for_qty, realized_pnl, total_collateral_per_unit};
use crate::instrument::{Instrument, InstrumentState};
use crate::token::TokenLedger;
use crate::types::{Address, Amount, InstrumentId, Price, SignedQty};

#[derive(Debug, Clone)]
pub(super) struct LegPlan {
    pub owner: Address,
    pub fill: SignedQty,
    pub closed: i128,
    pub opened: SignedQty,
    pub released: Amount,
    pub locked: Amount,
    // the account as it will look once the trade commits
    pub account: UserAccount,
}

pub(super) fn plan_leg(
    state: &InstrumentState,
    owner: Address,
    fill: SignedQty,
    price: Price,
) -> Result<LegPlan, EngineError> {
    let instrument = &state.instrument;
    let mut account = state
        .account(owner)
        .cloned()
        .unwrap_or_else(|| UserAccount::new(owner));

    // collateral moves are priced before the stack changes
    let existing = account.net_position();
    let closed = account.positions.closable_against(fill);
    let released = collateral_for_qty(instrument, existing.with_magnitude(closed), price)?;
    let opened = fill.with_magnitude(fill.abs() - closed);
    let locked = collateral_for_qty(instrument, opened, price)?;

    account.rebalance(released, locked)?;
    let report = account.apply_fill(price, fill);
    debug_assert_eq!(report.closed_qty(), closed);
    debug_assert_eq!(report.opened, opened);

    for lot in &report.closed {
        let pnl = realized_pnl(instrument, lot.quantity, lot.entry_price, price)?;
        account.record_realized_pnl(pnl)?;
    }

    Ok(LegPlan {
        owner,
        fill,
        closed,
        opened,
        released,
        locked,
        account,
    })
}

// realized pnl of a whole stack closed out at one price
pub(super) fn close_out_pnl(
    instrument: &Instrument,
    account: &UserAccount,
    price: Price,
) -> Result<Amount, EngineError> {
    let mut total = Amount::zero();
    for lot in account.positions.positions() {
        let pnl = realized_pnl(instrument, lot.quantity, lot.entry_price, price)?;
        total = total.checked_add(pnl)?;
    }
    Ok(total)
}

impl<T: TokenLedger> Engine<T> {
    /// Sum of long position quantities across every account of an instrument.
    pub fn open_interest(&self, id: InstrumentId) -> Result<i128, EngineError> {
        let state = self.state(id)?;
        Ok(state
            .accounts_iter()
            .map(|(_, account)| account.net_position().value().max(0))
            .sum())
    }

    /// What the pool should hold locked: every open long contract and every
    /// outstanding long token backs one full pair.
    pub fn expected_locked_collateral(&self, id: InstrumentId) -> Result<Amount, EngineError> {
        let state = self.state(id)?;
        let pairs = self.open_interest(id)? + state.pool.long_tokens_outstanding();
        Ok(total_collateral_per_unit(&state.instrument)?.checked_mul(pairs)?)
    }

    pub fn positions_of(&self, id: InstrumentId, owner: Address) -> Vec<(Price, SignedQty)> {
        self.account(id, owner)
            .map(|a| {
                a.positions
                    .positions()
                    .iter()
                    .map(|p| (p.entry_price, p.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstrumentId, Timestamp};

    fn state() -> InstrumentState {
        let inst = Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(100_000));
        InstrumentState::new(inst, true, 0)
    }

    fn fund(state: &mut InstrumentState, owner: Address, amount: i128) {
        state.account_mut(owner).deposit(Amount::new(amount)).unwrap();
    }

    #[test]
    fn opening_leg_locks_side_collateral() {
        let mut state = state();
        let alice = Address::from_low_u64(1);
        fund(&mut state, alice, 10_000_000);

        let plan = plan_leg(&state, alice, SignedQty::new(2), Price::new_unchecked(300_000)).unwrap();
        assert_eq!(plan.closed, 0);
        assert_eq!(plan.opened.value(), 2);
        assert_eq!(plan.locked.value(), 4_000_000);
        assert_eq!(plan.account.unallocated.value(), 6_000_000);

        // live account untouched until commit
        assert_eq!(state.account(alice).unwrap().unallocated.value(), 10_000_000);
    }

    #[test]
    fn closing_leg_releases_at_trade_price() {
        let mut state = state();
        let alice = Address::from_low_u64(1);
        fund(&mut state, alice, 2_000_000);
        let plan = plan_leg(&state, alice, SignedQty::new(1), Price::new_unchecked(300_000)).unwrap();
        state.accounts.insert(alice, plan.account);

        // sell at 350000: long collateral per unit is now 2_500_000
        let plan = plan_leg(&state, alice, SignedQty::new(-1), Price::new_unchecked(350_000)).unwrap();
        assert_eq!(plan.closed, 1);
        assert_eq!(plan.released.value(), 2_500_000);
        assert_eq!(plan.locked, Amount::zero());
        assert_eq!(plan.account.unallocated.value(), 2_500_000);
        assert_eq!(plan.account.realized_pnl.value(), 500_000);
        assert!(plan.account.net_position().is_zero());
    }

    #[test]
    fn reversal_releases_then_locks() {
        let mut state = state();
        let alice = Address::from_low_u64(1);
        fund(&mut state, alice, 2_000_000);
        let plan = plan_leg(&state, alice, SignedQty::new(1), Price::new_unchecked(300_000)).unwrap();
        state.accounts.insert(alice, plan.account);

        // sell 2: release 2_000_000 for the long, lock 2_000_000 for the new short
        let plan = plan_leg(&state, alice, SignedQty::new(-2), Price::new_unchecked(300_000)).unwrap();
        assert_eq!(plan.released.value(), 2_000_000);
        assert_eq!(plan.locked.value(), 2_000_000);
        assert_eq!(plan.opened.value(), -1);
        assert_eq!(plan.account.unallocated, Amount::zero());
    }

    #[test]
    fn underfunded_leg_fails() {
        let mut state = state();
        let alice = Address::from_low_u64(1);
        fund(&mut state, alice, 1_999_999);
        let result = plan_leg(&state, alice, SignedQty::new(1), Price::new_unchecked(300_000));
        assert!(matches!(result, Err(EngineError::Account(_))));
    }
}
