//! Collateral, fee and payout formulas.
//!
//! Every contract is fully collateralized: a long can lose at most the distance from
//! the trade price down to the floor, a short at most the distance up to the cap.
//! Linear contracts measure that distance in price units; inverse contracts measure it
//! in reciprocal price (`m / price`).
//!
//! Rounding rule: all division truncates toward zero, and per-unit amounts are
//! truncated *before* they are scaled by quantity. For inverse contracts each
//! reciprocal term is truncated on its own before the subtraction, so
//! `long + short == total` holds exactly at every price. The cost is a small
//! under-collection versus the exact rational value (at most one base unit per term
//! per contract), which is accepted rather than rounded away.

use crate::instrument::{ContractKind, Instrument};
use crate::types::{Amount, MathError, Price, Side, SignedQty};

pub const BPS_DENOMINATOR: i128 = 10_000;

// m / price, truncated
fn reciprocal(multiplier: i128, price: Price) -> Result<Amount, MathError> {
    Amount::new(multiplier).div_trunc(price.value())
}

fn linear_distance(upper: Price, lower: Price, multiplier: i128) -> Result<Amount, MathError> {
    let distance = upper
        .value()
        .checked_sub(lower.value())
        .ok_or(MathError::Overflow)?;
    Amount::new(distance).checked_mul(multiplier)
}

/// Collateral a long must lock per contract bought at `price`.
pub fn long_collateral_per_unit(instrument: &Instrument, price: Price) -> Result<Amount, MathError> {
    let price = instrument.clamp_price(price);
    let m = instrument.qty_multiplier;
    match instrument.kind {
        ContractKind::Linear => linear_distance(price, instrument.price_floor, m),
        ContractKind::Inverse => {
            reciprocal(m, instrument.price_floor)?.checked_sub(reciprocal(m, price)?)
        }
    }
}

/// Collateral a short must lock per contract sold at `price`.
pub fn short_collateral_per_unit(instrument: &Instrument, price: Price) -> Result<Amount, MathError> {
    let price = instrument.clamp_price(price);
    let m = instrument.qty_multiplier;
    match instrument.kind {
        ContractKind::Linear => linear_distance(instrument.price_cap, price, m),
        ContractKind::Inverse => {
            reciprocal(m, price)?.checked_sub(reciprocal(m, instrument.price_cap)?)
        }
    }
}

/// Collateral backing one long/short pair. Independent of price.
pub fn total_collateral_per_unit(instrument: &Instrument) -> Result<Amount, MathError> {
    let m = instrument.qty_multiplier;
    match instrument.kind {
        ContractKind::Linear => linear_distance(instrument.price_cap, instrument.price_floor, m),
        ContractKind::Inverse => reciprocal(m, instrument.price_floor)?
            .checked_sub(reciprocal(m, instrument.price_cap)?),
    }
}

pub fn collateral_per_unit(instrument: &Instrument, side: Side, price: Price) -> Result<Amount, MathError> {
    match side {
        Side::Long => long_collateral_per_unit(instrument, price),
        Side::Short => short_collateral_per_unit(instrument, price),
    }
}

/// Collateral for a signed quantity at `price`: `|qty| * per_unit(side(qty), price)`.
pub fn collateral_for_qty(instrument: &Instrument, qty: SignedQty, price: Price) -> Result<Amount, MathError> {
    match qty.side() {
        None => Ok(Amount::zero()),
        Some(side) => collateral_per_unit(instrument, side, price)?.checked_mul(qty.abs()),
    }
}

/// What a holder of `qty` receives once the instrument settles at `settlement_price`.
/// A position is worth exactly the collateral it would lock at that price, so
/// long and short payouts of one pair always add up to the total per unit.
pub fn settlement_payout(
    instrument: &Instrument,
    qty: SignedQty,
    settlement_price: Price,
) -> Result<Amount, MathError> {
    collateral_for_qty(instrument, qty, settlement_price)
}

/// Minting fees for `qty` pairs, in each of the two fee currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintFees {
    pub collateral_fee: Amount,
    pub reward_fee: Amount,
}

pub fn mint_fees(instrument: &Instrument, qty: i128) -> Result<MintFees, MathError> {
    let qty = qty.abs();
    Ok(MintFees {
        collateral_fee: instrument.collateral_fee_per_unit.checked_mul(qty)?,
        reward_fee: instrument.reward_fee_per_unit.checked_mul(qty)?,
    })
}

/// Share of an order's flat fee owed for a partial fill: `fee * filled / order`.
pub fn pro_rata_fee(fee: Amount, filled_abs: i128, order_abs: i128) -> Result<Amount, MathError> {
    fee.checked_mul(filled_abs.abs())?.div_trunc(order_abs.abs())
}

/// Per-unit fee from a basis-point rate on the band's mid-price notional.
/// Linear: `mid * m * bps / 10000`. Inverse: `(m / mid) * bps / 10000`.
pub fn fee_per_unit_from_bps(instrument: &Instrument, bps: u32) -> Result<Amount, MathError> {
    let mid = instrument
        .price_floor
        .value()
        .checked_add(instrument.price_cap.value())
        .ok_or(MathError::Overflow)?
        / 2;
    let notional = match instrument.kind {
        ContractKind::Linear => Amount::new(mid).checked_mul(instrument.qty_multiplier)?,
        ContractKind::Inverse => Amount::new(instrument.qty_multiplier).div_trunc(mid)?,
    };
    notional
        .checked_mul(i128::from(bps))?
        .div_trunc(BPS_DENOMINATOR)
}

/// Profit or loss realized when `closed` contracts opened at `entry` are netted at `exit`.
/// Reporting only; collateral moves are driven by `collateral_for_qty`.
pub fn realized_pnl(
    instrument: &Instrument,
    closed: SignedQty,
    entry: Price,
    exit: Price,
) -> Result<Amount, MathError> {
    let m = instrument.qty_multiplier;
    let per_unit = match instrument.kind {
        ContractKind::Linear => linear_distance(exit, entry, m)?,
        ContractKind::Inverse => reciprocal(m, entry)?.checked_sub(reciprocal(m, exit)?)?,
    };
    per_unit.checked_mul(closed.value())
}
