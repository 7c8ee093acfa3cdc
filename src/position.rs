// 4.0: LIFO position stack. one per user per instrument.
// same-direction fills push a new lot; opposing fills net against the newest lot first.
// 4.1 has the netting loop at the bottom.

use crate::types::{Price, Side, SignedQty};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub entry_price: Price,
    pub quantity: SignedQty,
    // monotonically increasing per stack, lets reports name a lot
    pub sequence: u64,
}

impl Position {
    pub fn side(&self) -> Option<Side> {
        self.quantity.side()
    }
}

// a lot (or part of one) removed by netting. quantity keeps the lot's own sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedLot {
    pub entry_price: Price,
    pub quantity: SignedQty,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub closed: Vec<ClosedLot>,
    // leftover pushed as a new lot, zero when the fill only netted
    pub opened: SignedQty,
}

impl FillReport {
    pub fn closed_qty(&self) -> i128 {
        self.closed.iter().map(|lot| lot.quantity.abs()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionStack {
    // oldest first; the top of the stack is the last element
    positions: Vec<Position>,
    net: SignedQty,
    next_sequence: u64,
}

impl PositionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn top(&self) -> Option<&Position> {
        self.positions.last()
    }

    pub fn net_position(&self) -> SignedQty {
        debug_assert_eq!(
            self.net.value(),
            self.positions.iter().map(|p| p.quantity.value()).sum::<i128>(),
            "cached net position drifted from the stack"
        );
        self.net
    }

    // what apply_fill would close, without touching the stack
    pub fn closable_against(&self, fill: SignedQty) -> i128 {
        if self.net.opposes(fill) {
            self.net.abs().min(fill.abs())
        } else {
            0
        }
    }

    // 4.1: the netting loop
    pub fn apply_fill(&mut self, price: Price, fill: SignedQty) -> FillReport {
        let mut report = FillReport::default();
        if fill.is_zero() {
            return report;
        }

        let mut remaining = fill.abs();
        while remaining > 0 {
            let Some(top) = self.positions.last_mut() else {
                break;
            };
            if !top.quantity.opposes(fill) {
                break;
            }

            let lot_abs = top.quantity.abs();
            if lot_abs <= remaining {
                // fully netted, pop it
                report.closed.push(ClosedLot {
                    entry_price: top.entry_price,
                    quantity: top.quantity,
                    sequence: top.sequence,
                });
                remaining -= lot_abs;
                self.positions.pop();
            } else {
                let closed = top.quantity.with_magnitude(remaining);
                report.closed.push(ClosedLot {
                    entry_price: top.entry_price,
                    quantity: closed,
                    sequence: top.sequence,
                });
                top.quantity = top.quantity.with_magnitude(lot_abs - remaining);
                remaining = 0;
            }
        }

        if remaining > 0 {
            let opened = fill.with_magnitude(remaining);
            self.push(price, opened);
            report.opened = opened;
        }

        self.net = SignedQty::new(self.net.value() + fill.value());
        report
    }

    // settlement closes everything at once
    pub fn clear(&mut self) -> Vec<Position> {
        self.net = SignedQty::zero();
        std::mem::take(&mut self.positions)
    }

    fn push(&mut self, price: Price, quantity: SignedQty) {
        self.positions.push(Position {
            entry_price: price,
            quantity,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
    }
}
