//! Order validation and replay protection.
//!
//! [`OrderFillState`] keeps, per order hash, the cumulative signed quantity already
//! filled *or* cancelled. Fills and cancels draw from the same counter, so a cancel
//! after a partial fill only covers the remainder, and an order can never be
//! consumed past its quantity.
//!
//! Validation is split from recording: `validate_fill`/`validate_cancel` are pure and
//! return the clipped quantity; the engine calls [`OrderFillState::record`] only once
//! every other check of the operation has passed.

use crate::order::Order;
use crate::signature::{verify_signature, Signature};
use crate::types::{Address, OrderHash, SignedQty, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Recorded (non-fatal) error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    OrderExpired = 0,
    OrderDead = 1,
}

impl ErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Outcome of a validation that did not hard-abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Proceed with this effective (clipped, order-signed) quantity.
    Accepted { hash: OrderHash, quantity: SignedQty },
    /// Nothing to do; surface the code to the caller.
    Rejected { hash: OrderHash, code: ErrorCode },
}

impl Validation {
    pub fn hash(&self) -> OrderHash {
        match self {
            Validation::Accepted { hash, .. } | Validation::Rejected { hash, .. } => *hash,
        }
    }
}

/// Hard-abort validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Order quantity is zero")]
    ZeroOrderQuantity,

    #[error("Requested quantity is zero")]
    ZeroRequestedQuantity,

    #[error("Requested quantity {requested} does not match the sign of order quantity {order}")]
    SignMismatch { order: SignedQty, requested: SignedQty },

    #[error("Quantity {0} is out of range")]
    QuantityOutOfRange(SignedQty),

    #[error("Maker {0} cannot trade against their own order")]
    SelfTrade(Address),

    #[error("Order is reserved for taker {expected}, called by {caller}")]
    TakerMismatch { expected: Address, caller: Address },

    #[error("Signature does not recover to maker {0}")]
    InvalidSignature(Address),

    #[error("Only the maker {maker} can cancel, called by {caller}")]
    NotMaker { maker: Address, caller: Address },
}

#[derive(Debug, Clone, Default)]
pub struct OrderFillState {
    filled_or_cancelled: HashMap<OrderHash, SignedQty>,
}

impl OrderFillState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filled_or_cancelled(&self, hash: &OrderHash) -> SignedQty {
        self.filled_or_cancelled
            .get(hash)
            .copied()
            .unwrap_or_default()
    }

    /// Magnitude still available to fill or cancel.
    pub fn remaining(&self, order: &Order, hash: &OrderHash) -> i128 {
        (order.quantity.abs() - self.filled_or_cancelled(hash).abs()).max(0)
    }

    /// Checks run in a fixed order: expiry, quantities, self-trade and taker
    /// restriction, signature, exhaustion.
    pub fn validate_fill(
        &self,
        order: &Order,
        requested: SignedQty,
        signature: &Signature,
        caller: Address,
        now: Timestamp,
    ) -> Result<Validation, ValidationError> {
        let hash = order.hash();

        if order.is_expired(now) {
            return Ok(Validation::Rejected { hash, code: ErrorCode::OrderExpired });
        }
        check_quantities(order, requested)?;
        if order.maker == caller {
            return Err(ValidationError::SelfTrade(caller));
        }
        if !order.is_open_to(caller) {
            return Err(ValidationError::TakerMismatch {
                expected: order.taker,
                caller,
            });
        }
        if !verify_signature(order.maker, &hash, signature) {
            return Err(ValidationError::InvalidSignature(order.maker));
        }

        Ok(self.clip(order, hash, requested))
    }

    /// Cancel path: maker only, no signature.
    pub fn validate_cancel(
        &self,
        order: &Order,
        requested: SignedQty,
        caller: Address,
        now: Timestamp,
    ) -> Result<Validation, ValidationError> {
        let hash = order.hash();

        if order.maker != caller {
            return Err(ValidationError::NotMaker {
                maker: order.maker,
                caller,
            });
        }
        if order.is_expired(now) {
            return Ok(Validation::Rejected { hash, code: ErrorCode::OrderExpired });
        }
        check_quantities(order, requested)?;

        Ok(self.clip(order, hash, requested))
    }

    // clip to what is left; check_quantities has already matched the signs
    fn clip(&self, order: &Order, hash: OrderHash, requested: SignedQty) -> Validation {
        let remaining = self.remaining(order, &hash);
        if remaining == 0 {
            return Validation::Rejected { hash, code: ErrorCode::OrderDead };
        }
        let magnitude = requested.abs().min(remaining);
        Validation::Accepted {
            hash,
            quantity: order.quantity.with_magnitude(magnitude),
        }
    }

    /// Advance the shared fill/cancel counter. `quantity` carries the order's sign.
    pub fn record(&mut self, hash: OrderHash, quantity: SignedQty) {
        let entry = self.filled_or_cancelled.entry(hash).or_default();
        *entry = SignedQty::new(entry.value() + quantity.value());
    }

    pub fn tracked_orders(&self) -> usize {
        self.filled_or_cancelled.len()
    }
}

fn check_quantities(order: &Order, requested: SignedQty) -> Result<(), ValidationError> {
    if order.quantity.is_zero() {
        return Err(ValidationError::ZeroOrderQuantity);
    }
    if requested.is_zero() {
        return Err(ValidationError::ZeroRequestedQuantity);
    }
    // no magnitude exists for i128::MIN
    for qty in [order.quantity, requested] {
        if qty.value() == i128::MIN {
            return Err(ValidationError::QuantityOutOfRange(qty));
        }
    }
    if requested.signum() != order.quantity.signum() {
        return Err(ValidationError::SignMismatch {
            order: order.quantity,
            requested,
        });
    }
    Ok(())
}
