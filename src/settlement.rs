// 9.1 settlement.rs: the per-instrument settlement state machine.
// Open -> Settling -> Settled. Settling only exists inside a single push_price call;
// Settled is terminal and the settlement price never changes once frozen.

use crate::instrument::Instrument;
use crate::types::{Price, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Open,
    Settling,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_price: Price,
    pub settled_at: Timestamp,
}

// Why a push settled the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementTrigger {
    Expired,
    BelowFloor,
    AboveCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOutcome {
    // price stored as the latest observation, contract still open
    Recorded(Price),
    Settled {
        record: SettlementRecord,
        trigger: SettlementTrigger,
    },
    // already settled, nothing changed
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementController {
    state: SettlementState,
    record: Option<SettlementRecord>,
    last_price: Option<(Price, Timestamp)>,
    withdrawal_delay_ms: i64,
}

impl SettlementController {
    pub fn new(withdrawal_delay_ms: i64) -> Self {
        Self {
            state: SettlementState::Open,
            record: None,
            last_price: None,
            withdrawal_delay_ms,
        }
    }

    pub fn state(&self) -> SettlementState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        self.state == SettlementState::Settled
    }

    pub fn record(&self) -> Option<SettlementRecord> {
        self.record
    }

    pub fn settlement_price(&self) -> Option<Price> {
        self.record.map(|r| r.settlement_price)
    }

    pub fn last_price(&self) -> Option<(Price, Timestamp)> {
        self.last_price
    }

    pub fn withdrawal_delay_ms(&self) -> i64 {
        self.withdrawal_delay_ms
    }

    pub fn push_price(&mut self, instrument: &Instrument, price: Price, at: Timestamp) -> PriceOutcome {
        if self.is_settled() {
            return PriceOutcome::Ignored;
        }

        let trigger = if instrument.is_expired(at) {
            Some(SettlementTrigger::Expired)
        } else if price <= instrument.price_floor {
            Some(SettlementTrigger::BelowFloor)
        } else if price >= instrument.price_cap {
            Some(SettlementTrigger::AboveCap)
        } else {
            None
        };

        match trigger {
            None => {
                self.last_price = Some((price, at));
                PriceOutcome::Recorded(price)
            }
            Some(trigger) => {
                self.state = SettlementState::Settling;
                let record = SettlementRecord {
                    settlement_price: instrument.clamp_price(price),
                    settled_at: at,
                };
                self.record = Some(record);
                self.last_price = Some((price, at));
                self.state = SettlementState::Settled;
                PriceOutcome::Settled { record, trigger }
            }
        }
    }

    // the earliest time settled positions may be closed out
    pub fn withdrawable_at(&self) -> Option<Timestamp> {
        self.record
            .map(|r| r.settled_at.plus_millis(self.withdrawal_delay_ms))
    }

    pub fn can_withdraw(&self, now: Timestamp) -> bool {
        self.withdrawable_at().is_some_and(|ready| now >= ready)
    }

    pub fn ensure_open(&self) -> Result<(), SettlementError> {
        match self.record {
            Some(record) => Err(SettlementError::AlreadySettled {
                settlement_price: record.settlement_price,
            }),
            None => Ok(()),
        }
    }

    // settled and past the withdrawal delay; hands back the frozen record
    pub fn ensure_withdrawable(&self, now: Timestamp) -> Result<SettlementRecord, SettlementError> {
        let record = self.record.ok_or(SettlementError::NotSettled)?;
        let ready_at = record.settled_at.plus_millis(self.withdrawal_delay_ms);
        if now < ready_at {
            return Err(SettlementError::WithdrawalDelayPending { ready_at, now });
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Contract already settled at {settlement_price}")]
    AlreadySettled { settlement_price: Price },

    #[error("Contract is not settled")]
    NotSettled,

    #[error("Withdrawal delay pending until {ready_at} (now {now})")]
    WithdrawalDelayPending { ready_at: Timestamp, now: Timestamp },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstrumentId;

    fn eth() -> Instrument {
        Instrument::eth_linear(InstrumentId(1), Timestamp::from_millis(100_000))
    }

    fn at(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn in_band_push_records_last_price() {
        let inst = eth();
        let mut controller = SettlementController::new(1_000);
        let outcome = controller.push_price(&inst, Price::new_unchecked(300_000), at(10));

        assert_eq!(outcome, PriceOutcome::Recorded(Price::new_unchecked(300_000)));
        assert_eq!(controller.state(), SettlementState::Open);
        assert_eq!(controller.last_price(), Some((Price::new_unchecked(300_000), at(10))));
        assert!(controller.ensure_open().is_ok());
    }

    #[test]
    fn breaching_the_cap_settles_at_the_cap() {
        let inst = eth();
        let mut controller = SettlementController::new(1_000);
        let outcome = controller.push_price(&inst, Price::new_unchecked(900_000), at(10));

        match outcome {
            PriceOutcome::Settled { record, trigger } => {
                assert_eq!(record.settlement_price, inst.price_cap);
                assert_eq!(trigger, SettlementTrigger::AboveCap);
            }
            other => panic!("expected settlement, got {:?}", other),
        }
        assert!(controller.is_settled());
    }

    #[test]
    fn touching_the_floor_settles() {
        let inst = eth();
        let mut controller = SettlementController::new(0);
        let outcome = controller.push_price(&inst, inst.price_floor, at(10));
        assert!(matches!(
            outcome,
            PriceOutcome::Settled { trigger: SettlementTrigger::BelowFloor, .. }
        ));
        assert_eq!(controller.settlement_price(), Some(inst.price_floor));
    }

    #[test]
    fn expiry_settles_at_the_pushed_price() {
        let inst = eth();
        let mut controller = SettlementController::new(0);
        let outcome = controller.push_price(&inst, Price::new_unchecked(320_000), at(100_000));
        assert!(matches!(
            outcome,
            PriceOutcome::Settled { trigger: SettlementTrigger::Expired, .. }
        ));
        assert_eq!(controller.settlement_price(), Some(Price::new_unchecked(320_000)));
    }

    #[test]
    fn settlement_is_terminal() {
        let inst = eth();
        let mut controller = SettlementController::new(0);
        controller.push_price(&inst, Price::new_unchecked(900_000), at(10));
        let frozen = controller.record();

        let outcome = controller.push_price(&inst, Price::new_unchecked(200_000), at(20));
        assert_eq!(outcome, PriceOutcome::Ignored);
        assert_eq!(controller.record(), frozen);
        assert!(matches!(
            controller.ensure_open(),
            Err(SettlementError::AlreadySettled { .. })
        ));
    }

    #[test]
    fn withdrawal_waits_for_the_delay() {
        let inst = eth();
        let mut controller = SettlementController::new(5_000);
        assert!(!controller.can_withdraw(at(1_000_000)));
        assert_eq!(controller.ensure_withdrawable(at(0)), Err(SettlementError::NotSettled));

        controller.push_price(&inst, Price::new_unchecked(50_000), at(1_000));
        assert!(!controller.can_withdraw(at(5_999)));
        assert!(matches!(
            controller.ensure_withdrawable(at(5_999)),
            Err(SettlementError::WithdrawalDelayPending { .. })
        ));
        assert!(controller.can_withdraw(at(6_000)));
        assert!(controller.ensure_withdrawable(at(6_000)).is_ok());
    }
}
