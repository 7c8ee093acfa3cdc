// Price Feed Integration
//
// The settlement controller does not care where a price comes from. A source only
// has to answer "is there a price for me at `now`?"; the engine converts the decimal
// answer into the instrument's raw integer units and pushes it.

use crate::types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Unique identifier for a price source
pub type PriceSourceId = u32;

/// A single price observation, in human units (e.g. 2500.25 USD)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub price: Decimal,
    pub timestamp: Timestamp,
    pub source_id: PriceSourceId,
}

impl PriceUpdate {
    pub fn new(price: Decimal, timestamp: Timestamp, source_id: PriceSourceId) -> Self {
        Self {
            price,
            timestamp,
            source_id,
        }
    }
}

/// Capability handed to the engine when polling for settlement prices.
/// An oracle adapter either answers immediately or returns nothing.
pub trait PriceSource {
    fn fetch_or_push(&mut self, now: Timestamp) -> Option<PriceUpdate>;
}

/// Mock adapter for testing
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    source_id: PriceSourceId,
    name: String,
    current_price: Decimal,
    healthy: bool,
}

impl MockPriceFeed {
    pub fn new(source_id: PriceSourceId, name: &str, price: Decimal) -> Self {
        Self {
            source_id,
            name: name.to_string(),
            current_price: price,
            healthy: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_price(&mut self, price: Decimal) {
        self.current_price = price;
    }

    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}

impl PriceSource for MockPriceFeed {
    fn fetch_or_push(&mut self, now: Timestamp) -> Option<PriceUpdate> {
        if self.healthy {
            Some(PriceUpdate::new(self.current_price, now, self.source_id))
        } else {
            None
        }
    }
}

/// Replays a fixed tape of updates. Each poll releases the oldest update whose
/// timestamp has been reached; updates from the future stay queued.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPriceFeed {
    pending: VecDeque<PriceUpdate>,
}

impl ScriptedPriceFeed {
    pub fn new(mut updates: Vec<PriceUpdate>) -> Self {
        updates.sort_by_key(|u| u.timestamp);
        Self {
            pending: updates.into(),
        }
    }

    pub fn push(&mut self, update: PriceUpdate) {
        let idx = self
            .pending
            .iter()
            .position(|u| u.timestamp > update.timestamp)
            .unwrap_or(self.pending.len());
        self.pending.insert(idx, update);
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl PriceSource for ScriptedPriceFeed {
    fn fetch_or_push(&mut self, now: Timestamp) -> Option<PriceUpdate> {
        match self.pending.front() {
            Some(next) if next.timestamp <= now => self.pending.pop_front(),
            _ => None,
        }
    }
}
