//! Engine configuration options.

use crate::types::Address;
use serde::{Deserialize, Serialize};

pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Time after settlement before positions and tokens can be closed out.
    pub withdrawal_delay_ms: i64,
    /// Furthest an instrument's expiration may lie from listing time.
    pub max_expiration_window_ms: i64,
    /// Escrow address holding every deposited token on the ledgers.
    pub custody: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            withdrawal_delay_ms: HOUR_MS,
            max_expiration_window_ms: 60 * DAY_MS,
            custody: Address::from_low_u64(0xC057_0D1A),
        }
    }
}
