// 7.0 config.rs: all settings in one place. engine knobs, fee recipient, listings.
// 7.1 InstrumentListing describes a contract relative to listing time so presets
// and JSON files stay valid whenever they are loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::engine::{EngineConfig, DAY_MS, HOUR_MS};
use crate::instrument::{ContractKind, Instrument, InstrumentError};
use crate::types::{Address, Amount, InstrumentId, Price, Timestamp};

// One contract to list at engine start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentListing {
    pub id: InstrumentId,
    pub name: String,
    pub kind: ContractKind,
    pub price_floor: Price,
    pub price_cap: Price,
    pub price_decimal_places: u32,
    pub qty_multiplier: i128,
    #[serde(default)]
    pub collateral_fee_per_unit: Amount,
    #[serde(default)]
    pub reward_fee_per_unit: Amount,
    // expiration = listing time + expires_in_ms
    pub expires_in_ms: i64,
    #[serde(default = "default_whitelisted")]
    pub whitelisted: bool,
}

fn default_whitelisted() -> bool {
    true
}

impl InstrumentListing {
    pub fn from_template(template: &Instrument, expires_in_ms: i64) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            kind: template.kind,
            price_floor: template.price_floor,
            price_cap: template.price_cap,
            price_decimal_places: template.price_decimal_places,
            qty_multiplier: template.qty_multiplier,
            collateral_fee_per_unit: template.collateral_fee_per_unit,
            reward_fee_per_unit: template.reward_fee_per_unit,
            expires_in_ms,
            whitelisted: true,
        }
    }

    pub fn eth_linear(id: InstrumentId, expires_in_ms: i64) -> Self {
        Self::from_template(&Instrument::eth_linear(id, Timestamp::from_millis(0)), expires_in_ms)
    }

    pub fn btc_inverse(id: InstrumentId, expires_in_ms: i64) -> Self {
        Self::from_template(&Instrument::btc_inverse(id, Timestamp::from_millis(0)), expires_in_ms)
    }

    pub fn with_fees(mut self, collateral_fee_per_unit: Amount, reward_fee_per_unit: Amount) -> Self {
        self.collateral_fee_per_unit = collateral_fee_per_unit;
        self.reward_fee_per_unit = reward_fee_per_unit;
        self
    }

    pub fn instrument_at(&self, listed_at: Timestamp) -> Instrument {
        let expiration = listed_at.plus_millis(self.expires_in_ms);
        let mut instrument = Instrument::linear(
            self.id,
            &self.name,
            self.price_floor,
            self.price_cap,
            self.price_decimal_places,
            self.qty_multiplier,
            expiration,
        )
        .with_fees(self.collateral_fee_per_unit, self.reward_fee_per_unit);
        instrument.kind = self.kind;
        instrument
    }
}

// The complete clearing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingConfig {
    pub environment: Environment,
    pub engine: EngineConfig,
    // receives minting fees; None = minting is free
    pub fee_recipient: Option<Address>,
    pub instruments: Vec<InstrumentListing>,
}

impl Default for ClearingConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            engine: EngineConfig::default(),
            fee_recipient: Some(Address::from_low_u64(0xFEE)),
            instruments: vec![InstrumentListing::eth_linear(InstrumentId(1), 30 * DAY_MS)],
        }
    }
}

impl ClearingConfig {
    // Create a configuration preset for testnet
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Testnet;
        config.engine.withdrawal_delay_ms = 60_000; // one minute on testnet
        config.instruments = vec![
            InstrumentListing::eth_linear(InstrumentId(1), 7 * DAY_MS)
                .with_fees(Amount::new(7_500), Amount::new(1)),
            InstrumentListing::btc_inverse(InstrumentId(2), 7 * DAY_MS),
        ];
        config
    }

    // Create a configuration preset for mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Mainnet;
        config.engine.withdrawal_delay_ms = 24 * HOUR_MS;
        config.engine.max_expiration_window_ms = 365 * DAY_MS;
        config.engine.max_events = 1_000_000;
        config.instruments = vec![
            InstrumentListing::eth_linear(InstrumentId(1), 90 * DAY_MS)
                .with_fees(Amount::new(7_500), Amount::new(5)),
            InstrumentListing::btc_inverse(InstrumentId(2), 90 * DAY_MS)
                .with_fees(Amount::new(113_636_363), Amount::new(5)),
        ];
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // engine checks
        if self.engine.max_events == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "Event log must retain at least one event".to_string(),
            });
        }
        if self.engine.withdrawal_delay_ms < 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "Withdrawal delay cannot be negative".to_string(),
            });
        }
        if self.engine.max_expiration_window_ms <= 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "Expiration window must be positive".to_string(),
            });
        }
        if self.engine.custody.is_zero() {
            return Err(ConfigError::ZeroAddress { field: "engine.custody" });
        }
        if self.fee_recipient.is_some_and(|a| a.is_zero()) {
            return Err(ConfigError::ZeroAddress { field: "fee_recipient" });
        }

        // listing checks
        let mut seen = HashSet::new();
        for listing in &self.instruments {
            if !seen.insert(listing.id) {
                return Err(ConfigError::DuplicateInstrument(listing.id));
            }
            if listing.expires_in_ms <= 0 || listing.expires_in_ms > self.engine.max_expiration_window_ms {
                return Err(ConfigError::ExpirationOutsideWindow {
                    id: listing.id,
                    expires_in_ms: listing.expires_in_ms,
                    max_window_ms: self.engine.max_expiration_window_ms,
                });
            }
            listing
                .instrument_at(Timestamp::from_millis(0))
                .validate_bounds()
                .map_err(|source| ConfigError::InvalidInstrument { id: listing.id, source })?;
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid engine config: {reason}")]
    InvalidEngine { reason: String },

    #[error("{field} cannot be the zero address")]
    ZeroAddress { field: &'static str },

    #[error("Instrument {0} listed twice")]
    DuplicateInstrument(InstrumentId),

    #[error("Instrument {id} expires in {expires_in_ms}ms, window is {max_window_ms}ms")]
    ExpirationOutsideWindow {
        id: InstrumentId,
        expires_in_ms: i64,
        max_window_ms: i64,
    },

    #[error("Instrument {id}: {source}")]
    InvalidInstrument { id: InstrumentId, source: InstrumentError },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ClearingConfig {
        match self {
            Environment::Development => ClearingConfig::default(),
            Environment::Testnet => ClearingConfig::testnet(),
            Environment::Mainnet => ClearingConfig::mainnet_conservative(),
        }
    }
}
