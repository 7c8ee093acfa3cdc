// 8.0 engine/core.rs: main engine. holds every instrument, both token ledgers, the event log.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::UserAccount;
use crate::config::ClearingConfig;
use crate::events::{Event, EventId, EventPayload};
use crate::instrument::{Instrument, InstrumentState};
use crate::token::{InMemoryLedger, TokenLedger};
use crate::types::{Address, Amount, InstrumentId, OrderHash, SignedQty, Timestamp};
use std::collections::HashMap;
use tracing::{debug, info};

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<T: TokenLedger = InMemoryLedger> {
    pub(super) config: EngineConfig,
    pub(super) instruments: HashMap<InstrumentId, InstrumentState>,
    pub(super) collateral_token: T,
    pub(super) reward_token: T,
    // receives minting fees
    pub(super) fee_recipient: Option<Address>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine<InMemoryLedger> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_ledgers(
            config,
            InMemoryLedger::new("COLLATERAL"),
            InMemoryLedger::new("REWARD"),
        )
    }

    /// Build an engine from a validated configuration and list its instruments at `now`.
    pub fn from_config(config: &ClearingConfig, now: Timestamp) -> Result<Self, EngineError> {
        config.validate()?;
        let mut engine = Self::new(config.engine.clone());
        engine.set_time(now);
        if let Some(recipient) = config.fee_recipient {
            engine.set_fee_recipient(recipient)?;
        }
        for listing in &config.instruments {
            engine.add_instrument(listing.instrument_at(now), listing.whitelisted)?;
        }
        Ok(engine)
    }
}

impl<T: TokenLedger> Engine<T> {
    pub fn with_ledgers(config: EngineConfig, collateral_token: T, reward_token: T) -> Self {
        Self {
            config,
            instruments: HashMap::new(),
            collateral_token,
            reward_token,
            fee_recipient: None,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn custody(&self) -> Address {
        self.config.custody
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    /// List a new instrument. Bounds, multiplier, fees and the expiration window are
    /// checked against the engine clock.
    pub fn add_instrument(&mut self, instrument: Instrument, whitelisted: bool) -> Result<InstrumentId, EngineError> {
        let id = instrument.id;
        if self.instruments.contains_key(&id) {
            return Err(EngineError::InstrumentExists(id));
        }
        instrument.validate(self.current_time, self.config.max_expiration_window_ms)?;

        info!(
            instrument = %id,
            name = %instrument.name,
            kind = ?instrument.kind,
            expiration = %instrument.expiration,
            "instrument listed"
        );
        let state = InstrumentState::new(instrument, whitelisted, self.config.withdrawal_delay_ms);
        self.instruments.insert(id, state);
        Ok(id)
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&InstrumentState> {
        self.instruments.get(&id)
    }

    pub fn instrument_ids(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<InstrumentId> = self.instruments.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(super) fn state(&self, id: InstrumentId) -> Result<&InstrumentState, EngineError> {
        self.instruments
            .get(&id)
            .ok_or(EngineError::InstrumentNotFound(id))
    }

    pub(super) fn state_mut(&mut self, id: InstrumentId) -> Result<&mut InstrumentState, EngineError> {
        self.instruments
            .get_mut(&id)
            .ok_or(EngineError::InstrumentNotFound(id))
    }

    /// Registry verdict for an instrument; deposits and mints require it.
    pub fn set_whitelisted(&mut self, id: InstrumentId, whitelisted: bool) -> Result<(), EngineError> {
        self.state_mut(id)?.whitelisted = whitelisted;
        Ok(())
    }

    pub fn set_fee_recipient(&mut self, recipient: Address) -> Result<(), EngineError> {
        if recipient.is_zero() {
            return Err(EngineError::ZeroAddress);
        }
        self.fee_recipient = Some(recipient);
        Ok(())
    }

    pub fn fee_recipient(&self) -> Option<Address> {
        self.fee_recipient
    }

    pub fn collateral_token(&self) -> &T {
        &self.collateral_token
    }

    pub fn collateral_token_mut(&mut self) -> &mut T {
        &mut self.collateral_token
    }

    pub fn reward_token(&self) -> &T {
        &self.reward_token
    }

    pub fn reward_token_mut(&mut self) -> &mut T {
        &mut self.reward_token
    }

    pub fn account(&self, id: InstrumentId, owner: Address) -> Option<&UserAccount> {
        self.instruments.get(&id).and_then(|s| s.account(owner))
    }

    pub fn net_position(&self, id: InstrumentId, owner: Address) -> SignedQty {
        self.account(id, owner)
            .map(UserAccount::net_position)
            .unwrap_or_default()
    }

    pub fn unallocated_balance(&self, id: InstrumentId, owner: Address) -> Amount {
        self.account(id, owner)
            .map(|a| a.unallocated)
            .unwrap_or_default()
    }

    /// Cumulative signed quantity filled or cancelled for an order hash.
    pub fn order_filled_or_cancelled(&self, id: InstrumentId, hash: &OrderHash) -> Result<SignedQty, EngineError> {
        Ok(self.state(id)?.fills.filled_or_cancelled(hash))
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_for(&self, id: InstrumentId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.instrument() == id)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        debug!(event_id = event.id.0, payload = ?event.payload, "event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
