// 8.3 engine/collateral.rs: moving collateral in and out of an instrument.
// deposits/withdrawals touch only the unallocated balance. minting locks one full
// pair per unit and hands out long+short tokens; redeeming burns a pair and unlocks it.

use super::core::Engine;
use super::results::{EngineError, MintResult, RedeemResult, TransferResult};
use crate::account::UserAccount;
use crate::collateral_math::{mint_fees, total_collateral_per_unit};
use crate::events::{
    DepositEvent, EventPayload, TokensMintedEvent, TokensRedeemedEvent, TokensTransferredEvent,
    WithdrawalEvent,
};
use crate::token::TokenLedger;
use crate::types::{Address, Amount, InstrumentId};
use tracing::{debug, info};

impl<T: TokenLedger> Engine<T> {
    /// 8.3.1: pull `amount` of collateral from `user` into custody and credit it as
    /// unallocated on the instrument. The user must have approved the custody address.
    pub fn deposit_tokens_for_trading(
        &mut self,
        id: InstrumentId,
        user: Address,
        amount: Amount,
    ) -> Result<Amount, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }
        let state = self.state(id)?;
        if !state.whitelisted {
            return Err(EngineError::NotWhitelisted(id));
        }
        let mut account = state
            .account(user)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(user));
        account.deposit(amount)?;

        let custody = self.config.custody;
        self.collateral_token.transfer_from(custody, user, custody, amount)?;

        let new_balance = account.unallocated;
        self.state_mut(id)?.accounts.insert(user, account);

        info!(instrument = %id, user = %user, amount = %amount, balance = %new_balance, "deposit");
        self.emit_event(EventPayload::Deposit(DepositEvent {
            instrument: id,
            owner: user,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    /// 8.3.2: send unallocated collateral back to `user`. Locked collateral stays put.
    pub fn withdraw_tokens(
        &mut self,
        id: InstrumentId,
        user: Address,
        amount: Amount,
    ) -> Result<Amount, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(amount));
        }
        let mut account = self
            .state(id)?
            .account(user)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(user));
        account.withdraw(amount)?;

        let custody = self.config.custody;
        self.collateral_token.transfer(custody, user, amount)?;

        let new_balance = account.unallocated;
        self.state_mut(id)?.accounts.insert(user, account);

        info!(instrument = %id, user = %user, amount = %amount, balance = %new_balance, "withdrawal");
        self.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
            instrument: id,
            owner: user,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    /// 8.3.3: lock `qty * total_collateral_per_unit` from the unallocated balance and
    /// issue `qty` long and `qty` short tokens.
    ///
    /// With a fee recipient configured, the minting fee is charged either in the
    /// reward token (pulled from `user` through custody) or in collateral (taken
    /// from the unallocated balance on top of the locked amount). Without one,
    /// minting is free.
    pub fn mint_position_tokens(
        &mut self,
        id: InstrumentId,
        user: Address,
        qty: i128,
        pay_fee_in_reward_token: bool,
    ) -> Result<MintResult, EngineError> {
        if qty <= 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }
        let state = self.state(id)?;
        state.settlement.ensure_open()?;
        if !state.whitelisted {
            return Err(EngineError::NotWhitelisted(id));
        }

        let locked = total_collateral_per_unit(&state.instrument)?.checked_mul(qty)?;
        let fees = mint_fees(&state.instrument, qty)?;
        let recipient = self.fee_recipient;
        let fee = match recipient {
            None => Amount::zero(),
            Some(_) if pay_fee_in_reward_token => fees.reward_fee,
            Some(_) => fees.collateral_fee,
        };
        let collateral_fee = if pay_fee_in_reward_token { Amount::zero() } else { fee };

        let mut account = state
            .account(user)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(user));
        account.reserve_collateral(locked.checked_add(collateral_fee)?)?;
        account.issue_tokens(qty)?;

        let mut pool = state.pool.clone();
        pool.lock(locked)?;
        pool.issue_tokens(qty)?;

        let custody = self.config.custody;
        if let Some(recipient) = recipient.filter(|_| fee.is_positive()) {
            if pay_fee_in_reward_token {
                self.reward_token.check_transfer_from(custody, user, fee)?;
                self.reward_token.transfer_from(custody, user, recipient, fee)?;
            } else {
                pool.record_collateral_fee(fee)?;
                self.collateral_token.transfer(custody, recipient, fee)?;
            }
            debug!(instrument = %id, user = %user, fee = %fee, reward = pay_fee_in_reward_token, "mint fee paid");
        }

        let state = self.state_mut(id)?;
        state.pool = pool;
        state.accounts.insert(user, account);

        info!(instrument = %id, user = %user, qty = %qty, locked = %locked, "position tokens minted");
        self.emit_event(EventPayload::TokensMinted(TokensMintedEvent {
            instrument: id,
            owner: user,
            quantity: qty,
            collateral_locked: locked,
            fee_paid: fee,
            fee_in_reward_token: pay_fee_in_reward_token,
        }));

        Ok(MintResult {
            quantity: qty,
            collateral_locked: locked,
            fee_paid: fee,
            fee_in_reward_token: pay_fee_in_reward_token,
        })
    }

    /// 8.3.4: burn `qty` long and `qty` short tokens held by `user` and return the
    /// full pair collateral to their unallocated balance. Only before settlement.
    pub fn redeem_position_tokens(
        &mut self,
        id: InstrumentId,
        user: Address,
        qty: i128,
    ) -> Result<RedeemResult, EngineError> {
        if qty <= 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }
        let state = self.state(id)?;
        state.settlement.ensure_open()?;

        let released = total_collateral_per_unit(&state.instrument)?.checked_mul(qty)?;
        let mut account = state
            .account(user)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(user));
        account.burn_tokens(qty, qty)?;
        account.return_collateral(released)?;

        let mut pool = state.pool.clone();
        pool.burn_tokens(qty, qty)?;
        pool.release(released)?;

        let state = self.state_mut(id)?;
        state.pool = pool;
        state.accounts.insert(user, account);

        info!(instrument = %id, user = %user, qty = %qty, released = %released, "position tokens redeemed");
        self.emit_event(EventPayload::TokensRedeemed(TokensRedeemedEvent {
            instrument: id,
            owner: user,
            quantity: qty,
            collateral_released: released,
        }));

        Ok(RedeemResult {
            quantity: qty,
            collateral_released: released,
        })
    }

    /// 8.3.5: hand long and/or short tokens to another holder. The pool's
    /// outstanding counts do not move, so this stays open after settlement and
    /// the receiver can settle one side on its own.
    pub fn transfer_position_tokens(
        &mut self,
        id: InstrumentId,
        from: Address,
        to: Address,
        long_qty: i128,
        short_qty: i128,
    ) -> Result<TransferResult, EngineError> {
        if long_qty < 0 || short_qty < 0 || (long_qty == 0 && short_qty == 0) {
            return Err(EngineError::InvalidQuantity(long_qty.min(short_qty)));
        }
        if to.is_zero() {
            return Err(EngineError::ZeroAddress);
        }
        if from == to {
            return Err(EngineError::SelfTransfer(from));
        }
        let state = self.state(id)?;

        let mut sender = state
            .account(from)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(from));
        sender.burn_tokens(long_qty, short_qty)?;
        let mut receiver = state
            .account(to)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(to));
        receiver.receive_tokens(long_qty, short_qty)?;

        let state = self.state_mut(id)?;
        state.accounts.insert(from, sender);
        state.accounts.insert(to, receiver);

        debug!(instrument = %id, from = %from, to = %to, long = %long_qty, short = %short_qty, "position tokens transferred");
        self.emit_event(EventPayload::TokensTransferred(TokensTransferredEvent {
            instrument: id,
            from,
            to,
            long_quantity: long_qty,
            short_quantity: short_qty,
        }));

        Ok(TransferResult {
            long_quantity: long_qty,
            short_quantity: short_qty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::instrument::Instrument;
    use crate::types::Timestamp;

    const ETH: InstrumentId = InstrumentId(1);

    fn engine_with(user: Address, deposit: i128) -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine.set_time(Timestamp::from_millis(1_000));
        engine
            .add_instrument(
                Instrument::eth_linear(ETH, Timestamp::from_millis(500_000))
                    .with_fees(Amount::new(7_500), Amount::new(3)),
                true,
            )
            .unwrap();
        let custody = engine.custody();
        engine.collateral_token_mut().mint(user, Amount::new(deposit)).unwrap();
        engine
            .collateral_token_mut()
            .approve(user, custody, Amount::new(deposit))
            .unwrap();
        engine
            .deposit_tokens_for_trading(ETH, user, Amount::new(deposit))
            .unwrap();
        engine
    }

    #[test]
    fn deposit_and_withdraw_move_custody_balance() {
        let user = Address::from_low_u64(1);
        let mut engine = engine_with(user, 1_000_000);
        let custody = engine.custody();
        assert_eq!(engine.collateral_token().balance_of(custody).value(), 1_000_000);
        assert_eq!(engine.unallocated_balance(ETH, user).value(), 1_000_000);

        let left = engine.withdraw_tokens(ETH, user, Amount::new(400_000)).unwrap();
        assert_eq!(left.value(), 600_000);
        assert_eq!(engine.collateral_token().balance_of(user).value(), 400_000);

        assert!(matches!(
            engine.withdraw_tokens(ETH, user, Amount::new(600_001)),
            Err(EngineError::Account(_))
        ));
    }

    #[test]
    fn deposit_requires_whitelist_and_allowance() {
        let user = Address::from_low_u64(1);
        let mut engine = engine_with(user, 1_000);
        engine.set_whitelisted(ETH, false).unwrap();
        assert_eq!(
            engine.deposit_tokens_for_trading(ETH, user, Amount::new(1)),
            Err(EngineError::NotWhitelisted(ETH))
        );

        engine.set_whitelisted(ETH, true).unwrap();
        // allowance used up by the first deposit
        assert!(matches!(
            engine.deposit_tokens_for_trading(ETH, user, Amount::new(1)),
            Err(EngineError::Token(_))
        ));
        assert_eq!(engine.unallocated_balance(ETH, user).value(), 1_000);
    }

    #[test]
    fn mint_with_collateral_fee_then_redeem() {
        let user = Address::from_low_u64(1);
        let recipient = Address::from_low_u64(0xFEE);
        let mut engine = engine_with(user, 10_000_000);
        engine.set_fee_recipient(recipient).unwrap();

        let minted = engine.mint_position_tokens(ETH, user, 2, false).unwrap();
        assert_eq!(minted.collateral_locked.value(), 8_000_000);
        assert_eq!(minted.fee_paid.value(), 15_000);
        assert_eq!(engine.unallocated_balance(ETH, user).value(), 10_000_000 - 8_015_000);
        assert_eq!(engine.collateral_token().balance_of(recipient).value(), 15_000);

        let account = engine.account(ETH, user).unwrap();
        assert_eq!((account.long_tokens, account.short_tokens), (2, 2));

        let redeemed = engine.redeem_position_tokens(ETH, user, 2).unwrap();
        assert_eq!(redeemed.collateral_released.value(), 8_000_000);
        assert_eq!(engine.unallocated_balance(ETH, user).value(), 10_000_000 - 15_000);
        let pool = &engine.instrument(ETH).unwrap().pool;
        assert_eq!(pool.locked_collateral(), Amount::zero());
        assert_eq!(pool.long_tokens_outstanding(), 0);
        assert_eq!(pool.collateral_fees_collected().value(), 15_000);
    }

    #[test]
    fn mint_is_free_without_recipient() {
        let user = Address::from_low_u64(1);
        let mut engine = engine_with(user, 4_000_000);
        let minted = engine.mint_position_tokens(ETH, user, 1, false).unwrap();
        assert_eq!(minted.fee_paid, Amount::zero());
        assert_eq!(engine.unallocated_balance(ETH, user), Amount::zero());
    }

    #[test]
    fn mint_fee_in_reward_token() {
        let user = Address::from_low_u64(1);
        let recipient = Address::from_low_u64(0xFEE);
        let mut engine = engine_with(user, 4_000_000);
        engine.set_fee_recipient(recipient).unwrap();
        let custody = engine.custody();
        engine.reward_token_mut().mint(user, Amount::new(10)).unwrap();
        engine.reward_token_mut().approve(user, custody, Amount::new(10)).unwrap();

        let minted = engine.mint_position_tokens(ETH, user, 1, true).unwrap();
        assert_eq!(minted.fee_paid.value(), 3);
        assert_eq!(engine.reward_token().balance_of(recipient).value(), 3);
        assert_eq!(engine.unallocated_balance(ETH, user), Amount::zero());
    }

    #[test]
    fn failed_mint_changes_nothing() {
        let user = Address::from_low_u64(1);
        let mut engine = engine_with(user, 3_999_999);
        assert!(matches!(
            engine.mint_position_tokens(ETH, user, 1, false),
            Err(EngineError::Account(_))
        ));
        assert_eq!(engine.instrument(ETH).unwrap().pool.locked_collateral(), Amount::zero());
        assert_eq!(engine.account(ETH, user).unwrap().long_tokens, 0);

        assert_eq!(
            engine.mint_position_tokens(ETH, user, 0, false),
            Err(EngineError::InvalidQuantity(0))
        );
    }

    #[test]
    fn redeem_requires_both_sides() {
        let user = Address::from_low_u64(1);
        let mut engine = engine_with(user, 4_000_000);
        assert!(matches!(
            engine.redeem_position_tokens(ETH, user, 1),
            Err(EngineError::Account(_))
        ));
    }

    #[test]
    fn transferred_tokens_follow_the_holder() {
        let minter = Address::from_low_u64(1);
        let buyer = Address::from_low_u64(2);
        let mut engine = engine_with(minter, 8_000_000);
        engine.mint_position_tokens(ETH, minter, 2, false).unwrap();
        let locked = engine.instrument(ETH).unwrap().pool.locked_collateral();

        engine.transfer_position_tokens(ETH, minter, buyer, 2, 0).unwrap();
        let sender = engine.account(ETH, minter).unwrap();
        assert_eq!((sender.long_tokens, sender.short_tokens), (0, 2));
        let receiver = engine.account(ETH, buyer).unwrap();
        assert_eq!((receiver.long_tokens, receiver.short_tokens), (2, 0));

        // escrow untouched, and a split pair can no longer be redeemed
        let pool = &engine.instrument(ETH).unwrap().pool;
        assert_eq!(pool.locked_collateral(), locked);
        assert_eq!(pool.long_tokens_outstanding(), 2);
        assert!(matches!(
            engine.redeem_position_tokens(ETH, minter, 1),
            Err(EngineError::Account(_))
        ));
        assert!(matches!(
            engine.events().last().map(|e| &e.payload),
            Some(EventPayload::TokensTransferred(TokensTransferredEvent { long_quantity: 2, .. }))
        ));
    }

    #[test]
    fn bad_transfers_abort() {
        let minter = Address::from_low_u64(1);
        let buyer = Address::from_low_u64(2);
        let mut engine = engine_with(minter, 4_000_000);
        engine.mint_position_tokens(ETH, minter, 1, false).unwrap();

        assert_eq!(
            engine.transfer_position_tokens(ETH, minter, buyer, 0, 0),
            Err(EngineError::InvalidQuantity(0))
        );
        assert_eq!(
            engine.transfer_position_tokens(ETH, minter, buyer, -1, 1),
            Err(EngineError::InvalidQuantity(-1))
        );
        assert_eq!(
            engine.transfer_position_tokens(ETH, minter, minter, 1, 0),
            Err(EngineError::SelfTransfer(minter))
        );
        assert_eq!(
            engine.transfer_position_tokens(ETH, minter, Address::ZERO, 1, 0),
            Err(EngineError::ZeroAddress)
        );
        assert!(matches!(
            engine.transfer_position_tokens(ETH, minter, buyer, 2, 0),
            Err(EngineError::Account(_))
        ));
        assert!(engine.account(ETH, buyer).is_none());
    }
}
