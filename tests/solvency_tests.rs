//! Solvency invariant tests.
//!
//! These tests verify the escrow always holds exactly what open exposure needs,
//! and that every unit of collateral is paid back out once the contract settles.

use clearing_core::*;
use proptest::prelude::*;

const ETH: InstrumentId = InstrumentId(1);
const BTC: InstrumentId = InstrumentId(2);

#[derive(Debug, Clone)]
enum Op {
    Trade { maker: usize, taker: usize, qty: i128, price: i128 },
    Mint { user: usize, qty: i128 },
    Redeem { user: usize, qty: i128 },
}

fn op_strategy(floor: i128, cap: i128) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..4usize, 0..4usize, (-20i128..=20i128).prop_filter("non-zero", |q| *q != 0), floor..=cap)
            .prop_map(|(maker, taker, qty, price)| Op::Trade { maker, taker, qty, price }),
        1 => (0..4usize, 1i128..5i128).prop_map(|(user, qty)| Op::Mint { user, qty }),
        1 => (0..4usize, 1i128..5i128).prop_map(|(user, qty)| Op::Redeem { user, qty }),
    ]
}

struct Market {
    engine: Engine,
    wallets: Vec<Wallet>,
    salt: u64,
}

impl Market {
    fn new(id: InstrumentId, deposit: i128) -> Self {
        let mut engine = Engine::new(EngineConfig {
            withdrawal_delay_ms: 1_000,
            ..EngineConfig::default()
        });
        engine.set_time(Timestamp::from_millis(1_000));
        let instrument = if id == ETH {
            Instrument::eth_linear(id, Timestamp::from_millis(1_000_000))
        } else {
            Instrument::btc_inverse(id, Timestamp::from_millis(1_000_000))
        };
        engine
            .add_instrument(instrument.with_fees(Amount::new(11), Amount::zero()), true)
            .unwrap();
        engine.set_fee_recipient(Address::from_low_u64(0xFEE)).unwrap();

        let custody = engine.custody();
        let wallets: Vec<Wallet> = (1..=4u8)
            .map(|n| Wallet::from_secret(&[n; 32]).unwrap())
            .collect();
        for wallet in &wallets {
            let user = wallet.address();
            engine.collateral_token_mut().mint(user, Amount::new(deposit)).unwrap();
            engine.collateral_token_mut().approve(user, custody, Amount::new(deposit)).unwrap();
            engine.deposit_tokens_for_trading(id, user, Amount::new(deposit)).unwrap();
        }
        Self { engine, wallets, salt: 0 }
    }

    fn apply(&mut self, id: InstrumentId, op: &Op) {
        match *op {
            Op::Trade { maker, taker, qty, price } => {
                let wallet = &self.wallets[maker];
                self.salt += 1;
                let order = Order::new(
                    id,
                    wallet.address(),
                    Price::new_unchecked(price),
                    SignedQty::new(qty),
                    Timestamp::from_millis(500_000),
                )
                .with_salt(self.salt);
                let signature = wallet.sign_order(&order).unwrap();
                let taker = self.wallets[taker].address();
                // self-trades and underfunded legs abort; that is part of what we test
                let _ = self.engine.trade_order(&order, SignedQty::new(qty), &signature, taker);
            }
            Op::Mint { user, qty } => {
                let _ = self.engine.mint_position_tokens(id, self.wallets[user].address(), qty, false);
            }
            Op::Redeem { user, qty } => {
                let _ = self.engine.redeem_position_tokens(id, self.wallets[user].address(), qty);
            }
        }
    }

    fn users(&self) -> Vec<Address> {
        self.wallets.iter().map(Wallet::address).collect()
    }

    fn total_unallocated(&self, id: InstrumentId) -> Amount {
        self.engine.instrument(id).unwrap().total_unallocated()
    }

    fn locked(&self, id: InstrumentId) -> Amount {
        self.engine.instrument(id).unwrap().pool.locked_collateral()
    }

    fn custody_balance(&self) -> Amount {
        self.engine.collateral_token().balance_of(self.engine.custody())
    }
}

fn check_escrow(market: &Market, id: InstrumentId) -> Result<(), TestCaseError> {
    let locked = market.locked(id);
    prop_assert_eq!(locked, market.engine.expected_locked_collateral(id).unwrap());
    prop_assert_eq!(
        market.custody_balance(),
        market.total_unallocated(id).checked_add(locked).unwrap()
    );
    let net: i128 = market
        .users()
        .iter()
        .map(|u| market.engine.net_position(id, *u).value())
        .sum();
    prop_assert_eq!(net, 0);
    Ok(())
}

fn settle_everyone(market: &mut Market, id: InstrumentId, price: Price) -> Result<(), TestCaseError> {
    market.engine.set_time(Timestamp::from_millis(1_000_000));
    let outcome = market.engine.push_price(id, price).unwrap();
    let is_settled = matches!(outcome, PriceOutcome::Settled { .. });
    prop_assert!(is_settled);
    market.engine.advance_time(1_000);

    for user in market.users() {
        if !market.engine.net_position(id, user).is_zero() {
            market.engine.settle_and_close_position(id, user).unwrap();
        }
        let (long, short) = market
            .engine
            .account(id, user)
            .map(|a| (a.long_tokens, a.short_tokens))
            .unwrap_or_default();
        if long > 0 || short > 0 {
            market.engine.settle_and_close(id, user, long, short).unwrap();
        }
    }

    prop_assert_eq!(market.locked(id), Amount::zero());
    prop_assert_eq!(market.custody_balance(), market.total_unallocated(id));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Locked collateral matches open exposure after every operation, successful or not
    #[test]
    fn linear_escrow_matches_exposure(
        ops in proptest::collection::vec(op_strategy(100_000, 500_000), 1..30),
        final_price in 50_000i128..600_000i128,
    ) {
        let mut market = Market::new(ETH, 60_000_000);
        for op in &ops {
            market.apply(ETH, op);
            check_escrow(&market, ETH)?;
        }
        settle_everyone(&mut market, ETH, Price::new_unchecked(final_price))?;
    }

    /// Same invariant for the inverse contract, where every term is truncated
    #[test]
    fn inverse_escrow_matches_exposure(
        ops in proptest::collection::vec(op_strategy(1_400_000_000_000, 3_000_000_000_000), 1..30),
        final_price in 1_000_000_000_000i128..3_500_000_000_000i128,
    ) {
        let mut market = Market::new(BTC, 100_000_000_000_000);
        for op in &ops {
            market.apply(BTC, op);
            check_escrow(&market, BTC)?;
        }
        settle_everyone(&mut market, BTC, Price::new_unchecked(final_price))?;
    }
}

#[test]
fn settlement_pays_out_exactly_the_pool() {
    let mut market = Market::new(ETH, 60_000_000);
    let ops = [
        Op::Trade { maker: 0, taker: 1, qty: 5, price: 200_000 },
        Op::Trade { maker: 1, taker: 2, qty: -3, price: 350_000 },
        Op::Mint { user: 3, qty: 2 },
        Op::Trade { maker: 2, taker: 0, qty: 7, price: 120_000 },
        Op::Redeem { user: 3, qty: 1 },
    ];
    for op in &ops {
        market.apply(ETH, op);
    }
    check_escrow(&market, ETH).unwrap();
    assert!(market.locked(ETH).is_positive());

    settle_everyone(&mut market, ETH, Price::new_unchecked(275_000)).unwrap();
}
