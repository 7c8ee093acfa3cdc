//! Clearing Core Simulation.
//!
//! Walks one instrument through its whole life: deposits, signed order fills with
//! LIFO netting, token minting, oracle-driven settlement and final close-out.
//!
//! Usage: `clearing-sim [config.json]`. Without a path the testnet preset is used.
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=clearing_core=debug`).

use clearing_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

const ETH: InstrumentId = InstrumentId(1);

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ClearingConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ClearingConfig::testnet(),
    };

    println!("Clearing Core Engine Simulation");
    println!("Fully Collateralized Contracts, LIFO Netting, Oracle Settlement\n");

    scenario_1_listing(&config)?;
    scenario_2_signed_order_fill(&config)?;
    scenario_3_lifo_netting(&config)?;
    scenario_4_mint_and_redeem(&config)?;
    scenario_5_settlement(&config)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn start(config: &ClearingConfig) -> Result<Engine, EngineError> {
    Engine::from_config(config, Timestamp::from_millis(1_000))
}

fn fund(engine: &mut Engine, user: Address, amount: i128) -> SimResult {
    let custody = engine.custody();
    let amount = Amount::new(amount);
    engine.collateral_token_mut().mint(user, amount)?;
    engine.collateral_token_mut().approve(user, custody, amount)?;
    engine.deposit_tokens_for_trading(ETH, user, amount)?;
    Ok(())
}

fn print_stack(engine: &Engine, label: &str, owner: Address) {
    let lots: Vec<String> = engine
        .positions_of(ETH, owner)
        .iter()
        .map(|(price, qty)| format!("{}@{}", qty, price))
        .collect();
    println!(
        "  {}: net {}, lots [{}], unallocated {}",
        label,
        engine.net_position(ETH, owner),
        lots.join(", "),
        engine.unallocated_balance(ETH, owner)
    );
}

/// Instruments listed from configuration, with their collateral per pair.
fn scenario_1_listing(config: &ClearingConfig) -> SimResult {
    println!("Scenario 1: Instrument Listing\n");

    let engine = start(config)?;
    for id in engine.instrument_ids() {
        let Some(state) = engine.instrument(id) else { continue };
        let inst = &state.instrument;
        println!(
            "  {} {} ({:?}): band [{}, {}], pair collateral {}, expires {}",
            id,
            inst.name,
            inst.kind,
            inst.price_floor,
            inst.price_cap,
            total_collateral_per_unit(inst)?,
            inst.expiration
        );
    }
    println!();
    Ok(())
}

/// A maker signs an order off-book, a taker fills part of it.
fn scenario_2_signed_order_fill(config: &ClearingConfig) -> SimResult {
    println!("Scenario 2: Signed Order Fill\n");

    let mut engine = start(config)?;
    let maker = Wallet::from_secret(&[7u8; 32])?;
    let taker = Address::from_low_u64(0xB0B);
    let fee_recipient = Address::from_low_u64(0xFEE5);
    fund(&mut engine, maker.address(), 50_000_000)?;
    fund(&mut engine, taker, 50_000_000)?;

    let custody = engine.custody();
    for payer in [maker.address(), taker] {
        engine.reward_token_mut().mint(payer, Amount::new(100))?;
        engine.reward_token_mut().approve(payer, custody, Amount::new(100))?;
    }

    let order = Order::new(
        ETH,
        maker.address(),
        Price::new_unchecked(250_000),
        SignedQty::new(10),
        Timestamp::from_millis(3_600_000),
    )
    .with_fees(fee_recipient, Amount::new(20), Amount::new(40))
    .with_salt(1);
    let signature = maker.sign_order(&order)?;

    println!("  Maker {} signs BUY 10 @ 2500.00", maker.address());
    let result = engine.trade_order(&order, SignedQty::new(4), &signature, taker)?;
    println!(
        "  Taker fills {}: maker fee {}, taker fee {}",
        result.filled, result.maker_fee_paid, result.taker_fee_paid
    );

    let replay = engine.trade_order(&order, SignedQty::new(100), &signature, taker)?;
    println!("  Taker asks for 100 more, gets the remaining {}", replay.filled);
    let dead = engine.trade_order(&order, SignedQty::new(1), &signature, taker)?;
    println!("  Another fill attempt: error code {:?}", dead.error.map(|c| c.code()));

    print_stack(&engine, "Maker", maker.address());
    print_stack(&engine, "Taker", taker);
    println!(
        "  Fee recipient holds {} reward tokens\n",
        engine.reward_token().balance_of(fee_recipient)
    );
    Ok(())
}

/// Opening, adding, reducing and flipping a position, all against one counterparty.
fn scenario_3_lifo_netting(config: &ClearingConfig) -> SimResult {
    println!("Scenario 3: LIFO Netting\n");

    let mut engine = start(config)?;
    let alice = Wallet::from_secret(&[11u8; 32])?;
    let bob = Address::from_low_u64(0xB0B);
    fund(&mut engine, alice.address(), 100_000_000)?;
    fund(&mut engine, bob, 100_000_000)?;

    let steps = [(2, 100_000), (3, 110_000), (-4, 120_000), (-3, 115_000)];
    for (salt, (qty, price)) in steps.into_iter().enumerate() {
        let order = Order::new(
            ETH,
            alice.address(),
            Price::new_unchecked(price),
            SignedQty::new(qty),
            Timestamp::from_millis(3_600_000),
        )
        .with_salt(salt as u64);
        let signature = alice.sign_order(&order)?;
        engine.trade_order(&order, SignedQty::new(qty), &signature, bob)?;
        println!("  Alice trades {} @ {}", qty, price);
        print_stack(&engine, "Alice", alice.address());
    }

    let realized = engine
        .account(ETH, alice.address())
        .map(|a| a.realized_pnl)
        .unwrap_or_default();
    println!("  Alice realized PnL: {}", realized);
    println!(
        "  Pool locked {} (expected {})\n",
        engine
            .instrument(ETH)
            .map(|s| s.pool.locked_collateral())
            .unwrap_or_default(),
        engine.expected_locked_collateral(ETH)?
    );
    Ok(())
}

/// Minting a long/short pair and redeeming it back.
fn scenario_4_mint_and_redeem(config: &ClearingConfig) -> SimResult {
    println!("Scenario 4: Mint and Redeem\n");

    let mut engine = start(config)?;
    let carol = Address::from_low_u64(0xCA401);
    fund(&mut engine, carol, 20_000_000)?;

    let minted = engine.mint_position_tokens(ETH, carol, 3, false)?;
    println!(
        "  Carol mints 3 pairs: locked {}, fee {} (collateral)",
        minted.collateral_locked, minted.fee_paid
    );
    let redeemed = engine.redeem_position_tokens(ETH, carol, 2)?;
    println!("  Carol redeems 2 pairs: released {}", redeemed.collateral_released);
    if let Some(account) = engine.account(ETH, carol) {
        println!(
            "  Carol holds {} long / {} short tokens, unallocated {}\n",
            account.long_tokens, account.short_tokens, account.unallocated
        );
    }
    Ok(())
}

/// An oracle tape drives the contract through its cap; everyone closes out.
fn scenario_5_settlement(config: &ClearingConfig) -> SimResult {
    println!("Scenario 5: Oracle Settlement\n");

    let mut engine = start(config)?;
    let maker = Wallet::from_secret(&[21u8; 32])?;
    let taker = Address::from_low_u64(0xD0D);
    let holder = Address::from_low_u64(0xE0E);
    fund(&mut engine, maker.address(), 30_000_000)?;
    fund(&mut engine, taker, 30_000_000)?;
    fund(&mut engine, holder, 10_000_000)?;

    let order = Order::new(
        ETH,
        maker.address(),
        Price::new_unchecked(300_000),
        SignedQty::new(-5),
        Timestamp::from_millis(3_600_000),
    );
    let signature = maker.sign_order(&order)?;
    engine.trade_order(&order, SignedQty::new(-5), &signature, taker)?;
    engine.mint_position_tokens(ETH, holder, 2, false)?;
    println!("  Maker shorts 5 @ 3000.00 to taker, holder mints 2 pairs");

    let mut tape = ScriptedPriceFeed::new(vec![
        PriceUpdate::new(dec!(3200.50), Timestamp::from_millis(2_000), 1),
        PriceUpdate::new(dec!(4800.00), Timestamp::from_millis(3_000), 1),
        PriceUpdate::new(dec!(5150.00), Timestamp::from_millis(4_000), 1),
    ]);
    while tape.remaining() > 0 {
        engine.advance_time(1_000);
        if let Some(outcome) = engine.poll_price_source(ETH, &mut tape)? {
            println!("  t={} oracle -> {:?}", engine.time(), outcome);
        }
    }

    let delay = engine.config().withdrawal_delay_ms;
    engine.advance_time(delay);
    println!("  Withdrawal delay of {}ms elapsed", delay);

    for (label, owner) in [("Maker", maker.address()), ("Taker", taker)] {
        let settled = engine.settle_and_close_position(ETH, owner)?;
        println!(
            "  {} closes {} @ {}: payout {}, realized PnL {}",
            label, settled.quantity, settled.settlement_price, settled.payout, settled.realized_pnl
        );
    }
    let tokens = engine.settle_and_close(ETH, holder, 2, 2)?;
    println!("  Holder settles 2 long + 2 short tokens: payout {}", tokens.payout);

    let locked = engine
        .instrument(ETH)
        .map(|s| s.pool.locked_collateral())
        .unwrap_or_default();
    println!("  Pool locked collateral after close-out: {}", locked);
    Ok(())
}
