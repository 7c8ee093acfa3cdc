//! Property-based tests for the collateral math, the LIFO stack and fill clipping.
//!
//! These tests verify invariants hold under random inputs.

use clearing_core::*;
use proptest::prelude::*;

const FAR: Timestamp = Timestamp(1_000_000);

// Strategies for generating test data
fn band_strategy() -> impl Strategy<Value = (i128, i128)> {
    (1i128..1_000_000i128, 1i128..1_000_000i128).prop_map(|(floor, width)| (floor, floor + width))
}

fn multiplier_strategy() -> impl Strategy<Value = i128> {
    prop_oneof![1i128..1_000i128, Just(100_000_000_000_000_000_000_000i128)]
}

fn fill_strategy() -> impl Strategy<Value = (i128, i128)> {
    // (signed qty, price)
    ((-50i128..=50i128).prop_filter("non-zero", |q| *q != 0), 100_000i128..500_000i128)
}

fn instrument(kind: ContractKind, floor: i128, cap: i128, m: i128) -> Instrument {
    let floor = Price::new_unchecked(floor);
    let cap = Price::new_unchecked(cap);
    match kind {
        ContractKind::Linear => Instrument::linear(InstrumentId(1), "LIN", floor, cap, 2, m, FAR),
        ContractKind::Inverse => Instrument::inverse(InstrumentId(1), "INV", floor, cap, 8, m, FAR),
    }
}

proptest! {
    /// A long and a short at the same price always add up to one full pair
    #[test]
    fn sides_sum_to_total(
        (floor, cap) in band_strategy(),
        m in multiplier_strategy(),
        offset in 0i128..2_000_000i128,
        inverse in any::<bool>(),
    ) {
        let kind = if inverse { ContractKind::Inverse } else { ContractKind::Linear };
        let inst = instrument(kind, floor, cap, m);
        let price = Price::new_unchecked(floor / 2 + 1 + offset);

        let long = long_collateral_per_unit(&inst, price).unwrap();
        let short = short_collateral_per_unit(&inst, price).unwrap();
        let total = total_collateral_per_unit(&inst).unwrap();

        prop_assert!(!long.is_negative());
        prop_assert!(!short.is_negative());
        prop_assert_eq!(long.checked_add(short).unwrap(), total);
    }

    /// Prices outside the band collateralize exactly like the nearest edge
    #[test]
    fn out_of_band_price_clamps(
        (floor, cap) in band_strategy(),
        m in 1i128..1_000i128,
        beyond in 1i128..1_000_000i128,
    ) {
        let inst = instrument(ContractKind::Linear, floor, cap, m);
        let above = Price::new_unchecked(cap + beyond);
        prop_assert_eq!(
            long_collateral_per_unit(&inst, above).unwrap(),
            long_collateral_per_unit(&inst, inst.price_cap).unwrap()
        );
        prop_assert_eq!(short_collateral_per_unit(&inst, above).unwrap(), Amount::zero());
    }

    /// Long collateral never falls as the price rises
    #[test]
    fn long_collateral_monotonic(
        (floor, cap) in band_strategy(),
        m in multiplier_strategy(),
        a in 0i128..1_000_000i128,
        b in 0i128..1_000_000i128,
        inverse in any::<bool>(),
    ) {
        let kind = if inverse { ContractKind::Inverse } else { ContractKind::Linear };
        let inst = instrument(kind, floor, cap, m);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo = Price::new_unchecked(floor + lo % (cap - floor + 1));
        let hi = Price::new_unchecked(floor + hi % (cap - floor + 1));
        if lo <= hi {
            prop_assert!(
                long_collateral_per_unit(&inst, lo).unwrap() <= long_collateral_per_unit(&inst, hi).unwrap()
            );
        }
    }

    /// The stack nets to the running sum of fills and never mixes sides
    #[test]
    fn lifo_stack_tracks_net(fills in proptest::collection::vec(fill_strategy(), 1..40)) {
        let mut stack = PositionStack::new();
        let mut expected = 0i128;

        for (qty, price) in fills {
            let before = stack.net_position();
            let fill = SignedQty::new(qty);
            let report = stack.apply_fill(Price::new_unchecked(price), fill);
            expected += qty;

            prop_assert_eq!(stack.net_position().value(), expected);
            prop_assert_eq!(report.closed_qty() + report.opened.abs(), qty.abs());
            if before.opposes(fill) {
                prop_assert_eq!(report.closed_qty(), before.abs().min(qty.abs()));
            } else {
                prop_assert_eq!(report.closed_qty(), 0);
            }

            let lots = stack.positions();
            let lot_sum: i128 = lots.iter().map(|p| p.quantity.value()).sum();
            prop_assert_eq!(lot_sum, expected);
            prop_assert!(lots.iter().all(|p| p.quantity.signum() == expected.signum()));
        }
    }

    /// However fills and cancels are requested, the counter never exceeds the order
    #[test]
    fn fills_clip_to_order_quantity(
        order_qty in (-100i128..=100i128).prop_filter("non-zero", |q| *q != 0),
        requests in proptest::collection::vec((1i128..60i128, any::<bool>(), any::<bool>()), 1..20),
    ) {
        let maker = Wallet::from_secret(&[3u8; 32]).unwrap();
        let taker = Address::from_low_u64(2);
        let order = Order::new(
            InstrumentId(1),
            maker.address(),
            Price::new_unchecked(200_000),
            SignedQty::new(order_qty),
            FAR,
        );
        let signature = maker.sign_order(&order).unwrap();
        let hash = order.hash();
        let now = Timestamp::from_millis(0);
        let mut fills = OrderFillState::new();

        for (requested, cancel, flip) in requests {
            let sign = if flip { -order_qty.signum() } else { order_qty.signum() };
            let requested = SignedQty::new(sign * requested);
            let checked = if cancel {
                fills.validate_cancel(&order, requested, maker.address(), now)
            } else {
                fills.validate_fill(&order, requested, &signature, taker, now)
            };
            // a request against the order's direction never touches the counter
            let validation = match checked {
                Err(ValidationError::SignMismatch { .. }) => {
                    prop_assert!(flip);
                    continue;
                }
                other => other.unwrap(),
            };
            prop_assert!(!flip);
            match validation {
                Validation::Accepted { quantity, .. } => {
                    prop_assert_eq!(quantity.signum(), order_qty.signum());
                    prop_assert!(quantity.abs() <= requested.abs());
                    fills.record(hash, quantity);
                }
                Validation::Rejected { code, .. } => {
                    prop_assert_eq!(code, ErrorCode::OrderDead);
                    prop_assert_eq!(fills.remaining(&order, &hash), 0);
                }
            }
            prop_assert!(fills.filled_or_cancelled(&hash).abs() <= order_qty.abs());
        }
    }

    /// Fees collected over partial fills never exceed the flat order fee
    #[test]
    fn pro_rata_fees_bounded(
        fee in 0i128..1_000_000i128,
        order_abs in 1i128..1_000i128,
        cuts in proptest::collection::vec(1i128..100i128, 1..10),
    ) {
        let fee = Amount::new(fee);
        let mut left = order_abs;
        let mut charged = Amount::zero();
        for cut in cuts {
            let filled = cut.min(left);
            if filled == 0 {
                break;
            }
            charged = charged.checked_add(pro_rata_fee(fee, filled, order_abs).unwrap()).unwrap();
            left -= filled;
        }
        prop_assert!(charged <= fee);
        if left == 0 {
            prop_assert!(fee.value() - charged.value() < order_abs);
        }
    }
}
