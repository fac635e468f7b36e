use card_escrow::domain::card::{Card, Entitlement, IssueTerms};
use card_escrow::domain::event::{Consumption, SettlementBranch};
use card_escrow::domain::money::{Money, SettlementPolicy};
use card_escrow::domain::refund;
use card_escrow::domain::transfer::{settle, transfer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

const RESERVE_RATIOS: [Decimal; 5] = [dec!(0.3), dec!(0.35), dec!(0.5), dec!(0.75), dec!(1)];

fn random_terms(rng: &mut StdRng) -> IssueTerms {
    let pay_cents = rng.gen_range(100..=100_000i64);
    let fee_cents = rng.gen_range(0..=pay_cents / 20);
    IssueTerms {
        pay_amount: Decimal::new(pay_cents, 2),
        arrival_amount: Decimal::new(pay_cents - fee_cents, 2),
        reserve_percent: RESERVE_RATIOS[rng.gen_range(0..RESERVE_RATIOS.len())],
    }
}

fn remaining_cents(card: &Card) -> i64 {
    (card.entitlement.remaining() * dec!(100))
        .to_i64()
        .unwrap()
}

/// Money value of everything consumed from the card so far.
fn consumed_value(card: &Card, policy: &SettlementPolicy) -> Money {
    match &card.entitlement {
        Entitlement::Count(units) | Entitlement::Days { units, .. } => Money::new(
            units.each_amount.value() * Decimal::from(units.total_count - units.remaining_count),
        ),
        Entitlement::Equity(equity) => policy.truncate(
            equity.cumulative_used_equity_amount.value() * card.arrival_amount.value()
                / equity.equity_amount.value(),
        ),
    }
}

/// Drives `card` to depletion with random events and checks the settlement
/// invariants after each one.
fn drain(card: &mut Card, rng: &mut StdRng, policy: &SettlementPolicy) {
    let mut released = Money::ZERO;
    let mut previous_reserve = card.current_reserve_amount;
    let mut previous_cumulative = card.cumulative_transfer_amount;

    while !card.is_terminal() {
        let quote = refund::quote(card, policy).unwrap();
        assert!(quote.consumer_refund <= card.pay_amount);
        assert!(!quote.custody_refund.is_negative());
        assert!(quote.custody_refund <= card.card_reserve_amount);

        let consumption = match card.entitlement.units() {
            Some(units) => Consumption::Units(rng.gen_range(1..=units.remaining_count)),
            None => {
                let cents = rng.gen_range(1..=remaining_cents(card));
                Consumption::FaceValue(Decimal::new(cents, 2))
            }
        };

        if card.entitlement.remaining() == consumption.quantity() {
            let again = settle(card, consumption, policy).unwrap();
            assert_eq!(settle(card, consumption, policy).unwrap(), again);
        }

        let outcome = transfer(card, consumption, policy).unwrap();
        assert!(!outcome.actual_amount.is_negative());
        if outcome.branch == SettlementBranch::Bookkeeping
            || outcome.branch == SettlementBranch::Deferred
        {
            assert_eq!(outcome.actual_amount, Money::ZERO);
        }
        released += outcome.actual_amount;

        if !card.is_terminal() {
            let residue = consumed_value(card, policy) - card.cumulative_transfer_amount;
            assert!(!residue.is_negative());
            assert!(!policy.is_settlable(residue));
        }

        assert!(card.current_reserve_amount <= previous_reserve);
        assert!(card.cumulative_transfer_amount >= previous_cumulative);
        assert!(!card.current_reserve_amount.is_negative());
        assert!(card.cumulative_transfer_amount <= card.arrival_amount);
        assert_eq!(released, card.released_amount());
        previous_reserve = card.current_reserve_amount;
        previous_cumulative = card.cumulative_transfer_amount;
    }

    assert_eq!(released, card.card_reserve_amount);
    assert_eq!(card.cumulative_transfer_amount, card.arrival_amount);
    assert_eq!(card.current_reserve_amount, Money::ZERO);
    assert!(refund::quote(card, policy).is_err());
}

#[test]
fn test_count_cards_conserve_reserve() {
    let mut rng = StdRng::seed_from_u64(7);
    let policy = SettlementPolicy::default();

    for id in 0..500 {
        let terms = random_terms(&mut rng);
        let total = rng.gen_range(1..=40u32);
        let mut card = Card::issue_count(id, terms, total, &policy).unwrap();

        let untouched = refund::consumer_refund(&card, &policy).unwrap();
        assert_eq!(untouched, card.pay_amount);

        drain(&mut card, &mut rng, &policy);
    }
}

#[test]
fn test_equity_cards_conserve_reserve() {
    let mut rng = StdRng::seed_from_u64(11);
    let policy = SettlementPolicy::default();

    for id in 0..500 {
        let terms = random_terms(&mut rng);
        let equity = Decimal::new(rng.gen_range(100..=100_000i64), 2);
        let mut card = Card::issue_equity(id, terms, equity, &policy).unwrap();

        let untouched = refund::consumer_refund(&card, &policy).unwrap();
        assert_eq!(untouched, card.pay_amount);

        drain(&mut card, &mut rng, &policy);
    }
}

#[test]
fn test_consumer_refund_is_below_pay_once_consumed() {
    let mut rng = StdRng::seed_from_u64(13);
    let policy = SettlementPolicy::default();

    for id in 0..200 {
        let terms = random_terms(&mut rng);
        let total = rng.gen_range(2..=40u32);
        let mut card = Card::issue_count(id, terms, total, &policy).unwrap();
        let units = rng.gen_range(1..total);
        transfer(&mut card, Consumption::Units(units), &policy).unwrap();

        assert!(refund::consumer_refund(&card, &policy).unwrap() < card.pay_amount);
    }
}
