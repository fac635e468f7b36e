//! Guards run before any engine computation.
//!
//! Cards reach the engine as snapshots loaded from an external store, so their
//! shape is checked on every call rather than trusted from issuance.

use super::card::{Card, Entitlement};
use super::event::Consumption;
use super::money::{MAX_AMOUNT, Money, SettlementPolicy};
use crate::error::SettlementError;
use rust_decimal::Decimal;

/// Rejects snapshots whose counters break the card invariants.
pub fn check_snapshot(card: &Card) -> Result<(), SettlementError> {
    let invalid = |reason: String| -> Result<(), SettlementError> {
        Err(SettlementError::InvalidCardState(format!(
            "card {}: {reason}",
            card.id
        )))
    };

    let amounts = [
        ("pay_amount", card.pay_amount),
        ("arrival_amount", card.arrival_amount),
        ("card_reserve_amount", card.card_reserve_amount),
        ("card_available_amount", card.card_available_amount),
        ("current_reserve_amount", card.current_reserve_amount),
        ("cumulative_transfer_amount", card.cumulative_transfer_amount),
    ];
    if let Some((name, amount)) = amounts.iter().find(|(_, amount)| amount.is_negative()) {
        return invalid(format!("{name} is negative ({amount})"));
    }
    if let Some((name, amount)) = amounts.iter().find(|(_, amount)| amount.value() > MAX_AMOUNT) {
        return invalid(format!("{name} {amount} exceeds {MAX_AMOUNT}"));
    }
    if card.reserve_percent <= Decimal::ZERO || card.reserve_percent > Decimal::ONE {
        return invalid(format!("reserve percent {} outside (0, 1]", card.reserve_percent));
    }
    if card.card_reserve_amount + card.card_available_amount != card.arrival_amount {
        return invalid("reserve and available amounts do not add up to arrival".to_string());
    }
    if card.current_reserve_amount > card.card_reserve_amount {
        return invalid(format!(
            "current reserve {} exceeds card reserve {}",
            card.current_reserve_amount, card.card_reserve_amount
        ));
    }
    if card.cumulative_transfer_amount > card.arrival_amount {
        return invalid(format!(
            "cumulative transfer {} exceeds arrival {}",
            card.cumulative_transfer_amount, card.arrival_amount
        ));
    }

    match &card.entitlement {
        Entitlement::Count(units) | Entitlement::Days { units, .. } => {
            if units.total_count == 0 {
                return invalid("total count is zero".to_string());
            }
            if units.remaining_count > units.total_count {
                return invalid(format!(
                    "remaining count {} exceeds total {}",
                    units.remaining_count, units.total_count
                ));
            }
            if units.each_amount.is_negative() {
                return invalid("each amount is negative".to_string());
            }
        }
        Entitlement::Equity(equity) => {
            if equity.equity_amount.value() <= Decimal::ZERO {
                return invalid("equity amount is not positive".to_string());
            }
            if equity.equity_amount.value() > MAX_AMOUNT {
                return invalid(format!(
                    "equity amount {} exceeds {MAX_AMOUNT}",
                    equity.equity_amount
                ));
            }
            if equity.cumulative_used_equity_amount.is_negative()
                || equity.cumulative_used_equity_amount > equity.equity_amount
            {
                return invalid(format!(
                    "used equity {} outside [0, {}]",
                    equity.cumulative_used_equity_amount, equity.equity_amount
                ));
            }
        }
    }
    Ok(())
}

/// Preconditions of a consumption event. Returns whether the event is terminal.
pub fn check_consumption(
    card: &Card,
    consumption: Consumption,
    policy: &SettlementPolicy,
) -> Result<bool, SettlementError> {
    check_snapshot(card)?;
    if card.is_terminal() {
        return Err(SettlementError::EntitlementDepleted(card.id));
    }
    if card.current_reserve_amount <= Money::ZERO {
        return Err(SettlementError::ReserveExhausted(card.id));
    }

    match (&card.entitlement, consumption) {
        (Entitlement::Count(units) | Entitlement::Days { units, .. }, Consumption::Units(n)) => {
            if n == 0 {
                return Err(SettlementError::NonPositiveConsumption(Decimal::ZERO));
            }
            if n > units.remaining_count {
                return Err(SettlementError::EntitlementExceeded {
                    card: card.id,
                    requested: Decimal::from(n),
                    remaining: Decimal::from(units.remaining_count),
                });
            }
            if units.each_amount.is_zero() {
                return Err(SettlementError::DegenerateTransfer(card.id));
            }
            Ok(n == units.remaining_count)
        }
        (Entitlement::Equity(equity), Consumption::FaceValue(amount)) => {
            if amount <= Decimal::ZERO {
                return Err(SettlementError::NonPositiveConsumption(amount));
            }
            let amount = policy.money(amount)?;
            let remaining = equity.remaining();
            if amount > remaining {
                return Err(SettlementError::EntitlementExceeded {
                    card: card.id,
                    requested: amount.value(),
                    remaining: remaining.value(),
                });
            }
            let terminal = amount == remaining;
            if !terminal && !policy.is_settlable(amount) {
                return Err(SettlementError::BelowMinimumUnit {
                    amount: amount.value(),
                    minimum: policy.minimum_unit,
                });
            }
            Ok(terminal)
        }
        (entitlement, _) => Err(SettlementError::ConsumptionMismatch {
            card: card.id,
            expected: match entitlement {
                Entitlement::Equity(_) => "face-value",
                _ => "whole-unit",
            },
        }),
    }
}

/// Preconditions shared by both refund engines.
pub fn check_refundable(card: &Card) -> Result<(), SettlementError> {
    check_snapshot(card)?;
    if card.is_terminal() {
        return Err(SettlementError::EntitlementDepleted(card.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::IssueTerms;
    use rust_decimal_macros::dec;

    fn count_card() -> Card {
        let terms = IssueTerms {
            pay_amount: dec!(9),
            arrival_amount: dec!(8.98),
            reserve_percent: dec!(0.3),
        };
        Card::issue_count(1, terms, 7, &SettlementPolicy::default()).unwrap()
    }

    fn equity_card(policy: &SettlementPolicy) -> Card {
        let terms = IssueTerms {
            pay_amount: dec!(100),
            arrival_amount: dec!(95),
            reserve_percent: dec!(0.3),
        };
        Card::issue_equity(2, terms, dec!(120), policy).unwrap()
    }

    #[test]
    fn test_fresh_cards_pass() {
        let policy = SettlementPolicy::default();
        assert!(check_snapshot(&count_card()).is_ok());
        assert!(check_snapshot(&equity_card(&policy)).is_ok());
    }

    #[test]
    fn test_snapshot_rejects_inconsistent_counters() {
        let mut card = count_card();
        card.current_reserve_amount = Money::new(dec!(3.00));
        assert!(matches!(
            check_snapshot(&card),
            Err(SettlementError::InvalidCardState(_))
        ));

        let mut card = count_card();
        card.cumulative_transfer_amount = Money::new(dec!(-0.01));
        assert!(matches!(
            check_snapshot(&card),
            Err(SettlementError::InvalidCardState(_))
        ));

        let mut card = count_card();
        card.card_available_amount = Money::new(dec!(6.00));
        assert!(matches!(
            check_snapshot(&card),
            Err(SettlementError::InvalidCardState(_))
        ));

        let mut card = count_card();
        if let Entitlement::Count(units) = &mut card.entitlement {
            units.remaining_count = 8;
        }
        assert!(matches!(
            check_snapshot(&card),
            Err(SettlementError::InvalidCardState(_))
        ));
    }

    #[test]
    fn test_units_bounds() {
        let policy = SettlementPolicy::default();
        let card = count_card();
        assert_eq!(check_consumption(&card, Consumption::Units(3), &policy), Ok(false));
        assert_eq!(check_consumption(&card, Consumption::Units(7), &policy), Ok(true));
        assert!(matches!(
            check_consumption(&card, Consumption::Units(0), &policy),
            Err(SettlementError::NonPositiveConsumption(_))
        ));
        assert!(matches!(
            check_consumption(&card, Consumption::Units(8), &policy),
            Err(SettlementError::EntitlementExceeded { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let policy = SettlementPolicy::default();
        let card = count_card();
        assert!(matches!(
            check_consumption(&card, Consumption::FaceValue(dec!(1)), &policy),
            Err(SettlementError::ConsumptionMismatch { .. })
        ));
        let card = equity_card(&policy);
        assert!(matches!(
            check_consumption(&card, Consumption::Units(1), &policy),
            Err(SettlementError::ConsumptionMismatch { .. })
        ));
    }

    #[test]
    fn test_depleted_before_reserve() {
        let policy = SettlementPolicy::default();
        let mut card = count_card();
        if let Entitlement::Count(units) = &mut card.entitlement {
            units.remaining_count = 0;
        }
        card.current_reserve_amount = Money::ZERO;
        assert_eq!(
            check_consumption(&card, Consumption::Units(1), &policy),
            Err(SettlementError::EntitlementDepleted(1))
        );

        let mut card = count_card();
        card.current_reserve_amount = Money::ZERO;
        assert_eq!(
            check_consumption(&card, Consumption::Units(1), &policy),
            Err(SettlementError::ReserveExhausted(1))
        );
    }

    #[test]
    fn test_face_value_rules() {
        let policy = SettlementPolicy::new(2, dec!(0.05), dec!(0.3)).unwrap();
        let mut card = equity_card(&policy);

        assert!(matches!(
            check_consumption(&card, Consumption::FaceValue(dec!(0.001)), &policy),
            Err(SettlementError::ExcessPrecision { .. })
        ));
        assert!(matches!(
            check_consumption(&card, Consumption::FaceValue(dec!(-1)), &policy),
            Err(SettlementError::NonPositiveConsumption(_))
        ));
        assert!(matches!(
            check_consumption(&card, Consumption::FaceValue(dec!(0.02)), &policy),
            Err(SettlementError::BelowMinimumUnit { .. })
        ));
        assert!(matches!(
            check_consumption(&card, Consumption::FaceValue(dec!(120.01)), &policy),
            Err(SettlementError::EntitlementExceeded { .. })
        ));

        // a sub-minimum remainder is still accepted when it closes the card
        if let Entitlement::Equity(equity) = &mut card.entitlement {
            equity.cumulative_used_equity_amount = Money::new(dec!(119.98));
        }
        assert_eq!(
            check_consumption(&card, Consumption::FaceValue(dec!(0.02)), &policy),
            Ok(true)
        );
    }

    #[test]
    fn test_degenerate_snapshot() {
        let policy = SettlementPolicy::default();
        let mut card = count_card();
        if let Entitlement::Count(units) = &mut card.entitlement {
            units.each_amount = Money::ZERO;
        }
        assert_eq!(
            check_consumption(&card, Consumption::Units(1), &policy),
            Err(SettlementError::DegenerateTransfer(1))
        );
    }

    #[test]
    fn test_refundable() {
        let mut card = count_card();
        assert!(check_refundable(&card).is_ok());
        if let Entitlement::Count(units) = &mut card.entitlement {
            units.remaining_count = 0;
        }
        assert_eq!(
            check_refundable(&card),
            Err(SettlementError::EntitlementDepleted(1))
        );
    }
}
