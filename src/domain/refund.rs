//! Cancellation amounts. Both engines are read-only over a card snapshot.

use super::card::{Card, Entitlement};
use super::event::RefundQuote;
use super::money::{Money, SettlementPolicy, checked_ratio};
use super::validation::check_refundable;
use crate::error::SettlementError;
use rust_decimal::Decimal;

/// Amount owed back to the consumer, pro rata to the unconsumed entitlement.
///
/// The ratio is applied in a single multiply/divide and rounded once.
pub fn consumer_refund(card: &Card, policy: &SettlementPolicy) -> Result<Money, SettlementError> {
    check_refundable(card)?;
    let (remaining, total) = match &card.entitlement {
        Entitlement::Count(units) | Entitlement::Days { units, .. } => (
            Decimal::from(units.remaining_count),
            Decimal::from(units.total_count),
        ),
        Entitlement::Equity(equity) => {
            (equity.remaining().value(), equity.equity_amount.value())
        }
    };
    Ok(policy.truncate(checked_ratio(card.pay_amount.value(), remaining, total)?))
}

/// Amount that must flow back out of the custodial reserve account.
pub fn custody_refund(card: &Card) -> Result<Money, SettlementError> {
    check_refundable(card)?;
    if card.card_available_amount > card.cumulative_transfer_amount {
        Ok(card.card_reserve_amount)
    } else {
        Ok(card.arrival_amount - card.cumulative_transfer_amount)
    }
}

/// Computes both refunds from the same snapshot.
pub fn quote(card: &Card, policy: &SettlementPolicy) -> Result<RefundQuote, SettlementError> {
    Ok(RefundQuote {
        card: card.id,
        consumer_refund: consumer_refund(card, policy)?,
        custody_refund: custody_refund(card)?,
    })
}
