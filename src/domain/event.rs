use super::card::{Card, CardId, CardKind};
use super::money::Money;
use crate::error::SettlementError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// One consumption event applied to a card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumption {
    /// Uses or days redeemed on a count or day card.
    Units(u32),
    /// Face value spent from a monetary card.
    FaceValue(Decimal),
}

impl Consumption {
    /// Interprets a raw quantity according to the kind of card it targets.
    pub fn for_kind(card: CardId, kind: CardKind, quantity: Decimal) -> Result<Self, SettlementError> {
        match kind {
            CardKind::Count | CardKind::Days => {
                if quantity.fract() != Decimal::ZERO {
                    return Err(SettlementError::ConsumptionMismatch {
                        card,
                        expected: "whole-unit",
                    });
                }
                if quantity <= Decimal::ZERO {
                    return Err(SettlementError::NonPositiveConsumption(quantity));
                }
                let units = quantity.to_u32().ok_or(SettlementError::EntitlementExceeded {
                    card,
                    requested: quantity,
                    remaining: Decimal::from(u32::MAX),
                })?;
                Ok(Consumption::Units(units))
            }
            CardKind::Equity => Ok(Consumption::FaceValue(quantity)),
        }
    }

    pub fn quantity(&self) -> Decimal {
        match self {
            Consumption::Units(units) => Decimal::from(*units),
            Consumption::FaceValue(amount) => *amount,
        }
    }
}

/// Which of the transfer rules produced the actual amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementBranch {
    /// Plan amount fell below the minimum unit; consumption recorded, nothing moved.
    Deferred,
    /// Still covered by the available portion; nothing leaves the reserve.
    Bookkeeping,
    /// First event to cross the available boundary; only the overshoot is released.
    FirstCrossing,
    /// Reserve already being drawn; the full plan amount is released.
    Drawdown,
    /// Terminal event; whatever reserve remains is released.
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub plan_amount: Money,
    pub actual_amount: Money,
    pub branch: SettlementBranch,
}

/// Result of applying one consumption: the new snapshot and the money to move.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub card: Card,
    pub outcome: TransferOutcome,
}

/// Both cancellation amounts computed from the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefundQuote {
    pub card: CardId,
    /// Owed back to the paying consumer.
    pub consumer_refund: Money,
    /// Returned out of the custodial reserve account.
    pub custody_refund: Money,
}
