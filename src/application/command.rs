use crate::domain::card::{CardId, IssueTerms, ValidityWindow};
use crate::domain::money::Money;
use rust_decimal::Decimal;
use serde::Serialize;

/// Entitlement shape requested at issuance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardSpec {
    Count { total_count: u32 },
    Days { window: ValidityWindow },
    Equity { equity_amount: Decimal },
}

/// One entry of an event log replayed against the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Issue {
        card: CardId,
        terms: IssueTerms,
        spec: CardSpec,
    },
    /// `quantity` is read as units or face value depending on the card kind.
    Consume {
        card: CardId,
        quantity: Decimal,
        at: Option<u64>,
    },
    Refund {
        card: CardId,
    },
}

impl Command {
    pub fn card(&self) -> CardId {
        match self {
            Command::Issue { card, .. } | Command::Consume { card, .. } | Command::Refund { card } => {
                *card
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Transfer,
    ConsumerRefund,
    CustodyRefund,
}

/// Money movement handed to the accounting layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub card: CardId,
    pub kind: MovementKind,
    pub amount: Money,
}
