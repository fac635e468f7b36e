use super::money::{MAX_AMOUNT, Money, SettlementPolicy, checked_mul, checked_ratio};
use crate::error::SettlementError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CardId = u64;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Monetary terms agreed when a card is sold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IssueTerms {
    /// Amount the consumer actually paid.
    pub pay_amount: Decimal,
    /// Net amount the merchant receives once the card is exhausted.
    pub arrival_amount: Decimal,
    /// Regulator-mandated retention ratio.
    pub reserve_percent: Decimal,
}

/// Half-open `[start_time, end_time)` window, in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub start_time: u64,
    pub end_time: u64,
}

impl ValidityWindow {
    pub fn new(start_time: u64, end_time: u64) -> Result<Self, SettlementError> {
        if end_time <= start_time {
            return Err(SettlementError::InvalidIssuance(format!(
                "validity window [{start_time}, {end_time}) is empty"
            )));
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    /// Number of whole days covered by the window.
    pub fn days(&self) -> u64 {
        (self.end_time - self.start_time) / SECONDS_PER_DAY
    }

    pub fn contains(&self, at: u64) -> bool {
        self.start_time <= at && at < self.end_time
    }
}

/// Entitlement counted in discrete units (uses or days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitEntitlement {
    pub total_count: u32,
    pub remaining_count: u32,
    /// Money value of one unit, truncated to the settlement scale.
    pub each_amount: Money,
}

/// Entitlement expressed as a face-value balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityEntitlement {
    pub equity_amount: Money,
    pub cumulative_used_equity_amount: Money,
    /// `arrival_amount / equity_amount`, kept at full precision for reporting.
    ///
    /// Plan amounts are derived from `arrival_amount` and `equity_amount`
    /// directly so that each is rounded once.
    pub transfer_ratio: Decimal,
}

impl EquityEntitlement {
    pub fn remaining(&self) -> Money {
        self.equity_amount - self.cumulative_used_equity_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entitlement {
    Count(UnitEntitlement),
    Days {
        units: UnitEntitlement,
        window: ValidityWindow,
    },
    Equity(EquityEntitlement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Count,
    Days,
    Equity,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Count => "count",
            CardKind::Days => "days",
            CardKind::Equity => "equity",
        }
    }
}

impl Entitlement {
    pub fn kind(&self) -> CardKind {
        match self {
            Entitlement::Count(_) => CardKind::Count,
            Entitlement::Days { .. } => CardKind::Days,
            Entitlement::Equity(_) => CardKind::Equity,
        }
    }

    pub fn units(&self) -> Option<&UnitEntitlement> {
        match self {
            Entitlement::Count(units) | Entitlement::Days { units, .. } => Some(units),
            Entitlement::Equity(_) => None,
        }
    }

    /// Entitlement still unconsumed, as units or face value.
    pub fn remaining(&self) -> Decimal {
        match self {
            Entitlement::Count(units) | Entitlement::Days { units, .. } => {
                Decimal::from(units.remaining_count)
            }
            Entitlement::Equity(equity) => equity.remaining().value(),
        }
    }

    pub fn is_depleted(&self) -> bool {
        match self {
            Entitlement::Count(units) | Entitlement::Days { units, .. } => {
                units.remaining_count == 0
            }
            Entitlement::Equity(equity) => {
                equity.cumulative_used_equity_amount >= equity.equity_amount
            }
        }
    }
}

/// Snapshot of a prepaid card: issuance amounts, settlement counters and entitlement.
///
/// The `card_*` amounts are fixed at issuance; the `current_*`/`cumulative_*`
/// counters and the entitlement move once per consumption event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub pay_amount: Money,
    pub arrival_amount: Money,
    pub reserve_percent: Decimal,
    /// Total reserve ever subject to regulation.
    pub card_reserve_amount: Money,
    /// Funds the merchant may access without regulatory gating.
    pub card_available_amount: Money,
    /// Reserve still held in custody.
    pub current_reserve_amount: Money,
    /// Money recognized as disbursed to the merchant so far.
    pub cumulative_transfer_amount: Money,
    /// Set by the first event that has to draw from the reserve.
    pub reserve_transfer_triggered: bool,
    pub entitlement: Entitlement,
}

impl Card {
    /// Issues a card redeemable `total_count` times.
    pub fn issue_count(
        id: CardId,
        terms: IssueTerms,
        total_count: u32,
        policy: &SettlementPolicy,
    ) -> Result<Self, SettlementError> {
        let units = Self::unit_entitlement(id, &terms, total_count, policy)?;
        Self::issue(id, terms, Entitlement::Count(units), policy)
    }

    /// Issues a card valid for every whole day in `window`.
    pub fn issue_days(
        id: CardId,
        terms: IssueTerms,
        window: ValidityWindow,
        policy: &SettlementPolicy,
    ) -> Result<Self, SettlementError> {
        let days = u32::try_from(window.days()).map_err(|_| {
            SettlementError::InvalidIssuance(format!("validity window of {} days", window.days()))
        })?;
        if days == 0 {
            return Err(SettlementError::InvalidIssuance(
                "validity window shorter than one day".to_string(),
            ));
        }
        let units = Self::unit_entitlement(id, &terms, days, policy)?;
        Self::issue(id, terms, Entitlement::Days { units, window }, policy)
    }

    /// Issues a card carrying `equity_amount` of face value.
    pub fn issue_equity(
        id: CardId,
        terms: IssueTerms,
        equity_amount: Decimal,
        policy: &SettlementPolicy,
    ) -> Result<Self, SettlementError> {
        let equity_amount = policy.money(equity_amount)?;
        if equity_amount.value() <= Decimal::ZERO {
            return Err(SettlementError::InvalidIssuance(
                "equity amount must be positive".to_string(),
            ));
        }
        if equity_amount.value() > MAX_AMOUNT {
            return Err(SettlementError::InvalidIssuance(format!(
                "equity amount {equity_amount} exceeds {MAX_AMOUNT}"
            )));
        }
        let arrival = policy.money(terms.arrival_amount)?;
        let equity = EquityEntitlement {
            equity_amount,
            cumulative_used_equity_amount: Money::ZERO,
            transfer_ratio: checked_ratio(arrival.value(), Decimal::ONE, equity_amount.value())?,
        };
        Self::issue(id, terms, Entitlement::Equity(equity), policy)
    }

    fn unit_entitlement(
        id: CardId,
        terms: &IssueTerms,
        total_count: u32,
        policy: &SettlementPolicy,
    ) -> Result<UnitEntitlement, SettlementError> {
        if total_count == 0 {
            return Err(SettlementError::InvalidIssuance(
                "total count must be positive".to_string(),
            ));
        }
        let arrival = policy.money(terms.arrival_amount)?;
        let each = checked_ratio(arrival.value(), Decimal::ONE, Decimal::from(total_count))?;
        let each_amount = policy.truncate(each);
        if each_amount.is_zero() {
            return Err(SettlementError::DegenerateTransfer(id));
        }
        Ok(UnitEntitlement {
            total_count,
            remaining_count: total_count,
            each_amount,
        })
    }

    fn issue(
        id: CardId,
        terms: IssueTerms,
        entitlement: Entitlement,
        policy: &SettlementPolicy,
    ) -> Result<Self, SettlementError> {
        let pay_amount = policy.money(terms.pay_amount)?;
        let arrival_amount = policy.money(terms.arrival_amount)?;
        if pay_amount.value() <= Decimal::ZERO || arrival_amount.value() <= Decimal::ZERO {
            return Err(SettlementError::InvalidIssuance(
                "pay and arrival amounts must be positive".to_string(),
            ));
        }
        if pay_amount.value() > MAX_AMOUNT {
            return Err(SettlementError::InvalidIssuance(format!(
                "pay amount {pay_amount} exceeds {MAX_AMOUNT}"
            )));
        }
        if arrival_amount > pay_amount {
            return Err(SettlementError::InvalidIssuance(format!(
                "arrival amount {arrival_amount} exceeds pay amount {pay_amount}"
            )));
        }
        if terms.reserve_percent < policy.minimum_reserve_ratio
            || terms.reserve_percent > Decimal::ONE
        {
            return Err(SettlementError::InvalidIssuance(format!(
                "reserve percent {} outside [{}, 1]",
                terms.reserve_percent, policy.minimum_reserve_ratio
            )));
        }

        let card_reserve_amount =
            policy.round_reserve(checked_mul(arrival_amount.value(), terms.reserve_percent)?);
        let card_available_amount = arrival_amount - card_reserve_amount;

        Ok(Self {
            id,
            pay_amount,
            arrival_amount,
            reserve_percent: terms.reserve_percent,
            card_reserve_amount,
            card_available_amount,
            current_reserve_amount: card_reserve_amount,
            cumulative_transfer_amount: Money::ZERO,
            reserve_transfer_triggered: false,
            entitlement,
        })
    }

    pub fn kind(&self) -> CardKind {
        self.entitlement.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.entitlement.is_depleted()
    }

    /// Reserve released to the merchant so far.
    pub fn released_amount(&self) -> Money {
        self.card_reserve_amount - self.current_reserve_amount
    }

    pub fn validity_window(&self) -> Option<ValidityWindow> {
        match self.entitlement {
            Entitlement::Days { window, .. } => Some(window),
            _ => None,
        }
    }
}
