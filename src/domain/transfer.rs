//! Transfer engine: how much of the reserve a consumption event releases.
//!
//! Every call is a pure transform of a card snapshot. The caller receives the
//! new snapshot together with the amount to move and persists both at once.

use super::card::{Card, Entitlement};
use super::event::{Consumption, Settlement, SettlementBranch, TransferOutcome};
use super::money::{Money, SettlementPolicy, checked_mul, checked_ratio};
use super::validation::check_consumption;
use crate::error::SettlementError;
use rust_decimal::Decimal;

/// Applies one consumption event to `card` and returns the resulting snapshot.
///
/// The input snapshot is never modified; on error nothing has been applied.
pub fn settle(
    card: &Card,
    consumption: Consumption,
    policy: &SettlementPolicy,
) -> Result<Settlement, SettlementError> {
    let terminal = check_consumption(card, consumption, policy)?;
    let mut next = card.clone();

    let plan_amount = consume_entitlement(&mut next, consumption, policy)?;
    debug_assert_eq!(terminal, next.is_terminal());

    let outcome = if terminal {
        flush(&mut next, plan_amount)
    } else if !policy.is_settlable(plan_amount) {
        // residue is picked up by the next plan or the terminal flush
        TransferOutcome {
            plan_amount: Money::ZERO,
            actual_amount: Money::ZERO,
            branch: SettlementBranch::Deferred,
        }
    } else {
        release(&mut next, plan_amount)
    };

    Ok(Settlement {
        card: next,
        outcome,
    })
}

/// Applies `consumption` in place, replacing `card` only when the event is accepted.
pub fn transfer(
    card: &mut Card,
    consumption: Consumption,
    policy: &SettlementPolicy,
) -> Result<TransferOutcome, SettlementError> {
    let Settlement {
        card: next,
        outcome,
    } = settle(card, consumption, policy)?;
    *card = next;
    Ok(outcome)
}

/// Advances the entitlement counter and returns the plan amount of the event.
///
/// The plan is the value of everything consumed so far less what is already
/// recognized, so residue left by deferred or truncated events carries forward.
fn consume_entitlement(
    card: &mut Card,
    consumption: Consumption,
    policy: &SettlementPolicy,
) -> Result<Money, SettlementError> {
    let arrival = card.arrival_amount.value();
    let consumed_value = match (&mut card.entitlement, consumption) {
        (Entitlement::Count(units) | Entitlement::Days { units, .. }, Consumption::Units(n)) => {
            units.remaining_count -= n;
            let consumed = Decimal::from(units.total_count - units.remaining_count);
            checked_mul(units.each_amount.value(), consumed)?
        }
        (Entitlement::Equity(equity), Consumption::FaceValue(amount)) => {
            equity.cumulative_used_equity_amount += Money::new(amount);
            let used = equity.cumulative_used_equity_amount.value();
            policy
                .truncate(checked_ratio(used, arrival, equity.equity_amount.value())?)
                .value()
        }
        // kind was matched during validation
        _ => return Ok(Money::ZERO),
    };
    Ok(Money::new(consumed_value) - card.cumulative_transfer_amount)
}

/// Terminal event: release whatever reserve is left and close the card.
fn flush(card: &mut Card, plan_amount: Money) -> TransferOutcome {
    let remaining_to_settle = card.arrival_amount - card.cumulative_transfer_amount;
    let actual_amount = if remaining_to_settle >= card.card_reserve_amount {
        card.card_reserve_amount
    } else {
        remaining_to_settle
    };
    card.cumulative_transfer_amount += remaining_to_settle;
    card.current_reserve_amount = Money::ZERO;

    TransferOutcome {
        plan_amount,
        actual_amount,
        branch: SettlementBranch::Flush,
    }
}

/// Non-terminal event with a settlable plan amount.
fn release(card: &mut Card, plan_amount: Money) -> TransferOutcome {
    let new_cumulative = card.cumulative_transfer_amount + plan_amount;
    card.cumulative_transfer_amount = new_cumulative;

    if new_cumulative <= card.card_available_amount {
        return TransferOutcome {
            plan_amount,
            actual_amount: Money::ZERO,
            branch: SettlementBranch::Bookkeeping,
        };
    }

    let (actual_amount, branch) = if card.reserve_transfer_triggered {
        (plan_amount, SettlementBranch::Drawdown)
    } else {
        (
            new_cumulative - card.card_available_amount,
            SettlementBranch::FirstCrossing,
        )
    };
    card.reserve_transfer_triggered = true;
    card.current_reserve_amount -= actual_amount;

    TransferOutcome {
        plan_amount,
        actual_amount,
        branch,
    }
}
