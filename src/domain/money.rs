use crate::error::SettlementError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Largest monetary amount accepted anywhere in a card.
///
/// Keeps every product of two card amounts inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = dec!(100000000000000);

/// `value * factor`, or `AmountOverflow` when the product leaves `Decimal` range.
pub fn checked_mul(value: Decimal, factor: Decimal) -> Result<Decimal, SettlementError> {
    value
        .checked_mul(factor)
        .ok_or_else(|| SettlementError::AmountOverflow(format!("{value} * {factor}")))
}

/// `value * numerator / denominator` at full precision, rounded by the caller.
pub fn checked_ratio(
    value: Decimal,
    numerator: Decimal,
    denominator: Decimal,
) -> Result<Decimal, SettlementError> {
    checked_mul(value, numerator)?
        .checked_div(denominator)
        .ok_or_else(|| {
            SettlementError::AmountOverflow(format!("{value} * {numerator} / {denominator}"))
        })
}

/// A monetary value already quantized to the settlement scale.
///
/// Wraps `rust_decimal::Decimal` so that amounts moving through the engine are
/// never confused with ratios or raw entitlement quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}", precision, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Rounding and minimum-unit rules applied by every engine call.
///
/// Regulatory rules differ per deployment, so none of these are literals in the
/// engines themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementPolicy {
    /// Fractional digits every money amount is quantized to.
    pub scale: u32,
    /// Smallest amount that can be moved between accounts.
    pub minimum_unit: Decimal,
    /// Lowest reserve ratio the regulator accepts at issuance.
    pub minimum_reserve_ratio: Decimal,
    /// Rounding used for per-unit prices, plan amounts and refunds.
    pub truncation: RoundingStrategy,
    /// Rounding used when computing the card reserve at issuance.
    pub reserve_rounding: RoundingStrategy,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            scale: 2,
            minimum_unit: dec!(0.01),
            minimum_reserve_ratio: dec!(0.3),
            truncation: RoundingStrategy::ToZero,
            reserve_rounding: RoundingStrategy::AwayFromZero,
        }
    }
}

impl SettlementPolicy {
    /// Builds a policy with the default rounding modes.
    pub fn new(
        scale: u32,
        minimum_unit: Decimal,
        minimum_reserve_ratio: Decimal,
    ) -> Result<Self, SettlementError> {
        let policy = Self {
            scale,
            minimum_unit,
            minimum_reserve_ratio,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.scale > 8 {
            return Err(SettlementError::InvalidPolicy(format!(
                "scale {} exceeds 8 fractional digits",
                self.scale
            )));
        }
        if self.minimum_unit <= Decimal::ZERO {
            return Err(SettlementError::InvalidPolicy(
                "minimum unit must be positive".to_string(),
            ));
        }
        if self.minimum_unit.normalize().scale() > self.scale {
            return Err(SettlementError::InvalidPolicy(format!(
                "minimum unit {} is finer than scale {}",
                self.minimum_unit, self.scale
            )));
        }
        if self.minimum_reserve_ratio <= Decimal::ZERO || self.minimum_reserve_ratio > Decimal::ONE
        {
            return Err(SettlementError::InvalidPolicy(format!(
                "minimum reserve ratio {} must lie in (0, 1]",
                self.minimum_reserve_ratio
            )));
        }
        Ok(())
    }

    /// Quantizes toward zero.
    pub fn truncate(&self, value: Decimal) -> Money {
        Money(value.round_dp_with_strategy(self.scale, self.truncation))
    }

    /// Quantizes with the reserve rounding mode (away from zero by default).
    pub fn round_reserve(&self, value: Decimal) -> Money {
        Money(value.round_dp_with_strategy(self.scale, self.reserve_rounding))
    }

    /// True when `value` carries no digits beyond the policy scale.
    pub fn fits_scale(&self, value: Decimal) -> bool {
        value.normalize().scale() <= self.scale
    }

    /// Converts an input amount into `Money`, rejecting excess precision.
    pub fn money(&self, value: Decimal) -> Result<Money, SettlementError> {
        if self.fits_scale(value) {
            Ok(Money(value))
        } else {
            Err(SettlementError::ExcessPrecision {
                amount: value,
                scale: self.scale,
            })
        }
    }

    pub fn is_settlable(&self, amount: Money) -> bool {
        amount.0 >= self.minimum_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(dec!(6.28));
        let b = Money::new(dec!(2.70));
        assert_eq!(a + b, Money::new(dec!(8.98)));
        assert_eq!(a - b, Money::new(dec!(3.58)));

        let mut c = a;
        c -= b;
        c += Money::new(dec!(0.01));
        assert_eq!(c, Money::new(dec!(3.59)));
    }

    #[test]
    fn test_money_display_pads_to_precision() {
        assert_eq!(format!("{:.2}", Money::new(dec!(2.7))), "2.70");
        assert_eq!(format!("{:.2}", Money::ZERO), "0.00");
        assert_eq!(Money::new(dec!(1.5)).to_string(), "1.5");
    }

    #[test]
    fn test_truncate_and_round_reserve() {
        let policy = SettlementPolicy::default();
        assert_eq!(policy.truncate(dec!(1.282857)), Money::new(dec!(1.28)));
        assert_eq!(policy.truncate(dec!(0.009)), Money::ZERO);
        assert_eq!(policy.round_reserve(dec!(2.694)), Money::new(dec!(2.70)));
        assert_eq!(policy.round_reserve(dec!(2.69)), Money::new(dec!(2.69)));
    }

    #[test]
    fn test_money_rejects_excess_precision() {
        let policy = SettlementPolicy::default();
        assert!(policy.money(dec!(1.10)).is_ok());
        assert!(policy.money(dec!(1.100000)).is_ok());
        assert!(matches!(
            policy.money(dec!(1.001)),
            Err(SettlementError::ExcessPrecision { .. })
        ));
    }

    #[test]
    fn test_policy_validation() {
        assert!(SettlementPolicy::new(2, dec!(0.01), dec!(0.3)).is_ok());
        assert!(SettlementPolicy::new(4, dec!(0.0001), dec!(0.5)).is_ok());
        assert!(matches!(
            SettlementPolicy::new(2, dec!(0), dec!(0.3)),
            Err(SettlementError::InvalidPolicy(_))
        ));
        assert!(matches!(
            SettlementPolicy::new(2, dec!(0.001), dec!(0.3)),
            Err(SettlementError::InvalidPolicy(_))
        ));
        assert!(matches!(
            SettlementPolicy::new(2, dec!(0.01), dec!(1.5)),
            Err(SettlementError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        assert_eq!(checked_ratio(dec!(9), dec!(4), dec!(7)).unwrap().round_dp(4), dec!(5.1429));
        assert!(checked_mul(MAX_AMOUNT, MAX_AMOUNT).is_ok());
        assert!(matches!(
            checked_mul(Decimal::MAX, dec!(2)),
            Err(SettlementError::AmountOverflow(_))
        ));
        assert!(matches!(
            checked_ratio(dec!(1), dec!(1), Decimal::ZERO),
            Err(SettlementError::AmountOverflow(_))
        ));
    }
}
