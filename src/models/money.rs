use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::DomainError;

pub const MONEY_SCALE: u32 = 2;

/// Rounds half-up to two places and always renders two places.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Pads the scale to at least two places without dropping digits.
pub fn pad_money(value: Decimal) -> Decimal {
    let mut padded = value;
    if padded.scale() < MONEY_SCALE {
        padded.rescale(MONEY_SCALE);
    }
    padded
}

pub fn zero() -> Decimal {
    Decimal::new(0, MONEY_SCALE)
}

/// Sums without panicking; overflow is reported as an invalid amount.
pub fn checked_sum<I>(values: I) -> Result<Decimal, DomainError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(zero(), |total, value| {
        total
            .checked_add(value)
            .ok_or_else(|| DomainError::InvalidAmount("amount overflow".to_string()))
    })
}

pub fn decimal_from_f64(value: f64) -> Result<Decimal, DomainError> {
    if !value.is_finite() {
        return Err(DomainError::InvalidAmount(format!("{value} is not finite")));
    }

    Decimal::from_f64(value)
        .ok_or_else(|| DomainError::InvalidAmount(format!("{value} is out of decimal range")))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{checked_sum, decimal_from_f64, pad_money, round_money, zero};
    use crate::error::DomainError;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn rounds_midpoint_up() {
        assert_eq!(round_money(dec("1.005")).to_string(), "1.01");
        assert_eq!(round_money(dec("2.675")).to_string(), "2.68");
        assert_eq!(round_money(dec("2.674")).to_string(), "2.67");
    }

    #[test]
    fn round_always_renders_two_places() {
        assert_eq!(round_money(dec("20")).to_string(), "20.00");
        assert_eq!(round_money(dec("7.8")).to_string(), "7.80");
    }

    #[test]
    fn pad_keeps_extra_precision() {
        assert_eq!(pad_money(dec("300")).to_string(), "300.00");
        assert_eq!(pad_money(dec("33.333")).to_string(), "33.333");
    }

    #[test]
    fn zero_has_money_scale() {
        assert_eq!(zero().to_string(), "0.00");
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        assert!(matches!(
            decimal_from_f64(f64::NAN),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            decimal_from_f64(f64::INFINITY),
            Err(DomainError::InvalidAmount(_))
        ));
        assert_eq!(round_money(decimal_from_f64(5.2).unwrap()).to_string(), "5.20");
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(
            checked_sum([dec("1.10"), dec("2.25")]).unwrap().to_string(),
            "3.35"
        );
        assert_eq!(checked_sum(Vec::<Decimal>::new()).unwrap().to_string(), "0.00");
        assert!(matches!(
            checked_sum([Decimal::MAX, Decimal::ONE]),
            Err(DomainError::InvalidAmount(_))
        ));
    }
}
