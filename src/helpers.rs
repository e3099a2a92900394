//! Shared helpers for Decimal ↔ f64 conversions of stored weather values.
//!
//! Weather columns are NUMERIC with a fixed scale per quantity:
//!
//! - temperatures (°F): 1 decimal place
//! - daylight hours: 2 decimal places
//! - precipitation (inches): 3 decimal places
//!
//! Conversions into Decimal return `Decimal::ZERO` for non-finite inputs (NaN, ±Inf).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places stored for temperatures.
pub(crate) const TEMPERATURE_DP: u32 = 1;
/// Decimal places stored for daylight duration.
pub(crate) const DAYLIGHT_DP: u32 = 2;
/// Decimal places stored for precipitation.
pub(crate) const PRECIPITATION_DP: u32 = 3;

/// Convert an f64 to Decimal, rounded half away from zero to `dp` decimal places.
pub(crate) fn f64_to_decimal(v: f64, dp: u32) -> Decimal {
    if !v.is_finite() {
        tracing::warn!("f64_to_decimal received non-finite value {}, defaulting to 0", v);
        return Decimal::ZERO;
    }
    Decimal::try_from(v)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or_default()
}

/// Convert an optional f64 to Decimal, returning None if input is None.
pub(crate) fn opt_f64_to_decimal(v: Option<f64>, dp: u32) -> Option<Decimal> {
    v.map(|v| f64_to_decimal(v, dp))
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert a nullable Decimal column to f64, coalescing NULL to 0.0.
pub(crate) fn opt_dec_to_f64_or_zero(d: Option<Decimal>) -> f64 {
    d.map(dec_to_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_f64_to_decimal_rounds() {
        assert_eq!(
            f64_to_decimal(28.36, TEMPERATURE_DP),
            Decimal::from_str("28.4").unwrap()
        );
        assert_eq!(
            f64_to_decimal(0.03937, PRECIPITATION_DP),
            Decimal::from_str("0.039").unwrap()
        );
    }

    #[test]
    fn test_f64_to_decimal_negative() {
        assert_eq!(
            f64_to_decimal(-4.25, TEMPERATURE_DP),
            Decimal::from_str("-4.3").unwrap()
        );
    }

    #[test]
    fn test_f64_to_decimal_non_finite() {
        assert_eq!(f64_to_decimal(f64::NAN, DAYLIGHT_DP), Decimal::ZERO);
        assert_eq!(f64_to_decimal(f64::INFINITY, DAYLIGHT_DP), Decimal::ZERO);
        assert_eq!(f64_to_decimal(f64::NEG_INFINITY, DAYLIGHT_DP), Decimal::ZERO);
    }

    #[test]
    fn test_opt_f64_to_decimal() {
        assert_eq!(opt_f64_to_decimal(None, TEMPERATURE_DP), None);
        assert_eq!(
            opt_f64_to_decimal(Some(9.125), DAYLIGHT_DP),
            Some(Decimal::from_str("9.13").unwrap())
        );
    }

    #[test]
    fn test_dec_to_f64() {
        let d = Decimal::from_str("9.25").unwrap();
        assert!((dec_to_f64(d) - 9.25).abs() < 1e-10);
        assert_eq!(dec_to_f64(Decimal::ZERO), 0.0);
    }

    #[test]
    fn test_opt_dec_to_f64_or_zero() {
        assert_eq!(opt_dec_to_f64_or_zero(None), 0.0);
        let d = Decimal::from_str("28.0").unwrap();
        assert!((opt_dec_to_f64_or_zero(Some(d)) - 28.0).abs() < 1e-10);
    }
}
