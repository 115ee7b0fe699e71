//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Floating-point percentage in the `0..=100` range.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percent(Decimal);

impl Percent {
    /// Ten percent.
    pub const TEN: Self = Self(Decimal::TEN);

    /// Creates a new [`Percent`] by checking the provided value is not less
    /// than `0` and not greater than `100`.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        if val < Decimal::ZERO || val > Decimal::ONE_HUNDRED {
            None
        } else {
            #[expect(
                clippy::allow_attributes,
                reason = "`expect` is not fulfilled on `unsafe_code`"
            )]
            #[allow(unsafe_code, reason = "invariants checked already")]
            Some(unsafe { Self::new_unchecked(val) })
        }
    }

    /// Creates a new [`Percent`] without performing any validation.
    ///
    /// # Safety
    ///
    /// The provided value must not be less than `0` and not greater than
    /// `100`.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(val: Decimal) -> Self {
        Self(val)
    }

    /// Returns this [`Percent`] of the provided `value`.
    #[must_use]
    pub fn of(self, value: Decimal) -> Decimal {
        value * self.0 / Decimal::ONE_HUNDRED
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = &'static str;

    fn try_from(val: Decimal) -> Result<Self, Self::Error> {
        Self::new(val).ok_or("percent must be within `0..=100`")
    }
}

impl From<Percent> for Decimal {
    fn from(p: Percent) -> Self {
        p.0
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::Percent;

    #[test]
    fn checks_range() {
        assert!(Percent::from_str("0").is_ok());
        assert!(Percent::from_str("10").is_ok());
        assert!(Percent::from_str("100").is_ok());
        assert!(Percent::from_str("100.01").is_err());
        assert!(Percent::from_str("-1").is_err());
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: Percent = serde_json::from_str(r#""12.5""#).unwrap();
        assert_eq!(Decimal::from(ok), Decimal::new(125, 1));

        assert!(serde_json::from_str::<Percent>(r#""150""#).is_err());
    }
}
