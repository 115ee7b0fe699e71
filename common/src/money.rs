//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};
use serde::{Deserialize, Serialize};

use crate::{define_kind, Percent};

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Number of decimal places amounts are rounded to.
    pub const SCALE: u32 = 2;

    /// Creates a new [`Money`] out of the provided `amount` and `currency`.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero [`Money`] in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Indicates whether this [`Money`] is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Adds the `other` [`Money`] to this one.
    ///
    /// [`None`] is returned if the currencies differ or the sum overflows.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then_some(())?;
        Some(Self::new(
            self.amount.checked_add(other.amount)?,
            self.currency,
        ))
    }

    /// Multiplies this [`Money`] by the provided `factor`.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_mul(self, factor: u32) -> Option<Self> {
        Some(Self::new(
            self.amount.checked_mul(Decimal::from(factor))?,
            self.currency,
        ))
    }

    /// Returns the provided [`Percent`] of this [`Money`], rounded to
    /// [`Money::SCALE`].
    #[must_use]
    pub fn percent(self, rate: Percent) -> Self {
        Self::new(rate.of(self.amount).round_dp(Self::SCALE), self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        match amount.is_integer().then(|| amount.to_i128()).flatten() {
            Some(int) => write!(f, "{int}{currency}"),
            None => write!(f, "{}{currency}", amount.normalize()),
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 || !s.is_char_boundary(s.len() - 3) {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Haitian Gourde."]
        Htg = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Euro."]
        Eur = 3,

        #[doc = "Canadian Dollar."]
        Cad = 4,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use crate::Percent;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("1000HTG").unwrap(),
            Money::new(decimal("1000"), Currency::Htg),
        );
        assert_eq!(
            Money::from_str("12.50CAD").unwrap(),
            Money::new(decimal("12.50"), Currency::Cad),
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45Usdollar").is_err());
        assert!(Money::from_str("12GBP").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(
            Money::new(decimal("3000.00"), Currency::Htg).to_string(),
            "3000HTG",
        );
        assert_eq!(
            Money::new(decimal("12.50"), Currency::Usd).to_string(),
            "12.5USD",
        );
    }

    #[test]
    fn adds_only_same_currency() {
        let a = Money::new(decimal("1000"), Currency::Htg);
        let b = Money::new(decimal("250.5"), Currency::Htg);

        assert_eq!(
            a.checked_add(b),
            Some(Money::new(decimal("1250.5"), Currency::Htg)),
        );
        assert_eq!(a.checked_add(Money::zero(Currency::Usd)), None);
    }

    #[test]
    fn takes_percent() {
        let rate = Percent::new(decimal("10")).unwrap();

        assert_eq!(
            Money::new(decimal("1000"), Currency::Htg).percent(rate),
            Money::new(decimal("100"), Currency::Htg),
        );
        assert_eq!(
            Money::new(decimal("33.33"), Currency::Usd).percent(rate),
            Money::new(decimal("3.33"), Currency::Usd),
        );
    }

    #[test]
    fn serializes_amount_as_string() {
        let json = serde_json::to_string(&Money::new(
            decimal("1000.25"),
            Currency::Htg,
        ))
        .unwrap();

        assert_eq!(json, r#"{"amount":"1000.25","currency":"HTG"}"#);
    }
}
