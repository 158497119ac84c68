//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (reais). The payment
//! gateway expects integer centavos, see [`Price::to_cents`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a BRL price.
    #[must_use]
    pub const fn brl(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::BRL)
    }

    /// Create a price from an integer amount of the smallest currency unit.
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }

    /// Amount in the smallest currency unit, rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_cents(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Format for display, e.g. `R$ 1.234,50`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(self.currency_code.thousands_separator());
            }
            grouped.push(ch);
        }

        format!(
            "{}{} {grouped}{}{frac_part}",
            if negative { "-" } else { "" },
            self.currency_code.symbol(),
            self.currency_code.decimal_separator(),
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
}

impl CurrencyCode {
    /// Currency symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$",
            Self::USD => "$",
        }
    }

    const fn decimal_separator(self) -> char {
        match self {
            Self::BRL => ',',
            Self::USD => '.',
        }
    }

    const fn thousands_separator(self) -> char {
        match self {
            Self::BRL => '.',
            Self::USD => ',',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cents_rounds_half_away_from_zero() {
        assert_eq!(Price::brl(Decimal::new(1234, 2)).to_cents(), Some(1234));
        assert_eq!(Price::brl(Decimal::new(12345, 3)).to_cents(), Some(1235));
        assert_eq!(Price::brl(Decimal::new(150, 0)).to_cents(), Some(15000));
    }

    #[test]
    fn test_from_cents() {
        let price = Price::from_cents(9990, CurrencyCode::BRL);
        assert_eq!(price.amount, Decimal::new(9990, 2));
    }

    #[test]
    fn test_display_brl() {
        assert_eq!(Price::brl(Decimal::new(1234, 2)).display(), "R$ 12,34");
        assert_eq!(Price::brl(Decimal::new(123_450, 2)).display(), "R$ 1.234,50");
        assert_eq!(Price::brl(Decimal::ZERO).display(), "R$ 0,00");
    }

    #[test]
    fn test_display_usd() {
        let price = Price::new(Decimal::new(1_000_000, 2), CurrencyCode::USD);
        assert_eq!(price.display(), "$ 10,000.00");
    }
}
