//! Monetary amounts with an explicit, uniform unit convention.
//!
//! Amounts are carried in **major currency units** as [`Decimal`] everywhere
//! in the domain (cart line prices, cart totals, order totals). The single
//! place where minor units appear is the payment gateway boundary, which
//! calls [`Money::minor_units`]. Mixing the two conventions is the classic
//! checkout bug, so the conversion lives here and is tested explicitly.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting monetary amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is negative where a charge amount is required.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),

    /// Amount does not fit the gateway's integer minor-unit representation.
    #[error("amount out of range for minor units: {0}")]
    OutOfRange(Decimal),
}

/// A monetary amount in major units of a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's major unit (e.g., colones, not céntimos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Convert to the gateway's integer minor-unit amount.
    ///
    /// Zero-decimal currencies (CRC, JPY) pass through unscaled; two-decimal
    /// currencies are scaled by 100. The result is rounded half-up to absorb
    /// sub-minor-unit residue from quantity multiplication.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for negative amounts and
    /// `MoneyError::OutOfRange` if the scaled amount exceeds `i64`.
    pub fn minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative(self.amount));
        }
        let scaled = self
            .amount
            .checked_mul(Decimal::from(self.currency.minor_units_per_major()))
            .ok_or(MoneyError::OutOfRange(self.amount))?;
        scaled
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::OutOfRange(self.amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.code())
    }
}

/// ISO 4217 currency codes supported by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// Costa Rican colón. Zero-decimal at the payment gateway.
    #[default]
    Crc,
    Usd,
    Eur,
}

impl CurrencyCode {
    /// ISO 4217 code, lowercase as the payment gateway expects it.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Crc => "crc",
            Self::Usd => "usd",
            Self::Eur => "eur",
        }
    }

    /// Number of ISO 4217 decimal places for the currency.
    #[must_use]
    pub const fn exponent(&self) -> u32 {
        match self {
            Self::Crc => 0,
            Self::Usd | Self::Eur => 2,
        }
    }

    /// Scale factor between major and minor units.
    #[must_use]
    pub const fn minor_units_per_major(&self) -> i64 {
        match self.exponent() {
            0 => 1,
            1 => 10,
            _ => 100,
        }
    }

    /// Whether a gateway-reported code names this currency, ignoring case.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        code.eq_ignore_ascii_case(self.code())
    }

    /// Parse a currency code, case-insensitively.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "crc" => Some(Self::Crc),
            "usd" => Some(Self::Usd),
            "eur" => Some(Self::Eur),
            _ => None,
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).expect("valid decimal")
    }

    #[test]
    fn test_zero_decimal_currency_is_not_scaled() {
        // CRC has no minor unit: 2500 colones are sent to the gateway as 2500.
        let money = Money::new(dec("2500"), CurrencyCode::Crc);
        assert_eq!(money.minor_units(), Ok(2500));
    }

    #[test]
    fn test_two_decimal_currency_is_scaled_by_100() {
        let money = Money::new(dec("19.99"), CurrencyCode::Usd);
        assert_eq!(money.minor_units(), Ok(1999));
    }

    #[test]
    fn test_residue_rounds_half_up() {
        let money = Money::new(dec("10.005"), CurrencyCode::Usd);
        assert_eq!(money.minor_units(), Ok(1001));
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let money = Money::new(dec("-1"), CurrencyCode::Crc);
        assert_eq!(money.minor_units(), Err(MoneyError::Negative(dec("-1"))));
    }

    #[test]
    fn test_zero_is_fine() {
        let money = Money::new(Decimal::ZERO, CurrencyCode::Usd);
        assert_eq!(money.minor_units(), Ok(0));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(CurrencyCode::parse("CRC"), Some(CurrencyCode::Crc));
        assert_eq!(CurrencyCode::parse("usd"), Some(CurrencyCode::Usd));
        assert_eq!(CurrencyCode::parse("xxx"), None);
    }

    #[test]
    fn test_currency_matches_ignores_case() {
        assert!(CurrencyCode::Crc.matches("CRC"));
        assert!(CurrencyCode::Crc.matches("crc"));
        assert!(!CurrencyCode::Crc.matches("usd"));
    }
}
