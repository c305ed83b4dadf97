//! Prices stored as integer cents.
//!
//! Prices are kept in the smallest currency unit (USD cents) so they round-trip
//! through the payment provider's `amount` field without any conversion.
//! Display formatting goes through `rust_decimal` to avoid float rounding.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`PriceInCents`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The value is zero or negative.
    #[error("price must be at least 1 cent (got {0})")]
    NotPositive(i64),
    /// The value does not fit the storage column.
    #[error("price is too large (got {0})")]
    TooLarge(i64),
    /// The input is not an integer.
    #[error("price must be a whole number of cents")]
    NotAnInteger,
}

/// A product price in USD cents. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PriceInCents(i32);

impl PriceInCents {
    /// Create a price from a number of cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] for values below 1 and
    /// [`PriceError::TooLarge`] for values that overflow `i32`.
    pub fn new(cents: i64) -> Result<Self, PriceError> {
        if cents < 1 {
            return Err(PriceError::NotPositive(cents));
        }
        i32::try_from(cents)
            .map(Self)
            .map_err(|_| PriceError::TooLarge(cents))
    }

    /// Parse a price from form input such as `"1999"`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotAnInteger`] if the input is not an integer, or
    /// any error from [`Self::new`].
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let cents = input
            .trim()
            .parse::<i64>()
            .map_err(|_| PriceError::NotAnInteger)?;
        Self::new(cents)
    }

    /// The raw number of cents.
    #[must_use]
    pub const fn cents(self) -> i32 {
        self.0
    }
}

/// Format a number of cents as a dollar amount, e.g. `1999` as `$19.99`.
///
/// Works for amounts reported by the payment provider, which may be zero.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    format!("${}", Decimal::new(cents, 2))
}

impl fmt::Display for PriceInCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_cents(i64::from(self.0)))
    }
}

impl TryFrom<i64> for PriceInCents {
    type Error = PriceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PriceInCents> for i64 {
    fn from(price: PriceInCents) -> Self {
        Self::from(price.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PriceInCents {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PriceInCents {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let cents = <i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(i64::from(cents))?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PriceInCents {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
