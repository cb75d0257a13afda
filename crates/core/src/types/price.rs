//! Euro prices using decimal arithmetic, and the shipping rule.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount is zero where a positive price is required.
    #[error("price must be greater than zero")]
    NotPositive,
}

/// A non-negative amount in euros.
///
/// Serialized as a decimal string (`"20.00"`) so no precision is lost in the
/// cart record or order snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Create a price from whole cents.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `cents` is below zero.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// Parse a strictly positive price, as typed into the inventory form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not a number, negative or zero.
    pub fn parse_positive(s: &str) -> Result<Self, PriceError> {
        let price: Self = s.parse()?;
        if price.0.is_zero() {
            return Err(PriceError::NotPositive);
        }
        Ok(price)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The price of `quantity` units.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Format for display (e.g., "€19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("€{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceError::Empty);
        }
        let amount = Decimal::from_str(s).map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Shipping surcharge rule applied at checkout finalization.
///
/// Shipping is free when the subtotal is strictly above `free_threshold`,
/// otherwise `flat_fee` is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    /// Subtotals above this ship for free.
    pub free_threshold: Price,
    /// Fee charged at or below the threshold.
    pub flat_fee: Price,
}

impl ShippingPolicy {
    /// Create a policy from explicit amounts.
    #[must_use]
    pub const fn new(free_threshold: Price, flat_fee: Price) -> Self {
        Self {
            free_threshold,
            flat_fee,
        }
    }

    /// Shipping fee for a given subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Price) -> Price {
        if subtotal > self.free_threshold {
            Price::ZERO
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    /// €50 free-shipping threshold, €5 flat fee.
    fn default() -> Self {
        Self {
            free_threshold: Price(Decimal::new(50, 0)),
            flat_fee: Price(Decimal::new(5, 0)),
        }
    }
}
