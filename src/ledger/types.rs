//! Types used throughout the ledger.
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::{Decimal, Error as DecimalError};

/// Money type, representing an exact decimal value of up to 28 significant digits.
pub type Money = Decimal;

/// Account ID type, a stable per-instance identifier used to order lock acquisition.
pub type AccountId = u64;

static NEXT_ACCOUNT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh account ID, unique for the lifetime of the process.
pub(crate) fn next_account_id() -> AccountId {
    NEXT_ACCOUNT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Parses a monetary value from its decimal text without any rounding.
///
/// Fails instead of rounding when the text carries more precision than a [`Money`] can hold.
pub fn parse_money(text: &str) -> Result<Money, DecimalError> {
    Decimal::from_str_exact(text.trim())
}

/// Adds two amounts, returning `None` on overflow or if the sum would be rounded.
///
/// A [`Money`] holds at most 28 significant digits. When an exact result needs more, the
/// decimal arithmetic rounds it to a smaller scale, so an exact result always keeps the
/// larger of the operand scales.
pub fn exact_add(lhs: Money, rhs: Money) -> Option<Money> {
    let sum = lhs.checked_add(rhs)?;
    (sum.scale() == lhs.scale().max(rhs.scale())).then_some(sum)
}

/// Subtracts `rhs` from `lhs`, returning `None` on overflow or if the difference would be rounded.
pub fn exact_sub(lhs: Money, rhs: Money) -> Option<Money> {
    let difference = lhs.checked_sub(rhs)?;
    (difference.scale() == lhs.scale().max(rhs.scale())).then_some(difference)
}
