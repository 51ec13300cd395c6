//! Accounts and their exact-decimal balance operations.
use std::{
    fmt,
    hash::{Hash, Hasher},
    ptr,
    sync::{Arc, Weak},
};

use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{
    Bank,
    types::{AccountId, Money, exact_add, exact_sub, next_account_id},
};

fn serialize_money<S>(money: &Money, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(money)
}

/// Represents a named account holding an exact decimal balance.
///
/// The balance sits behind its own lock, so an `Account` can be shared between threads
/// (usually as an `Arc<Account>`) and every credit or debit is applied atomically.
///
/// Equality and hashing follow the current owner and balance. Do not keep an `Account` in a
/// hashed collection while its balance can still change: a credit or debit leaves it filed
/// under a stale hash.
pub struct Account {
    /// Stable identifier, used only to order lock acquisition.
    id: AccountId,

    /// The name of the account holder.
    owner: String,

    /// The current balance.
    balance: Mutex<Money>,

    /// The bank currently holding this account, if any.
    bank: RwLock<Weak<Bank>>,
}

impl Account {
    /// Creates a new, detached account for `owner` with an initial `balance`.
    pub fn new(owner: impl Into<String>, balance: Money) -> Self {
        Account {
            id: next_account_id(),
            owner: owner.into(),
            balance: Mutex::new(balance),
            bank: RwLock::new(Weak::new()),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Gets the name of the account holder.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Gets the current balance.
    pub fn balance(&self) -> Money {
        *self.balance.lock()
    }

    /// Gets the integer part of the balance, truncated toward zero, e.g. `900` for
    /// `900.12345`. `None` if it does not fit in an `i64`.
    pub fn whole_units(&self) -> Option<i64> {
        self.balance().trunc().to_i64()
    }

    /// Gets the bank this account belongs to, if it was registered with one that is still alive.
    pub fn bank(&self) -> Option<Arc<Bank>> {
        self.bank.read().upgrade()
    }

    pub(crate) fn attach(&self, bank: &Arc<Bank>) {
        *self.bank.write() = Arc::downgrade(bank);
    }

    /// Deposits the specified amount into the account.
    ///
    /// Returns an error, leaving the balance untouched, if the new balance cannot be held
    /// exactly.
    pub fn credit(&self, amount: Money) -> Result<(), PrecisionError> {
        let mut balance = self.balance.lock();
        *balance = credited(*balance, amount)?;
        Ok(())
    }

    /// Withdraws the specified amount from the account.
    ///
    /// Returns an error, leaving the balance untouched, if there are insufficient funds or the
    /// new balance cannot be held exactly.
    pub fn debit(&self, amount: Money) -> Result<(), BalanceError> {
        let mut balance = self.balance.lock();
        *balance = debited(*balance, amount)?;
        Ok(())
    }

    /// Takes a point-in-time copy of the account for reporting.
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            owner: self.owner.clone(),
            balance: self.balance(),
            bank: self.bank().map(|bank| bank.name()),
        }
    }

    /// Locks the balances of two distinct accounts in ascending ID order and returns the
    /// guards in argument order.
    pub(crate) fn lock_pair<'a>(
        first: &'a Account,
        second: &'a Account,
    ) -> (MutexGuard<'a, Money>, MutexGuard<'a, Money>) {
        debug_assert_ne!(first.id, second.id);
        if first.id < second.id {
            let first_guard = first.balance.lock();
            let second_guard = second.balance.lock();
            (first_guard, second_guard)
        } else {
            let second_guard = second.balance.lock();
            let first_guard = first.balance.lock();
            (first_guard, second_guard)
        }
    }
}

/// Computes `balance + amount` without writing it anywhere.
pub(crate) fn credited(balance: Money, amount: Money) -> Result<Money, PrecisionError> {
    exact_add(balance, amount).ok_or(PrecisionError { balance, amount })
}

/// Computes `balance - amount` without writing it anywhere.
pub(crate) fn debited(balance: Money, amount: Money) -> Result<Money, BalanceError> {
    if amount > balance {
        return Err(InsufficientFundsError.into());
    }
    exact_sub(balance, amount)
        .ok_or(PrecisionError { balance, amount })
        .map_err(BalanceError::from)
}

// Equality and hashing are structural over owner and balance; the ID and bank are ignored.
impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        self.owner == other.owner && self.balance() == other.balance()
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.balance().hash(state);
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("balance", &self.balance())
            .finish_non_exhaustive()
    }
}

/// A point-in-time copy of an account, serialized as one output row.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    /// The name of the account holder.
    pub owner: String,

    /// The balance at the time of the snapshot, written as its exact decimal text.
    #[serde(serialize_with = "serialize_money")]
    pub balance: Money,

    /// The name of the bank holding the account.
    pub bank: Option<String>,
}

/// Raised when a debit asks for more than the account holds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Insufficient funds")]
pub struct InsufficientFundsError;

/// Raised when a balance change would overflow or need more than 28 significant digits.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Balance {balance} cannot absorb {amount} exactly")]
pub struct PrecisionError {
    pub balance: Money,
    pub amount: Money,
}

/// Errors that can occur while debiting an account.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFundsError),
    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::ledger::{Account, BalanceError, InsufficientFundsError, PrecisionError};

    fn account() -> Account {
        Account::new("Jahir", dec!(1000.12345))
    }

    #[test]
    fn test_owner_and_balance() {
        let account = account();
        assert_eq!(account.owner(), "Jahir");
        assert_eq!(account.balance().to_string(), "1000.12345");
        assert!(account.balance() > dec!(0));
        assert!(account.bank().is_none());
    }

    #[test]
    fn test_debit() {
        let account = account();
        assert!(account.debit(dec!(100)).is_ok());
        assert_eq!(account.balance().to_string(), "900.12345");
        assert_eq!(account.whole_units(), Some(900));
    }

    #[test]
    fn test_credit() {
        let account = account();
        assert!(account.credit(dec!(100)).is_ok());
        assert_eq!(account.balance().to_string(), "1100.12345");
        assert_eq!(account.whole_units(), Some(1100));
    }

    #[test]
    fn test_whole_units_truncates_toward_zero() {
        assert_eq!(Account::new("Debt", dec!(-3.99)).whole_units(), Some(-3));
        assert_eq!(Account::new("Huge", Decimal::MAX).whole_units(), None);
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let account = account();
        let err = account.debit(dec!(1500)).unwrap_err();
        assert_eq!(err, BalanceError::InsufficientFunds(InsufficientFundsError));
        assert_eq!(err.to_string(), "Insufficient funds");
        assert_eq!(account.balance().to_string(), "1000.12345");
    }

    #[test]
    fn test_debit_entire_balance() {
        let account = account();
        assert!(account.debit(dec!(1000.12345)).is_ok());
        assert!(account.balance().is_zero());
        assert!(matches!(
            account.debit(dec!(0.00001)),
            Err(BalanceError::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_chained_operations_stay_exact() {
        let account = Account::new("Exact", dec!(0));
        for _ in 0..10 {
            account.credit(dec!(0.1)).unwrap();
        }
        assert_eq!(account.balance(), dec!(1));
        account.debit(dec!(0.3)).unwrap();
        assert_eq!(account.balance().to_string(), "0.7");
    }

    #[test]
    fn test_credit_that_would_round_is_rejected() {
        let account = account();
        let tiny = Decimal::new(1, 28);
        assert_eq!(
            account.credit(tiny),
            Err(PrecisionError {
                balance: dec!(1000.12345),
                amount: tiny,
            })
        );
        assert_eq!(account.balance().to_string(), "1000.12345");
    }

    #[test]
    fn test_debit_that_would_round_is_rejected() {
        let account = account();
        assert!(matches!(
            account.debit(Decimal::new(1, 28)),
            Err(BalanceError::Precision(_))
        ));
        assert_eq!(account.balance().to_string(), "1000.12345");
    }

    #[test]
    fn test_credit_at_precision_limit() {
        let account = Account::new("Limit", dec!(0.000000000000000000000000001));
        assert!(account.credit(Decimal::new(1, 28)).is_ok());
        assert_eq!(
            account.balance().to_string(),
            "0.0000000000000000000000000011"
        );
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let account = Account::new("Full", Decimal::MAX);
        assert!(matches!(
            account.credit(dec!(1)),
            Err(PrecisionError { .. })
        ));
        assert_eq!(account.balance(), Decimal::MAX);
    }

    #[test]
    fn test_structural_equality() {
        let first = Account::new("Jahir SR", dec!(8900.9997));
        let second = Account::new("Jahir SR", dec!(8900.9997));
        assert_ne!(first.id(), second.id());
        assert_eq!(first, second);
        assert_eq!(second, first);
        assert_eq!(first, first);

        second.credit(dec!(1)).unwrap();
        assert_ne!(first, second);
        assert_ne!(second, first);
    }

    #[test]
    fn test_different_owners_are_not_equal() {
        let first = Account::new("Jahir SR", dec!(10));
        let second = Account::new("Jhan SR", dec!(10));
        assert_ne!(first, second);
    }

    #[test]
    fn test_equal_accounts_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let hash = |account: &Account| {
            let mut hasher = DefaultHasher::new();
            account.hash(&mut hasher);
            hasher.finish()
        };
        let first = Account::new("Jahir SR", dec!(8900.9997));
        let second = Account::new("Jahir SR", dec!(8900.9997));
        assert_eq!(hash(&first), hash(&second));
    }

    #[test]
    fn test_snapshot_of_detached_account() {
        let snapshot = account().snapshot();
        assert_eq!(snapshot.owner, "Jahir");
        assert_eq!(snapshot.balance, dec!(1000.12345));
        assert_eq!(snapshot.bank, None);
    }

    #[test]
    fn test_snapshot_csv_rows() {
        let attached = Account::new("Jhan SR", dec!(1000.8989)).snapshot();
        let attached = super::AccountSnapshot {
            bank: Some("Banco del Estado".to_string()),
            ..attached
        };
        let detached = Account::new("Jahir", dec!(3000.00)).snapshot();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&attached).unwrap();
        writer.serialize(&detached).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            output,
            "owner,balance,bank\n\
             Jhan SR,1000.8989,Banco del Estado\n\
             Jahir,3000.00,\n"
        );
    }

    #[test]
    fn test_concurrent_credits_lose_no_update() {
        let account = Account::new("Shared", dec!(0));
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        account.credit(dec!(0.01)).unwrap();
                    }
                });
            }
        });
        assert_eq!(account.balance(), dec!(8.00));
    }
}
