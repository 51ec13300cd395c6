//! The bank: an ordered registry of accounts that moves money between them.
use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::ledger::{
    Account, BalanceError, PrecisionError,
    account::{credited, debited},
    types::{Money, exact_add},
};

/// Represents a bank grouping a set of accounts.
///
/// Banks are always handled through an `Arc`, so registered accounts can hold a weak
/// back-reference to the bank without keeping it alive.
pub struct Bank {
    /// The display name of the bank.
    name: RwLock<String>,

    /// Registered accounts, in registration order.
    accounts: RwLock<Vec<Arc<Account>>>,
}

impl Bank {
    /// Creates a new bank with no accounts.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Bank {
            name: RwLock::new(name.into()),
            accounts: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Registers an account with this bank and points its back-reference here.
    ///
    /// Registering the same account instance twice is a no-op. An account still attached to
    /// another bank is re-pointed to this one; the other bank keeps its own entry.
    pub fn add_account(self: &Arc<Self>, account: Arc<Account>) {
        let mut accounts = self.accounts.write();
        if accounts.iter().any(|known| Arc::ptr_eq(known, &account)) {
            debug!(owner = account.owner(), "account already registered");
            return;
        }
        account.attach(self);
        debug!(owner = account.owner(), bank = %self.name(), "account registered");
        accounts.push(account);
    }

    /// Retrieves all registered accounts, in registration order.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.accounts.read().clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Retrieves the first registered account held by `owner`.
    pub fn find_account(&self, owner: &str) -> Option<Arc<Account>> {
        self.accounts
            .read()
            .iter()
            .find(|account| account.owner() == owner)
            .cloned()
    }

    /// Sums the balances of all registered accounts.
    ///
    /// Fails if the sum cannot be held exactly.
    pub fn total_balance(&self) -> Result<Money, PrecisionError> {
        self.accounts
            .read()
            .iter()
            .try_fold(Money::ZERO, |total, account| {
                let balance = account.balance();
                exact_add(total, balance).ok_or(PrecisionError {
                    balance: total,
                    amount: balance,
                })
            })
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Both balances stay locked for the whole operation, acquired in ascending account ID
    /// order. Both new balances are computed before either is written, so on any error
    /// neither account changes. A debit failure is returned unchanged. The accounts do not
    /// have to be registered with this bank.
    pub fn transfer(
        &self,
        from: &Account,
        to: &Account,
        amount: Money,
    ) -> Result<(), BalanceError> {
        if from.id() == to.id() {
            // Debit then credit of the same balance nets to nothing once both are valid.
            let balance = from.balance();
            credited(debited(balance, amount)?, amount)?;
            return Ok(());
        }

        let (mut from_balance, mut to_balance) = Account::lock_pair(from, to);
        let new_from = debited(*from_balance, amount)?;
        let new_to = credited(*to_balance, amount)?;
        *from_balance = new_from;
        *to_balance = new_to;
        drop((from_balance, to_balance));

        debug!(
            from = from.owner(),
            to = to.owner(),
            %amount,
            "transfer completed"
        );
        Ok(())
    }
}

impl fmt::Debug for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bank")
            .field("name", &*self.name.read())
            .field("accounts", &*self.accounts.read())
            .finish()
    }
}
