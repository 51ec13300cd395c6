//! The `State` module applies a stream of ledger transactions to a bank.
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ledger::{
    Account, AccountSnapshot, BalanceError, Bank, Transaction, TransactionType, types::Money,
};

/// Errors that can occur while applying a ledger transaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error("Account for {0} already exists")]
    AccountExists(String),
    #[error("No account found for {0}")]
    AccountNotFound(String),
    #[error("Transaction requires an amount")]
    MissingAmount,
    #[error("Transfer requires a counterparty")]
    MissingCounterparty,
    #[error("Negative amount {0} is not allowed")]
    NegativeAmount(Money),
}

/// Represents the state of the ledger: a bank and the channel feeding it transactions.
pub struct State {
    /// The bank all transactions are applied to.
    bank: Arc<Bank>,
    /// A channel receiver for processing incoming transactions.
    receiver: mpsc::Receiver<Transaction>,
}

impl State {
    /// Creates a new instance of `State` around an existing bank.
    pub fn new(bank: Arc<Bank>, receiver: mpsc::Receiver<Transaction>) -> Self {
        State { bank, receiver }
    }

    pub fn bank(&self) -> &Arc<Bank> {
        &self.bank
    }

    /// Takes a snapshot of every registered account, in registration order.
    pub fn get_all_accounts(&self) -> Vec<AccountSnapshot> {
        self.bank
            .accounts()
            .iter()
            .map(|account| account.snapshot())
            .collect()
    }

    fn lookup(&self, owner: &str) -> Result<Arc<Account>, TransactionError> {
        self.bank
            .find_account(owner)
            .ok_or_else(|| TransactionError::AccountNotFound(owner.to_string()))
    }

    /// Processes a transaction, updating the bank accordingly.
    pub fn process_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<(), TransactionError> {
        if let Some(amount) = transaction.get_amount().filter(|amount| *amount < Money::ZERO) {
            return Err(TransactionError::NegativeAmount(amount));
        }
        let owner = transaction.get_owner();
        let required_amount = || {
            transaction
                .get_amount()
                .ok_or(TransactionError::MissingAmount)
        };

        match transaction.get_type() {
            TransactionType::Open => {
                if self.bank.find_account(owner).is_some() {
                    return Err(TransactionError::AccountExists(owner.to_string()));
                }
                let balance = transaction.get_amount().unwrap_or(Money::ZERO);
                self.bank.add_account(Arc::new(Account::new(owner, balance)));
            }
            TransactionType::Credit => {
                let account = self.lookup(owner)?;
                account
                    .credit(required_amount()?)
                    .map_err(BalanceError::from)?;
            }
            TransactionType::Debit => {
                let account = self.lookup(owner)?;
                account.debit(required_amount()?)?;
            }
            TransactionType::Transfer => {
                let counterparty = transaction
                    .get_counterparty()
                    .ok_or(TransactionError::MissingCounterparty)?;
                let from = self.lookup(owner)?;
                let to = self.lookup(counterparty)?;
                self.bank.transfer(&from, &to, required_amount()?)?;
            }
        }
        Ok(())
    }

    /// Runs the state management loop, processing transactions from the receiver.
    pub async fn run(&mut self) {
        let mut applied = 0usize;
        let mut rejected = 0usize;
        while let Some(transaction) = self.receiver.recv().await {
            match self.process_transaction(&transaction) {
                Ok(()) => applied += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(?transaction, "Error processing transaction: {e}");
                }
            }
        }
        info!(applied, rejected, bank = %self.bank.name(), "ledger batch finished");
    }
}
