//! Transaction module describing one row of a ledger batch.
use serde::{Deserialize, de};

use crate::ledger::types::{Money, parse_money};

/// Enum representing the type of transaction.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Open,
    Credit,
    Debit,
    Transfer,
}

/// Custom deserializer for monetary values, parsed straight from their decimal text.
fn deserialize_money<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_money(text).map(Some).map_err(de::Error::custom),
    }
}

fn deserialize_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|name| !name.trim().is_empty()))
}

/// Represents a ledger transaction.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The type of transaction (e.g., Open, Transfer, etc.)
    #[serde(rename = "type")]
    tx_type: TransactionType,

    /// The owner of the account this transaction acts on; the source of a transfer.
    owner: String,

    /// The owner of the destination account of a transfer.
    #[serde(default, deserialize_with = "deserialize_name")]
    counterparty: Option<String>,

    /// The amount involved in the transaction, if applicable.
    #[serde(default, deserialize_with = "deserialize_money")]
    amount: Option<Money>,
}

impl Transaction {
    pub fn new(
        tx_type: TransactionType,
        owner: impl Into<String>,
        counterparty: Option<String>,
        amount: Option<Money>,
    ) -> Self {
        Transaction {
            tx_type,
            owner: owner.into(),
            counterparty,
            amount,
        }
    }

    /// Gets the type of the transaction.
    pub fn get_type(&self) -> TransactionType {
        self.tx_type
    }

    /// Gets the owner of the account this transaction acts on.
    pub fn get_owner(&self) -> &str {
        &self.owner
    }

    /// Gets the destination owner of a transfer, if present.
    pub fn get_counterparty(&self) -> Option<&str> {
        self.counterparty.as_deref()
    }

    /// Gets the amount of the transaction, if applicable.
    pub fn get_amount(&self) -> Option<Money> {
        self.amount
    }
}
