use anyhow::{Context, bail};
use bank_ledger::ledger::{Bank, State, Transaction};
use csv::{ReaderBuilder, Trim};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The size of the channel for processing transactions.
const CHANNEL_SIZE: usize = 100;

/// The bank name used when none is given on the command line.
const DEFAULT_BANK_NAME: &str = "Ledger";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().collect::<Vec<_>>();
    if !(2..=3).contains(&args.len()) {
        bail!("Usage: {} <input_csv_file> [bank_name]", args[0]);
    }
    let input_file = &args[1];
    let bank_name = args.get(2).map_or(DEFAULT_BANK_NAME, String::as_str);

    let (sender, receiver) = mpsc::channel::<Transaction>(CHANNEL_SIZE);
    let mut state = State::new(Bank::new(bank_name), receiver);

    let handle = tokio::spawn(async move {
        state.run().await;
        state
    });

    info!(%input_file, %bank_name, "replaying ledger batch");
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(input_file)
        .with_context(|| format!("Failed to read CSV file {input_file}"))?;

    for row in reader.deserialize::<Transaction>() {
        match row {
            Ok(transaction) => {
                if let Err(err) = sender.send(transaction).await {
                    warn!("Error sending transaction: {err}");
                }
            }
            Err(err) => warn!("Skipping unreadable row: {err}"),
        }
    }

    drop(sender); // Close the sender to signal no more transactions will be sent
    let state = handle
        .await
        .context("Failed to join the state handling task")?;

    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for account in state.get_all_accounts() {
        writer
            .serialize(&account)
            .with_context(|| format!("Error writing account {}", account.owner))?;
    }
    writer.flush()?;
    Ok(())
}
