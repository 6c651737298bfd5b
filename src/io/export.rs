use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{LedgerService, TransactionFilter, TransferFilter};
use crate::domain::{Category, Loan, Transaction, Transfer, Wallet, WalletId, format_cents};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub owner: String,
    pub wallets: Vec<Wallet>,
    pub categories: Vec<Category>,
    pub transfers: Vec<Transfer>,
    pub transactions: Vec<Transaction>,
    pub loans: Vec<Loan>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export transfers to CSV format, newest first
    pub async fn export_transfers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transfers = self.service.list_transfers(TransferFilter::default()).await?;
        let names = self.service.get_wallet_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "from_wallet",
            "to_wallet",
            "amount",
            "status",
            "description",
        ])?;

        let name_of = |id: WalletId| names.get(&id).cloned().unwrap_or_else(|| id.to_string());
        for transfer in &transfers {
            csv_writer.write_record(&[
                transfer.id.to_string(),
                transfer.date.format("%Y-%m-%d").to_string(),
                name_of(transfer.from_wallet),
                name_of(transfer.to_wallet),
                format_cents(transfer.amount_cents),
                transfer.status.to_string(),
                transfer.description.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transfers.len())
    }

    /// Export wallets with their stored balances to CSV format
    pub async fn export_wallets_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let wallets = self.service.list_wallets().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["wallet", "currency", "opening_balance", "balance"])?;

        for wallet in &wallets {
            csv_writer.write_record(&[
                wallet.name.clone(),
                wallet.currency.clone(),
                format_cents(wallet.opening_balance),
                format_cents(wallet.balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(wallets.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            owner: self.service.owner().to_string(),
            wallets: self.service.list_wallets().await?,
            categories: self.service.list_categories().await?,
            transfers: self.service.list_transfers(TransferFilter::default()).await?,
            transactions: self
                .service
                .list_transactions(TransactionFilter::default())
                .await?,
            loans: self.service.list_loans().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransferDraft;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn service() -> anyhow::Result<(TempDir, LedgerService)> {
        let dir = TempDir::new()?;
        let path = dir.path().join("export.db");
        let service = LedgerService::init(path.to_string_lossy().as_ref(), "exporter").await?;
        Ok((dir, service))
    }

    #[tokio::test]
    async fn test_transfers_csv_uses_wallet_names() -> anyhow::Result<()> {
        let (_dir, service) = service().await?;
        let cash = service.create_wallet("Cash", "NPR", 100000).await?;
        let bank = service.create_wallet("Bank", "NPR", 0).await?;
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        service
            .create_transfer(TransferDraft::new(cash.id, bank.id, 25050, date).with_description("deposit"))
            .await?;

        let mut out = Vec::new();
        let count = Exporter::new(&service).export_transfers_csv(&mut out).await?;
        let text = String::from_utf8(out)?;

        assert_eq!(count, 1);
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains(",2025-06-01,Cash,Bank,250.50,completed,deposit"), "{}", row);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_json_snapshot() -> anyhow::Result<()> {
        let (_dir, service) = service().await?;
        service.create_wallet("Cash", "", 5000).await?;
        service.create_category("Groceries", Some("#22c55e")).await?;

        let mut out = Vec::new();
        let snapshot = Exporter::new(&service).export_full_json(&mut out).await?;
        let parsed: DatabaseSnapshot = serde_json::from_slice(&out)?;

        assert_eq!(snapshot.wallets.len(), 1);
        assert_eq!(parsed.wallets[0].currency, "NPR");
        assert_eq!(parsed.owner, "exporter");
        assert_eq!(parsed.categories[0].name, "Groceries");
        assert_eq!(parsed.categories[0].color, "#22C55E");
        assert!(parsed.transfers.is_empty());
        Ok(())
    }
}
