// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use fintrackr::application::LedgerService;
use fintrackr::domain::{Cents, Wallet};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const OWNER: &str = "user-1";

/// Route service logs to the test harness; `RUST_LOG` narrows them.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    init_test_tracing();
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), OWNER).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a YYYY-MM-DD date string
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Current stored balance of a wallet
pub async fn balance_of(service: &LedgerService, wallet: &Wallet) -> Result<Cents> {
    Ok(service.get_wallet(wallet.id).await?.balance)
}

/// Test fixture: the two-wallet setup used throughout the transfer tests
pub struct TwoWallets {
    pub a: Wallet,
    pub b: Wallet,
}

impl TwoWallets {
    /// Wallet A with 1000.00 and wallet B with 500.00
    pub async fn create(service: &LedgerService) -> Result<Self> {
        let a = service.create_wallet("A", "NPR", 100000).await?;
        let b = service.create_wallet("B", "NPR", 50000).await?;
        Ok(Self { a, b })
    }

    pub async fn balances(&self, service: &LedgerService) -> Result<(Cents, Cents)> {
        Ok((balance_of(service, &self.a).await?, balance_of(service, &self.b).await?))
    }
}

/// Assert the service's integrity report is clean.
pub async fn assert_healthy(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "integrity issues: {:?}", report.issues);
    Ok(())
}
