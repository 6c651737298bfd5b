use thiserror::Error;

use crate::domain::{BalanceOverflow, ValidationError, WalletId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("Wallet '{name}' is still referenced by {references} transfer(s) or transaction(s)")]
    WalletInUse { name: String, references: i64 },

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    CategoryAlreadyExists(String),

    #[error("Currency mismatch between wallets: {from_currency} vs {to_currency}")]
    CurrencyMismatch {
        from_currency: String,
        to_currency: String,
    },

    #[error("Balance of wallet {0} would overflow")]
    BalanceOverflow(WalletId),

    #[error("Total of {0} would overflow")]
    TotalOverflow(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<BalanceOverflow> for AppError {
    fn from(err: BalanceOverflow) -> Self {
        AppError::BalanceOverflow(err.0)
    }
}
