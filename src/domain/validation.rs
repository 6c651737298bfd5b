use thiserror::Error;

use super::{Cents, LoanStatus};

/// Rejections raised before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Source and destination wallets cannot be the same")]
    SameWallet,

    #[error("Amount must be greater than 0 (got {0})")]
    NonPositiveAmount(Cents),

    #[error("Remaining amount {remaining} must be between 0 and the loan amount {amount}")]
    InvalidLoanRemaining { amount: Cents, remaining: Cents },

    #[error("Repayment of {requested} exceeds the remaining amount {remaining}")]
    RepaymentExceedsRemaining { remaining: Cents, requested: Cents },

    #[error("A loan with {remaining} remaining cannot be {status}")]
    LoanStatusConflict { status: LoanStatus, remaining: Cents },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),
}

/// Amounts moved by transfers, transactions and loans are strictly positive.
pub fn ensure_positive(amount: Cents) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(())
}

/// Trim a user-supplied name and reject it when nothing is left.
pub fn normalize_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Empty or whitespace-only free text is stored as absent.
pub fn normalize_optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(1).is_ok());
        assert_eq!(ensure_positive(0), Err(ValidationError::NonPositiveAmount(0)));
        assert_eq!(
            ensure_positive(-500),
            Err(ValidationError::NonPositiveAmount(-500))
        );
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Cash "), Ok("Cash".to_string()));
        assert_eq!(normalize_name("   "), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_normalize_optional_text() {
        assert_eq!(normalize_optional_text(Some("  ".into())), None);
        assert_eq!(
            normalize_optional_text(Some(" rent ".into())),
            Some("rent".to_string())
        );
        assert_eq!(normalize_optional_text(None), None);
    }
}
