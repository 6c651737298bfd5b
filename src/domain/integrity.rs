use std::collections::BTreeMap;

use serde::Serialize;

use super::{Cents, Transfer, TransferId, Wallet, WalletId, format_cents};

/// A wallet whose stored balance disagrees with its recorded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub wallet_id: WalletId,
    pub wallet_name: String,
    pub stored: Cents,
    pub expected: Cents,
}

impl BalanceDrift {
    /// Saturates at the ends of the range.
    pub fn difference(&self) -> Cents {
        self.stored.saturating_sub(self.expected)
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum IntegrityIssue {
    BalanceDrift(BalanceDrift),
    /// Applied snapshot does not match the transfer's status or fields
    AppliedStateMismatch(TransferId),
    /// A transfer or its applied snapshot references a missing wallet
    DanglingWallet { transfer: TransferId, wallet: WalletId },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::BalanceDrift(drift) => write!(
                f,
                "wallet '{}' stores {} but its history gives {} (off by {})",
                drift.wallet_name,
                format_cents(drift.stored),
                format_cents(drift.expected),
                format_cents(drift.difference())
            ),
            IntegrityIssue::AppliedStateMismatch(id) => {
                write!(f, "transfer {} has an applied effect that disagrees with its status", id)
            }
            IntegrityIssue::DanglingWallet { transfer, wallet } => {
                write!(f, "transfer {} references missing wallet {}", transfer, wallet)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub wallet_count: usize,
    pub transfer_count: usize,
    pub transaction_count: usize,
    pub applied_transfer_count: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compare stored wallet balances and transfer snapshots against the
/// expected balances rebuilt from history.
pub fn build_integrity_report(
    wallets: &[Wallet],
    transfers: &[Transfer],
    transaction_count: usize,
    expected: &BTreeMap<WalletId, Cents>,
) -> IntegrityReport {
    let mut issues = Vec::new();

    for wallet in wallets {
        let expected_balance = expected.get(&wallet.id).copied().unwrap_or(wallet.opening_balance);
        if expected_balance != wallet.balance {
            issues.push(IntegrityIssue::BalanceDrift(BalanceDrift {
                wallet_id: wallet.id,
                wallet_name: wallet.name.clone(),
                stored: wallet.balance,
                expected: expected_balance,
            }));
        }
    }

    let known = |id: &WalletId| wallets.iter().any(|w| &w.id == id);
    for transfer in transfers {
        if !transfer.applied_state_consistent() {
            issues.push(IntegrityIssue::AppliedStateMismatch(transfer.id));
        }
        let referenced = [transfer.from_wallet, transfer.to_wallet]
            .into_iter()
            .chain(transfer.applied.iter().flat_map(|e| [e.from_wallet, e.to_wallet]));
        for wallet in referenced {
            if !known(&wallet) {
                issues.push(IntegrityIssue::DanglingWallet {
                    transfer: transfer.id,
                    wallet,
                });
            }
        }
    }

    IntegrityReport {
        wallet_count: wallets.len(),
        transfer_count: transfers.len(),
        transaction_count,
        applied_transfer_count: transfers.iter().filter(|t| t.is_applied()).count(),
        issues,
    }
}
