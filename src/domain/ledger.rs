use std::collections::BTreeMap;

use thiserror::Error;

use super::{AppliedEffect, Cents, TransactionKind, TransferDraft, WalletId};

/// A balance change that does not fit in [`Cents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Balance of wallet {0} would overflow")]
pub struct BalanceOverflow(pub WalletId);

/// The balance work one ledger operation has to do: undo what is currently
/// applied, then apply what should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub reverse: Option<AppliedEffect>,
    pub apply: Option<AppliedEffect>,
}

impl Reconciliation {
    /// Creating a transfer: apply iff the draft is completed.
    pub fn for_create(draft: &TransferDraft) -> Self {
        Self {
            reverse: None,
            apply: draft.intended_effect(),
        }
    }

    /// Editing a transfer: reverse the stored snapshot, apply the new draft.
    pub fn for_update(current: Option<AppliedEffect>, draft: &TransferDraft) -> Self {
        Self {
            reverse: current,
            apply: draft.intended_effect(),
        }
    }

    /// Deleting a transfer: reverse the stored snapshot.
    pub fn for_delete(current: Option<AppliedEffect>) -> Self {
        Self {
            reverse: current,
            apply: None,
        }
    }

    /// Net balance change per wallet. Wallets whose changes cancel out are
    /// omitted.
    pub fn net_deltas(&self) -> Result<BalanceDeltas, BalanceOverflow> {
        let mut deltas = BalanceDeltas::default();
        if let Some(effect) = &self.reverse {
            for (wallet, delta) in effect.reversal_deltas() {
                deltas.add(wallet, delta)?;
            }
        }
        if let Some(effect) = &self.apply {
            for (wallet, delta) in effect.deltas() {
                deltas.add(wallet, delta)?;
            }
        }
        Ok(deltas)
    }
}

/// Signed balance changes keyed by wallet, in a stable order so writes always
/// lock wallets in the same sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceDeltas(BTreeMap<WalletId, Cents>);

impl BalanceDeltas {
    pub fn add(&mut self, wallet: WalletId, delta: Cents) -> Result<(), BalanceOverflow> {
        let entry = self.0.entry(wallet).or_insert(0);
        *entry = entry.checked_add(delta).ok_or(BalanceOverflow(wallet))?;
        if *entry == 0 {
            self.0.remove(&wallet);
        }
        Ok(())
    }

    pub fn get(&self, wallet: &WalletId) -> Cents {
        self.0.get(wallet).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WalletId, Cents)> + '_ {
        self.0.iter().map(|(w, d)| (*w, *d))
    }
}

/// Signed effect of an income/expense entry on its wallet.
pub fn transaction_delta(kind: TransactionKind, amount_cents: Cents) -> Cents {
    match kind {
        TransactionKind::Income => amount_cents,
        TransactionKind::Expense => -amount_cents,
    }
}

/// Expected balance of every wallet, rebuilt from opening balances, signed
/// transaction effects and applied transfer snapshots.
pub fn expected_balances<'a>(
    opening: impl IntoIterator<Item = (WalletId, Cents)>,
    transactions: impl IntoIterator<Item = (WalletId, TransactionKind, Cents)>,
    applied_transfers: impl IntoIterator<Item = &'a AppliedEffect>,
) -> Result<BTreeMap<WalletId, Cents>, BalanceOverflow> {
    let mut balances: BTreeMap<WalletId, Cents> = opening.into_iter().collect();
    let mut credit = |wallet: WalletId, delta: Cents| -> Result<(), BalanceOverflow> {
        let balance = balances.entry(wallet).or_insert(0);
        *balance = balance.checked_add(delta).ok_or(BalanceOverflow(wallet))?;
        Ok(())
    };

    for (wallet, kind, amount) in transactions {
        credit(wallet, transaction_delta(kind, amount))?;
    }
    for effect in applied_transfers {
        for (wallet, delta) in effect.deltas() {
            credit(wallet, delta)?;
        }
    }

    Ok(balances)
}
