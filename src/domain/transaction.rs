use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CategoryId, Cents, OwnerId, ValidationError, WalletId, ensure_positive};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(TransactionKind::Income),
            "expense" => Some(TransactionKind::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An income or expense entry against a single wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner: OwnerId,
    pub wallet: WalletId,
    pub kind: TransactionKind,
    pub amount_cents: Cents,
    pub reason: String,
    pub category: Option<CategoryId>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn from_draft(owner: impl Into<OwnerId>, draft: TransactionDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            wallet: draft.wallet,
            kind: draft.kind,
            amount_cents: draft.amount_cents,
            reason: draft.reason,
            category: draft.category,
            date: draft.date,
            created_at: Utc::now(),
        }
    }

    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            wallet: self.wallet,
            kind: self.kind,
            amount_cents: self.amount_cents,
            reason: self.reason.clone(),
            category: self.category,
            date: self.date,
        }
    }

    pub fn set_fields(&mut self, draft: TransactionDraft) {
        self.wallet = draft.wallet;
        self.kind = draft.kind;
        self.amount_cents = draft.amount_cents;
        self.reason = draft.reason;
        self.category = draft.category;
        self.date = draft.date;
    }

    /// Signed change this entry makes to its wallet balance.
    pub fn signed_amount(&self) -> Cents {
        super::transaction_delta(self.kind, self.amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub wallet: WalletId,
    pub kind: TransactionKind,
    pub amount_cents: Cents,
    pub reason: String,
    pub category: Option<CategoryId>,
    pub date: NaiveDate,
}

impl TransactionDraft {
    pub fn new(
        wallet: WalletId,
        kind: TransactionKind,
        amount_cents: Cents,
        reason: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            wallet,
            kind,
            amount_cents,
            reason: reason.into(),
            category: None,
            date,
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_positive(self.amount_cents)
    }
}

/// Partial edit of a transaction; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub wallet: Option<WalletId>,
    pub kind: Option<TransactionKind>,
    pub amount_cents: Option<Cents>,
    pub reason: Option<String>,
    /// `Some(None)` clears the category
    pub category: Option<Option<CategoryId>>,
    pub date: Option<NaiveDate>,
}

impl TransactionPatch {
    pub fn apply_to(self, base: TransactionDraft) -> Result<TransactionDraft, ValidationError> {
        let merged = TransactionDraft {
            wallet: self.wallet.unwrap_or(base.wallet),
            kind: self.kind.unwrap_or(base.kind),
            amount_cents: self.amount_cents.unwrap_or(base.amount_cents),
            reason: self.reason.unwrap_or(base.reason),
            category: self.category.unwrap_or(base.category),
            date: self.date.unwrap_or(base.date),
        };
        merged.validate()?;
        Ok(merged)
    }
}
