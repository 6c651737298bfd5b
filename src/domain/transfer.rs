use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, OwnerId, ValidationError, WalletId, ensure_positive, normalize_optional_text};

pub type TransferId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Pending,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Pending => "pending",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Some(TransferStatus::Completed),
            "pending" => Some(TransferStatus::Pending),
            "cancelled" | "canceled" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    /// Only completed transfers are reflected in wallet balances.
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The balance effect a transfer currently has on its wallets.
/// Stored on the transfer so reversal never depends on the previous status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEffect {
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub amount_cents: Cents,
}

impl AppliedEffect {
    /// Signed balance changes produced by applying this effect.
    pub fn deltas(&self) -> [(WalletId, Cents); 2] {
        [
            (self.from_wallet, -self.amount_cents),
            (self.to_wallet, self.amount_cents),
        ]
    }

    /// Signed balance changes that undo this effect.
    pub fn reversal_deltas(&self) -> [(WalletId, Cents); 2] {
        [
            (self.from_wallet, self.amount_cents),
            (self.to_wallet, -self.amount_cents),
        ]
    }
}

/// A directed movement of money between two wallets of the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub owner: OwnerId,
    /// Source wallet (balance decreases)
    pub from_wallet: WalletId,
    /// Destination wallet (balance increases)
    pub to_wallet: WalletId,
    /// Always positive
    pub amount_cents: Cents,
    pub date: NaiveDate,
    pub status: TransferStatus,
    pub description: Option<String>,
    /// Effect currently applied to balances; present iff status is completed
    pub applied: Option<AppliedEffect>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// Build a transfer record from a validated draft. The applied snapshot is
    /// left empty; the ledger sets it when the effect hits the balances.
    pub fn from_draft(owner: impl Into<OwnerId>, draft: TransferDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            from_wallet: draft.from_wallet,
            to_wallet: draft.to_wallet,
            amount_cents: draft.amount_cents,
            date: draft.date,
            status: draft.status,
            description: draft.description,
            applied: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current fields as a draft, the starting point for an edit.
    pub fn to_draft(&self) -> TransferDraft {
        TransferDraft {
            from_wallet: self.from_wallet,
            to_wallet: self.to_wallet,
            amount_cents: self.amount_cents,
            date: self.date,
            status: self.status,
            description: self.description.clone(),
        }
    }

    /// Overwrite the editable fields with a draft.
    pub fn set_fields(&mut self, draft: TransferDraft) {
        self.from_wallet = draft.from_wallet;
        self.to_wallet = draft.to_wallet;
        self.amount_cents = draft.amount_cents;
        self.date = draft.date;
        self.status = draft.status;
        self.description = draft.description;
        self.updated_at = Utc::now();
    }

    pub fn is_applied(&self) -> bool {
        self.applied.is_some()
    }

    /// True when the applied snapshot agrees with status and fields.
    pub fn applied_state_consistent(&self) -> bool {
        match (&self.applied, self.status.is_completed()) {
            (None, false) => true,
            (Some(effect), true) => effect == &TransferDraft::effect_of(self),
            _ => false,
        }
    }
}

/// The editable fields of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDraft {
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub amount_cents: Cents,
    pub date: NaiveDate,
    pub status: TransferStatus,
    pub description: Option<String>,
}

impl TransferDraft {
    pub fn new(from_wallet: WalletId, to_wallet: WalletId, amount_cents: Cents, date: NaiveDate) -> Self {
        Self {
            from_wallet,
            to_wallet,
            amount_cents,
            date,
            status: TransferStatus::Completed,
            description: None,
        }
    }

    pub fn with_status(mut self, status: TransferStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject same-wallet and non-positive transfers.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from_wallet == self.to_wallet {
            return Err(ValidationError::SameWallet);
        }
        ensure_positive(self.amount_cents)
    }

    /// The effect this draft should have on balances, if any.
    pub fn intended_effect(&self) -> Option<AppliedEffect> {
        self.status.is_completed().then(|| AppliedEffect {
            from_wallet: self.from_wallet,
            to_wallet: self.to_wallet,
            amount_cents: self.amount_cents,
        })
    }

    fn effect_of(transfer: &Transfer) -> AppliedEffect {
        AppliedEffect {
            from_wallet: transfer.from_wallet,
            to_wallet: transfer.to_wallet,
            amount_cents: transfer.amount_cents,
        }
    }
}

/// Partial edit of a transfer; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TransferPatch {
    pub from_wallet: Option<WalletId>,
    pub to_wallet: Option<WalletId>,
    pub amount_cents: Option<Cents>,
    pub date: Option<NaiveDate>,
    pub status: Option<TransferStatus>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

impl TransferPatch {
    pub fn status(status: TransferStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn amount(amount_cents: Cents) -> Self {
        Self {
            amount_cents: Some(amount_cents),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from_wallet.is_none()
            && self.to_wallet.is_none()
            && self.amount_cents.is_none()
            && self.date.is_none()
            && self.status.is_none()
            && self.description.is_none()
    }

    /// Merge onto an existing draft and validate the result.
    pub fn apply_to(self, base: TransferDraft) -> Result<TransferDraft, ValidationError> {
        let merged = TransferDraft {
            from_wallet: self.from_wallet.unwrap_or(base.from_wallet),
            to_wallet: self.to_wallet.unwrap_or(base.to_wallet),
            amount_cents: self.amount_cents.unwrap_or(base.amount_cents),
            date: self.date.unwrap_or(base.date),
            status: self.status.unwrap_or(base.status),
            description: match self.description {
                Some(desc) => normalize_optional_text(desc),
                None => base.description,
            },
        };
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn sample_wallet_ids() -> (WalletId, WalletId) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TransferStatus::Completed,
            TransferStatus::Pending,
            TransferStatus::Cancelled,
        ] {
            assert_eq!(TransferStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(
            TransferStatus::from_str("Canceled"),
            Some(TransferStatus::Cancelled)
        );
        assert_eq!(TransferStatus::from_str("done"), None);
    }

    #[test]
    fn test_draft_rejects_same_wallet() {
        let (a, _) = sample_wallet_ids();
        let draft = TransferDraft::new(a, a, 10000, date());
        assert_eq!(draft.validate(), Err(ValidationError::SameWallet));
    }

    #[test]
    fn test_draft_rejects_non_positive_amount() {
        let (a, b) = sample_wallet_ids();
        assert_eq!(
            TransferDraft::new(a, b, 0, date()).validate(),
            Err(ValidationError::NonPositiveAmount(0))
        );
        assert_eq!(
            TransferDraft::new(a, b, -500, date()).validate(),
            Err(ValidationError::NonPositiveAmount(-500))
        );
    }

    #[test]
    fn test_intended_effect_only_when_completed() {
        let (a, b) = sample_wallet_ids();
        let completed = TransferDraft::new(a, b, 2500, date());
        assert_eq!(
            completed.intended_effect(),
            Some(AppliedEffect {
                from_wallet: a,
                to_wallet: b,
                amount_cents: 2500
            })
        );

        let pending = completed.clone().with_status(TransferStatus::Pending);
        assert_eq!(pending.intended_effect(), None);
    }

    #[test]
    fn test_reversal_deltas_invert_apply() {
        let (a, b) = sample_wallet_ids();
        let effect = AppliedEffect {
            from_wallet: a,
            to_wallet: b,
            amount_cents: 700,
        };
        let apply = effect.deltas();
        let reverse = effect.reversal_deltas();
        for (applied, reversed) in apply.iter().zip(reverse.iter()) {
            assert_eq!(applied.0, reversed.0);
            assert_eq!(applied.1 + reversed.1, 0);
        }
    }

    #[test]
    fn test_patch_merges_and_validates() {
        let (a, b) = sample_wallet_ids();
        let base = TransferDraft::new(a, b, 1000, date()).with_description("rent");

        let merged = TransferPatch::amount(3000).apply_to(base.clone()).unwrap();
        assert_eq!(merged.amount_cents, 3000);
        assert_eq!(merged.from_wallet, a);
        assert_eq!(merged.description.as_deref(), Some("rent"));

        let cleared = TransferPatch {
            description: Some(None),
            ..Default::default()
        }
        .apply_to(base.clone())
        .unwrap();
        assert_eq!(cleared.description, None);

        let invalid = TransferPatch {
            to_wallet: Some(a),
            ..Default::default()
        }
        .apply_to(base);
        assert_eq!(invalid, Err(ValidationError::SameWallet));
    }

    #[test]
    fn test_applied_state_consistency() {
        let (a, b) = sample_wallet_ids();
        let mut transfer = Transfer::from_draft("user-1", TransferDraft::new(a, b, 1000, date()));
        assert!(!transfer.applied_state_consistent());

        transfer.applied = transfer.to_draft().intended_effect();
        assert!(transfer.applied_state_consistent());

        transfer.amount_cents = 2000;
        assert!(!transfer.applied_state_consistent());
    }
}
