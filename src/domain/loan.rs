use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, OwnerId, ValidationError, ensure_positive, normalize_optional_text};

pub type LoanId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    /// Money the owner owes
    Borrowed,
    /// Money owed to the owner
    Lent,
}

impl LoanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanKind::Borrowed => "borrowed",
            LoanKind::Lent => "lent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "borrowed" => Some(LoanKind::Borrowed),
            "lent" => Some(LoanKind::Lent),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
}

impl LoanStatus {
    /// A loan is completed exactly when nothing remains to be repaid.
    pub fn for_remaining(remaining_cents: Cents) -> Self {
        if remaining_cents == 0 {
            LoanStatus::Completed
        } else {
            LoanStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(LoanStatus::Active),
            "completed" => Some(LoanStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub owner: OwnerId,
    pub name: String,
    pub kind: LoanKind,
    pub amount_cents: Cents,
    pub remaining_cents: Cents,
    pub due_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// A new active loan with nothing repaid yet.
    pub fn new(owner: impl Into<OwnerId>, name: impl Into<String>, kind: LoanKind, amount_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            kind,
            amount_cents,
            remaining_cents: amount_cents,
            due_date: None,
            status: LoanStatus::Active,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_remaining(mut self, remaining_cents: Cents) -> Self {
        self.remaining_cents = remaining_cents;
        self.refresh_status();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_positive(self.amount_cents)?;
        if self.remaining_cents < 0 || self.remaining_cents > self.amount_cents {
            return Err(ValidationError::InvalidLoanRemaining {
                amount: self.amount_cents,
                remaining: self.remaining_cents,
            });
        }
        Ok(())
    }

    pub fn refresh_status(&mut self) {
        self.status = LoanStatus::for_remaining(self.remaining_cents);
    }

    pub fn repaid_cents(&self) -> Cents {
        self.amount_cents - self.remaining_cents
    }

    /// Reduce the remaining amount. A loan paid off in full is completed.
    pub fn repay(&mut self, amount_cents: Cents) -> Result<(), ValidationError> {
        ensure_positive(amount_cents)?;
        if amount_cents > self.remaining_cents {
            return Err(ValidationError::RepaymentExceedsRemaining {
                remaining: self.remaining_cents,
                requested: amount_cents,
            });
        }
        self.remaining_cents -= amount_cents;
        self.refresh_status();
        Ok(())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active && self.due_date.is_some_and(|due| due < today)
    }
}

/// Partial edit of a loan; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub name: Option<String>,
    pub kind: Option<LoanKind>,
    pub amount_cents: Option<Cents>,
    pub remaining_cents: Option<Cents>,
    /// `Some(None)` clears the due date
    pub due_date: Option<Option<NaiveDate>>,
    /// Completed without a remaining amount marks the loan paid off; Active
    /// requires something left to repay.
    pub status: Option<LoanStatus>,
    pub description: Option<Option<String>>,
}

impl LoanPatch {
    pub fn apply_to(self, loan: &mut Loan) -> Result<(), ValidationError> {
        if let Some(name) = self.name {
            loan.name = super::normalize_name(&name)?;
        }
        if let Some(kind) = self.kind {
            loan.kind = kind;
        }
        if let Some(amount) = self.amount_cents {
            loan.amount_cents = amount;
        }
        if let Some(due_date) = self.due_date {
            loan.due_date = due_date;
        }
        match (self.remaining_cents, self.status) {
            (Some(remaining), _) => loan.remaining_cents = remaining,
            (None, Some(LoanStatus::Completed)) => loan.remaining_cents = 0,
            (None, _) => {}
        }
        if let Some(description) = self.description {
            loan.description = normalize_optional_text(description);
        }
        loan.validate()?;

        if let Some(status) = self.status {
            if status != LoanStatus::for_remaining(loan.remaining_cents) {
                return Err(ValidationError::LoanStatusConflict {
                    status,
                    remaining: loan.remaining_cents,
                });
            }
        }
        loan.refresh_status();
        Ok(())
    }
}

/// Outstanding totals over active loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoanSummary {
    /// Remaining amount the owner owes
    pub total_borrowed: Cents,
    /// Remaining amount owed to the owner
    pub total_lent: Cents,
    pub active_count: usize,
}

impl LoanSummary {
    /// `None` when a total does not fit in [`Cents`].
    pub fn from_loans<'a>(loans: impl IntoIterator<Item = &'a Loan>) -> Option<Self> {
        loans
            .into_iter()
            .filter(|loan| loan.status == LoanStatus::Active)
            .try_fold(Self::default(), |mut summary, loan| {
                let total = match loan.kind {
                    LoanKind::Borrowed => &mut summary.total_borrowed,
                    LoanKind::Lent => &mut summary.total_lent,
                };
                *total = total.checked_add(loan.remaining_cents)?;
                summary.active_count += 1;
                Some(summary)
            })
    }

    /// Positive when more is owed to the owner than the owner owes. Both
    /// totals are non-negative, so this cannot overflow.
    pub fn net_position(&self) -> Cents {
        self.total_lent - self.total_borrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_loan_is_unpaid() {
        let loan = Loan::new("user-1", "Personal Loan - Bank", LoanKind::Borrowed, 5000000);
        assert_eq!(loan.remaining_cents, 5000000);
        assert_eq!(loan.status, LoanStatus::Active);
        assert!(loan.validate().is_ok());
    }

    #[test]
    fn test_remaining_must_not_exceed_amount() {
        let loan = Loan::new("user-1", "Loan to Friend", LoanKind::Lent, 1500000).with_remaining(2000000);
        assert_eq!(
            loan.validate(),
            Err(ValidationError::InvalidLoanRemaining {
                amount: 1500000,
                remaining: 2000000
            })
        );
    }

    #[test]
    fn test_repay_to_zero_completes() {
        let mut loan = Loan::new("user-1", "Emergency Loan", LoanKind::Borrowed, 2500000);
        loan.repay(1000000).unwrap();
        assert_eq!(loan.remaining_cents, 1500000);
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.repaid_cents(), 1000000);

        loan.repay(1500000).unwrap();
        assert_eq!(loan.remaining_cents, 0);
        assert_eq!(loan.status, LoanStatus::Completed);
    }

    #[test]
    fn test_over_repayment_rejected() {
        let mut loan = Loan::new("user-1", "Business Advance", LoanKind::Lent, 3000000);
        let result = loan.repay(3000001);
        assert_eq!(
            result,
            Err(ValidationError::RepaymentExceedsRemaining {
                remaining: 3000000,
                requested: 3000001
            })
        );
        assert_eq!(loan.remaining_cents, 3000000);
    }

    #[test]
    fn test_summary_counts_only_active() {
        let loans = vec![
            Loan::new("u", "Bank", LoanKind::Borrowed, 5000000).with_remaining(3500000),
            Loan::new("u", "Friend", LoanKind::Lent, 1500000).with_remaining(500000),
            Loan::new("u", "Advance", LoanKind::Lent, 3000000),
            {
                let mut done = Loan::new("u", "Emergency", LoanKind::Borrowed, 2500000);
                done.repay(2500000).unwrap();
                done
            },
        ];

        let summary = LoanSummary::from_loans(&loans).unwrap();
        assert_eq!(summary.total_borrowed, 3500000);
        assert_eq!(summary.total_lent, 3500000);
        assert_eq!(summary.active_count, 3);
        assert_eq!(summary.net_position(), 0);
    }

    #[test]
    fn test_patch_to_zero_remaining_completes() {
        let mut loan = Loan::new("u", "Friend", LoanKind::Lent, 1500000);
        LoanPatch {
            remaining_cents: Some(0),
            ..Default::default()
        }
        .apply_to(&mut loan)
        .unwrap();
        assert_eq!(loan.status, LoanStatus::Completed);

        let invalid = LoanPatch {
            amount_cents: Some(100),
            remaining_cents: Some(200),
            ..Default::default()
        }
        .apply_to(&mut loan);
        assert!(matches!(invalid, Err(ValidationError::InvalidLoanRemaining { .. })));
    }

    #[test]
    fn test_status_follows_remaining() {
        let paid = Loan::new("u", "Settled", LoanKind::Lent, 1000).with_remaining(0);
        assert_eq!(paid.status, LoanStatus::Completed);

        let mut reopened = paid.clone();
        LoanPatch {
            remaining_cents: Some(400),
            ..Default::default()
        }
        .apply_to(&mut reopened)
        .unwrap();
        assert_eq!(reopened.status, LoanStatus::Active);

        let mut still_paid = paid.clone();
        let conflict = LoanPatch {
            status: Some(LoanStatus::Active),
            ..Default::default()
        }
        .apply_to(&mut still_paid);
        assert_eq!(
            conflict,
            Err(ValidationError::LoanStatusConflict {
                status: LoanStatus::Active,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_marking_completed_clears_remaining() {
        let mut loan = Loan::new("u", "Bank", LoanKind::Borrowed, 5000);
        LoanPatch {
            status: Some(LoanStatus::Completed),
            ..Default::default()
        }
        .apply_to(&mut loan)
        .unwrap();
        assert_eq!(loan.remaining_cents, 0);
        assert_eq!(loan.status, LoanStatus::Completed);

        let mut other = Loan::new("u", "Bank", LoanKind::Borrowed, 5000);
        let conflict = LoanPatch {
            status: Some(LoanStatus::Completed),
            remaining_cents: Some(100),
            ..Default::default()
        }
        .apply_to(&mut other);
        assert!(matches!(conflict, Err(ValidationError::LoanStatusConflict { .. })));
    }

    #[test]
    fn test_summary_overflow() {
        let loans = vec![
            Loan::new("u", "Big", LoanKind::Borrowed, i64::MAX),
            Loan::new("u", "Bigger", LoanKind::Borrowed, i64::MAX),
        ];
        assert_eq!(LoanSummary::from_loans(&loans), None);
    }

    #[test]
    fn test_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let loan = Loan::new("u", "Friend", LoanKind::Lent, 1000)
            .with_due_date(NaiveDate::from_ymd_opt(2025, 8, 20).unwrap());
        assert!(loan.is_overdue(today));

        let no_due = Loan::new("u", "Open", LoanKind::Lent, 1000);
        assert!(!no_due.is_overdue(today));
    }
}
