use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type WalletId = Uuid;

/// Identifier of the user owning a record. Every query is scoped to one owner.
pub type OwnerId = String;

pub const DEFAULT_CURRENCY: &str = "NPR";

/// A wallet holding a stored running balance.
///
/// `balance` always equals `opening_balance` plus the signed effect of every
/// transaction on the wallet and every applied transfer touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner: OwnerId,
    pub name: String,
    pub currency: String,
    /// Balance the wallet was created with, shifted by manual balance edits
    pub opening_balance: Cents,
    /// Current running balance
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner: impl Into<OwnerId>, name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            currency: currency.into(),
            opening_balance: 0,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_opening_balance(mut self, opening_balance: Cents) -> Self {
        self.opening_balance = opening_balance;
        self.balance = opening_balance;
        self
    }

    /// Net effect of all recorded activity (balance minus opening balance).
    pub fn activity_total(&self) -> Cents {
        self.balance - self.opening_balance
    }
}
