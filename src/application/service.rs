use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    BalanceDeltas, Category, CategoryId, Cents, DEFAULT_CATEGORY_COLOR, DEFAULT_CURRENCY,
    IntegrityReport, Loan, LoanId, LoanKind, LoanPatch, LoanSummary, OwnerId, Reconciliation,
    Transaction, TransactionDraft, TransactionId, TransactionKind, TransactionPatch, Transfer,
    TransferDraft, TransferId, TransferPatch, TransferStatus, Wallet, WalletId,
    build_integrity_report, expected_balances, normalize_color, normalize_name,
    normalize_optional_text,
};
use crate::storage::{LedgerTx, Repository, TransactionQuery, TransferQuery};

use super::{AppError, CategoryReport, CurrencyTotal, DashboardSummary};

/// Application service providing high-level operations for the ledger.
///
/// A service is bound to one owner; every read and write it performs is
/// scoped to that owner's records.
#[derive(Clone)]
pub struct LedgerService {
    repo: Repository,
    owner: OwnerId,
}

/// Filter for querying transfers
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    /// Wallet name, matched as either source or destination
    pub wallet: Option<String>,
    pub status: Option<TransferStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Filter for querying income/expense transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub wallet: Option<String>,
    pub kind: Option<TransactionKind>,
    /// Category name
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Fields for a new loan.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub name: String,
    pub kind: LoanKind,
    pub amount_cents: Cents,
    /// Defaults to the full amount
    pub remaining_cents: Option<Cents>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository, owner: impl Into<OwnerId>) -> Self {
        Self {
            repo,
            owner: owner.into(),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, owner: impl Into<OwnerId>) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, owner))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, owner: impl Into<OwnerId>) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, owner))
    }

    /// A service over the same database acting for another owner.
    pub fn for_owner(&self, owner: impl Into<OwnerId>) -> Self {
        Self::new(self.repo.clone(), owner)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    // ========================
    // Wallet operations
    // ========================

    /// Create a new wallet whose balance starts at `opening_balance`.
    #[instrument(skip(self))]
    pub async fn create_wallet(
        &self,
        name: &str,
        currency: &str,
        opening_balance: Cents,
    ) -> Result<Wallet, AppError> {
        let name = normalize_name(name)?;
        let currency = match currency.trim() {
            "" => DEFAULT_CURRENCY.to_string(),
            code => code.to_uppercase(),
        };

        let mut tx = self.repo.begin().await?;
        if tx.get_wallet_by_name(&self.owner, &name).await?.is_some() {
            return Err(AppError::WalletAlreadyExists(name));
        }

        let wallet = Wallet::new(self.owner.clone(), name, currency).with_opening_balance(opening_balance);
        tx.insert_wallet(&wallet).await?;
        tx.commit().await?;

        info!(wallet_id = %wallet.id, name = %wallet.name, opening_balance, "wallet created");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, id: WalletId) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))
    }

    /// Get a wallet by name.
    pub async fn get_wallet_by_name(&self, name: &str) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet_by_name(&self.owner, name.trim())
            .await?
            .ok_or_else(|| AppError::WalletNotFound(name.to_string()))
    }

    /// List all wallets, ordered by name.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, AppError> {
        Ok(self.repo.list_wallets(&self.owner).await?)
    }

    #[instrument(skip(self))]
    pub async fn rename_wallet(&self, id: WalletId, new_name: &str) -> Result<Wallet, AppError> {
        let new_name = normalize_name(new_name)?;

        let mut tx = self.repo.begin().await?;
        let mut wallet = tx
            .get_wallet(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))?;

        if wallet.name != new_name {
            if tx.get_wallet_by_name(&self.owner, &new_name).await?.is_some() {
                return Err(AppError::WalletAlreadyExists(new_name));
            }
            tx.rename_wallet(&self.owner, id, &new_name).await?;
            tx.commit().await?;
            info!(wallet_id = %id, from = %wallet.name, to = %new_name, "wallet renamed");
            wallet.name = new_name;
        }

        Ok(wallet)
    }

    /// Set a wallet's balance directly. The opening balance moves by the same
    /// amount so the wallet's history still adds up.
    #[instrument(skip(self))]
    pub async fn set_wallet_balance(&self, id: WalletId, new_balance: Cents) -> Result<Wallet, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut wallet = tx
            .get_wallet(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))?;

        let delta = new_balance
            .checked_sub(wallet.balance)
            .ok_or(AppError::BalanceOverflow(id))?;
        let opening_balance = wallet
            .opening_balance
            .checked_add(delta)
            .ok_or(AppError::BalanceOverflow(id))?;

        tx.write_wallet_balance(&self.owner, id, new_balance, delta).await?;
        tx.commit().await?;

        info!(wallet_id = %id, delta, balance = new_balance, "wallet balance set");
        wallet.balance = new_balance;
        wallet.opening_balance = opening_balance;
        Ok(wallet)
    }

    /// Delete a wallet no transfer or transaction refers to.
    #[instrument(skip(self))]
    pub async fn delete_wallet(&self, id: WalletId) -> Result<Wallet, AppError> {
        let mut tx = self.repo.begin().await?;
        let wallet = tx
            .get_wallet(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))?;

        let references = tx.count_wallet_references(&self.owner, id).await?;
        if references > 0 {
            return Err(AppError::WalletInUse {
                name: wallet.name,
                references,
            });
        }

        tx.delete_wallet(&self.owner, id).await?;
        tx.commit().await?;

        info!(wallet_id = %id, name = %wallet.name, "wallet deleted");
        Ok(wallet)
    }

    /// Get a map of wallet IDs to names (useful for display).
    pub async fn get_wallet_names(&self) -> Result<HashMap<WalletId, String>, AppError> {
        let wallets = self.repo.list_wallets(&self.owner).await?;
        Ok(wallets.into_iter().map(|w| (w.id, w.name)).collect())
    }

    // ========================
    // Transfer operations
    // ========================

    /// Record a new transfer. A completed transfer moves its amount from the
    /// source to the destination wallet in the same database transaction.
    #[instrument(skip(self))]
    pub async fn create_transfer(&self, mut draft: TransferDraft) -> Result<Transfer, AppError> {
        draft.description = normalize_optional_text(draft.description);
        draft.validate()?;

        let mut tx = self.repo.begin().await?;
        self.check_transfer_wallets(&mut tx, &draft).await?;

        let plan = Reconciliation::for_create(&draft);
        let mut transfer = Transfer::from_draft(self.owner.clone(), draft);
        transfer.applied = plan.apply;

        tx.insert_transfer(&transfer).await?;
        self.apply_deltas(&mut tx, &plan.net_deltas()?).await?;
        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            amount = transfer.amount_cents,
            status = %transfer.status,
            "transfer created"
        );
        Ok(transfer)
    }

    /// Edit a transfer. Whatever the stored transfer currently applies is
    /// reversed and the edited transfer's effect is applied, netted per
    /// wallet, all within one database transaction.
    #[instrument(skip(self))]
    pub async fn update_transfer(&self, id: TransferId, patch: TransferPatch) -> Result<Transfer, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut transfer = tx
            .get_transfer(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransferNotFound(id.to_string()))?;

        let draft = patch.apply_to(transfer.to_draft())?;
        self.check_transfer_wallets(&mut tx, &draft).await?;

        let plan = Reconciliation::for_update(transfer.applied, &draft);
        self.apply_deltas(&mut tx, &plan.net_deltas()?).await?;

        transfer.set_fields(draft);
        transfer.applied = plan.apply;
        tx.update_transfer(&transfer).await?;
        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            amount = transfer.amount_cents,
            status = %transfer.status,
            reversed = plan.reverse.is_some(),
            applied = plan.apply.is_some(),
            "transfer updated"
        );
        Ok(transfer)
    }

    /// Delete a transfer, reversing its effect if it has one.
    #[instrument(skip(self))]
    pub async fn delete_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        let mut tx = self.repo.begin().await?;
        let transfer = tx
            .get_transfer(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransferNotFound(id.to_string()))?;

        let plan = Reconciliation::for_delete(transfer.applied);
        self.apply_deltas(&mut tx, &plan.net_deltas()?).await?;
        tx.delete_transfer(&self.owner, id).await?;
        tx.commit().await?;

        info!(
            transfer_id = %id,
            reversed = plan.reverse.is_some(),
            "transfer deleted"
        );
        Ok(transfer)
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        self.repo
            .get_transfer(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransferNotFound(id.to_string()))
    }

    /// List transfers with filters, newest first.
    pub async fn list_transfers(&self, filter: TransferFilter) -> Result<Vec<Transfer>, AppError> {
        // Resolve wallet name to ID if provided
        let wallet = match &filter.wallet {
            Some(name) => Some(self.get_wallet_by_name(name).await?.id),
            None => None,
        };

        let query = TransferQuery {
            wallet,
            status: filter.status,
            from_date: filter.from_date,
            to_date: filter.to_date,
            limit: filter.limit,
        };
        Ok(self.repo.list_transfers(&self.owner, &query).await?)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record an income or expense and apply it to its wallet.
    #[instrument(skip(self))]
    pub async fn create_transaction(&self, mut draft: TransactionDraft) -> Result<Transaction, AppError> {
        draft.reason = draft.reason.trim().to_string();
        draft.validate()?;

        let mut tx = self.repo.begin().await?;
        self.require_wallet(&mut tx, draft.wallet).await?;
        if let Some(category) = draft.category {
            self.require_category(&mut tx, category).await?;
        }

        let transaction = Transaction::from_draft(self.owner.clone(), draft);
        tx.insert_transaction(&transaction).await?;

        let mut deltas = BalanceDeltas::default();
        deltas.add(transaction.wallet, transaction.signed_amount())?;
        self.apply_deltas(&mut tx, &deltas).await?;
        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            kind = %transaction.kind,
            amount = transaction.amount_cents,
            "transaction created"
        );
        Ok(transaction)
    }

    /// Edit a transaction, moving its balance effect to match.
    #[instrument(skip(self))]
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        mut patch: TransactionPatch,
    ) -> Result<Transaction, AppError> {
        patch.reason = patch.reason.map(|r| r.trim().to_string());

        let mut tx = self.repo.begin().await?;
        let mut transaction = tx
            .get_transaction(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let draft = patch.apply_to(transaction.to_draft())?;
        self.require_wallet(&mut tx, draft.wallet).await?;
        if let Some(category) = draft.category {
            self.require_category(&mut tx, category).await?;
        }

        let mut deltas = BalanceDeltas::default();
        deltas.add(transaction.wallet, -transaction.signed_amount())?;
        transaction.set_fields(draft);
        deltas.add(transaction.wallet, transaction.signed_amount())?;

        self.apply_deltas(&mut tx, &deltas).await?;
        tx.update_transaction(&transaction).await?;
        tx.commit().await?;

        info!(
            transaction_id = %id,
            kind = %transaction.kind,
            amount = transaction.amount_cents,
            "transaction updated"
        );
        Ok(transaction)
    }

    /// Delete a transaction and take its effect off the wallet balance.
    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let mut tx = self.repo.begin().await?;
        let transaction = tx
            .get_transaction(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let mut deltas = BalanceDeltas::default();
        deltas.add(transaction.wallet, -transaction.signed_amount())?;
        self.apply_deltas(&mut tx, &deltas).await?;
        tx.delete_transaction(&self.owner, id).await?;
        tx.commit().await?;

        info!(transaction_id = %id, "transaction deleted");
        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    pub async fn list_transactions(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, AppError> {
        let wallet = match &filter.wallet {
            Some(name) => Some(self.get_wallet_by_name(name).await?.id),
            None => None,
        };
        let category = match &filter.category {
            Some(name) => Some(self.get_category_by_name(name).await?.id),
            None => None,
        };

        let query = TransactionQuery {
            wallet,
            kind: filter.kind,
            category,
            from_date: filter.from_date,
            to_date: filter.to_date,
            limit: filter.limit,
        };
        Ok(self.repo.list_transactions(&self.owner, &query).await?)
    }

    // ========================
    // Category operations
    // ========================

    /// Create a category. Without a color it gets the default one.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str, color: Option<&str>) -> Result<Category, AppError> {
        let name = normalize_name(name)?;
        let color = normalize_color(color.unwrap_or(DEFAULT_CATEGORY_COLOR))?;

        let mut tx = self.repo.begin().await?;
        if tx.get_category_by_name(&self.owner, &name).await?.is_some() {
            return Err(AppError::CategoryAlreadyExists(name));
        }

        let category = Category::new(self.owner.clone(), name, color);
        tx.insert_category(&category).await?;
        tx.commit().await?;

        info!(category_id = %category.id, name = %category.name, color = %category.color, "category created");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category, AppError> {
        self.repo
            .get_category(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(id.to_string()))
    }

    pub async fn get_category_by_name(&self, name: &str) -> Result<Category, AppError> {
        self.repo
            .get_category_by_name(&self.owner, name.trim())
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(name.to_string()))
    }

    /// List all categories, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories(&self.owner).await?)
    }

    #[instrument(skip(self))]
    pub async fn rename_category(&self, id: CategoryId, new_name: &str) -> Result<Category, AppError> {
        let new_name = normalize_name(new_name)?;

        let mut tx = self.repo.begin().await?;
        let mut category = self.require_category(&mut tx, id).await?;

        if category.name != new_name {
            if tx.get_category_by_name(&self.owner, &new_name).await?.is_some() {
                return Err(AppError::CategoryAlreadyExists(new_name));
            }
            let old_name = std::mem::replace(&mut category.name, new_name);
            tx.update_category(&category).await?;
            tx.commit().await?;
            info!(category_id = %id, from = %old_name, to = %category.name, "category renamed");
        }

        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn recolor_category(&self, id: CategoryId, color: &str) -> Result<Category, AppError> {
        let color = normalize_color(color)?;

        let mut tx = self.repo.begin().await?;
        let mut category = self.require_category(&mut tx, id).await?;
        category.color = color;
        tx.update_category(&category).await?;
        tx.commit().await?;

        info!(category_id = %id, color = %category.color, "category recolored");
        Ok(category)
    }

    /// Delete a category. Its transactions stay, without a category.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<Category, AppError> {
        let mut tx = self.repo.begin().await?;
        let category = self.require_category(&mut tx, id).await?;

        let detached = tx.detach_category(&self.owner, id).await?;
        if !tx.delete_category(&self.owner, id).await? {
            return Err(AppError::CategoryNotFound(id.to_string()));
        }
        tx.commit().await?;

        info!(category_id = %id, name = %category.name, detached, "category deleted");
        Ok(category)
    }

    /// Get a map of category IDs to names (useful for display).
    pub async fn get_category_names(&self) -> Result<HashMap<CategoryId, String>, AppError> {
        let categories = self.repo.list_categories(&self.owner).await?;
        Ok(categories.into_iter().map(|c| (c.id, c.name)).collect())
    }

    // ========================
    // Loan operations
    // ========================

    #[instrument(skip(self))]
    pub async fn create_loan(&self, new_loan: NewLoan) -> Result<Loan, AppError> {
        let name = normalize_name(&new_loan.name)?;
        let mut loan = Loan::new(self.owner.clone(), name, new_loan.kind, new_loan.amount_cents);
        if let Some(remaining) = new_loan.remaining_cents {
            loan = loan.with_remaining(remaining);
        }
        loan.due_date = new_loan.due_date;
        loan.description = normalize_optional_text(new_loan.description);
        loan.validate()?;

        self.repo.save_loan(&loan).await?;
        info!(loan_id = %loan.id, kind = %loan.kind, amount = loan.amount_cents, "loan created");
        Ok(loan)
    }

    #[instrument(skip(self))]
    pub async fn update_loan(&self, id: LoanId, patch: LoanPatch) -> Result<Loan, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut loan = self.require_loan(&mut tx, id).await?;
        patch.apply_to(&mut loan)?;
        tx.update_loan(&loan).await?;
        tx.commit().await?;

        info!(loan_id = %id, remaining = loan.remaining_cents, status = %loan.status, "loan updated");
        Ok(loan)
    }

    /// Record a repayment. Paying off the remaining amount completes the loan.
    #[instrument(skip(self))]
    pub async fn repay_loan(&self, id: LoanId, amount_cents: Cents) -> Result<Loan, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut loan = self.require_loan(&mut tx, id).await?;
        loan.repay(amount_cents)?;
        tx.update_loan(&loan).await?;
        tx.commit().await?;

        info!(
            loan_id = %id,
            amount = amount_cents,
            remaining = loan.remaining_cents,
            status = %loan.status,
            "loan repayment recorded"
        );
        Ok(loan)
    }

    #[instrument(skip(self))]
    pub async fn delete_loan(&self, id: LoanId) -> Result<Loan, AppError> {
        let mut tx = self.repo.begin().await?;
        let loan = self.require_loan(&mut tx, id).await?;
        if !tx.delete_loan(&self.owner, id).await? {
            return Err(AppError::LoanNotFound(id.to_string()));
        }
        tx.commit().await?;
        info!(loan_id = %id, "loan deleted");
        Ok(loan)
    }

    pub async fn get_loan(&self, id: LoanId) -> Result<Loan, AppError> {
        self.repo
            .get_loan(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::LoanNotFound(id.to_string()))
    }

    pub async fn list_loans(&self) -> Result<Vec<Loan>, AppError> {
        Ok(self.repo.list_loans(&self.owner).await?)
    }

    pub async fn loan_summary(&self) -> Result<LoanSummary, AppError> {
        let loans = self.repo.list_loans(&self.owner).await?;
        LoanSummary::from_loans(&loans).ok_or_else(|| AppError::TotalOverflow("loan amounts".to_string()))
    }

    // ========================
    // Reports
    // ========================

    /// Headline numbers for a period (both dates inclusive).
    pub async fn dashboard_summary(
        &self,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let wallets = self.repo.list_wallets(&self.owner).await?;
        let mut per_currency: BTreeMap<String, Cents> = BTreeMap::new();
        for wallet in &wallets {
            let total = per_currency.entry(wallet.currency.clone()).or_insert(0);
            *total = total
                .checked_add(wallet.balance)
                .ok_or_else(|| AppError::TotalOverflow(format!("{} balances", wallet.currency)))?;
        }

        let (total_income, total_expense) = self
            .repo
            .sum_transactions_by_kind(&self.owner, from_date, to_date)
            .await?;
        let completed_transfers = self
            .repo
            .count_completed_transfers(&self.owner, from_date, to_date)
            .await?;
        let loans = self.loan_summary().await?;
        let net = total_income
            .checked_sub(total_expense)
            .ok_or_else(|| AppError::TotalOverflow("net income".to_string()))?;

        Ok(DashboardSummary {
            from_date,
            to_date,
            balances: per_currency
                .into_iter()
                .map(|(currency, total)| CurrencyTotal { currency, total })
                .collect(),
            wallet_count: wallets.len(),
            total_income,
            total_expense,
            net,
            completed_transfers,
            loans,
        })
    }

    /// Income and expense per category for a period (both dates inclusive).
    pub async fn category_report(
        &self,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<CategoryReport, AppError> {
        let totals = self
            .repo
            .category_totals(&self.owner, from_date, to_date)
            .await?;
        CategoryReport::from_totals(from_date, to_date, totals)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Rebuild every wallet balance from history and compare it with the
    /// stored one.
    #[instrument(skip(self))]
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let wallets = self.repo.list_wallets(&self.owner).await?;
        let transfers = self
            .repo
            .list_transfers(&self.owner, &TransferQuery::default())
            .await?;
        let transactions = self
            .repo
            .list_transactions(&self.owner, &TransactionQuery::default())
            .await?;

        let expected = expected_balances(
            wallets.iter().map(|w| (w.id, w.opening_balance)),
            transactions.iter().map(|t| (t.wallet, t.kind, t.amount_cents)),
            transfers.iter().filter_map(|t| t.applied.as_ref()),
        )?;
        let report = build_integrity_report(&wallets, &transfers, transactions.len(), &expected);

        for issue in &report.issues {
            warn!(%issue, "integrity issue");
        }
        Ok(report)
    }

    // ========================
    // Helpers
    // ========================

    /// Both wallets of a transfer must exist for this owner and share a
    /// currency.
    async fn check_transfer_wallets(&self, tx: &mut LedgerTx, draft: &TransferDraft) -> Result<(), AppError> {
        let from_wallet = self.require_wallet(tx, draft.from_wallet).await?;
        let to_wallet = self.require_wallet(tx, draft.to_wallet).await?;

        if from_wallet.currency != to_wallet.currency {
            return Err(AppError::CurrencyMismatch {
                from_currency: from_wallet.currency,
                to_currency: to_wallet.currency,
            });
        }
        Ok(())
    }

    async fn require_wallet(&self, tx: &mut LedgerTx, id: WalletId) -> Result<Wallet, AppError> {
        tx.get_wallet(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(id.to_string()))
    }

    /// Write balance changes, reading each balance fresh inside the
    /// transaction right before it is written.
    async fn apply_deltas(&self, tx: &mut LedgerTx, deltas: &BalanceDeltas) -> Result<(), AppError> {
        for (wallet, delta) in deltas.iter() {
            let current = tx
                .wallet_balance(&self.owner, wallet)
                .await?
                .ok_or_else(|| AppError::WalletNotFound(wallet.to_string()))?;
            let balance = current
                .checked_add(delta)
                .ok_or(AppError::BalanceOverflow(wallet))?;

            tx.write_wallet_balance(&self.owner, wallet, balance, 0).await?;
            debug!(wallet_id = %wallet, delta, balance, "wallet balance written");
        }
        Ok(())
    }

    async fn require_category(&self, tx: &mut LedgerTx, id: CategoryId) -> Result<Category, AppError> {
        tx.get_category(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(id.to_string()))
    }

    async fn require_loan(&self, tx: &mut LedgerTx, id: LoanId) -> Result<Loan, AppError> {
        tx.get_loan(&self.owner, id)
            .await?
            .ok_or_else(|| AppError::LoanNotFound(id.to_string()))
    }
}
