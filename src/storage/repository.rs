use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    AppliedEffect, Category, CategoryId, Cents, Loan, LoanId, LoanKind, LoanStatus, Transaction,
    TransactionId, TransactionKind, Transfer, TransferId, TransferStatus, Wallet, WalletId,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_LOANS};

const DATE_FORMAT: &str = "%Y-%m-%d";

const WALLET_COLUMNS: &str =
    "id, user_id, name, currency, opening_balance, balance, created_at";

const TRANSFER_COLUMNS: &str = "id, user_id, from_wallet_id, to_wallet_id, amount_cents, date, status, description, \
     applied_from_wallet_id, applied_to_wallet_id, applied_amount_cents, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, wallet_id, kind, amount_cents, reason, category_id, date, created_at";

const CATEGORY_COLUMNS: &str = "id, user_id, name, color, created_at";

const LOAN_COLUMNS: &str = "id, user_id, name, kind, amount_cents, remaining_cents, due_date, status, description, created_at";

/// Filters for listing transfers. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct TransferQuery {
    pub wallet: Option<WalletId>,
    pub status: Option<TransferStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Filters for listing income/expense transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub wallet: Option<WalletId>,
    pub kind: Option<TransactionKind>,
    pub category: Option<CategoryId>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Income and expense totals of one category over a period. `category_id`,
/// `name` and `color` are `None` for uncategorised transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotals {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub income: Cents,
    pub expense: Cents,
    pub count: i64,
}

/// Repository for persisting and querying ledger records.
///
/// Every query is scoped to an owner (`user_id`); rows of other owners are
/// never visible or writable through it.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_LOANS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        tracing::debug!("database migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a unit of work. Nothing it writes is visible until
    /// [`LedgerTx::commit`]; dropping it rolls everything back.
    pub async fn begin(&self) -> Result<LedgerTx> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;
        Ok(LedgerTx { tx })
    }

    // ========================
    // Wallet queries
    // ========================

    pub async fn get_wallet(&self, owner: &str, id: WalletId) -> Result<Option<Wallet>> {
        fetch_wallet(&self.pool, owner, id).await
    }

    pub async fn get_wallet_by_name(&self, owner: &str, name: &str) -> Result<Option<Wallet>> {
        fetch_wallet_by_name(&self.pool, owner, name).await
    }

    /// List the owner's wallets, ordered by name.
    pub async fn list_wallets(&self, owner: &str) -> Result<Vec<Wallet>> {
        let query = format!(
            "SELECT {} FROM wallets WHERE user_id = ? ORDER BY name",
            WALLET_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list wallets")?;

        rows.iter().map(row_to_wallet).collect()
    }

    // ========================
    // Transfer queries
    // ========================

    pub async fn get_transfer(&self, owner: &str, id: TransferId) -> Result<Option<Transfer>> {
        fetch_transfer(&self.pool, owner, id).await
    }

    /// List transfers matching the query, newest first.
    pub async fn list_transfers(&self, owner: &str, filter: &TransferQuery) -> Result<Vec<Transfer>> {
        let mut query = format!(
            "SELECT {} FROM transfers WHERE user_id = ?",
            TRANSFER_COLUMNS
        );

        // Collect all string bindings first so they live long enough
        let wallet_str = filter.wallet.map(|id| id.to_string());
        let from_date_str = filter.from_date.map(format_date);
        let to_date_str = filter.to_date.map(format_date);

        if wallet_str.is_some() {
            query.push_str(" AND (from_wallet_id = ? OR to_wallet_id = ?)");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if from_date_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date DESC, created_at DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut sql_query = sqlx::query(&query).bind(owner);
        if let Some(ref wallet) = wallet_str {
            sql_query = sql_query.bind(wallet).bind(wallet);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(ref from) = from_date_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_date_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transfers")?;

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Transaction queries
    // ========================

    pub async fn get_transaction(&self, owner: &str, id: TransactionId) -> Result<Option<Transaction>> {
        fetch_transaction(&self.pool, owner, id).await
    }

    /// List transactions matching the query, newest first.
    pub async fn list_transactions(
        &self,
        owner: &str,
        filter: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        let mut query = format!(
            "SELECT {} FROM transactions WHERE user_id = ?",
            TRANSACTION_COLUMNS
        );

        let wallet_str = filter.wallet.map(|id| id.to_string());
        let category_str = filter.category.map(|id| id.to_string());
        let from_date_str = filter.from_date.map(format_date);
        let to_date_str = filter.to_date.map(format_date);

        if wallet_str.is_some() {
            query.push_str(" AND wallet_id = ?");
        }
        if filter.kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if category_str.is_some() {
            query.push_str(" AND category_id = ?");
        }
        if from_date_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date DESC, created_at DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut sql_query = sqlx::query(&query).bind(owner);
        if let Some(ref wallet) = wallet_str {
            sql_query = sql_query.bind(wallet);
        }
        if let Some(kind) = filter.kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        if let Some(ref category) = category_str {
            sql_query = sql_query.bind(category);
        }
        if let Some(ref from) = from_date_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_date_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Sum of income and expense amounts in a date range (inclusive).
    pub async fn sum_transactions_by_kind(
        &self,
        owner: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<(Cents, Cents)> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents ELSE 0 END), 0) as income,
                COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents ELSE 0 END), 0) as expense
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(owner)
        .bind(format_date(from_date))
        .bind(format_date(to_date))
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transactions")?;

        Ok((row.get("income"), row.get("expense")))
    }

    /// Income and expense totals grouped by category in a date range,
    /// uncategorised transactions forming one group.
    pub async fn category_totals(
        &self,
        owner: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<CategoryTotals>> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id as category_id,
                c.name as name,
                c.color as color,
                COALESCE(SUM(CASE WHEN t.kind = 'income' THEN t.amount_cents ELSE 0 END), 0) as income,
                COALESCE(SUM(CASE WHEN t.kind = 'expense' THEN t.amount_cents ELSE 0 END), 0) as expense,
                COUNT(*) as count
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id AND c.user_id = t.user_id
            WHERE t.user_id = ? AND t.date >= ? AND t.date <= ?
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .bind(owner)
        .bind(format_date(from_date))
        .bind(format_date(to_date))
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute category totals")?;

        rows.iter()
            .map(|row| {
                let category_id: Option<String> = row.get("category_id");
                Ok(CategoryTotals {
                    category_id: category_id
                        .as_deref()
                        .map(|id| parse_uuid(id, "category"))
                        .transpose()?,
                    name: row.get("name"),
                    color: row.get("color"),
                    income: row.get("income"),
                    expense: row.get("expense"),
                    count: row.get("count"),
                })
            })
            .collect()
    }

    /// Number of completed transfers dated within a range.
    pub async fn count_completed_transfers(
        &self,
        owner: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transfers
            WHERE user_id = ? AND status = 'completed' AND date >= ? AND date <= ?
            "#,
        )
        .bind(owner)
        .bind(format_date(from_date))
        .bind(format_date(to_date))
        .fetch_one(&self.pool)
        .await
        .context("Failed to count transfers")?;

        Ok(row.get("count"))
    }

    // ========================
    // Category queries
    // ========================

    pub async fn get_category(&self, owner: &str, id: CategoryId) -> Result<Option<Category>> {
        fetch_category(&self.pool, owner, id).await
    }

    pub async fn get_category_by_name(&self, owner: &str, name: &str) -> Result<Option<Category>> {
        fetch_category_by_name(&self.pool, owner, name).await
    }

    /// List the owner's categories, ordered by name.
    pub async fn list_categories(&self, owner: &str) -> Result<Vec<Category>> {
        let query = format!(
            "SELECT {} FROM categories WHERE user_id = ? ORDER BY name",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list categories")?;

        rows.iter().map(row_to_category).collect()
    }

    // ========================
    // Loan operations
    // ========================

    pub async fn save_loan(&self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (id, user_id, name, kind, amount_cents, remaining_cents, due_date, status, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan.id.to_string())
        .bind(&loan.owner)
        .bind(&loan.name)
        .bind(loan.kind.as_str())
        .bind(loan.amount_cents)
        .bind(loan.remaining_cents)
        .bind(loan.due_date.map(format_date))
        .bind(loan.status.as_str())
        .bind(&loan.description)
        .bind(loan.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save loan")?;
        Ok(())
    }

    pub async fn get_loan(&self, owner: &str, id: LoanId) -> Result<Option<Loan>> {
        fetch_loan(&self.pool, owner, id).await
    }

    /// List the owner's loans: active first, then by due date and name.
    pub async fn list_loans(&self, owner: &str) -> Result<Vec<Loan>> {
        let query = format!(
            "SELECT {} FROM loans WHERE user_id = ? \
             ORDER BY status = 'completed', due_date IS NULL, due_date, name",
            LOAN_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list loans")?;

        rows.iter().map(row_to_loan).collect()
    }
}

/// A single database transaction over the ledger tables.
///
/// Reads inside it see its own writes; balances read here are fresh. Any
/// error path that drops it without [`commit`](Self::commit) rolls back.
pub struct LedgerTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl LedgerTx {
    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("Failed to commit database transaction")
    }

    // ========================
    // Wallets
    // ========================

    pub async fn get_wallet(&mut self, owner: &str, id: WalletId) -> Result<Option<Wallet>> {
        fetch_wallet(&mut *self.tx, owner, id).await
    }

    pub async fn get_wallet_by_name(&mut self, owner: &str, name: &str) -> Result<Option<Wallet>> {
        fetch_wallet_by_name(&mut *self.tx, owner, name).await
    }

    pub async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, name, currency, opening_balance, balance, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.to_string())
        .bind(&wallet.owner)
        .bind(&wallet.name)
        .bind(&wallet.currency)
        .bind(wallet.opening_balance)
        .bind(wallet.balance)
        .bind(wallet.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save wallet")?;
        Ok(())
    }

    pub async fn rename_wallet(&mut self, owner: &str, id: WalletId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE wallets SET name = ? WHERE id = ? AND user_id = ?")
            .bind(name)
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to rename wallet")?;
        Ok(result.rows_affected() == 1)
    }

    /// Read the current stored balance of a wallet.
    pub async fn wallet_balance(&mut self, owner: &str, id: WalletId) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .fetch_optional(&mut *self.tx)
            .await
            .context("Failed to read wallet balance")?;
        Ok(row.map(|r| r.get("balance")))
    }

    /// Write a wallet's balance, shifting its opening balance by
    /// `opening_shift` (zero for ledger activity).
    pub async fn write_wallet_balance(
        &mut self,
        owner: &str,
        id: WalletId,
        balance: Cents,
        opening_shift: Cents,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wallets SET balance = ?, opening_balance = opening_balance + ? WHERE id = ? AND user_id = ?",
        )
        .bind(balance)
        .bind(opening_shift)
        .bind(id.to_string())
        .bind(owner)
        .execute(&mut *self.tx)
        .await
        .context("Failed to write wallet balance")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("wallet {} disappeared during balance update", id);
        }
        Ok(())
    }

    pub async fn delete_wallet(&mut self, owner: &str, id: WalletId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wallets WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete wallet")?;
        Ok(result.rows_affected() == 1)
    }

    /// Number of transfers and transactions that reference a wallet.
    pub async fn count_wallet_references(&mut self, owner: &str, id: WalletId) -> Result<i64> {
        let wallet_id = id.to_string();
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM transfers
                 WHERE user_id = ?1 AND (from_wallet_id = ?2 OR to_wallet_id = ?2
                     OR applied_from_wallet_id = ?2 OR applied_to_wallet_id = ?2))
              + (SELECT COUNT(*) FROM transactions WHERE user_id = ?1 AND wallet_id = ?2) as refs
            "#,
        )
        .bind(owner)
        .bind(&wallet_id)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to count wallet references")?;
        Ok(row.get("refs"))
    }

    // ========================
    // Transfers
    // ========================

    pub async fn get_transfer(&mut self, owner: &str, id: TransferId) -> Result<Option<Transfer>> {
        fetch_transfer(&mut *self.tx, owner, id).await
    }

    pub async fn insert_transfer(&mut self, transfer: &Transfer) -> Result<()> {
        let applied = applied_columns(transfer.applied.as_ref());
        sqlx::query(
            r#"
            INSERT INTO transfers (id, user_id, from_wallet_id, to_wallet_id, amount_cents, date, status, description,
                                   applied_from_wallet_id, applied_to_wallet_id, applied_amount_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transfer.id.to_string())
        .bind(&transfer.owner)
        .bind(transfer.from_wallet.to_string())
        .bind(transfer.to_wallet.to_string())
        .bind(transfer.amount_cents)
        .bind(format_date(transfer.date))
        .bind(transfer.status.as_str())
        .bind(&transfer.description)
        .bind(applied.0)
        .bind(applied.1)
        .bind(applied.2)
        .bind(transfer.created_at.to_rfc3339())
        .bind(transfer.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save transfer")?;
        Ok(())
    }

    /// Overwrite a stored transfer, including its applied snapshot.
    pub async fn update_transfer(&mut self, transfer: &Transfer) -> Result<()> {
        let applied = applied_columns(transfer.applied.as_ref());
        let result = sqlx::query(
            r#"
            UPDATE transfers
            SET from_wallet_id = ?, to_wallet_id = ?, amount_cents = ?, date = ?, status = ?, description = ?,
                applied_from_wallet_id = ?, applied_to_wallet_id = ?, applied_amount_cents = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(transfer.from_wallet.to_string())
        .bind(transfer.to_wallet.to_string())
        .bind(transfer.amount_cents)
        .bind(format_date(transfer.date))
        .bind(transfer.status.as_str())
        .bind(&transfer.description)
        .bind(applied.0)
        .bind(applied.1)
        .bind(applied.2)
        .bind(transfer.updated_at.to_rfc3339())
        .bind(transfer.id.to_string())
        .bind(&transfer.owner)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update transfer")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("transfer {} disappeared during update", transfer.id);
        }
        Ok(())
    }

    pub async fn delete_transfer(&mut self, owner: &str, id: TransferId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transfers WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete transfer")?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Transactions
    // ========================

    pub async fn get_transaction(&mut self, owner: &str, id: TransactionId) -> Result<Option<Transaction>> {
        fetch_transaction(&mut *self.tx, owner, id).await
    }

    pub async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, wallet_id, kind, amount_cents, reason, category_id, date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(&transaction.owner)
        .bind(transaction.wallet.to_string())
        .bind(transaction.kind.as_str())
        .bind(transaction.amount_cents)
        .bind(&transaction.reason)
        .bind(transaction.category.map(|id| id.to_string()))
        .bind(format_date(transaction.date))
        .bind(transaction.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    pub async fn update_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET wallet_id = ?, kind = ?, amount_cents = ?, reason = ?, category_id = ?, date = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(transaction.wallet.to_string())
        .bind(transaction.kind.as_str())
        .bind(transaction.amount_cents)
        .bind(&transaction.reason)
        .bind(transaction.category.map(|id| id.to_string()))
        .bind(format_date(transaction.date))
        .bind(transaction.id.to_string())
        .bind(&transaction.owner)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update transaction")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("transaction {} disappeared during update", transaction.id);
        }
        Ok(())
    }

    pub async fn delete_transaction(&mut self, owner: &str, id: TransactionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete transaction")?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Categories
    // ========================

    pub async fn get_category(&mut self, owner: &str, id: CategoryId) -> Result<Option<Category>> {
        fetch_category(&mut *self.tx, owner, id).await
    }

    pub async fn get_category_by_name(&mut self, owner: &str, name: &str) -> Result<Option<Category>> {
        fetch_category_by_name(&mut *self.tx, owner, name).await
    }

    pub async fn insert_category(&mut self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, user_id, name, color, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(category.id.to_string())
        .bind(&category.owner)
        .bind(&category.name)
        .bind(&category.color)
        .bind(category.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save category")?;
        Ok(())
    }

    pub async fn update_category(&mut self, category: &Category) -> Result<()> {
        let result = sqlx::query("UPDATE categories SET name = ?, color = ? WHERE id = ? AND user_id = ?")
            .bind(&category.name)
            .bind(&category.color)
            .bind(category.id.to_string())
            .bind(&category.owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to update category")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("category {} disappeared during update", category.id);
        }
        Ok(())
    }

    /// Clear the category of every transaction filed under it. Returns how
    /// many transactions were affected.
    pub async fn detach_category(&mut self, owner: &str, id: CategoryId) -> Result<u64> {
        let result = sqlx::query("UPDATE transactions SET category_id = NULL WHERE category_id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to detach category from transactions")?;
        Ok(result.rows_affected())
    }

    pub async fn delete_category(&mut self, owner: &str, id: CategoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete category")?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Loans
    // ========================

    pub async fn get_loan(&mut self, owner: &str, id: LoanId) -> Result<Option<Loan>> {
        fetch_loan(&mut *self.tx, owner, id).await
    }

    /// Overwrite a stored loan.
    pub async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET name = ?, kind = ?, amount_cents = ?, remaining_cents = ?, due_date = ?, status = ?, description = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&loan.name)
        .bind(loan.kind.as_str())
        .bind(loan.amount_cents)
        .bind(loan.remaining_cents)
        .bind(loan.due_date.map(format_date))
        .bind(loan.status.as_str())
        .bind(&loan.description)
        .bind(loan.id.to_string())
        .bind(&loan.owner)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update loan")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("loan {} disappeared during update", loan.id);
        }
        Ok(())
    }

    pub async fn delete_loan(&mut self, owner: &str, id: LoanId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM loans WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete loan")?;
        Ok(result.rows_affected() == 1)
    }
}

// ========================
// Shared queries
// ========================

async fn fetch_wallet<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    id: WalletId,
) -> Result<Option<Wallet>> {
    let query = format!(
        "SELECT {} FROM wallets WHERE id = ? AND user_id = ?",
        WALLET_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch wallet")?;

    row.as_ref().map(row_to_wallet).transpose()
}

async fn fetch_wallet_by_name<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    name: &str,
) -> Result<Option<Wallet>> {
    let query = format!(
        "SELECT {} FROM wallets WHERE name = ? AND user_id = ?",
        WALLET_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch wallet by name")?;

    row.as_ref().map(row_to_wallet).transpose()
}

async fn fetch_transfer<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    id: TransferId,
) -> Result<Option<Transfer>> {
    let query = format!(
        "SELECT {} FROM transfers WHERE id = ? AND user_id = ?",
        TRANSFER_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch transfer")?;

    row.as_ref().map(row_to_transfer).transpose()
}

async fn fetch_transaction<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    id: TransactionId,
) -> Result<Option<Transaction>> {
    let query = format!(
        "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

async fn fetch_category<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    id: CategoryId,
) -> Result<Option<Category>> {
    let query = format!(
        "SELECT {} FROM categories WHERE id = ? AND user_id = ?",
        CATEGORY_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch category")?;

    row.as_ref().map(row_to_category).transpose()
}

async fn fetch_category_by_name<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    name: &str,
) -> Result<Option<Category>> {
    let query = format!(
        "SELECT {} FROM categories WHERE name = ? AND user_id = ?",
        CATEGORY_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch category by name")?;

    row.as_ref().map(row_to_category).transpose()
}

async fn fetch_loan<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner: &str,
    id: LoanId,
) -> Result<Option<Loan>> {
    let query = format!(
        "SELECT {} FROM loans WHERE id = ? AND user_id = ?",
        LOAN_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch loan")?;

    row.as_ref().map(row_to_loan).transpose()
}

// ========================
// Row conversion
// ========================

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .with_context(|| format!("Invalid date: {}", value))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp: {}", value))?
        .with_timezone(&Utc))
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid {} ID: {}", what, value))
}

fn applied_columns(applied: Option<&AppliedEffect>) -> (Option<String>, Option<String>, Option<Cents>) {
    match applied {
        Some(effect) => (
            Some(effect.from_wallet.to_string()),
            Some(effect.to_wallet.to_string()),
            Some(effect.amount_cents),
        ),
        None => (None, None, None),
    }
}

fn row_to_wallet(row: &SqliteRow) -> Result<Wallet> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(Wallet {
        id: parse_uuid(&id_str, "wallet")?,
        owner: row.get("user_id"),
        name: row.get("name"),
        currency: row.get("currency"),
        opening_balance: row.get("opening_balance"),
        balance: row.get("balance"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer> {
    let id_str: String = row.get("id");
    let from_str: String = row.get("from_wallet_id");
    let to_str: String = row.get("to_wallet_id");
    let date_str: String = row.get("date");
    let status_str: String = row.get("status");
    let applied_from: Option<String> = row.get("applied_from_wallet_id");
    let applied_to: Option<String> = row.get("applied_to_wallet_id");
    let applied_amount: Option<Cents> = row.get("applied_amount_cents");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    let applied = match (applied_from, applied_to, applied_amount) {
        (Some(from), Some(to), Some(amount_cents)) => Some(AppliedEffect {
            from_wallet: parse_uuid(&from, "applied from_wallet")?,
            to_wallet: parse_uuid(&to, "applied to_wallet")?,
            amount_cents,
        }),
        (None, None, None) => None,
        _ => anyhow::bail!("Transfer {} has a partially stored applied effect", id_str),
    };

    Ok(Transfer {
        id: parse_uuid(&id_str, "transfer")?,
        owner: row.get("user_id"),
        from_wallet: parse_uuid(&from_str, "from_wallet")?,
        to_wallet: parse_uuid(&to_str, "to_wallet")?,
        amount_cents: row.get("amount_cents"),
        date: parse_date(&date_str)?,
        status: TransferStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transfer status: {}", status_str))?,
        description: row.get("description"),
        applied,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

fn row_to_category(row: &SqliteRow) -> Result<Category> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(Category {
        id: parse_uuid(&id_str, "category")?,
        owner: row.get("user_id"),
        name: row.get("name"),
        color: row.get("color"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let id_str: String = row.get("id");
    let wallet_str: String = row.get("wallet_id");
    let category_str: Option<String> = row.get("category_id");
    let kind_str: String = row.get("kind");
    let date_str: String = row.get("date");
    let created_at_str: String = row.get("created_at");

    Ok(Transaction {
        id: parse_uuid(&id_str, "transaction")?,
        owner: row.get("user_id"),
        wallet: parse_uuid(&wallet_str, "wallet")?,
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
        amount_cents: row.get("amount_cents"),
        reason: row.get("reason"),
        category: category_str
            .as_deref()
            .map(|id| parse_uuid(id, "category"))
            .transpose()?,
        date: parse_date(&date_str)?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_loan(row: &SqliteRow) -> Result<Loan> {
    let id_str: String = row.get("id");
    let kind_str: String = row.get("kind");
    let status_str: String = row.get("status");
    let due_date_str: Option<String> = row.get("due_date");
    let created_at_str: String = row.get("created_at");

    Ok(Loan {
        id: parse_uuid(&id_str, "loan")?,
        owner: row.get("user_id"),
        name: row.get("name"),
        kind: LoanKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid loan kind: {}", kind_str))?,
        amount_cents: row.get("amount_cents"),
        remaining_cents: row.get("remaining_cents"),
        due_date: due_date_str.as_deref().map(parse_date).transpose()?,
        status: LoanStatus::from_str(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid loan status: {}", status_str))?,
        description: row.get("description"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}
