use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CategoryId, Cents, LoanSummary, UNCATEGORIZED_COLOR};
use crate::storage::CategoryTotals;

use super::AppError;

/// Bucket name for transactions without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Sum of stored wallet balances, one entry per currency
    pub balances: Vec<CurrencyTotal>,
    pub wallet_count: usize,
    pub total_income: Cents,
    pub total_expense: Cents,
    pub net: Cents,
    pub completed_transfers: i64,
    pub loans: LoanSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub total: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub categories: Vec<CategorySummary>,
    pub total_income: Cents,
    pub total_expense: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// `None` for the [`UNCATEGORIZED`] bucket
    pub category_id: Option<CategoryId>,
    pub category: String,
    pub color: String,
    pub income: Cents,
    pub expense: Cents,
    pub count: i64,
    /// Share of the period's expenses, 0-100
    pub expense_percentage: f64,
}

impl CategoryReport {
    /// Build a report from per-category totals. Rows without a category form
    /// the [`UNCATEGORIZED`] bucket. Categories are ordered by expense,
    /// largest first.
    pub fn from_totals(
        from_date: NaiveDate,
        to_date: NaiveDate,
        totals: Vec<CategoryTotals>,
    ) -> Result<Self, AppError> {
        let mut categories: Vec<CategorySummary> = totals
            .into_iter()
            .map(|row| CategorySummary {
                category: row.name.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                color: row.color.unwrap_or_else(|| UNCATEGORIZED_COLOR.to_string()),
                category_id: row.category_id,
                income: row.income,
                expense: row.expense,
                count: row.count,
                expense_percentage: 0.0,
            })
            .collect();

        let total_income = checked_sum(categories.iter().map(|c| c.income), "category income")?;
        let total_expense = checked_sum(categories.iter().map(|c| c.expense), "category expenses")?;
        for summary in &mut categories {
            if total_expense > 0 {
                summary.expense_percentage = summary.expense as f64 / total_expense as f64 * 100.0;
            }
        }
        categories.sort_by(|a, b| b.expense.cmp(&a.expense).then_with(|| a.category.cmp(&b.category)));

        Ok(Self {
            from_date,
            to_date,
            categories,
            total_income,
            total_expense,
        })
    }
}

fn checked_sum(mut values: impl Iterator<Item = Cents>, what: &str) -> Result<Cents, AppError> {
    values
        .try_fold(0, Cents::checked_add)
        .ok_or_else(|| AppError::TotalOverflow(what.to_string()))
}
