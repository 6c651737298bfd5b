use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{LedgerService, NewLoan, TransactionFilter, TransferFilter};
use crate::domain::{
    DEFAULT_CURRENCY, LoanKind, LoanPatch, LoanStatus, TransactionDraft, TransactionKind,
    TransactionPatch, TransferDraft, TransferPatch, TransferStatus, format_cents,
    format_cents_grouped, parse_cents,
};

/// FinTrackr - personal finance ledger
#[derive(Parser)]
#[command(name = "fintrackr")]
#[command(about = "A local-first personal finance tracker with wallets, transfers and loans")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "FINTRACKR_DB", default_value = "fintrackr.db")]
    pub database: String,

    /// Owner whose records are read and written
    #[arg(long, env = "FINTRACKR_OWNER", default_value = "local")]
    pub owner: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Wallet management commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Transfers between wallets
    #[command(subcommand)]
    Transfer(TransferCommands),

    /// Income and expense transactions
    #[command(subcommand)]
    Txn(TxnCommands),

    /// Transaction categories
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Money borrowed or lent
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Show balance for a wallet or all wallets
    Balance {
        /// Wallet name (omit for all wallets)
        wallet: Option<String>,
    },

    /// Dashboard summary for a period
    Summary {
        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Verify that stored balances match the recorded history
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: transfers, wallets, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet
    Create {
        /// Wallet name (must be unique)
        name: String,

        /// Currency code
        #[arg(short, long, default_value = DEFAULT_CURRENCY)]
        currency: String,

        /// Opening balance (e.g., "1500.00")
        #[arg(short, long, allow_hyphen_values = true)]
        opening: Option<String>,
    },

    /// List all wallets
    List,

    /// Show detailed wallet information
    Show {
        /// Wallet name
        name: String,
    },

    /// Rename a wallet
    Rename {
        /// Current wallet name
        name: String,

        /// New wallet name
        new_name: String,
    },

    /// Set a wallet's balance directly
    SetBalance {
        /// Wallet name
        name: String,

        /// New balance (e.g., "2500.00")
        #[arg(allow_hyphen_values = true)]
        balance: String,
    },

    /// Delete a wallet that has no transfers or transactions
    Delete {
        /// Wallet name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum TransferCommands {
    /// Record a transfer between wallets
    Create {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source wallet name
        #[arg(long)]
        from: String,

        /// Destination wallet name
        #[arg(long)]
        to: String,

        /// Date of the transfer (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Status: completed, pending, cancelled
        #[arg(short, long, default_value = "completed")]
        status: String,

        /// Description of the transfer
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Edit a transfer; only the given fields change
    Edit {
        /// Transfer ID
        id: String,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// New source wallet name
        #[arg(long)]
        from: Option<String>,

        /// New destination wallet name
        #[arg(long)]
        to: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New status: completed, pending, cancelled
        #[arg(short, long)]
        status: Option<String>,

        /// New description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,
    },

    /// Delete a transfer, undoing its effect on balances
    Delete {
        /// Transfer ID
        id: String,
    },

    /// Show detailed transfer information
    Show {
        /// Transfer ID
        id: String,
    },

    /// List transfers, newest first
    List {
        /// Filter by wallet name
        #[arg(long)]
        wallet: Option<String>,

        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transfers to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum TxnCommands {
    /// Record an income or expense
    Add {
        /// income or expense
        kind: String,

        /// Amount (e.g., "12.50")
        amount: String,

        /// Wallet name
        #[arg(short, long)]
        wallet: String,

        /// What the money was for
        #[arg(short, long)]
        reason: String,

        /// Category name (e.g., "food", "salary")
        #[arg(short, long)]
        category: Option<String>,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Edit a transaction; only the given fields change
    Edit {
        /// Transaction ID
        id: String,

        /// income or expense
        #[arg(short, long)]
        kind: Option<String>,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// New wallet name
        #[arg(short, long)]
        wallet: Option<String>,

        /// New reason
        #[arg(short, long)]
        reason: Option<String>,

        /// New category
        #[arg(short, long, conflicts_with = "clear_category")]
        category: Option<String>,

        /// Remove the category
        #[arg(long)]
        clear_category: bool,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a transaction, undoing its effect on the wallet balance
    Delete {
        /// Transaction ID
        id: String,
    },

    /// List transactions, newest first
    List {
        /// Filter by wallet name
        #[arg(long)]
        wallet: Option<String>,

        /// Filter by kind: income, expense
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Create {
        /// Category name (must be unique)
        name: String,

        /// Color as #RRGGBB
        #[arg(short, long)]
        color: Option<String>,
    },

    /// List all categories
    List,

    /// Rename a category
    Rename {
        /// Current category name
        name: String,

        /// New category name
        new_name: String,
    },

    /// Change a category's color
    Recolor {
        /// Category name
        name: String,

        /// Color as #RRGGBB
        color: String,
    },

    /// Delete a category; its transactions become uncategorized
    Delete {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Record a new loan
    Create {
        /// Loan name (e.g., "Personal Loan - Bank")
        name: String,

        /// borrowed or lent
        kind: String,

        /// Loan amount
        amount: String,

        /// Amount still outstanding (defaults to the full amount)
        #[arg(short, long)]
        remaining: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Edit a loan; only the given fields change
    Edit {
        /// Loan ID
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        /// borrowed or lent
        #[arg(short, long)]
        kind: Option<String>,

        #[arg(short, long)]
        amount: Option<String>,

        #[arg(short, long)]
        remaining: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// active or completed
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Record a repayment
    Repay {
        /// Loan ID
        id: String,

        /// Amount repaid
        amount: String,
    },

    /// Delete a loan
    Delete {
        /// Loan ID
        id: String,
    },

    /// List all loans
    List,

    /// Outstanding totals over active loans
    Summary,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income and expense per category
    Categories {
        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            LedgerService::init(&self.database, self.owner.as_str()).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = LedgerService::connect(&self.database, self.owner.as_str()).await?;

        match self.command {
            Commands::Init => {}
            Commands::Wallet(cmd) => run_wallet_command(&service, cmd).await?,
            Commands::Transfer(cmd) => run_transfer_command(&service, cmd).await?,
            Commands::Txn(cmd) => run_txn_command(&service, cmd).await?,
            Commands::Category(cmd) => run_category_command(&service, cmd).await?,
            Commands::Loan(cmd) => run_loan_command(&service, cmd).await?,
            Commands::Balance { wallet } => run_balance_command(&service, wallet).await?,
            Commands::Summary { from, to, format } => {
                run_summary_command(&service, from, to, &format).await?
            }
            Commands::Report(cmd) => run_report_command(&service, cmd).await?,
            Commands::Check => run_check_command(&service).await?,
            Commands::Export {
                export_type,
                output,
            } => run_export_command(&service, &export_type, output.as_deref()).await?,
        }

        Ok(())
    }
}

async fn run_wallet_command(service: &LedgerService, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Create {
            name,
            currency,
            opening,
        } => {
            let opening_balance = opening
                .map(|o| parse_amount(&o))
                .transpose()?
                .unwrap_or(0);
            let wallet = service
                .create_wallet(&name, &currency, opening_balance)
                .await?;
            println!(
                "Created wallet: {} ({} {})",
                wallet.name,
                format_cents_grouped(wallet.balance),
                wallet.currency
            );
        }

        WalletCommands::List => {
            let wallets = service.list_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!("{:<20} {:<8} {:>15}", "NAME", "CURRENCY", "BALANCE");
                println!("{}", "-".repeat(45));
                for wallet in wallets {
                    println!(
                        "{:<20} {:<8} {:>15}",
                        truncate(&wallet.name, 20),
                        wallet.currency,
                        format_cents_grouped(wallet.balance)
                    );
                }
            }
        }

        WalletCommands::Show { name } => {
            let wallet = service.get_wallet_by_name(&name).await?;
            let transfers = service
                .list_transfers(TransferFilter {
                    wallet: Some(wallet.name.clone()),
                    ..Default::default()
                })
                .await?;
            let transactions = service
                .list_transactions(TransactionFilter {
                    wallet: Some(wallet.name.clone()),
                    ..Default::default()
                })
                .await?;

            println!("Wallet: {}", wallet.name);
            println!("  ID:              {}", wallet.id);
            println!("  Currency:        {}", wallet.currency);
            println!(
                "  Created:         {}",
                wallet.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!(
                "  Opening balance: {}",
                format_cents_grouped(wallet.opening_balance)
            );
            println!(
                "  Balance:         {} {}",
                format_cents_grouped(wallet.balance),
                wallet.currency
            );
            println!("  Transfers:       {}", transfers.len());
            println!("  Transactions:    {}", transactions.len());
        }

        WalletCommands::Rename { name, new_name } => {
            let wallet = service.get_wallet_by_name(&name).await?;
            let renamed = service.rename_wallet(wallet.id, &new_name).await?;
            println!("Renamed wallet: {} -> {}", name, renamed.name);
        }

        WalletCommands::SetBalance { name, balance } => {
            let wallet = service.get_wallet_by_name(&name).await?;
            let new_balance = parse_amount(&balance)?;
            let updated = service.set_wallet_balance(wallet.id, new_balance).await?;
            println!(
                "{}: {} -> {} {}",
                updated.name,
                format_cents_grouped(wallet.balance),
                format_cents_grouped(updated.balance),
                updated.currency
            );
        }

        WalletCommands::Delete { name } => {
            let wallet = service.get_wallet_by_name(&name).await?;
            service.delete_wallet(wallet.id).await?;
            println!("Deleted wallet: {}", wallet.name);
        }
    }
    Ok(())
}

async fn run_transfer_command(service: &LedgerService, cmd: TransferCommands) -> Result<()> {
    match cmd {
        TransferCommands::Create {
            amount,
            from,
            to,
            date,
            status,
            description,
        } => {
            let from_wallet = service.get_wallet_by_name(&from).await?;
            let to_wallet = service.get_wallet_by_name(&to).await?;
            let date = date.map(|d| parse_date(&d)).transpose()?.unwrap_or_else(today);

            let mut draft = TransferDraft::new(from_wallet.id, to_wallet.id, parse_amount(&amount)?, date)
                .with_status(parse_transfer_status(&status)?);
            draft.description = description;

            let transfer = service.create_transfer(draft).await?;
            println!(
                "Recorded transfer: {} {} -> {} [{}] ({})",
                format_cents(transfer.amount_cents),
                from_wallet.name,
                to_wallet.name,
                transfer.status,
                transfer.id
            );
        }

        TransferCommands::Edit {
            id,
            amount,
            from,
            to,
            date,
            status,
            description,
            clear_description,
        } => {
            let transfer_id = parse_id(&id, "transfer")?;
            let patch = TransferPatch {
                from_wallet: resolve_wallet(service, from.as_deref()).await?,
                to_wallet: resolve_wallet(service, to.as_deref()).await?,
                amount_cents: amount.map(|a| parse_amount(&a)).transpose()?,
                date: date.map(|d| parse_date(&d)).transpose()?,
                status: status.map(|s| parse_transfer_status(&s)).transpose()?,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to change. Pass at least one field to edit.");
            }

            let transfer = service.update_transfer(transfer_id, patch).await?;
            println!(
                "Updated transfer: {} [{}] ({})",
                format_cents(transfer.amount_cents),
                transfer.status,
                transfer.id
            );
        }

        TransferCommands::Delete { id } => {
            let transfer = service.delete_transfer(parse_id(&id, "transfer")?).await?;
            println!(
                "Deleted transfer: {} [{}] ({})",
                format_cents(transfer.amount_cents),
                transfer.status,
                transfer.id
            );
        }

        TransferCommands::Show { id } => {
            let transfer = service.get_transfer(parse_id(&id, "transfer")?).await?;
            let from_wallet = service.get_wallet(transfer.from_wallet).await?;
            let to_wallet = service.get_wallet(transfer.to_wallet).await?;

            println!("Transfer: {}", transfer.id);
            println!("  Date:        {}", transfer.date.format("%Y-%m-%d"));
            println!(
                "  Amount:      {} {}",
                format_cents(transfer.amount_cents),
                from_wallet.currency
            );
            println!("  From:        {}", from_wallet.name);
            println!("  To:          {}", to_wallet.name);
            println!("  Status:      {}", transfer.status);
            if let Some(desc) = &transfer.description {
                println!("  Description: {}", desc);
            }
            println!(
                "  Applied:     {}",
                if transfer.is_applied() { "yes" } else { "no" }
            );
            println!(
                "  Recorded at: {}",
                transfer.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if transfer.updated_at != transfer.created_at {
                println!(
                    "  Updated at:  {}",
                    transfer.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        TransferCommands::List {
            wallet,
            status,
            from_date,
            to_date,
            limit,
        } => {
            let filter = TransferFilter {
                wallet,
                status: status.map(|s| parse_transfer_status(&s)).transpose()?,
                from_date: from_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid from-date")?,
                to_date: to_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid to-date")?,
                limit,
            };

            let transfers = service.list_transfers(filter).await?;
            if transfers.is_empty() {
                println!("No transfers found.");
                return Ok(());
            }

            let wallet_names = service.get_wallet_names().await?;
            println!(
                "{:<12} {:>12} {:<15} {:<15} {:<10} DESCRIPTION",
                "DATE", "AMOUNT", "FROM", "TO", "STATUS"
            );
            println!("{}", "-".repeat(85));
            for transfer in &transfers {
                let from_name = wallet_names
                    .get(&transfer.from_wallet)
                    .map(|s| s.as_str())
                    .unwrap_or("?");
                let to_name = wallet_names
                    .get(&transfer.to_wallet)
                    .map(|s| s.as_str())
                    .unwrap_or("?");

                println!(
                    "{:<12} {:>12} {:<15} {:<15} {:<10} {}",
                    transfer.date.format("%Y-%m-%d"),
                    format_cents(transfer.amount_cents),
                    truncate(from_name, 15),
                    truncate(to_name, 15),
                    transfer.status,
                    truncate(transfer.description.as_deref().unwrap_or(""), 30)
                );
            }
        }
    }
    Ok(())
}

async fn run_txn_command(service: &LedgerService, cmd: TxnCommands) -> Result<()> {
    match cmd {
        TxnCommands::Add {
            kind,
            amount,
            wallet,
            reason,
            category,
            date,
        } => {
            let wallet = service.get_wallet_by_name(&wallet).await?;
            let date = date.map(|d| parse_date(&d)).transpose()?.unwrap_or_else(today);

            let mut draft = TransactionDraft::new(
                wallet.id,
                parse_transaction_kind(&kind)?,
                parse_amount(&amount)?,
                reason,
                date,
            );
            draft.category = resolve_category(service, category.as_deref()).await?;

            let transaction = service.create_transaction(draft).await?;
            println!(
                "Recorded {}: {} on {} ({})",
                transaction.kind,
                format_cents(transaction.amount_cents),
                wallet.name,
                transaction.id
            );
        }

        TxnCommands::Edit {
            id,
            kind,
            amount,
            wallet,
            reason,
            category,
            clear_category,
            date,
        } => {
            let transaction_id = parse_id(&id, "transaction")?;
            let patch = TransactionPatch {
                wallet: resolve_wallet(service, wallet.as_deref()).await?,
                kind: kind.map(|k| parse_transaction_kind(&k)).transpose()?,
                amount_cents: amount.map(|a| parse_amount(&a)).transpose()?,
                reason,
                category: if clear_category {
                    Some(None)
                } else {
                    resolve_category(service, category.as_deref()).await?.map(Some)
                },
                date: date.map(|d| parse_date(&d)).transpose()?,
            };

            let transaction = service.update_transaction(transaction_id, patch).await?;
            println!(
                "Updated {}: {} ({})",
                transaction.kind,
                format_cents(transaction.amount_cents),
                transaction.id
            );
        }

        TxnCommands::Delete { id } => {
            let transaction = service
                .delete_transaction(parse_id(&id, "transaction")?)
                .await?;
            println!(
                "Deleted {}: {} ({})",
                transaction.kind,
                format_cents(transaction.amount_cents),
                transaction.id
            );
        }

        TxnCommands::List {
            wallet,
            kind,
            category,
            from_date,
            to_date,
            limit,
        } => {
            let filter = TransactionFilter {
                wallet,
                kind: kind.map(|k| parse_transaction_kind(&k)).transpose()?,
                category,
                from_date: from_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid from-date")?,
                to_date: to_date
                    .map(|s| parse_date(&s))
                    .transpose()
                    .context("Invalid to-date")?,
                limit,
            };

            let transactions = service.list_transactions(filter).await?;
            if transactions.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            let wallet_names = service.get_wallet_names().await?;
            let category_names = service.get_category_names().await?;
            println!(
                "{:<12} {:<8} {:>12} {:<15} {:<15} REASON",
                "DATE", "KIND", "AMOUNT", "WALLET", "CATEGORY"
            );
            println!("{}", "-".repeat(85));
            for transaction in &transactions {
                let wallet_name = wallet_names
                    .get(&transaction.wallet)
                    .map(|s| s.as_str())
                    .unwrap_or("?");
                let category_name = transaction
                    .category
                    .and_then(|id| category_names.get(&id))
                    .map(|s| s.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<12} {:<8} {:>12} {:<15} {:<15} {}",
                    transaction.date.format("%Y-%m-%d"),
                    transaction.kind,
                    format_cents(transaction.signed_amount()),
                    truncate(wallet_name, 15),
                    truncate(category_name, 15),
                    truncate(&transaction.reason, 30)
                );
            }
        }
    }
    Ok(())
}

async fn run_category_command(service: &LedgerService, cmd: CategoryCommands) -> Result<()> {
    match cmd {
        CategoryCommands::Create { name, color } => {
            let category = service.create_category(&name, color.as_deref()).await?;
            println!("Created category: {} ({})", category.name, category.color);
        }

        CategoryCommands::List => {
            let categories = service.list_categories().await?;
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                println!("{:<20} {:<8}", "NAME", "COLOR");
                println!("{}", "-".repeat(29));
                for category in categories {
                    println!("{:<20} {:<8}", truncate(&category.name, 20), category.color);
                }
            }
        }

        CategoryCommands::Rename { name, new_name } => {
            let category = service.get_category_by_name(&name).await?;
            let renamed = service.rename_category(category.id, &new_name).await?;
            println!("Renamed category: {} -> {}", name, renamed.name);
        }

        CategoryCommands::Recolor { name, color } => {
            let category = service.get_category_by_name(&name).await?;
            let updated = service.recolor_category(category.id, &color).await?;
            println!("{}: {} -> {}", updated.name, category.color, updated.color);
        }

        CategoryCommands::Delete { name } => {
            let category = service.get_category_by_name(&name).await?;
            service.delete_category(category.id).await?;
            println!("Deleted category: {}", category.name);
        }
    }
    Ok(())
}

async fn run_loan_command(service: &LedgerService, cmd: LoanCommands) -> Result<()> {
    match cmd {
        LoanCommands::Create {
            name,
            kind,
            amount,
            remaining,
            due,
            description,
        } => {
            let loan = service
                .create_loan(NewLoan {
                    name,
                    kind: parse_loan_kind(&kind)?,
                    amount_cents: parse_amount(&amount)?,
                    remaining_cents: remaining.map(|r| parse_amount(&r)).transpose()?,
                    due_date: due.map(|d| parse_date(&d)).transpose()?,
                    description,
                })
                .await?;
            println!(
                "Recorded loan: {} ({}, {} of {} outstanding) ({})",
                loan.name,
                loan.kind,
                format_cents(loan.remaining_cents),
                format_cents(loan.amount_cents),
                loan.id
            );
        }

        LoanCommands::Edit {
            id,
            name,
            kind,
            amount,
            remaining,
            due,
            clear_due,
            status,
            description,
        } => {
            let patch = LoanPatch {
                name,
                kind: kind.map(|k| parse_loan_kind(&k)).transpose()?,
                amount_cents: amount.map(|a| parse_amount(&a)).transpose()?,
                remaining_cents: remaining.map(|r| parse_amount(&r)).transpose()?,
                due_date: if clear_due {
                    Some(None)
                } else {
                    due.map(|d| parse_date(&d)).transpose()?.map(Some)
                },
                status: status.map(|s| parse_loan_status(&s)).transpose()?,
                description: description.map(Some),
            };

            let loan = service.update_loan(parse_id(&id, "loan")?, patch).await?;
            println!(
                "Updated loan: {} [{}] {} outstanding",
                loan.name,
                loan.status,
                format_cents(loan.remaining_cents)
            );
        }

        LoanCommands::Repay { id, amount } => {
            let loan = service
                .repay_loan(parse_id(&id, "loan")?, parse_amount(&amount)?)
                .await?;
            if loan.status == LoanStatus::Completed {
                println!("Loan '{}' fully repaid.", loan.name);
            } else {
                println!(
                    "Loan '{}': {} repaid, {} outstanding",
                    loan.name,
                    format_cents(loan.repaid_cents()),
                    format_cents(loan.remaining_cents)
                );
            }
        }

        LoanCommands::Delete { id } => {
            let loan = service.delete_loan(parse_id(&id, "loan")?).await?;
            println!("Deleted loan: {}", loan.name);
        }

        LoanCommands::List => {
            let loans = service.list_loans().await?;
            if loans.is_empty() {
                println!("No loans found.");
                return Ok(());
            }

            let today = today();
            println!(
                "{:<25} {:<9} {:>12} {:>12} {:<12} {:<10}",
                "NAME", "KIND", "AMOUNT", "REMAINING", "DUE", "STATUS"
            );
            println!("{}", "-".repeat(85));
            for loan in &loans {
                let due = loan
                    .due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let status = if loan.is_overdue(today) {
                    "overdue".to_string()
                } else {
                    loan.status.to_string()
                };
                println!(
                    "{:<25} {:<9} {:>12} {:>12} {:<12} {:<10}",
                    truncate(&loan.name, 25),
                    loan.kind,
                    format_cents(loan.amount_cents),
                    format_cents(loan.remaining_cents),
                    due,
                    status
                );
            }
        }

        LoanCommands::Summary => {
            let summary = service.loan_summary().await?;
            println!("Active loans: {}", summary.active_count);
            println!("  You owe:      {:>15}", format_cents_grouped(summary.total_borrowed));
            println!("  Owed to you:  {:>15}", format_cents_grouped(summary.total_lent));
            println!("  {}", "-".repeat(29));
            println!("  Net position: {:>15}", format_cents_grouped(summary.net_position()));
        }
    }
    Ok(())
}

async fn run_balance_command(service: &LedgerService, wallet: Option<String>) -> Result<()> {
    match wallet {
        Some(name) => {
            let wallet = service.get_wallet_by_name(&name).await?;
            println!(
                "{}: {} {}",
                wallet.name,
                format_cents_grouped(wallet.balance),
                wallet.currency
            );
        }
        None => {
            let wallets = service.list_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!("{:<20} {:>15} {:<8}", "WALLET", "BALANCE", "CURRENCY");
                println!("{}", "-".repeat(45));
                for wallet in wallets {
                    println!(
                        "{:<20} {:>15} {:<8}",
                        truncate(&wallet.name, 20),
                        format_cents_grouped(wallet.balance),
                        wallet.currency
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_summary_command(
    service: &LedgerService,
    from: Option<String>,
    to: Option<String>,
    format: &str,
) -> Result<()> {
    let (from_date, to_date) = parse_date_range(from, to)?;
    let summary = service.dashboard_summary(from_date, to_date).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Summary");
    println!(
        "Period: {} to {}",
        from_date.format("%Y-%m-%d"),
        to_date.format("%Y-%m-%d")
    );
    println!();
    println!("Wallets: {}", summary.wallet_count);
    for total in &summary.balances {
        println!(
            "  Total balance ({}): {:>15}",
            total.currency,
            format_cents_grouped(total.total)
        );
    }
    println!();
    println!("Income:    {:>15}", format_cents_grouped(summary.total_income));
    println!("Expense:   {:>15}", format_cents_grouped(summary.total_expense));
    println!("{}", "-".repeat(26));
    println!("Net:       {:>15}", format_cents_grouped(summary.net));
    println!();
    println!("Completed transfers: {}", summary.completed_transfers);
    println!(
        "Loans: {} active, you owe {}, owed to you {}",
        summary.loans.active_count,
        format_cents_grouped(summary.loans.total_borrowed),
        format_cents_grouped(summary.loans.total_lent)
    );
    Ok(())
}

async fn run_report_command(service: &LedgerService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Categories { from, to, format } => {
            let (from_date, to_date) = parse_date_range(from, to)?;
            let report = service.category_report(from_date, to_date).await?;

            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                "csv" => {
                    println!("category,color,income,expense,count,expense_percentage");
                    for cat in &report.categories {
                        println!(
                            "{},{},{},{},{},{:.2}",
                            cat.category,
                            cat.color,
                            format_cents(cat.income),
                            format_cents(cat.expense),
                            cat.count,
                            cat.expense_percentage
                        );
                    }
                }
                _ => {
                    println!("Category Report");
                    println!(
                        "Period: {} to {}",
                        from_date.format("%Y-%m-%d"),
                        to_date.format("%Y-%m-%d")
                    );
                    println!();
                    println!(
                        "{:<20} {:<8} {:>12} {:>12} {:>8} {:>8}",
                        "CATEGORY", "COLOR", "INCOME", "EXPENSE", "COUNT", "PERCENT"
                    );
                    println!("{}", "-".repeat(73));

                    for cat in &report.categories {
                        println!(
                            "{:<20} {:<8} {:>12} {:>12} {:>8} {:>7.1}%",
                            truncate(&cat.category, 20),
                            cat.color,
                            format_cents(cat.income),
                            format_cents(cat.expense),
                            cat.count,
                            cat.expense_percentage
                        );
                    }

                    println!("{}", "-".repeat(73));
                    println!(
                        "{:<20} {:<8} {:>12} {:>12}",
                        "TOTAL",
                        "",
                        format_cents(report.total_income),
                        format_cents(report.total_expense)
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Wallets:           {}", report.wallet_count);
    println!(
        "Transfers:         {} ({} applied)",
        report.transfer_count, report.applied_transfer_count
    );
    println!("Transactions:      {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(service: &LedgerService, export_type: &str, output: Option<&str>) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transfers" => {
            let count = exporter.export_transfers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transfers", count);
            }
        }
        "wallets" => {
            let count = exporter.export_wallets_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} wallets", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} wallets, {} categories, {} transfers, {} transactions, {} loans",
                    snapshot.wallets.len(),
                    snapshot.categories.len(),
                    snapshot.transfers.len(),
                    snapshot.transactions.len(),
                    snapshot.loans.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transfers, wallets, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn resolve_wallet(service: &LedgerService, name: Option<&str>) -> Result<Option<Uuid>> {
    match name {
        Some(name) => Ok(Some(service.get_wallet_by_name(name).await?.id)),
        None => Ok(None),
    }
}

async fn resolve_category(service: &LedgerService, name: Option<&str>) -> Result<Option<Uuid>> {
    match name {
        Some(name) => Ok(Some(service.get_category_by_name(name).await?.id)),
        None => Ok(None),
    }
}

fn parse_amount(input: &str) -> Result<i64> {
    parse_cents(input).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", input))
}

fn parse_id(input: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

fn parse_transfer_status(input: &str) -> Result<TransferStatus> {
    TransferStatus::from_str(input).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid statuses: completed, pending, cancelled",
            input
        )
    })
}

fn parse_transaction_kind(input: &str) -> Result<TransactionKind> {
    TransactionKind::from_str(input)
        .ok_or_else(|| anyhow::anyhow!("Invalid kind '{}'. Use income or expense", input))
}

fn parse_loan_kind(input: &str) -> Result<LoanKind> {
    LoanKind::from_str(input)
        .ok_or_else(|| anyhow::anyhow!("Invalid loan kind '{}'. Use borrowed or lent", input))
}

fn parse_loan_status(input: &str) -> Result<LoanStatus> {
    LoanStatus::from_str(input)
        .ok_or_else(|| anyhow::anyhow!("Invalid loan status '{}'. Use active or completed", input))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Defaults to the current month so far.
fn parse_date_range(from: Option<String>, to: Option<String>) -> Result<(NaiveDate, NaiveDate)> {
    let today = today();

    let to_date = match to {
        Some(date_str) => parse_date(&date_str)?,
        None => today,
    };
    let from_date = match from {
        Some(date_str) => parse_date(&date_str)?,
        None => today.with_day(1).unwrap_or(today),
    };

    Ok((from_date, to_date))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
