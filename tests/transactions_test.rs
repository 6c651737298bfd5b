mod common;

use anyhow::Result;
use common::{TwoWallets, assert_healthy, balance_of, parse_date, test_service};
use fintrackr::application::{AppError, TransactionFilter};
use fintrackr::domain::{
    TransactionDraft, TransactionKind, TransactionPatch, TransferDraft, ValidationError,
};

#[tokio::test]
async fn test_income_then_delete_restores_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;

    let income = service
        .create_transaction(TransactionDraft::new(
            wallets.a.id,
            TransactionKind::Income,
            7550,
            "Freelance",
            parse_date("2025-06-01"),
        ))
        .await?;
    assert_eq!(balance_of(&service, &wallets.a).await?, 107550);

    service.delete_transaction(income.id).await?;
    assert_eq!(balance_of(&service, &wallets.a).await?, 100000);
    assert!(matches!(
        service.get_transaction(income.id).await,
        Err(AppError::TransactionNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_expense_debits_wallet() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;
    let food = service.create_category("food", None).await?;

    let expense = service
        .create_transaction(
            TransactionDraft::new(
                wallets.b.id,
                TransactionKind::Expense,
                1250,
                "  Momo  ",
                parse_date("2025-06-02"),
            )
            .with_category(food.id),
        )
        .await?;

    assert_eq!(expense.reason, "Momo");
    assert_eq!(expense.category, Some(food.id));
    assert_eq!(service.get_transaction(expense.id).await?.category, Some(food.id));
    assert_eq!(wallets.balances(&service).await?, (100000, 48750));
    Ok(())
}

#[tokio::test]
async fn test_update_moves_effect() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;

    let txn = service
        .create_transaction(TransactionDraft::new(
            wallets.a.id,
            TransactionKind::Expense,
            3000,
            "Phone bill",
            parse_date("2025-06-03"),
        ))
        .await?;
    assert_eq!(wallets.balances(&service).await?, (97000, 50000));

    // Bigger amount on the same wallet
    service
        .update_transaction(
            txn.id,
            TransactionPatch {
                amount_cents: Some(4500),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(wallets.balances(&service).await?, (95500, 50000));

    // Different wallet and kind
    let moved = service
        .update_transaction(
            txn.id,
            TransactionPatch {
                wallet: Some(wallets.b.id),
                kind: Some(TransactionKind::Income),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(moved.wallet, wallets.b.id);
    assert_eq!(wallets.balances(&service).await?, (100000, 54500));

    assert_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_transactions_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;

    let zero = service
        .create_transaction(TransactionDraft::new(
            wallets.a.id,
            TransactionKind::Income,
            0,
            "Nothing",
            parse_date("2025-06-04"),
        ))
        .await;
    assert!(matches!(
        zero,
        Err(AppError::Validation(ValidationError::NonPositiveAmount(0)))
    ));

    let missing_wallet = service
        .create_transaction(TransactionDraft::new(
            uuid::Uuid::new_v4(),
            TransactionKind::Income,
            100,
            "Ghost",
            parse_date("2025-06-04"),
        ))
        .await;
    assert!(matches!(missing_wallet, Err(AppError::WalletNotFound(_))));

    let missing_category = service
        .create_transaction(
            TransactionDraft::new(
                wallets.a.id,
                TransactionKind::Expense,
                100,
                "Snacks",
                parse_date("2025-06-04"),
            )
            .with_category(uuid::Uuid::new_v4()),
        )
        .await;
    assert!(matches!(missing_category, Err(AppError::CategoryNotFound(_))));

    assert_eq!(wallets.balances(&service).await?, (100000, 50000));
    Ok(())
}

#[tokio::test]
async fn test_list_transactions_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;
    let salary = service.create_category("salary", None).await?;
    let food = service.create_category("food", None).await?;

    let entries = [
        (wallets.a.id, TransactionKind::Income, 500000, "Salary", Some(salary.id), "2025-05-01"),
        (wallets.a.id, TransactionKind::Expense, 2000, "Groceries", Some(food.id), "2025-05-03"),
        (wallets.b.id, TransactionKind::Expense, 800, "Tea", Some(food.id), "2025-05-04"),
        (wallets.b.id, TransactionKind::Expense, 1500, "Bus", None, "2025-06-01"),
    ];
    for (wallet, kind, amount, reason, category, date) in entries {
        let mut draft = TransactionDraft::new(wallet, kind, amount, reason, parse_date(date));
        draft.category = category;
        service.create_transaction(draft).await?;
    }

    let all = service.list_transactions(TransactionFilter::default()).await?;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].reason, "Bus", "newest first");

    let food = service
        .list_transactions(TransactionFilter {
            category: Some("food".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(food.len(), 2);
    assert!(matches!(
        service
            .list_transactions(TransactionFilter {
                category: Some("travel".to_string()),
                ..Default::default()
            })
            .await,
        Err(AppError::CategoryNotFound(_))
    ));

    let b_expenses = service
        .list_transactions(TransactionFilter {
            wallet: Some("B".to_string()),
            kind: Some(TransactionKind::Expense),
            ..Default::default()
        })
        .await?;
    assert_eq!(b_expenses.len(), 2);

    let may = service
        .list_transactions(TransactionFilter {
            from_date: Some(parse_date("2025-05-01")),
            to_date: Some(parse_date("2025-05-31")),
            ..Default::default()
        })
        .await?;
    assert_eq!(may.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_mixed_history_stays_consistent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;
    let c = service.create_wallet("C", "NPR", 0).await?;

    let salary = service
        .create_transaction(TransactionDraft::new(
            wallets.a.id,
            TransactionKind::Income,
            250000,
            "Salary",
            parse_date("2025-06-01"),
        ))
        .await?;
    let t1 = service
        .create_transfer(TransferDraft::new(wallets.a.id, c.id, 40000, parse_date("2025-06-02")))
        .await?;
    service
        .create_transaction(TransactionDraft::new(
            c.id,
            TransactionKind::Expense,
            12000,
            "Rent share",
            parse_date("2025-06-03"),
        ))
        .await?;
    service
        .create_transfer(TransferDraft::new(wallets.b.id, wallets.a.id, 5000, parse_date("2025-06-04")))
        .await?;
    service.delete_transaction(salary.id).await?;
    service.delete_transfer(t1.id).await?;

    assert_eq!(balance_of(&service, &wallets.a).await?, 105000);
    assert_eq!(balance_of(&service, &wallets.b).await?, 45000);
    assert_eq!(balance_of(&service, &c).await?, -12000);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{:?}", report.issues);
    assert_eq!(report.transaction_count, 1);
    assert_eq!(report.transfer_count, 1);
    assert_eq!(report.applied_transfer_count, 1);
    Ok(())
}
