mod common;

use anyhow::Result;
use common::{OWNER, TwoWallets, assert_healthy, parse_date, test_service};
use fintrackr::application::{AppError, TransactionFilter, UNCATEGORIZED};
use fintrackr::domain::{
    DEFAULT_CATEGORY_COLOR, TransactionDraft, TransactionKind, TransactionPatch, ValidationError,
};

#[tokio::test]
async fn test_create_category() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let groceries = service.create_category("  Groceries ", None).await?;
    assert_eq!(groceries.name, "Groceries");
    assert_eq!(groceries.color, DEFAULT_CATEGORY_COLOR);
    assert_eq!(groceries.owner, OWNER);

    let rent = service.create_category("Rent", Some("#ef4444")).await?;
    assert_eq!(rent.color, "#EF4444");

    let listed = service.list_categories().await?;
    assert_eq!(listed, vec![groceries.clone(), rent]);
    assert_eq!(service.get_category_by_name("Groceries").await?, groceries);
    Ok(())
}

#[tokio::test]
async fn test_invalid_categories_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.create_category("Travel", None).await?;

    assert!(matches!(
        service.create_category("Travel", Some("#000000")).await,
        Err(AppError::CategoryAlreadyExists(name)) if name == "Travel"
    ));
    assert!(matches!(
        service.create_category("Fuel", Some("orange")).await,
        Err(AppError::Validation(ValidationError::InvalidColor(_)))
    ));
    assert!(matches!(
        service.create_category("   ", None).await,
        Err(AppError::Validation(ValidationError::EmptyName))
    ));
    assert_eq!(service.list_categories().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rename_and_recolor() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let food = service.create_category("Food", None).await?;
    service.create_category("Dining", None).await?;

    assert!(matches!(
        service.rename_category(food.id, "Dining").await,
        Err(AppError::CategoryAlreadyExists(_))
    ));

    let renamed = service.rename_category(food.id, "Groceries").await?;
    assert_eq!(renamed.name, "Groceries");
    assert_eq!(renamed.id, food.id);

    let recolored = service.recolor_category(food.id, "#10b981").await?;
    assert_eq!(recolored.color, "#10B981");
    assert!(matches!(
        service.recolor_category(food.id, "#10b98").await,
        Err(AppError::Validation(ValidationError::InvalidColor(_)))
    ));

    let stored = service.get_category(food.id).await?;
    assert_eq!((stored.name.as_str(), stored.color.as_str()), ("Groceries", "#10B981"));
    Ok(())
}

#[tokio::test]
async fn test_delete_category_keeps_transactions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;
    let food = service.create_category("Food", None).await?;

    let expense = service
        .create_transaction(
            TransactionDraft::new(
                wallets.a.id,
                TransactionKind::Expense,
                2500,
                "Lunch",
                parse_date("2025-06-02"),
            )
            .with_category(food.id),
        )
        .await?;

    service.delete_category(food.id).await?;
    assert!(matches!(
        service.get_category(food.id).await,
        Err(AppError::CategoryNotFound(_))
    ));

    let stored = service.get_transaction(expense.id).await?;
    assert_eq!(stored.category, None);
    assert_eq!(wallets.balances(&service).await?, (97500, 50000));

    let report = service
        .category_report(parse_date("2025-06-01"), parse_date("2025-06-30"))
        .await?;
    assert_eq!(report.categories.len(), 1);
    assert_eq!(report.categories[0].category, UNCATEGORIZED);
    assert_eq!(report.categories[0].expense, 2500);

    assert_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_categories_are_owner_scoped() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallets = TwoWallets::create(&service).await?;
    let other = service.for_owner("user-2");
    let theirs = other.create_category("Food", None).await?;

    // Same name is free for another owner
    let mine = service.create_category("Food", None).await?;
    assert_ne!(mine.id, theirs.id);

    assert!(matches!(
        service.get_category(theirs.id).await,
        Err(AppError::CategoryNotFound(_))
    ));
    assert!(matches!(
        service.delete_category(theirs.id).await,
        Err(AppError::CategoryNotFound(_))
    ));

    let txn = service
        .create_transaction(TransactionDraft::new(
            wallets.a.id,
            TransactionKind::Expense,
            100,
            "Tea",
            parse_date("2025-06-03"),
        ))
        .await?;
    let borrowed = service
        .update_transaction(
            txn.id,
            TransactionPatch {
                category: Some(Some(theirs.id)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(borrowed, Err(AppError::CategoryNotFound(_))));
    assert_eq!(service.get_transaction(txn.id).await?.category, None);

    let filed = service
        .update_transaction(
            txn.id,
            TransactionPatch {
                category: Some(Some(mine.id)),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(filed.category, Some(mine.id));
    let food = service
        .list_transactions(TransactionFilter {
            category: Some("Food".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(food.len(), 1);
    assert_eq!(other.list_categories().await?.len(), 1);
    Ok(())
}
