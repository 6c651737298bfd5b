mod common;

use anyhow::Result;
use common::{parse_date, test_service};
use fintrackr::application::{AppError, NewLoan};
use fintrackr::domain::{LoanKind, LoanPatch, LoanStatus, ValidationError};

fn new_loan(name: &str, kind: LoanKind, amount: i64) -> NewLoan {
    NewLoan {
        name: name.to_string(),
        kind,
        amount_cents: amount,
        remaining_cents: None,
        due_date: None,
        description: None,
    }
}

#[tokio::test]
async fn test_create_loan_defaults_remaining() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let loan = service
        .create_loan(NewLoan {
            due_date: Some(parse_date("2025-12-31")),
            description: Some("  Home renovation ".to_string()),
            ..new_loan("Personal Loan - Bank", LoanKind::Borrowed, 5000000)
        })
        .await?;

    assert_eq!(loan.remaining_cents, 5000000);
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.description.as_deref(), Some("Home renovation"));

    let stored = service.get_loan(loan.id).await?;
    assert_eq!(stored, loan);
    Ok(())
}

#[tokio::test]
async fn test_invalid_loans_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert!(matches!(
        service.create_loan(new_loan("Nothing", LoanKind::Lent, 0)).await,
        Err(AppError::Validation(ValidationError::NonPositiveAmount(0)))
    ));
    assert!(matches!(
        service
            .create_loan(NewLoan {
                remaining_cents: Some(2000000),
                ..new_loan("Loan to Friend", LoanKind::Lent, 1500000)
            })
            .await,
        Err(AppError::Validation(ValidationError::InvalidLoanRemaining { .. }))
    ));
    assert!(service.list_loans().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_repay_until_completed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let loan = service
        .create_loan(new_loan("Emergency Loan", LoanKind::Borrowed, 2500000))
        .await?;

    let partly = service.repay_loan(loan.id, 1000000).await?;
    assert_eq!(partly.remaining_cents, 1500000);
    assert_eq!(partly.status, LoanStatus::Active);

    let over = service.repay_loan(loan.id, 1500001).await;
    assert!(matches!(
        over,
        Err(AppError::Validation(ValidationError::RepaymentExceedsRemaining {
            remaining: 1500000,
            requested: 1500001
        }))
    ));

    let done = service.repay_loan(loan.id, 1500000).await?;
    assert_eq!(done.remaining_cents, 0);
    assert_eq!(done.status, LoanStatus::Completed);
    assert_eq!(service.get_loan(loan.id).await?.status, LoanStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_loan() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let loan = service
        .create_loan(NewLoan {
            due_date: Some(parse_date("2025-09-01")),
            ..new_loan("Business Advance", LoanKind::Lent, 3000000)
        })
        .await?;

    let updated = service
        .update_loan(
            loan.id,
            LoanPatch {
                name: Some("Advance to Ram".to_string()),
                remaining_cents: Some(1000000),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.name, "Advance to Ram");
    assert_eq!(updated.remaining_cents, 1000000);
    assert_eq!(updated.due_date, None);
    assert_eq!(service.get_loan(loan.id).await?, updated);

    service.delete_loan(loan.id).await?;
    assert!(matches!(
        service.get_loan(loan.id).await,
        Err(AppError::LoanNotFound(_))
    ));
    assert!(matches!(
        service.delete_loan(loan.id).await,
        Err(AppError::LoanNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_loan_summary() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .create_loan(NewLoan {
            remaining_cents: Some(3500000),
            ..new_loan("Bank", LoanKind::Borrowed, 5000000)
        })
        .await?;
    service
        .create_loan(NewLoan {
            remaining_cents: Some(500000),
            ..new_loan("Friend", LoanKind::Lent, 1500000)
        })
        .await?;
    let emergency = service
        .create_loan(new_loan("Emergency", LoanKind::Borrowed, 2500000))
        .await?;
    service.repay_loan(emergency.id, 2500000).await?;

    let summary = service.loan_summary().await?;
    assert_eq!(summary.total_borrowed, 3500000);
    assert_eq!(summary.total_lent, 500000);
    assert_eq!(summary.active_count, 2);
    assert_eq!(summary.net_position(), -3000000);

    let loans = service.list_loans().await?;
    assert_eq!(loans.len(), 3);
    assert_eq!(loans[2].name, "Emergency", "completed loans listed last");

    // Another owner sees nothing
    assert_eq!(service.for_owner("user-2").loan_summary().await?.active_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_status_follows_remaining() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let settled = service
        .create_loan(NewLoan {
            remaining_cents: Some(0),
            ..new_loan("Settled", LoanKind::Lent, 200000)
        })
        .await?;
    assert_eq!(settled.status, LoanStatus::Completed);
    assert_eq!(service.get_loan(settled.id).await?.status, LoanStatus::Completed);
    assert_eq!(service.loan_summary().await?.active_count, 0);

    // A paid-off loan cannot be marked active without something left to repay
    let reopen = service
        .update_loan(
            settled.id,
            LoanPatch {
                status: Some(LoanStatus::Active),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        reopen,
        Err(AppError::Validation(ValidationError::LoanStatusConflict {
            status: LoanStatus::Active,
            remaining: 0
        }))
    ));
    assert_eq!(service.get_loan(settled.id).await?.status, LoanStatus::Completed);

    // Raising the remaining amount reopens it
    let reopened = service
        .update_loan(
            settled.id,
            LoanPatch {
                remaining_cents: Some(50000),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(reopened.status, LoanStatus::Active);
    assert_eq!(service.get_loan(settled.id).await?.status, LoanStatus::Active);
    assert_eq!(service.loan_summary().await?.total_lent, 50000);

    // Completing clears what remains
    let closed = service
        .update_loan(
            settled.id,
            LoanPatch {
                status: Some(LoanStatus::Completed),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(closed.remaining_cents, 0);
    assert_eq!(closed.status, LoanStatus::Completed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_repayments_are_not_lost() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let loan = service
        .create_loan(new_loan("Shared", LoanKind::Borrowed, 1000000))
        .await?;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.repay_loan(loan.id, 10000).await })
        })
        .collect();

    let mut repaid = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => repaid += 10000,
            Err(AppError::Backend(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert!(repaid > 0);
    let stored = service.get_loan(loan.id).await?;
    assert_eq!(stored.remaining_cents, 1000000 - repaid);
    assert_eq!(stored.status, LoanStatus::Active);
    Ok(())
}
