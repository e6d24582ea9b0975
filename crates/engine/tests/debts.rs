use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Account, AccountKind, AccountStatus, BorrowCmd, CollectCmd, CreateAccountCmd, DebtDirection,
    Engine, EngineError, EntryKind, ExpenseWithDebtCmd, LendCmd, SmartCollectCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine.ensure_user("alice").await.unwrap();
    (engine, db)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

async fn new_asset(engine: &Engine, name: &str, balance_minor: i64) -> Account {
    engine
        .create_account(
            CreateAccountCmd::new("alice", name, AccountKind::Asset).balance_minor(balance_minor),
        )
        .await
        .unwrap()
}

async fn receivable_for(engine: &Engine, counterparty: &str) -> Account {
    engine
        .find_or_create_counterparty("alice", AccountKind::Receivable, counterparty)
        .await
        .unwrap()
}

#[tokio::test]
async fn lending_opens_a_receivable() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    let entry = engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    assert_eq!(entry.kind, EntryKind::DebtOp);
    assert_eq!(entry.direction, Some(DebtDirection::Lent));
    assert!(entry.is_debt);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 70_000);

    let alex = receivable_for(&engine, "Alex").await;
    assert_eq!(alex.balance_minor, 30_000);
    assert_eq!(alex.status, AccountStatus::Active);
}

#[tokio::test]
async fn lending_twice_reuses_the_same_receivable() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 10_000, day(1)))
        .await
        .unwrap();
    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 5_000, day(2)))
        .await
        .unwrap();

    let obligations = engine.outstanding_obligations("alice").await.unwrap();
    assert_eq!(obligations.len(), 1);
    assert_eq!(obligations[0].balance_minor, 15_000);
}

#[tokio::test]
async fn exact_collection_closes_the_debt()  {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let entry = engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 30_000, day(10)))
        .await
        .unwrap();
    assert_eq!(entry.direction, Some(DebtDirection::Returned));

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 0);
    assert_eq!(alex.status, AccountStatus::Closed);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 100_000);

    assert!(engine.outstanding_obligations("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn collecting_more_than_outstanding_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let err = engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 40_000, day(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)));

    // the rejected write left no trace
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 70_000);
    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 30_000);
}

#[tokio::test]
async fn smart_collect_splits_an_overpayment() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let written = engine
        .collect_debt_smart(SmartCollectCmd::new("alice", alex.id, cash.id, 35_000, day(10)))
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].direction, Some(DebtDirection::Returned));
    assert_eq!(written[0].amount_minor, 30_000);
    assert_eq!(written[1].kind, EntryKind::Income);
    assert_eq!(written[1].amount_minor, 5_000);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 105_000);
    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.status, AccountStatus::Closed);
}

#[tokio::test]
async fn smart_collect_absorbs_one_cent_differences() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let written = engine
        .collect_debt_smart(SmartCollectCmd::new("alice", alex.id, cash.id, 29_999, day(10)))
        .await
        .unwrap();
    assert_eq!(written.len(), 1);
    // settled for the exact outstanding amount, not the payment
    assert_eq!(written[0].amount_minor, 30_000);

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 0);
    assert_eq!(alex.status, AccountStatus::Closed);
}

#[tokio::test]
async fn smart_collect_forgives_the_shortfall_when_closing() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let written = engine
        .collect_debt_smart(
            SmartCollectCmd::new("alice", alex.id, cash.id, 20_000, day(10)).close_debt(true),
        )
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].amount_minor, 20_000);
    assert_eq!(written[1].direction, Some(DebtDirection::Forgiven));
    assert_eq!(written[1].amount_minor, 10_000);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 90_000);
    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 0);
    assert_eq!(alex.status, AccountStatus::Closed);
}

#[tokio::test]
async fn smart_collect_partial_payment_keeps_the_debt_open() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let written = engine
        .collect_debt_smart(SmartCollectCmd::new("alice", alex.id, cash.id, 20_000, day(10)))
        .await
        .unwrap();
    assert_eq!(written.len(), 1);

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 10_000);
    assert_eq!(alex.status, AccountStatus::Active);
}

#[tokio::test]
async fn borrow_and_repay_round_trip() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 10_000).await;

    let entry = engine
        .borrow(BorrowCmd::new("alice", cash.id, "Banca", 50_000, day(1)))
        .await
        .unwrap();
    assert_eq!(entry.direction, Some(DebtDirection::Borrowed));

    let cash_after = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash_after.balance_minor, 60_000);

    let banca = engine
        .find_or_create_counterparty("alice", AccountKind::Liability, "Banca")
        .await
        .unwrap();
    assert_eq!(banca.balance_minor, -50_000);
    assert_eq!(banca.outstanding_minor(), 50_000);

    let entry = engine
        .repay_debt(CollectCmd::new("alice", banca.id, cash.id, 50_000, day(20)))
        .await
        .unwrap();
    assert_eq!(entry.direction, Some(DebtDirection::Repaid));

    let banca = engine.account("alice", banca.id).await.unwrap();
    assert_eq!(banca.balance_minor, 0);
    assert_eq!(banca.status, AccountStatus::Closed);
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 10_000);
}

#[tokio::test]
async fn smart_repay_overpayment_becomes_an_expense() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .borrow(BorrowCmd::new("alice", cash.id, "Banca", 30_000, day(1)))
        .await
        .unwrap();
    let banca = engine
        .find_or_create_counterparty("alice", AccountKind::Liability, "Banca")
        .await
        .unwrap();

    let written = engine
        .repay_debt_smart(SmartCollectCmd::new("alice", banca.id, cash.id, 32_000, day(10)))
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].direction, Some(DebtDirection::Repaid));
    assert_eq!(written[0].amount_minor, 30_000);
    assert_eq!(written[1].kind, EntryKind::Expense);
    assert_eq!(written[1].amount_minor, 2_000);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 100_000 + 30_000 - 32_000);
    let banca = engine.account("alice", banca.id).await.unwrap();
    assert_eq!(banca.status, AccountStatus::Closed);
}

#[tokio::test]
async fn forgiving_writes_off_the_remainder() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;

    let entry = engine
        .forgive_debt("alice", alex.id, day(15), Some("settled over dinner"))
        .await
        .unwrap()
        .expect("an outstanding debt produces a forgiveness entry");
    assert_eq!(entry.direction, Some(DebtDirection::Forgiven));
    assert_eq!(entry.amount_minor, 30_000);

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 0);
    assert_eq!(alex.status, AccountStatus::Closed);

    // the money is gone for good
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 70_000);

    // forgiving a settled debt is a no-op close
    assert!(engine
        .forgive_debt("alice", alex.id, day(16), None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn lending_again_reopens_a_settled_debt() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 10_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 10_000, day(5)))
        .await
        .unwrap();
    assert_eq!(
        engine.account("alice", alex.id).await.unwrap().status,
        AccountStatus::Closed
    );

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 8_000, day(10)))
        .await
        .unwrap();

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 8_000);
    assert_eq!(alex.status, AccountStatus::Active);
}

#[tokio::test]
async fn shared_expense_splits_own_share_and_loan() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    let (expense, loan) = engine
        .expense_with_debt(
            ExpenseWithDebtCmd::new("alice", cash.id, 10_000, 4_000, "Alex", day(1))
                .category("restaurant"),
        )
        .await
        .unwrap();
    assert_eq!(expense.kind, EntryKind::Expense);
    assert_eq!(expense.amount_minor, 6_000);
    assert_eq!(loan.direction, Some(DebtDirection::Lent));
    assert_eq!(loan.amount_minor, 4_000);

    // cash drops by the full bill, the friend owes only their share
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 90_000);
    let alex = receivable_for(&engine, "Alex").await;
    assert_eq!(alex.balance_minor, 4_000);
}

#[tokio::test]
async fn shared_expense_validates_the_split() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    for their_share in [0, -1, 10_000, 12_000] {
        let err = engine
            .expense_with_debt(ExpenseWithDebtCmd::new(
                "alice",
                cash.id,
                10_000,
                their_share,
                "Alex",
                day(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}

#[tokio::test]
async fn debt_entries_cannot_be_deleted_individually() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    let entry = engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();

    let err = engine.delete_entry("alice", entry.id).await.unwrap_err();
    assert!(matches!(err, EngineError::DependentDataPresent(_)));
}

#[tokio::test]
async fn cascade_delete_erases_the_whole_relationship() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 10_000, day(5)))
        .await
        .unwrap();
    engine
        .forgive_debt("alice", alex.id, day(10), None)
        .await
        .unwrap();

    let removed = engine
        .delete_account_with_entries("alice", alex.id)
        .await
        .unwrap();
    assert_eq!(removed, 3);

    // as if the relationship never happened
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 100_000);
    assert_eq!(
        engine.account("alice", alex.id).await.unwrap_err(),
        EngineError::NotFound("account".to_string())
    );
    let remaining = engine
        .entries("alice", Default::default())
        .await
        .unwrap();
    // only the opening entry of the cash account survives
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn cascade_delete_handles_backdated_settlements() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    // the collection is dated before the lend it settles
    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(5)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 30_000, day(1)))
        .await
        .unwrap();

    let removed = engine
        .delete_account_with_entries("alice", alex.id)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 100_000);
    assert_eq!(
        engine.account("alice", alex.id).await.unwrap_err(),
        EngineError::NotFound("account".to_string())
    );
}

#[tokio::test]
async fn wrong_account_kind_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .borrow(BorrowCmd::new("alice", cash.id, "Banca", 30_000, day(1)))
        .await
        .unwrap();
    let banca = engine
        .find_or_create_counterparty("alice", AccountKind::Liability, "Banca")
        .await
        .unwrap();

    // collecting targets receivables, not liabilities
    let err = engine
        .collect_debt(CollectCmd::new("alice", banca.id, cash.id, 30_000, day(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    // debt ops against a plain asset account make no sense either
    let err = engine
        .collect_debt(CollectCmd::new("alice", cash.id, cash.id, 30_000, day(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn smart_collect_on_a_settled_debt_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 10_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 10_000, day(5)))
        .await
        .unwrap();

    let err = engine
        .collect_debt_smart(SmartCollectCmd::new("alice", alex.id, cash.id, 5_000, day(6)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn overdue_obligations_respect_due_dates() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 10_000, day(1)).due_date(day(10)))
        .await
        .unwrap();
    engine
        .lend(LendCmd::new("alice", cash.id, "Sam", 5_000, day(1)).due_date(day(25)))
        .await
        .unwrap();

    let overdue = engine.overdue_obligations("alice", day(15)).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].counterparty.as_deref(), Some("Alex"));

    // settling clears it from the overdue list
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 10_000, day(16)))
        .await
        .unwrap();
    assert!(engine
        .overdue_obligations("alice", day(17))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn editing_a_debt_entry_resyncs_the_obligation() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 100_000).await;

    let lend = engine
        .lend(LendCmd::new("alice", cash.id, "Alex", 30_000, day(1)))
        .await
        .unwrap();
    let alex = receivable_for(&engine, "Alex").await;
    engine
        .collect_debt(CollectCmd::new("alice", alex.id, cash.id, 30_000, day(5)))
        .await
        .unwrap();
    assert_eq!(
        engine.account("alice", alex.id).await.unwrap().status,
        AccountStatus::Closed
    );

    // correcting the lent amount upward reopens the debt
    engine
        .update_entry(
            engine::UpdateEntryCmd::new("alice", lend.id, lend.created_at).amount_minor(35_000),
        )
        .await
        .unwrap();

    let alex = engine.account("alice", alex.id).await.unwrap();
    assert_eq!(alex.balance_minor, 5_000);
    assert_eq!(alex.status, AccountStatus::Active);
}
