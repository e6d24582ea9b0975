use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Account, AccountKind, AccountListFilter, AccountPatch, CreateAccountCmd, Engine, EngineError,
    EntryKind, EntryListFilter, SimpleEntryCmd, TransferCmd, UpdateEntryCmd,
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

#[tokio::test]
async fn create_account_validates_kind_constraints() {
    let (engine, _db) = engine_with_db().await;

    // obligation accounts need a counterparty
    let err = engine
        .create_account(CreateAccountCmd::new("alice", "Alex", AccountKind::Receivable))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    // a credit limit only makes sense on asset accounts
    let err = engine
        .create_account(
            CreateAccountCmd::new("alice", "Stash", AccountKind::Savings)
                .credit_limit_minor(50_000),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    // debt accounts start settled
    let err = engine
        .create_account(
            CreateAccountCmd::new("alice", "Loan", AccountKind::Liability)
                .counterparty("Bank")
                .balance_minor(-5_000),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "Card", AccountKind::Asset)
                .balance_minor(100_000)
                .credit_limit_minor(200_000),
        )
        .await
        .unwrap();
    assert_eq!(account.balance_minor, 100_000);
    assert_eq!(account.credit_limit_minor, Some(200_000));
}

#[tokio::test]
async fn duplicate_account_name_rejected() {
    let (engine, _db) = engine_with_db().await;
    new_asset(&engine, "Cash", 0).await;

    let err = engine
        .create_account(CreateAccountCmd::new("alice", "cash", AccountKind::Asset))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn expense_income_transfer_move_balances() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 50_000).await;
    let bank = new_asset(&engine, "Bank", 0).await;

    engine
        .expense(
            SimpleEntryCmd::new("alice", cash.id, 12_000, day(1)).category("groceries"),
        )
        .await
        .unwrap();
    engine
        .income(SimpleEntryCmd::new("alice", bank.id, 300_000, day(1)).category("salary"))
        .await
        .unwrap();
    engine
        .transfer(TransferCmd::new("alice", bank.id, cash.id, 20_000, day(2)))
        .await
        .unwrap();

    let cash = engine.account("alice", cash.id).await.unwrap();
    let bank = engine.account("alice", bank.id).await.unwrap();
    assert_eq!(cash.balance_minor, 50_000 - 12_000 + 20_000);
    assert_eq!(bank.balance_minor, 300_000 - 20_000);
}

#[tokio::test]
async fn transfer_rejects_same_account() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 10_000).await;

    let err = engine
        .transfer(TransferCmd::new("alice", cash.id, cash.id, 1_000, day(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn entry_round_trip() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 10_000).await;

    let created = engine
        .expense(
            SimpleEntryCmd::new("alice", cash.id, 2_500, day(3))
                .category("transport")
                .note("bus pass"),
        )
        .await
        .unwrap();

    let loaded = engine.entry("alice", created.id).await.unwrap();
    assert_eq!(loaded, created);
}

#[tokio::test]
async fn update_entry_rebalances_on_amount_change() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 50_000).await;

    let entry = engine
        .expense(SimpleEntryCmd::new("alice", cash.id, 10_000, day(1)))
        .await
        .unwrap();

    let updated = engine
        .update_entry(
            UpdateEntryCmd::new("alice", entry.id, entry.created_at)
                .amount_minor(15_000)
                .note("corrected"),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount_minor, 15_000);
    assert_eq!(updated.note.as_deref(), Some("corrected"));

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 50_000 - 15_000);
}

#[tokio::test]
async fn stale_version_token_loses_the_edit_race() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 50_000).await;

    let entry = engine
        .expense(SimpleEntryCmd::new("alice", cash.id, 10_000, day(1)))
        .await
        .unwrap();

    // first editor wins and refreshes the token
    engine
        .update_entry(UpdateEntryCmd::new("alice", entry.id, entry.created_at).amount_minor(9_000))
        .await
        .unwrap();

    // second editor still holds the original token
    let err = engine
        .update_entry(
            UpdateEntryCmd::new("alice", entry.id, entry.created_at).amount_minor(11_000),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConcurrentModification(_)));

    // the losing edit left no trace on the balance
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 50_000 - 9_000);
}

#[tokio::test]
async fn delete_entry_reverses_its_effect() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 50_000).await;

    let entry = engine
        .expense(SimpleEntryCmd::new("alice", cash.id, 10_000, day(1)))
        .await
        .unwrap();
    engine.delete_entry("alice", entry.id).await.unwrap();

    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 50_000);
    assert_eq!(
        engine.entry("alice", entry.id).await.unwrap_err(),
        EngineError::NotFound("entry".to_string())
    );
}

#[tokio::test]
async fn entries_list_filters_and_orders() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 0).await;
    let bank = new_asset(&engine, "Bank", 0).await;

    engine
        .expense(SimpleEntryCmd::new("alice", cash.id, 1_000, day(1)))
        .await
        .unwrap();
    engine
        .income(SimpleEntryCmd::new("alice", cash.id, 2_000, day(2)))
        .await
        .unwrap();
    engine
        .transfer(TransferCmd::new("alice", bank.id, cash.id, 3_000, day(3)))
        .await
        .unwrap();

    let all = engine
        .entries("alice", EntryListFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    // newest first
    assert_eq!(all[0].kind, EntryKind::Transfer);
    assert_eq!(all[2].kind, EntryKind::Expense);

    let expenses = engine
        .entries(
            "alice",
            EntryListFilter {
                kind: Some(EntryKind::Expense),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(expenses.len(), 1);

    let bank_only = engine
        .entries(
            "alice",
            EntryListFilter {
                account_id: Some(bank.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bank_only.len(), 1);

    let ranged = engine
        .entries(
            "alice",
            EntryListFilter {
                from: Some(day(2)),
                to: Some(day(3)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.len(), 1);
    assert_eq!(ranged[0].kind, EntryKind::Income);

    let err = engine
        .entries(
            "alice",
            EntryListFilter {
                from: Some(day(3)),
                to: Some(day(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn archived_accounts_are_hidden_from_listing() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 0).await;
    new_asset(&engine, "Bank", 0).await;

    engine
        .set_account_archived("alice", cash.id, true)
        .await
        .unwrap();

    let visible = engine
        .accounts("alice", AccountListFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name, "Bank");

    let all = engine
        .accounts(
            "alice",
            AccountListFilter {
                include_hidden: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    engine
        .set_account_archived("alice", cash.id, false)
        .await
        .unwrap();
    let visible = engine
        .accounts("alice", AccountListFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 2);
}

#[tokio::test]
async fn delete_account_refuses_while_entries_exist() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 0).await;

    let entry = engine
        .income(SimpleEntryCmd::new("alice", cash.id, 1_000, day(1)))
        .await
        .unwrap();

    let err = engine.delete_account("alice", cash.id).await.unwrap_err();
    assert!(matches!(err, EngineError::DependentDataPresent(_)));

    engine.delete_entry("alice", entry.id).await.unwrap();
    engine.delete_account("alice", cash.id).await.unwrap();
    assert_eq!(
        engine.account("alice", cash.id).await.unwrap_err(),
        EngineError::NotFound("account".to_string())
    );
}

#[tokio::test]
async fn update_account_patches_fields() {
    let (engine, _db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 10_000).await;

    let updated = engine
        .update_account(
            "alice",
            cash.id,
            AccountPatch::default().name("Wallet").balance_minor(12_345),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Wallet");
    assert_eq!(updated.balance_minor, 12_345);

    // a counterparty does not belong on an asset account
    let err = engine
        .update_account("alice", cash.id, AccountPatch::default().counterparty("Alex"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn recompute_repairs_balance_drift() {
    let (engine, db) = engine_with_db().await;
    let cash = new_asset(&engine, "Cash", 50_000).await;

    engine
        .expense(SimpleEntryCmd::new("alice", cash.id, 10_000, day(1)))
        .await
        .unwrap();

    // corrupt the denormalized balance behind the engine's back
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE accounts SET balance_minor = ? WHERE id = ?",
        vec![999_999.into(), cash.id.to_string().into()],
    ))
    .await
    .unwrap();

    engine.recompute_balances("alice").await.unwrap();

    // the opening balance is entry-backed, so the replay restores everything
    let cash = engine.account("alice", cash.id).await.unwrap();
    assert_eq!(cash.balance_minor, 50_000 - 10_000);
}

#[tokio::test]
async fn operations_are_scoped_to_the_owner() {
    let (engine, _db) = engine_with_db().await;
    engine.ensure_user("bob").await.unwrap();
    // registering twice is a no-op
    engine.ensure_user("bob").await.unwrap();

    let cash = new_asset(&engine, "Cash", 10_000).await;

    assert_eq!(
        engine.account("bob", cash.id).await.unwrap_err(),
        EngineError::NotFound("account".to_string())
    );
    let err = engine
        .expense(SimpleEntryCmd::new("bob", cash.id, 1_000, day(1)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("account".to_string()));
}
