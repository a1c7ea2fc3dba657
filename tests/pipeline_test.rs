use capgains::datasource::MockTransactionSource;
use capgains::db::{MemorySnapshotStore, SnapshotStore};
use capgains::domain::{Account, Currency, Decimal, Scope, TimeMs, Transaction, TransactionType, DAY_MS};
use capgains::engine::{LedgerError, Portfolio, ValidationKind};
use capgains::pipeline::{ReportError, ReportingPipeline, UnrealizedSection};
use capgains::pricing::StaticPriceOracle;
use std::sync::Arc;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn scope() -> Scope {
    Scope::new("personal")
}

fn trade(id: i64, from: (&str, &str), to: (&str, &str), usd: &str, day: i64) -> Transaction {
    Transaction {
        id,
        kind: TransactionType::Trade,
        external_id: None,
        from_account: Account::named("Coinbase"),
        from_currency: Currency::new(from.0),
        from_amount: d(from.1),
        to_account: Account::named("Coinbase"),
        to_currency: Currency::new(to.0),
        to_amount: d(to.1),
        usd_value: d(usd),
        fee: Decimal::zero(),
        transacted_at: TimeMs::new(day * DAY_MS),
    }
}

fn genesis() -> Portfolio {
    Portfolio::new(scope(), TimeMs::new(0), Currency::new("USD"))
}

/// Buy 2 BTC, buy 3 BTC, sell 4 BTC, then a long-term ETH round trip.
fn ledger() -> Vec<Transaction> {
    vec![
        trade(1, ("USD", "20"), ("BTC", "2"), "20", 1),
        trade(2, ("USD", "60"), ("BTC", "3"), "60", 2),
        trade(3, ("BTC", "4"), ("USD", "60"), "60", 3),
        trade(4, ("USD", "100"), ("ETH", "1"), "100", 4),
        trade(5, ("ETH", "1"), ("USD", "150"), "150", 400),
    ]
}

fn oracle() -> StaticPriceOracle {
    StaticPriceOracle::new().with_price(Currency::new("BTC"), TimeMs::new(500 * DAY_MS), d("50"))
}

fn pipeline(
    source: MockTransactionSource,
    oracle: StaticPriceOracle,
    store: Arc<MemorySnapshotStore>,
) -> ReportingPipeline {
    ReportingPipeline::new(Arc::new(source), Arc::new(oracle), store).with_page_size(2)
}

#[tokio::test]
async fn test_report_totals_and_snapshot() {
    let store = Arc::new(MemorySnapshotStore::new());
    let source = MockTransactionSource::new().with_transactions(&scope(), ledger());
    let report = pipeline(source.clone(), oracle(), store.clone())
        .run(genesis(), TimeMs::new(500 * DAY_MS))
        .await
        .unwrap();

    assert_eq!(report.transactions_processed, 5);
    assert_eq!(report.short_term.gain, Decimal::zero());
    assert_eq!(report.short_term.details.len(), 1);
    assert_eq!(report.short_term.details[0].currency, Currency::new("BTC"));
    assert_eq!(report.short_term.details[0].total_quantity, d("4"));
    assert_eq!(report.long_term.gain, d("50"));
    assert_eq!(report.long_term.details[0].currency, Currency::new("ETH"));

    // Five transactions at two per page.
    assert_eq!(source.fetch_count(), 3);

    match &report.unrealized {
        UnrealizedSection::Available(unrealized) => {
            // 1 BTC left at cost 20, marked at 50.
            assert_eq!(unrealized.total_unrealized_gain, d("30"));
        }
        other => panic!("Expected Available, got {:?}", other),
    }

    let saved = store.load(&scope(), TimeMs::new(500 * DAY_MS)).await.unwrap();
    assert_eq!(saved.as_of(), TimeMs::new(500 * DAY_MS));
    assert_eq!(
        saved.wallet(&Currency::new("BTC")).unwrap().outstanding_quantity(),
        d("1")
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let source = MockTransactionSource::new().with_transactions(&scope(), ledger());
    let end = TimeMs::new(500 * DAY_MS);

    let first_store = Arc::new(MemorySnapshotStore::new());
    let first = pipeline(source.clone(), oracle(), first_store.clone())
        .run(genesis(), end)
        .await
        .unwrap();
    let second_store = Arc::new(MemorySnapshotStore::new());
    let second = pipeline(source, oracle(), second_store.clone())
        .run(genesis(), end)
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.short_term, second.short_term);
    assert_eq!(first.long_term, second.long_term);
    assert_eq!(first.unrealized, second.unrealized);
    assert_eq!(first.snapshot.digest, second.snapshot.digest);
    assert_eq!(
        first_store.encoded(&scope(), end).await,
        second_store.encoded(&scope(), end).await
    );
}

#[tokio::test]
async fn test_chained_runs_match_single_run() {
    let source = MockTransactionSource::new().with_transactions(&scope(), ledger());
    let store = Arc::new(MemorySnapshotStore::new());
    let pipeline = pipeline(source, oracle(), store.clone());

    let middle = TimeMs::new(3 * DAY_MS);
    let end = TimeMs::new(500 * DAY_MS);
    let first = pipeline.run(genesis(), middle).await.unwrap();
    let resumed = store.load(&scope(), middle).await.unwrap();
    let second = pipeline.run(resumed, end).await.unwrap();

    // Transaction 3 sits exactly on the boundary and belongs to the second window.
    assert_eq!(first.transactions_processed, 2);
    assert_eq!(second.transactions_processed, 3);

    let single_store = Arc::new(MemorySnapshotStore::new());
    let single = ReportingPipeline::new(
        Arc::new(MockTransactionSource::new().with_transactions(&scope(), ledger())),
        Arc::new(oracle()),
        single_store,
    )
    .run(genesis(), end)
    .await
    .unwrap();
    assert_eq!(second.snapshot.digest, single.snapshot.digest);
}

#[tokio::test]
async fn test_transactions_at_end_are_excluded() {
    let store = Arc::new(MemorySnapshotStore::new());
    let mut txns = ledger();
    txns.push(trade(6, ("USD", "10"), ("BTC", "1"), "10", 500));
    // The source ignores the window end; the pipeline must still stop.
    let source = MockTransactionSource::new()
        .with_transactions(&scope(), txns)
        .ignoring_window_end();

    let report = pipeline(source, oracle(), store.clone())
        .run(genesis(), TimeMs::new(500 * DAY_MS))
        .await
        .unwrap();
    assert_eq!(report.transactions_processed, 5);
}

#[tokio::test]
async fn test_insufficient_lots_aborts_without_persisting() {
    let store = Arc::new(MemorySnapshotStore::new());
    let source = MockTransactionSource::new().with_transactions(
        &scope(),
        vec![
            trade(1, ("USD", "10"), ("BTC", "1"), "10", 1),
            trade(2, ("BTC", "2"), ("USD", "30"), "30", 2),
        ],
    );

    let err = pipeline(source, oracle(), store.clone())
        .run(genesis(), TimeMs::new(10 * DAY_MS))
        .await
        .unwrap_err();

    match err {
        ReportError::Ledger(LedgerError::InsufficientLots { transaction_id, .. }) => {
            assert_eq!(transaction_id, 2)
        }
        other => panic!("Expected InsufficientLots, got {:?}", other),
    }
    assert!(store.list(&scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_aborts() {
    let store = Arc::new(MemorySnapshotStore::new().with_failing_saves());
    let source = MockTransactionSource::new().with_transactions(&scope(), ledger());

    let err = pipeline(source, oracle(), store)
        .run(genesis(), TimeMs::new(500 * DAY_MS))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Snapshot(_)));
}

#[tokio::test]
async fn test_transaction_before_as_of_is_rejected() {
    let store = Arc::new(MemorySnapshotStore::new());
    let start = Portfolio::new(scope(), TimeMs::new(5 * DAY_MS), Currency::new("USD"));
    let source = MockTransactionSource::new()
        .with_transaction(&scope(), trade(1, ("USD", "10"), ("BTC", "1"), "10", 1))
        .ignoring_window_start();

    let err = pipeline(source, oracle(), store.clone())
        .run(start, TimeMs::new(6 * DAY_MS))
        .await
        .unwrap_err();

    match err {
        ReportError::Ledger(LedgerError::Validation {
            transaction_id,
            kind: ValidationKind::OutOfOrder { as_of },
            ..
        }) => {
            assert_eq!(transaction_id, 1);
            assert_eq!(as_of, TimeMs::new(5 * DAY_MS));
        }
        other => panic!("Expected OutOfOrder, got {:?}", other),
    }
    assert!(store.list(&scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_price_degrades_unrealized_only() {
    let store = Arc::new(MemorySnapshotStore::new());
    let source = MockTransactionSource::new().with_transactions(&scope(), ledger());

    let report = pipeline(source, StaticPriceOracle::new(), store.clone())
        .run(genesis(), TimeMs::new(500 * DAY_MS))
        .await
        .unwrap();

    assert_eq!(report.long_term.gain, d("50"));
    match report.unrealized {
        UnrealizedSection::Unavailable { currency, at, .. } => {
            assert_eq!(currency, Currency::new("BTC"));
            assert_eq!(at, TimeMs::new(500 * DAY_MS));
        }
        other => panic!("Expected Unavailable, got {:?}", other),
    }
    assert_eq!(store.list(&scope()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_window_rejected() {
    let store = Arc::new(MemorySnapshotStore::new());
    let err = pipeline(MockTransactionSource::new(), oracle(), store)
        .run(genesis(), TimeMs::new(0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidWindow { .. }));
}
