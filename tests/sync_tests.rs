use chart_playlist_sync::api::mock::MockCatalog;
use chart_playlist_sync::cancel::CancelToken;
use chart_playlist_sync::error::SyncError;
use chart_playlist_sync::models::{BulkOp, CatalogItem, ChartEntry, KeyValues, TicketStatus};
use chart_playlist_sync::retry::RetryConfig;
use chart_playlist_sync::sync::{CatalogSynchronizer, SyncOptions};
use std::sync::Arc;
use std::time::Duration;

fn quick_opts() -> SyncOptions {
    SyncOptions {
        page_size: 300,
        poll_interval: Duration::from_millis(2),
        poll_max_attempts: 50,
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
    }
}

fn synchronizer(catalog: &Arc<MockCatalog>) -> CatalogSynchronizer {
    CatalogSynchronizer::new(catalog.clone(), quick_opts(), CancelToken::new())
}

fn materialized(n: usize) -> CatalogItem {
    CatalogItem {
        song_id: Some(format!("SO{:06}", n)),
        song_name: format!("Song {}", n),
        artist_name: format!("Artist {}", n),
        ..Default::default()
    }
}

fn entries(pairs: &[(&str, &str)]) -> Vec<ChartEntry> {
    pairs
        .iter()
        .map(|(song, artist)| ChartEntry::new(*song, *artist))
        .collect()
}

#[tokio::test]
async fn pagination_accumulates_the_reported_total() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.seed_items((0..301).map(materialized).collect());

    synchronizer(&catalog).drain("CA1").await.expect("drain");

    // 301 items at page size 300 means exactly two read calls
    assert_eq!(catalog.read_call_count(), 2);
    let bulks = catalog.bulk_calls();
    assert_eq!(bulks.len(), 1);
    assert_eq!(bulks[0].len(), 301);
    assert!(bulks[0].iter().all(|op| matches!(op, BulkOp::Delete { .. })));
    assert!(catalog.items_snapshot().is_empty());
}

#[tokio::test]
async fn drain_deletes_only_materialized_items() {
    let catalog = Arc::new(MockCatalog::new());
    let mut pending = CatalogItem::default();
    pending.song_name = "not yet indexed".into();
    catalog.seed_items(vec![materialized(1), pending, materialized(2)]);

    synchronizer(&catalog).drain("CA1").await.expect("drain");

    let bulks = catalog.bulk_calls();
    assert_eq!(
        bulks[0],
        vec![BulkOp::delete("SO000001"), BulkOp::delete("SO000002")]
    );
}

#[tokio::test]
async fn empty_catalog_drain_issues_no_bulk_update() {
    let catalog = Arc::new(MockCatalog::new());
    synchronizer(&catalog).drain("CA1").await.expect("drain");
    assert!(catalog.bulk_calls().is_empty());
    assert_eq!(catalog.read_call_count(), 1);
}

#[tokio::test]
async fn fill_assigns_dense_indices_in_chart_order() {
    let catalog = Arc::new(MockCatalog::new());
    let chart = entries(&[("A", "X"), ("B", "Y"), ("C", "Z")]);

    synchronizer(&catalog).fill("CA1", &chart).await.expect("fill");

    let bulks = catalog.bulk_calls();
    assert_eq!(bulks.len(), 1);
    assert_eq!(
        bulks[0],
        vec![
            BulkOp::Update {
                song_name: "A".into(),
                artist_name: "X".into(),
                item_keyvalues: KeyValues { index: 0 },
            },
            BulkOp::Update {
                song_name: "B".into(),
                artist_name: "Y".into(),
                item_keyvalues: KeyValues { index: 1 },
            },
            BulkOp::Update {
                song_name: "C".into(),
                artist_name: "Z".into(),
                item_keyvalues: KeyValues { index: 2 },
            },
        ]
    );
}

#[tokio::test]
async fn fill_with_no_entries_issues_no_bulk_update() {
    let catalog = Arc::new(MockCatalog::new());
    synchronizer(&catalog).fill("CA1", &[]).await.expect("fill");
    assert!(catalog.bulk_calls().is_empty());
}

#[tokio::test]
async fn resolve_recovers_chart_order_from_scrambled_reads() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track:tA");
    catalog.resolve_track("B", "Y", "rdio-DE:track:tB");
    catalog.resolve_track("C", "Z", "rdio-DE:track:tC");

    let sync = synchronizer(&catalog);
    sync.fill("CA1", &entries(&[("A", "X"), ("B", "Y"), ("C", "Z")]))
        .await
        .expect("fill");
    // reads are allowed to return items in any order
    catalog.reorder_items(&[2, 0, 1]);

    let keys = sync.resolve_order("CA1").await.expect("resolve");
    assert_eq!(keys, vec!["tA", "tB", "tC"]);
}

#[tokio::test]
async fn unresolved_items_are_skipped_without_breaking_order() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track:tA");
    // B stays without candidate tracks
    catalog.resolve_track("C", "Z", "rdio-DE:track:tC");

    let sync = synchronizer(&catalog);
    let keys = sync
        .sync("CA1", &entries(&[("A", "X"), ("B", "Y"), ("C", "Z")]))
        .await
        .expect("sync");
    assert_eq!(keys, vec!["tA", "tC"]);
}

#[tokio::test]
async fn malformed_foreign_id_contributes_no_key() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track");
    catalog.resolve_track("B", "Y", "rdio-DE:track:tB");

    let sync = synchronizer(&catalog);
    let keys = sync
        .sync("CA1", &entries(&[("A", "X"), ("B", "Y")]))
        .await
        .expect("sync");
    assert_eq!(keys, vec!["tB"]);
}

#[tokio::test]
async fn failed_drain_ticket_stops_the_run_before_fill() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.seed_items(vec![materialized(1)]);
    catalog.push_ticket_script(vec![TicketStatus::Other("error".into())]);

    let result = synchronizer(&catalog)
        .sync("CA1", &entries(&[("A", "X")]))
        .await;

    match result {
        Err(SyncError::TicketFailed { status, .. }) => assert_eq!(status, "error"),
        other => panic!("expected TicketFailed, got {:?}", other.map(|_| ())),
    }
    // only the drain bulk went out
    assert_eq!(catalog.bulk_calls().len(), 1);
}

#[tokio::test]
async fn fill_waits_for_pending_ticket_before_resolving() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track:tA");
    catalog.push_ticket_script(vec![
        TicketStatus::Pending,
        TicketStatus::Pending,
        TicketStatus::Complete,
    ]);

    let keys = synchronizer(&catalog)
        .sync("CA1", &entries(&[("A", "X")]))
        .await
        .expect("sync");

    assert_eq!(keys, vec!["tA"]);
    // empty drain issues no bulk, so the fill ticket is the first one
    let ticket = chart_playlist_sync::models::Ticket("ticket-0".into());
    assert_eq!(catalog.status_call_count(&ticket), 3);
}

#[tokio::test]
async fn cancelled_token_prevents_any_remote_call() {
    let catalog = Arc::new(MockCatalog::new());
    let cancel = CancelToken::new();
    cancel.cancel();
    let sync = CatalogSynchronizer::new(catalog.clone(), quick_opts(), cancel);

    let result = sync.sync("CA1", &entries(&[("A", "X")])).await;
    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(catalog.read_call_count(), 0);
    assert!(catalog.bulk_calls().is_empty());
}

#[tokio::test]
async fn cancel_during_ticket_poll_aborts_without_further_mutations() {
    let catalog = Arc::new(MockCatalog::new());
    // a ticket that never completes
    catalog.push_ticket_script(vec![TicketStatus::Pending]);
    let cancel = CancelToken::new();
    let opts = SyncOptions {
        poll_max_attempts: 100_000,
        ..quick_opts()
    };
    let sync = CatalogSynchronizer::new(catalog.clone(), opts, cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let result = sync.sync("CA1", &entries(&[("A", "X")])).await;
    assert!(matches!(result, Err(SyncError::Cancelled)));
    // drain was empty; only the fill bulk was ever submitted
    assert_eq!(catalog.bulk_calls().len(), 1);
}

#[tokio::test]
async fn rerun_after_failure_starts_from_a_clean_drain() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track:tA");
    catalog.push_ticket_script(vec![TicketStatus::Other("error".into())]);

    let sync = synchronizer(&catalog);
    let chart = entries(&[("A", "X")]);
    // first run fails at the fill ticket, leaving items behind
    assert!(sync.sync("CA1", &chart).await.is_err());
    assert_eq!(catalog.items_snapshot().len(), 1);

    // second run drains the leftovers and converges
    let keys = sync.sync("CA1", &chart).await.expect("second run");
    assert_eq!(keys, vec!["tA"]);
    assert_eq!(catalog.items_snapshot().len(), 1);
}

#[tokio::test]
async fn sync_round_trip_materializes_indexed_items() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.resolve_track("A", "X", "rdio-DE:track:tA");

    let sync = synchronizer(&catalog);
    let keys = sync.sync("CA1", &entries(&[("A", "X")])).await.expect("sync");
    assert_eq!(keys, vec!["tA"]);

    // the materialized item kept its index keyvalue as written
    let items = catalog.items_snapshot();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].order_index(), Some(0));
    assert_eq!(items[0].first_track_key(), Some("tA"));
}
