// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Watch loop behaviour: unread re-queries, duplicate suppression, interrupts

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use mailwatch::config::WatchConfig;
use mailwatch::imap::types::WatchEvent;
use mailwatch::registry::SessionRegistry;
use mailwatch::testing::{credentials, MockConnector, RecordingSink};

fn setup(idle_timeout: Duration) -> (Arc<MockConnector>, Arc<RecordingSink>, SessionRegistry) {
    let connector = Arc::new(MockConnector::new());
    let sink = Arc::new(RecordingSink::new());
    let config = WatchConfig {
        idle_timeout,
        ..WatchConfig::default()
    };
    let registry = SessionRegistry::new(connector.clone(), sink.clone(), config);
    (connector, sink, registry)
}

async fn wait_for_unseen_queries(connector: &MockConnector, n: u32) {
    for _ in 0..400 {
        if connector.unseen_count().await >= n {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} unseen queries, saw {}", n, connector.unseen_count().await);
}

#[tokio::test]
async fn test_repeated_counts_are_not_renotified() {
    let (connector, sink, registry) = setup(Duration::from_secs(60));
    connector.script_unseen(&[2, 2, 5, 5, 0]).await;

    registry.connect("alice", &credentials("alice")).await.unwrap();
    for _ in 0..4 {
        connector.push(WatchEvent::Changed);
    }

    wait_for_unseen_queries(&connector, 5).await;
    assert!(sink.wait_for(3, Duration::from_secs(2)).await);
    sleep(Duration::from_millis(20)).await;

    assert_eq!(sink.counts_for("alice").await, vec![2, 5, 0]);
    let session = registry.get("alice").await.unwrap();
    assert_eq!(session.unread_count().await, 0);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_unrelated_events_do_not_query() {
    let (connector, sink, registry) = setup(Duration::from_secs(60));
    connector.script_unseen(&[1, 4]).await;

    registry.connect("alice", &credentials("alice")).await.unwrap();
    connector.push(WatchEvent::Unrelated);
    connector.push(WatchEvent::Timeout);
    connector.push(WatchEvent::Changed);

    wait_for_unseen_queries(&connector, 2).await;
    assert!(sink.wait_for(2, Duration::from_secs(2)).await);
    assert_eq!(connector.unseen_count().await, 2);
    assert_eq!(sink.counts_for("alice").await, vec![1, 4]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_short_idle_timeout_rearms_without_notifying() {
    let (connector, sink, registry) = setup(Duration::from_millis(10));
    connector.script_unseen(&[7]).await;

    let session = registry.connect("alice", &credentials("alice")).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    assert!(session.is_connected());
    assert_eq!(connector.unseen_count().await, 1);
    assert_eq!(sink.counts_for("alice").await, vec![7]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_handler_interrupts_idle() {
    let (connector, _sink, registry) = setup(Duration::from_secs(60));
    connector.fill_mailbox(5).await;

    let session = registry.connect("alice", &credentials("alice")).await.unwrap();
    // Let the loop enter its wait.
    sleep(Duration::from_millis(20)).await;

    let headers = timeout(Duration::from_secs(2), session.list_headers(2))
        .await
        .expect("listing should not wait for the idle timeout")
        .unwrap();
    assert_eq!(headers.len(), 2);

    // The loop keeps watching after the handler is done.
    connector.script_unseen(&[9]).await;
    connector.push(WatchEvent::Changed);
    wait_for_unseen_queries(&connector, 2).await;
    assert!(session.is_connected());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_change_seen_during_listing_triggers_requery() {
    let (connector, sink, registry) = setup(Duration::from_secs(60));
    connector.fill_mailbox(3).await;
    connector.script_unseen(&[1, 2]).await;

    let session = registry.connect("alice", &credentials("alice")).await.unwrap();
    sleep(Duration::from_millis(20)).await;

    // New mail lands while the handler, not IDLE, owns the connection.
    connector.report_change_during_next_command().await;
    let headers = session.list_headers(3).await.unwrap();
    assert_eq!(headers.len(), 3);

    wait_for_unseen_queries(&connector, 2).await;
    assert!(sink.wait_for(2, Duration::from_secs(2)).await);
    assert_eq!(sink.counts_for("alice").await, vec![1, 2]);
    assert_eq!(session.unread_count().await, 2);

    registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_change_seen_during_fetch_triggers_requery_multi_thread() {
    let (connector, sink, registry) = setup(Duration::from_secs(60));
    connector.fill_mailbox(1).await;
    connector.script_unseen(&[0, 1]).await;

    let session = registry.connect("alice", &credentials("alice")).await.unwrap();
    connector.report_change_during_next_command().await;
    assert!(session.fetch_source(1001).await.unwrap().is_some());

    wait_for_unseen_queries(&connector, 2).await;
    assert!(sink.wait_for(2, Duration::from_secs(2)).await);
    assert_eq!(sink.counts_for("alice").await, vec![0, 1]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_stops_idling_loop_promptly() {
    let (connector, _sink, registry) = setup(Duration::from_secs(60));
    let session = registry.connect("alice", &credentials("alice")).await.unwrap();
    sleep(Duration::from_millis(20)).await;

    timeout(Duration::from_secs(2), registry.disconnect("alice"))
        .await
        .expect("disconnect should interrupt the watch");

    assert!(!session.is_connected());
    assert_eq!(connector.logout_count().await, 1);
}
