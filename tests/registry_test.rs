// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Session registry lifecycle against the in-memory connector

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use mailwatch::capability::Capability;
use mailwatch::config::WatchConfig;
use mailwatch::error::ManagerError;
use mailwatch::imap::error::ImapError;
use mailwatch::imap::types::WatchEvent;
use mailwatch::registry::SessionRegistry;
use mailwatch::testing::{credentials, MockConnector, RecordingSink};

fn setup() -> (Arc<MockConnector>, Arc<RecordingSink>, SessionRegistry) {
    setup_with(MockConnector::new())
}

fn setup_with(connector: MockConnector) -> (Arc<MockConnector>, Arc<RecordingSink>, SessionRegistry) {
    let connector = Arc::new(connector);
    let sink = Arc::new(RecordingSink::new());
    let registry = SessionRegistry::new(connector.clone(), sink.clone(), WatchConfig::default());
    (connector, sink, registry)
}

#[tokio::test]
async fn test_connect_twice_reuses_session() {
    let (connector, _sink, registry) = setup();
    let creds = credentials("alice");

    let first = registry.connect("alice", &creds).await.unwrap();
    let second = registry.connect("alice", &creds).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.open_count().await, 1);
    assert_eq!(connector.hold_count().await, 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_then_connect_authenticates_again() {
    let (connector, _sink, registry) = setup();
    let creds = credentials("alice");

    let first = registry.connect("alice", &creds).await.unwrap();
    registry.disconnect("alice").await;

    assert!(!first.is_connected());
    assert!(registry.get("alice").await.is_none());
    assert_eq!(connector.release_count().await, 1);
    assert_eq!(connector.logout_count().await, 1);

    let second = registry.connect("alice", &creds).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(connector.open_count().await, 2);
    assert_eq!(connector.hold_count().await, 2);

    registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_open_one_connection() {
    let (connector, _sink, registry) = setup();
    connector.set_open_delay(Duration::from_millis(50)).await;
    let creds = credentials("alice");

    let (a, b) = tokio::join!(registry.connect("alice", &creds), registry.connect("alice", &creds));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(connector.open_count().await, 1);
    assert_eq!(registry.connected_accounts().await, vec!["alice".to_string()]);

    registry.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_initial_count_is_reported_before_watched_changes() {
    for _ in 0..50 {
        let (connector, sink, registry) = setup();
        connector.script_unseen(&[2, 5]).await;
        // Already queued when the watch starts.
        connector.push(WatchEvent::Changed);

        registry.connect("alice", &credentials("alice")).await.unwrap();

        assert!(sink.wait_for(2, Duration::from_secs(2)).await);
        assert_eq!(sink.counts_for("alice").await, vec![2, 5]);

        registry.shutdown().await;
    }
}

#[tokio::test]
async fn test_accounts_are_independent() {
    let (connector, _sink, registry) = setup();

    registry.connect("alice", &credentials("alice")).await.unwrap();
    registry.connect("bob", &credentials("bob")).await.unwrap();
    assert_eq!(connector.open_count().await, 2);

    registry.disconnect("alice").await;
    let bob = registry.get("bob").await.unwrap();
    assert!(bob.is_connected());
    assert_eq!(registry.connected_accounts().await, vec!["bob".to_string()]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_failed_open_registers_nothing() {
    let (connector, sink, registry) = setup();
    connector
        .fail_open(Some(ImapError::Auth("invalid credentials".to_string())))
        .await;

    let err = registry.connect("alice", &credentials("alice")).await.unwrap_err();

    assert_eq!(err.code(), "connection-failure");
    assert!(err.to_string().contains("invalid credentials"));
    assert!(registry.get("alice").await.is_none());
    assert!(sink.events().await.is_empty());
}

#[tokio::test]
async fn test_failed_folder_hold_logs_out_and_registers_nothing() {
    let (connector, _sink, registry) = setup();
    connector
        .fail_hold(Some(ImapError::Mailbox("no such mailbox".to_string())))
        .await;

    let err = registry.connect("alice", &credentials("alice")).await.unwrap_err();

    assert!(matches!(err, ManagerError::ConnectionFailure(_)));
    assert_eq!(connector.logout_count().await, 1);
    assert!(registry.get("alice").await.is_none());
}

#[tokio::test]
async fn test_missing_inbound_capability_is_reported() {
    let (connector, _sink, registry) = setup_with(MockConnector::with_capability(Capability::Unavailable));

    let err = registry.connect("alice", &credentials("alice")).await.unwrap_err();

    assert_eq!(err.code(), "capability-unavailable");
    assert_eq!(connector.open_count().await, 0);
}

#[tokio::test]
async fn test_connect_reports_initial_unread_count() {
    let (connector, sink, registry) = setup();
    connector.script_unseen(&[3]).await;

    let session = registry.connect("alice", &credentials("alice")).await.unwrap();

    assert_eq!(session.unread_count().await, 3);
    assert_eq!(sink.events().await, vec![("alice".to_string(), 3)]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_dropped_session_is_rebuilt_on_connect() {
    let (connector, _sink, registry) = setup();
    let creds = credentials("alice");

    let first = registry.connect("alice", &creds).await.unwrap();
    connector.push_error(ImapError::Disconnected);

    for _ in 0..200 {
        if !first.is_connected() {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert!(!first.is_connected());

    let second = registry.connect("alice", &creds).await.unwrap();
    assert!(second.is_connected());
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(connector.open_count().await, 2);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_unknown_account_is_a_no_op() {
    let (connector, _sink, registry) = setup();
    registry.disconnect("nobody").await;
    assert_eq!(connector.logout_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_disconnects_every_account() {
    let (connector, _sink, registry) = setup();
    registry.connect("alice", &credentials("alice")).await.unwrap();
    registry.connect("bob", &credentials("bob")).await.unwrap();

    registry.shutdown().await;

    assert!(registry.connected_accounts().await.is_empty());
    assert_eq!(connector.logout_count().await, 2);
}
