// Session Lifecycle Tests
// Tests for connect/disconnect, snapshot dispatch, writes and messaging between nodes

use std::time::Duration;
use tokio::time::{sleep, timeout};
use wearsync::identity::PeerId;
use wearsync::messaging::SendOutcome;
use wearsync::network::{NetworkConfig, WearableNetwork};
use wearsync::payload::{Payload, PayloadCodec};
use wearsync::replication::DataEventKind;
use wearsync::session::{
    ChangeOrigin, DataChange, SessionConfig, SessionEvent, SessionEvents, SessionState,
    SyncSession,
};
use wearsync::SyncError;

fn phone_id() -> PeerId {
    PeerId::from("phone")
}

fn watch_id() -> PeerId {
    PeerId::from("watch")
}

fn weather(high: &str, low: &str) -> Payload {
    Payload::new()
        .with_int("weather_id", 800)
        .with_string("weather_temp_max", high)
        .with_string("weather_temp_min", low)
}

fn session(network: &WearableNetwork, id: PeerId) -> (SyncSession, SessionEvents) {
    SyncSession::new(id, network.clone(), SessionConfig::default())
}

/// Connect and consume the connect transitions plus the snapshot
async fn connected(network: &WearableNetwork, id: PeerId) -> (SyncSession, SessionEvents) {
    let (session, mut events) = session(network, id);
    session.connect().await.unwrap();
    let queued = events.drain();
    assert_eq!(queued.len(), 3, "unexpected connect events: {:?}", queued);
    (session, events)
}

async fn next_event(events: &mut SessionEvents) -> SessionEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event stream closed")
}

async fn next_data(events: &mut SessionEvents) -> (ChangeOrigin, Vec<DataChange>) {
    loop {
        if let SessionEvent::DataChanged { origin, changes } = next_event(events).await {
            return (origin, changes);
        }
    }
}

/// Let spawned tasks run, then collect whatever was dispatched
async fn settle(events: &mut SessionEvents) -> Vec<SessionEvent> {
    sleep(Duration::from_millis(50)).await;
    events.drain()
}

// ============================================================================
// CONNECT
// ============================================================================

#[tokio::test]
async fn test_connect_emits_transitions_then_snapshot() {
    let network = WearableNetwork::default();
    let (watch, mut events) = session(&network, watch_id());
    assert_eq!(watch.state(), SessionState::Disconnected);

    watch.connect().await.unwrap();

    assert_eq!(watch.state(), SessionState::Connected);
    assert_eq!(
        events.drain(),
        vec![
            SessionEvent::StateChanged {
                from: SessionState::Disconnected,
                to: SessionState::Connecting,
            },
            SessionEvent::StateChanged {
                from: SessionState::Connecting,
                to: SessionState::Connected,
            },
            SessionEvent::DataChanged {
                origin: ChangeOrigin::Snapshot,
                changes: vec![],
            },
        ]
    );
    assert!(network.is_reachable(&watch_id()));
}

#[tokio::test]
async fn test_connect_twice_is_invalid() {
    let network = WearableNetwork::default();
    let (watch, _events) = connected(&network, watch_id()).await;

    let result = watch.connect().await;

    assert_eq!(
        result,
        Err(SyncError::InvalidTransition {
            from: SessionState::Connected,
            to: SessionState::Connecting,
        })
    );
    assert_eq!(watch.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_connect_refused() {
    let network = WearableNetwork::default();
    network.refuse_connections(&watch_id(), true);
    let (watch, mut events) = session(&network, watch_id());

    let result = watch.connect().await;

    assert!(matches!(result, Err(SyncError::TransportFailure(_))));
    assert_eq!(watch.state(), SessionState::Disconnected);
    assert_eq!(
        events.drain(),
        vec![
            SessionEvent::StateChanged {
                from: SessionState::Disconnected,
                to: SessionState::Connecting,
            },
            SessionEvent::StateChanged {
                from: SessionState::Connecting,
                to: SessionState::Disconnected,
            },
        ]
    );

    network.refuse_connections(&watch_id(), false);
    assert!(watch.connect().await.is_ok());
}

#[tokio::test]
async fn test_connect_timeout() {
    let network = WearableNetwork::new(NetworkConfig::new().with_attach_latency_ms(500));
    let config = SessionConfig::new().with_connect_timeout_ms(20);
    let (watch, _events) = SyncSession::new(watch_id(), network.clone(), config);

    let result = watch.connect().await;

    assert_eq!(
        result,
        Err(SyncError::TransportFailure("connect timed out".to_string()))
    );
    assert_eq!(watch.state(), SessionState::Disconnected);
    assert!(!network.is_reachable(&watch_id()));
}

#[tokio::test]
async fn test_disconnect_while_connecting_discards_late_attach() {
    let network = WearableNetwork::new(NetworkConfig::new().with_attach_latency_ms(100));
    let (watch, _events) = session(&network, watch_id());

    let pending = tokio::spawn({
        let watch = watch.clone();
        async move { watch.connect().await }
    });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(watch.state(), SessionState::Connecting);

    watch.disconnect().unwrap();
    let result = pending.await.unwrap();

    assert_eq!(result, Err(SyncError::NotConnected));
    assert_eq!(watch.state(), SessionState::Disconnected);
    assert!(!network.is_reachable(&watch_id()));
    assert_eq!(network.store().subscriber_count(), 0);
}

// ============================================================================
// SNAPSHOT THEN INCREMENTAL
// ============================================================================

#[tokio::test]
async fn test_snapshot_holds_state_at_connect() {
    let network = WearableNetwork::default();
    let (phone, _phone_events) = connected(&network, phone_id()).await;
    phone.put("weather-data", &weather("72", "58")).await.unwrap();
    phone
        .put("watch-face-config", &Payload::new().with_string("background_colour", "navy"))
        .await
        .unwrap();

    let (watch, mut events) = session(&network, watch_id());
    watch.connect().await.unwrap();

    let (origin, changes) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Snapshot);
    let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["watch-face-config", "weather-data"]);
    assert!(changes.iter().all(|c| c.kind == DataEventKind::Updated));
    assert!(changes.iter().all(|c| c.source == phone_id()));
}

#[tokio::test]
async fn test_put_after_snapshot_is_incremental_and_separate() {
    let network = WearableNetwork::default();
    let (phone, _phone_events) = connected(&network, phone_id()).await;
    phone.put("weather-data", &weather("70", "50")).await.unwrap();

    let (watch, mut events) = session(&network, watch_id());
    watch.connect().await.unwrap();
    let (origin, snapshot) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Snapshot);
    assert_eq!(snapshot.len(), 1);

    phone.put("weather-data", &weather("72", "58")).await.unwrap();

    let (origin, changes) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Incremental);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].payload, weather("72", "58"));

    // Exactly one snapshot for this connection
    let rest = settle(&mut events).await;
    assert!(!rest.iter().any(|e| matches!(
        e,
        SessionEvent::DataChanged {
            origin: ChangeOrigin::Snapshot,
            ..
        }
    )));
}

#[tokio::test]
async fn test_weather_reaches_connected_peer() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;

    phone.put("weather-data", &weather("72", "58")).await.unwrap();

    let (origin, changes) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Incremental);
    assert_eq!(changes.len(), 1);

    let change = &changes[0];
    assert_eq!(change.path, "weather-data");
    assert_eq!(change.payload.get_int("weather_id"), Some(800));
    assert_eq!(change.payload.get_string("weather_temp_max"), Some("72"));
    assert_eq!(change.payload.get_string("weather_temp_min"), Some("58"));

    assert_eq!(
        watch.get_all().unwrap(),
        vec![("weather-data".to_string(), weather("72", "58"))]
    );
    assert_eq!(watch.get("weather-data").unwrap(), Some(weather("72", "58")));
}

#[tokio::test]
async fn test_last_write_wins_for_subscriber() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;

    for high in ["70", "71", "72"] {
        phone.put("weather-data", &weather(high, "58")).await.unwrap();
    }

    let mut seen = Vec::new();
    while seen.last() != Some(&"72".to_string()) {
        let (_, changes) = next_data(&mut events).await;
        for change in changes {
            seen.push(change.payload.get_string("weather_temp_max").unwrap().to_string());
        }
    }

    // Nothing arrives after the final write
    assert!(settle(&mut events).await.is_empty());
    assert_eq!(seen.last().map(String::as_str), Some("72"));
    assert_eq!(
        watch.get("weather-data").unwrap().unwrap().get_string("weather_temp_max"),
        Some("72")
    );
}

#[tokio::test]
async fn test_undecodable_item_skipped() {
    let network = WearableNetwork::default();
    let (_watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;

    network.publish(&phone_id(), "weather-data", vec![0xFF, 0x00]).unwrap();
    phone.put("watch-face-config", &Payload::new()).await.unwrap();

    let (_, changes) = next_data(&mut events).await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "watch-face-config");
}

#[tokio::test]
async fn test_deleted_item_dispatched_with_empty_payload() {
    let network = WearableNetwork::default();
    let (_watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;
    phone.put("weather-data", &weather("72", "58")).await.unwrap();
    next_data(&mut events).await;

    network.store().delete("weather-data", &phone_id()).unwrap();

    let (_, changes) = next_data(&mut events).await;
    assert_eq!(changes[0].kind, DataEventKind::Deleted);
    assert!(changes[0].payload.is_empty());
}

// ============================================================================
// NO WRITES OUTSIDE CONNECTED
// ============================================================================

#[tokio::test]
async fn test_put_before_connect_fails() {
    let network = WearableNetwork::default();
    let (watch, _events) = session(&network, watch_id());

    let result = watch.put("weather-data-request", &Payload::new()).await;

    assert_eq!(result, Err(SyncError::NotConnected));
    assert!(network.store().is_empty());
    assert_eq!(watch.get_all(), Err(SyncError::NotConnected));
}

#[tokio::test]
async fn test_put_unencodable_payload_is_not_published() {
    let network = WearableNetwork::default();
    let (phone, _events) = connected(&network, phone_id()).await;
    let bad = Payload::new().with_string("", "x");

    let result = phone.put("weather-data", &bad).await;

    assert!(matches!(result, Err(SyncError::MalformedPayload(_))));
    assert!(network.store().is_empty());

    let receipt = phone.send(&watch_id(), "weather-data", &bad);
    assert!(!receipt.outcome().await.is_delivered());
}

#[tokio::test]
async fn test_put_after_disconnect_fails() {
    let network = WearableNetwork::default();
    let (watch, _events) = connected(&network, watch_id()).await;
    watch.disconnect().unwrap();

    let result = watch.put("weather-data-request", &Payload::new()).await;

    assert_eq!(result, Err(SyncError::NotConnected));
    assert_eq!(network.store().clock(), 0);
}

#[tokio::test]
async fn test_send_while_disconnected_fails() {
    let network = WearableNetwork::default();
    let (watch, _events) = session(&network, watch_id());

    let outcome = watch
        .send(&phone_id(), "weather-data-request", &Payload::new())
        .outcome()
        .await;

    assert_eq!(outcome, SendOutcome::Failed(SyncError::NotConnected));
}

// ============================================================================
// MESSAGING
// ============================================================================

#[tokio::test]
async fn test_send_to_never_seen_peer_is_unknown() {
    let network = WearableNetwork::default();
    let (watch, _events) = connected(&network, watch_id()).await;
    let (_phone, _phone_events) = connected(&network, phone_id()).await;

    let outcome = watch
        .send(&phone_id(), "weather-data-request", &Payload::new())
        .outcome()
        .await;

    assert_eq!(outcome, SendOutcome::Failed(SyncError::UnknownPeer(phone_id())));
    assert!(watch.known_peers().is_empty());
}

#[tokio::test]
async fn test_reply_to_inbound_peer() {
    let network = WearableNetwork::default();
    let (watch, mut watch_events) = connected(&network, watch_id()).await;
    let (phone, mut phone_events) = connected(&network, phone_id()).await;

    let request = PayloadCodec::encode(&Payload::new()).unwrap();
    network
        .deliver(&watch_id(), &phone_id(), "weather-data-request", request)
        .unwrap();

    let message = match next_event(&mut phone_events).await {
        SessionEvent::MessageReceived(message) => message,
        other => panic!("unexpected event: {:?}", other),
    };
    assert_eq!(message.source, watch_id());
    assert_eq!(phone.known_peers(), vec![watch_id()]);
    assert_eq!(phone.last_peer(), Some(watch_id()));

    let outcome = phone
        .reply(&message, "weather-data", &weather("72", "58"))
        .outcome()
        .await;
    assert_eq!(outcome, SendOutcome::Delivered);

    match next_event(&mut watch_events).await {
        SessionEvent::MessageReceived(reply) => {
            assert_eq!(reply.path, "weather-data");
            assert_eq!(reply.payload, weather("72", "58"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(watch.last_peer(), Some(phone_id()));
}

#[tokio::test]
async fn test_sends_complete_in_issue_order() {
    let network = WearableNetwork::default();
    let (_watch, mut watch_events) = connected(&network, watch_id()).await;
    let (phone, mut phone_events) = connected(&network, phone_id()).await;
    network
        .deliver(
            &watch_id(),
            &phone_id(),
            "weather-data-request",
            PayloadCodec::encode(&Payload::new()).unwrap(),
        )
        .unwrap();
    next_event(&mut phone_events).await;

    let receipts: Vec<_> = (0..4)
        .map(|i| phone.send(&watch_id(), "weather-data", &Payload::new().with_int("seq", i)))
        .collect();
    for receipt in receipts {
        assert!(receipt.outcome().await.is_delivered());
    }

    for expected in 0..4 {
        match next_event(&mut watch_events).await {
            SessionEvent::MessageReceived(message) => {
                assert_eq!(message.payload.get_int("seq"), Some(expected))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(phone.messenger_stats().delivered(), 4);
}

#[tokio::test]
async fn test_malformed_message_dropped_and_session_continues() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (_phone, _phone_events) = connected(&network, phone_id()).await;

    network
        .deliver(&phone_id(), &watch_id(), "weather-data", vec![0xDE, 0xAD, 0xBE, 0xEF])
        .unwrap();
    network
        .deliver(
            &phone_id(),
            &watch_id(),
            "weather-data",
            PayloadCodec::encode(&weather("72", "58")).unwrap(),
        )
        .unwrap();

    match next_event(&mut events).await {
        SessionEvent::MessageReceived(message) => {
            assert_eq!(message.payload, weather("72", "58"))
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(settle(&mut events).await.is_empty());
    assert_eq!(watch.state(), SessionState::Connected);
}

// ============================================================================
// DISCONNECT
// ============================================================================

#[tokio::test]
async fn test_disconnect_releases_everything() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (_phone, _phone_events) = connected(&network, phone_id()).await;
    network
        .deliver(
            &phone_id(),
            &watch_id(),
            "weather-data",
            PayloadCodec::encode(&Payload::new()).unwrap(),
        )
        .unwrap();
    next_event(&mut events).await;
    assert_eq!(network.store().subscriber_count(), 2);

    watch.disconnect().unwrap();

    assert_eq!(watch.state(), SessionState::Disconnected);
    assert!(watch.known_peers().is_empty());
    assert!(watch.last_peer().is_none());
    assert!(!network.is_reachable(&watch_id()));
    assert_eq!(network.store().subscriber_count(), 1);
    assert_eq!(
        events.drain(),
        vec![SessionEvent::StateChanged {
            from: SessionState::Connected,
            to: SessionState::Disconnected,
        }]
    );
}

#[tokio::test]
async fn test_disconnect_when_disconnected_is_invalid() {
    let network = WearableNetwork::default();
    let (watch, _events) = session(&network, watch_id());

    assert!(matches!(
        watch.disconnect(),
        Err(SyncError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_changes_queued_before_disconnect_are_not_dispatched() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;

    // The watch pump has not run yet when it is torn down
    phone.put("weather-data", &weather("72", "58")).await.unwrap();
    watch.disconnect().unwrap();

    let after = settle(&mut events).await;
    assert_eq!(
        after,
        vec![SessionEvent::StateChanged {
            from: SessionState::Connected,
            to: SessionState::Disconnected,
        }]
    );
}

#[tokio::test]
async fn test_reconnect_gets_fresh_snapshot() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;
    watch.disconnect().unwrap();
    events.drain();

    phone.put("weather-data", &weather("72", "58")).await.unwrap();
    watch.connect().await.unwrap();

    let (origin, changes) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Snapshot);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].payload, weather("72", "58"));
}

#[tokio::test]
async fn test_dropping_session_detaches() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;

    drop(watch);

    assert!(!network.is_reachable(&watch_id()));
    assert_eq!(network.store().subscriber_count(), 0);
    assert!(timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// SUSPENSION AND CONNECTION LOSS
// ============================================================================

#[tokio::test]
async fn test_suspend_and_resume() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    let (phone, _phone_events) = connected(&network, phone_id()).await;

    network.suspend(&watch_id());
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StateChanged {
            from: SessionState::Connected,
            to: SessionState::Suspended,
        }
    );
    assert_eq!(
        watch.put("weather-data-request", &Payload::new()).await,
        Err(SyncError::NotConnected)
    );

    // Written while suspended; arrives with the resume snapshot
    phone.put("weather-data", &weather("72", "58")).await.unwrap();
    assert!(settle(&mut events).await.is_empty());

    network.resume(&watch_id());
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StateChanged {
            from: SessionState::Suspended,
            to: SessionState::Connected,
        }
    );
    let (origin, changes) = next_data(&mut events).await;
    assert_eq!(origin, ChangeOrigin::Snapshot);
    assert_eq!(changes[0].payload, weather("72", "58"));

    assert!(watch.put("weather-data-request", &Payload::new()).await.is_ok());
}

#[tokio::test]
async fn test_disconnect_while_suspended() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;
    network.suspend(&watch_id());
    next_event(&mut events).await;

    watch.disconnect().unwrap();

    assert_eq!(watch.state(), SessionState::Disconnected);
    assert!(network.attached_nodes().is_empty());
    assert!(!network.resume(&watch_id()));
}

#[tokio::test]
async fn test_connection_loss_goes_straight_to_disconnected() {
    let network = WearableNetwork::default();
    let (watch, mut events) = connected(&network, watch_id()).await;

    network.sever(&watch_id(), "out of range");

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::StateChanged {
            from: SessionState::Connected,
            to: SessionState::Disconnected,
        }
    );
    assert_eq!(watch.state(), SessionState::Disconnected);
    assert_eq!(network.store().subscriber_count(), 0);
    assert_eq!(
        watch.put("weather-data-request", &Payload::new()).await,
        Err(SyncError::NotConnected)
    );

    // A fresh connect works after loss
    watch.connect().await.unwrap();
    assert!(watch.is_connected());
}
