// Messenger Tests
// Tests for the bounded dispatch queue and peer directory

use wearsync::identity::PeerId;
use wearsync::messaging::{Messenger, PeerDirectory, SendOutcome};
use wearsync::network::{LinkEvent, WearableNetwork};
use wearsync::SyncError;

fn phone() -> PeerId {
    PeerId::from("phone")
}

fn watch() -> PeerId {
    PeerId::from("watch")
}

// ============================================================================
// DISPATCH
// ============================================================================

#[tokio::test]
async fn test_message_delivered() {
    let network = WearableNetwork::default();
    let _phone_link = network.attach(&phone()).await.unwrap();
    let mut watch_link = network.attach(&watch()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 8);

    let receipt = messenger.submit(&phone(), &watch(), "weather-data", vec![7]);

    assert_eq!(receipt.outcome().await, SendOutcome::Delivered);
    match watch_link.recv().await {
        Some(LinkEvent::Message(message)) => {
            assert_eq!(message.source(), &phone());
            assert_eq!(message.path(), "weather-data");
            assert_eq!(message.data(), &[7]);
        }
        other => panic!("unexpected link event: {:?}", other),
    }
    assert_eq!(messenger.stats().delivered(), 1);
}

#[tokio::test]
async fn test_messages_arrive_in_issue_order() {
    let network = WearableNetwork::default();
    let _phone_link = network.attach(&phone()).await.unwrap();
    let mut watch_link = network.attach(&watch()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 8);

    let receipts: Vec<_> = (0u8..5)
        .map(|i| messenger.submit(&phone(), &watch(), "weather-data", vec![i]))
        .collect();
    for receipt in receipts {
        assert!(receipt.outcome().await.is_delivered());
    }

    for expected in 0u8..5 {
        match watch_link.recv().await {
            Some(LinkEvent::Message(message)) => assert_eq!(message.data(), &[expected]),
            other => panic!("unexpected link event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_unattached_target_is_unknown_peer() {
    let network = WearableNetwork::default();
    let _phone_link = network.attach(&phone()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 8);

    let outcome = messenger
        .submit(&phone(), &watch(), "weather-data", vec![])
        .outcome()
        .await;

    assert_eq!(outcome, SendOutcome::Failed(SyncError::UnknownPeer(watch())));
    assert_eq!(messenger.stats().failed(), 1);
}

#[tokio::test]
async fn test_unattached_source_is_not_connected() {
    let network = WearableNetwork::default();
    let _watch_link = network.attach(&watch()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 8);

    let outcome = messenger
        .submit(&phone(), &watch(), "weather-data", vec![])
        .outcome()
        .await;

    assert_eq!(outcome.error(), Some(&SyncError::NotConnected));
}

#[tokio::test]
async fn test_full_queue_fails_immediately() {
    let network = WearableNetwork::default();
    let _phone_link = network.attach(&phone()).await.unwrap();
    let _watch_link = network.attach(&watch()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 1);

    // The worker cannot run until this task yields, so the queue stays full
    let first = messenger.submit(&phone(), &watch(), "weather-data", vec![1]);
    let second = messenger.submit(&phone(), &watch(), "weather-data", vec![2]);

    assert_eq!(
        second.outcome().await,
        SendOutcome::Failed(SyncError::TransportFailure("dispatch queue full".to_string()))
    );
    assert_eq!(first.outcome().await, SendOutcome::Delivered);
    assert_eq!(messenger.stats().submitted(), 1);
}

#[tokio::test]
async fn test_suspended_target_is_unknown_peer() {
    let network = WearableNetwork::default();
    let _phone_link = network.attach(&phone()).await.unwrap();
    let _watch_link = network.attach(&watch()).await.unwrap();
    let messenger = Messenger::spawn(network.clone(), 8);

    network.suspend(&watch());
    let outcome = messenger
        .submit(&phone(), &watch(), "weather-data", vec![])
        .outcome()
        .await;

    assert!(matches!(outcome, SendOutcome::Failed(SyncError::UnknownPeer(_))));
}

// ============================================================================
// PEER DIRECTORY
// ============================================================================

#[test]
fn test_directory_learns_from_inbound() {
    let mut directory = PeerDirectory::new();
    assert!(directory.is_empty());
    assert!(directory.last_inbound().is_none());

    directory.record_inbound(&phone(), "weather-data");
    directory.record_inbound(&watch(), "weather-data-request");
    directory.record_inbound(&phone(), "weather-data");

    assert_eq!(directory.len(), 2);
    assert!(directory.contains(&phone()));
    assert_eq!(directory.last_inbound(), Some(&phone()));
    assert_eq!(directory.get(&phone()).unwrap().messages_received(), 2);
    assert_eq!(directory.peers(), vec![phone(), watch()]);
}

#[test]
fn test_directory_clear() {
    let mut directory = PeerDirectory::new();
    directory.record_inbound(&phone(), "weather-data");

    directory.clear();

    assert!(!directory.contains(&phone()));
    assert!(directory.last_inbound().is_none());
}
