//! Pairing, link tracking and message flow against a scripted transport.

mod common;

use std::sync::Arc;

use common::{connection_for, eventually, peripheral, user, Calls, MockTransport};
use satlink_companion::error::{PairingError, TransportError, ValidationError};
use satlink_companion::storage::{DeliveryState, Message, MessageStore};
use satlink_companion::transport::{
    ConnectionStatus, DeviceInfo, LinkState, MessageEvent, SatelliteState, Transport,
    TransportEvent,
};
use satlink_companion::ui::{UiEvent, UiSink};
use satlink_companion::{
    LinkManager, PairingSession, PairingState, Scanner, SendOutcome, SendSession, SendState,
};

fn connected_status() -> ConnectionStatus {
    ConnectionStatus {
        bluetooth: LinkState::Connected,
        satellite: SatelliteState::Connected,
        device: DeviceInfo::default(),
    }
}

async fn start(
    transport: Arc<MockTransport>,
) -> (LinkManager, MessageStore, async_channel::Receiver<UiEvent>) {
    let store = MessageStore::in_memory().unwrap();
    let (ui, ui_rx) = UiSink::channel();
    let dyn_transport: Arc<dyn Transport> = transport;
    let link = LinkManager::spawn(dyn_transport, store.clone(), ui).await;
    (link, store, ui_rx)
}

#[tokio::test]
async fn test_scan_pick_pair_links_device() {
    let a = peripheral(1, "Relay A");
    let b = peripheral(2, "Relay B");
    let transport = Arc::new(MockTransport::default());
    *transport.sightings.lock() = vec![Ok(a.clone()), Ok(b.clone()), Ok(a.clone())];

    let (link, store, _ui_rx) = start(transport.clone()).await;
    let (ui, _scan_rx) = UiSink::channel();
    let scanner = Scanner::new(transport.clone(), ui.clone());
    let found = scanner.scan().unwrap().await.unwrap();
    assert_eq!(found, 2);
    assert_eq!(scanner.peripherals(), vec![a.clone(), b]);

    let pairing = PairingSession::new(link.clone(), "Check In Message", ui);
    let picked = scanner.peripheral(0).unwrap();
    let connection = pairing.pair(&picked, "5551234").await.unwrap();

    assert_eq!(connection.device, a);
    assert_eq!(connection.imsi.0, "9991");
    assert!(link.is_linked());
    assert_eq!(link.connection(), Some(connection.clone()));
    assert_eq!(pairing.state(), PairingState::Linked(connection));
    assert_eq!(store.count().unwrap(), 0);

    let (requested, config) = transport.last_pairing_request().unwrap();
    assert_eq!(requested, a);
    assert_eq!(config.user_id, user("5551234"));
    assert_eq!(config.check_in_number, user("5551234"));
    assert_eq!(config.check_in_message, "Check In Message");
}

#[tokio::test]
async fn test_pairing_timeout_fails_without_linking() {
    let transport = Arc::new(MockTransport::default());
    *transport.pairing_result.lock() = Err(TransportError::Timeout);

    let (link, store, ui_rx) = start(transport.clone()).await;
    let pairing = PairingSession::new(link.clone(), "Check In Message", UiSink::channel().0);

    let result = pairing.pair(&peripheral(1, "Relay A"), "5551234").await;
    assert_eq!(result, Err(PairingError::Transport(TransportError::Timeout)));
    assert_eq!(
        pairing.state(),
        PairingState::Failed(PairingError::Transport(TransportError::Timeout))
    );
    assert_eq!(Calls::get(&transport.calls.confirm_pairing), 0);
    assert!(!link.is_linked());
    assert_eq!(store.count().unwrap(), 0);
    drop(ui_rx);
}

#[tokio::test]
async fn test_cancelled_pairing_stays_cancelled() {
    let transport = Arc::new(MockTransport::default());
    *transport.hold_pairing.lock() = true;
    let (link, _store, _link_rx) = start(transport.clone()).await;
    let (ui, ui_rx) = UiSink::channel();
    let pairing = PairingSession::new(link.clone(), "Check In Message", ui);

    let attempt = {
        let pairing = pairing.clone();
        tokio::spawn(async move { pairing.pair(&peripheral(1, "Relay A"), "5551234").await })
    };
    assert!(eventually(|| Calls::get(&transport.calls.request_pairing) == 1).await);
    assert_eq!(pairing.state(), PairingState::RequestingPairing);

    assert!(pairing.cancel());
    assert!(!pairing.is_pairing());
    assert_eq!(attempt.await.unwrap(), Err(PairingError::Cancelled));

    assert_eq!(pairing.state(), PairingState::Failed(PairingError::Cancelled));
    assert_eq!(Calls::get(&transport.calls.confirm_pairing), 0);
    assert!(!link.is_linked());
    while let Ok(event) = ui_rx.try_recv() {
        assert!(
            !matches!(event, UiEvent::PairingFailed(_) | UiEvent::PairingSucceeded(_)),
            "unexpected {:?}",
            event
        );
    }
}

#[tokio::test]
async fn test_late_status_from_previous_device_ignored() {
    let transport = Arc::new(MockTransport::default());
    let (link, _store, _ui_rx) = start(transport.clone()).await;
    let first = connection_for(peripheral(1, "Relay A"), "9991");
    let second = connection_for(peripheral(2, "Relay B"), "9992");

    transport.emit(TransportEvent::DeviceLinked(first.clone()));
    transport.emit(TransportEvent::DeviceLinked(second.clone()));
    transport.emit(TransportEvent::DeviceStatusUpdate {
        connection: first,
        status: connected_status(),
    });
    transport.emit(TransportEvent::DeviceStatusUpdate {
        connection: second.clone(),
        status: ConnectionStatus {
            bluetooth: LinkState::Connecting,
            ..connected_status()
        },
    });

    assert!(eventually(|| link.snapshot().status.is_some()).await);
    let snapshot = link.snapshot();
    assert_eq!(snapshot.connection, Some(second));
    assert_eq!(snapshot.link_state(), LinkState::Connecting);
    assert!(!link.is_connected());
}

#[tokio::test]
async fn test_invalid_user_id_never_reaches_transport() {
    let transport = Arc::new(MockTransport::default());
    let (link, _store, _link_rx) = start(transport.clone()).await;
    let (ui, ui_rx) = UiSink::channel();
    let pairing = PairingSession::new(link.clone(), "Check In Message", ui);

    let result = pairing.pair(&peripheral(1, "Relay A"), "call me").await;
    assert!(matches!(
        result,
        Err(PairingError::InvalidUserId(ValidationError::InvalidUserId(_)))
    ));
    assert_eq!(Calls::get(&transport.calls.request_pairing), 0);
    assert!(!link.is_linked());
    assert!(matches!(ui_rx.try_recv(), Ok(UiEvent::InvalidUserId(_))));

    // The caller may simply try again.
    assert!(pairing.pair(&peripheral(1, "Relay A"), "12345").await.is_ok());
}

#[tokio::test]
async fn test_startup_adopts_linked_device() {
    let transport = Arc::new(MockTransport::default());
    let existing = connection_for(peripheral(7, "Relay"), "42");
    *transport.linked.lock() = Some(existing.clone());

    let (link, _store, _ui_rx) = start(transport).await;
    assert_eq!(link.connection(), Some(existing));
    assert!(!link.is_connected());
}

#[tokio::test]
async fn test_events_update_snapshot_in_order() {
    let transport = Arc::new(MockTransport::default());
    let (link, _store, _ui_rx) = start(transport.clone()).await;
    let connection = connection_for(peripheral(1, "Relay A"), "9991");

    // Status before any link is dropped.
    transport.emit(TransportEvent::DeviceStatusUpdate {
        connection: connection.clone(),
        status: connected_status(),
    });
    transport.emit(TransportEvent::DeviceLinked(connection.clone()));
    assert!(eventually(|| link.is_linked()).await);
    assert!(link.snapshot().status.is_none());

    transport.emit(TransportEvent::DeviceStatusUpdate {
        connection: connection.clone(),
        status: connected_status(),
    });
    assert!(eventually(|| link.is_connected()).await);

    transport.emit(TransportEvent::DeviceUnlinked);
    assert!(eventually(|| !link.is_linked()).await);
    let snapshot = link.snapshot();
    assert!(snapshot.status.is_none());
    assert!(!link.is_connected());
}

#[tokio::test]
async fn test_forget_clears_via_unlink_event() {
    let transport = Arc::new(MockTransport::default());
    *transport.linked.lock() = Some(connection_for(peripheral(1, "Relay A"), "9991"));
    let (link, _store, _ui_rx) = start(transport.clone()).await;
    assert!(link.is_linked());

    link.forget().await;
    assert!(eventually(|| !link.is_linked()).await);
    assert!(transport.linked.lock().is_none());
}

#[tokio::test]
async fn test_received_bundle_stored_once() {
    let transport = Arc::new(MockTransport::default());
    let connection = connection_for(peripheral(1, "Relay A"), "9991");
    *transport.linked.lock() = Some(connection.clone());
    let (_link, store, _ui_rx) = start(transport.clone()).await;

    let bundle = transport.incoming_text(1, "5559876", "over the horizon");
    let message_id = bundle.message_id();
    for _ in 0..2 {
        transport.emit(TransportEvent::Message {
            connection: connection.clone(),
            event: MessageEvent::BundleReceived(bundle.clone()),
        });
    }

    assert!(eventually(|| store.count().unwrap() == 1).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(store.count().unwrap(), 1);

    let message = store.get(&message_id).unwrap().unwrap();
    assert_eq!(message.partner, user("5559876"));
    assert!(!message.is_sending);
    assert_eq!(message.state, DeliveryState::Received);
}

#[tokio::test]
async fn test_send_without_connection_is_noop() {
    let transport = Arc::new(MockTransport::default());
    let (link, store, _ui_rx) = start(transport.clone()).await;
    let sender = SendSession::new(link, store.clone(), false, UiSink::channel().0);

    let outcome = sender.send(&user("5559876"), "hello").await.unwrap();
    assert_eq!(outcome, SendOutcome::NotLinked);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(Calls::get(&transport.calls.send), 0);
    assert_eq!(sender.state(), None);
}

#[tokio::test]
async fn test_successful_send_marks_only_its_message() {
    let transport = Arc::new(MockTransport::default());
    *transport.linked.lock() = Some(connection_for(peripheral(1, "Relay A"), "9991"));
    let (link, store, _ui_rx) = start(transport.clone()).await;

    let stuck = Message::outgoing("older".into(), user("5559876"), "earlier");
    store.insert(&stuck).unwrap();

    let sender = SendSession::new(link, store.clone(), false, UiSink::channel().0);
    let outcome = sender.send(&user("5559876"), "hello").await.unwrap();
    let SendOutcome::Acknowledged(result) = outcome else {
        panic!("expected acknowledgement, got {:?}", outcome);
    };
    assert_eq!(sender.state(), Some(SendState::Acknowledged));

    let sent = store.get(&result.message_id).unwrap().unwrap();
    assert_eq!(sent.state, DeliveryState::Sent);
    assert!(sent.is_sending);
    assert_eq!(sent.content, "hello");

    let untouched = store.get(&"older".into()).unwrap().unwrap();
    assert_eq!(untouched.state, DeliveryState::Sending);
}

#[tokio::test]
async fn test_failed_send_stays_sending() {
    let transport = Arc::new(MockTransport::default());
    *transport.linked.lock() = Some(connection_for(peripheral(1, "Relay A"), "9991"));
    *transport.send_error.lock() = Some(TransportError::Timeout);
    let (link, store, _ui_rx) = start(transport.clone()).await;

    let sender = SendSession::new(link, store.clone(), false, UiSink::channel().0);
    assert!(sender.send(&user("5559876"), "hello").await.is_err());
    assert_eq!(sender.state(), Some(SendState::Failed));

    let messages = store.messages_for(&user("5559876")).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].state, DeliveryState::Sending);
}

#[tokio::test]
async fn test_failed_send_marked_when_configured() {
    let transport = Arc::new(MockTransport::default());
    *transport.linked.lock() = Some(connection_for(peripheral(1, "Relay A"), "9991"));
    *transport.send_error.lock() = Some(TransportError::Disconnected);
    let (link, store, _ui_rx) = start(transport.clone()).await;

    let sender = SendSession::new(link, store.clone(), true, UiSink::channel().0);
    let handle = sender.submit(user("5559876"), "hello".to_string());
    assert!(handle.await.unwrap().is_err());

    let messages = store.messages_for(&user("5559876")).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].state, DeliveryState::Failed);
}
