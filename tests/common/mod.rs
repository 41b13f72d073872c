//! Scripted transport for driving the link manager and sessions.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use satlink_companion::error::{TransportError, TransportResult};
use satlink_companion::transport::{
    BundleContent, BundleHeader, Connection, ContentBundle, DeliveryCode, DeliveryResult, Imsi,
    PairingConfig, Peripheral, Transport, TransportEvent,
};
use satlink_companion::UserId;

pub fn peripheral(n: u128, name: &str) -> Peripheral {
    Peripheral {
        id: Uuid::from_u128(n),
        name: Some(name.to_string()),
    }
}

pub fn user(raw: &str) -> UserId {
    UserId::parse(raw).unwrap()
}

pub fn connection_for(device: Peripheral, imsi: &str) -> Connection {
    Connection {
        device,
        imsi: Imsi(imsi.to_string()),
        self_id: user("5551234"),
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[derive(Default)]
pub struct Calls {
    pub request_pairing: AtomicUsize,
    pub confirm_pairing: AtomicUsize,
    pub send: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockTransport {
    pub sightings: Mutex<Vec<TransportResult<Peripheral>>>,
    /// Keep the scan stream open after the sightings.
    pub hold_scan: Mutex<bool>,
    /// Never answer pairing requests.
    pub hold_pairing: Mutex<bool>,
    pub linked: Mutex<Option<Connection>>,
    pub pairing_result: Mutex<TransportResult<Imsi>>,
    pub send_error: Mutex<Option<TransportError>>,
    pub emit_on_confirm: bool,
    pub calls: Calls,
    requested: Mutex<Option<(Peripheral, PairingConfig)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    sequence: Mutex<u32>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            sightings: Mutex::new(Vec::new()),
            hold_scan: Mutex::new(false),
            hold_pairing: Mutex::new(false),
            linked: Mutex::new(None),
            pairing_result: Mutex::new(Ok(Imsi("9991".to_string()))),
            send_error: Mutex::new(None),
            emit_on_confirm: true,
            calls: Calls::default(),
            requested: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            sequence: Mutex::new(0),
        }
    }
}

impl MockTransport {
    pub fn emit(&self, event: TransportEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn last_pairing_request(&self) -> Option<(Peripheral, PairingConfig)> {
        self.requested.lock().clone()
    }

    pub fn incoming_text(&self, sequence: u32, partner: &str, text: &str) -> ContentBundle {
        ContentBundle {
            header: BundleHeader {
                sender: Imsi("remote".to_string()),
                sequence,
                created_at: Utc::now(),
            },
            content: BundleContent::text(user(partner), text),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn list_devices(&self) -> BoxStream<'static, TransportResult<Peripheral>> {
        let sightings = stream::iter(self.sightings.lock().clone());
        if *self.hold_scan.lock() {
            sightings.chain(stream::pending()).boxed()
        } else {
            sightings.boxed()
        }
    }

    async fn get_linked_device(&self) -> TransportResult<Option<Connection>> {
        Ok(self.linked.lock().clone())
    }

    async fn request_pairing(
        &self,
        peripheral: &Peripheral,
        config: &PairingConfig,
    ) -> TransportResult<Imsi> {
        self.calls.request_pairing.fetch_add(1, Ordering::SeqCst);
        *self.requested.lock() = Some((peripheral.clone(), config.clone()));
        let hold = *self.hold_pairing.lock();
        if hold {
            futures::future::pending::<()>().await;
        }
        self.pairing_result.lock().clone()
    }

    async fn confirm_pairing(&self) -> TransportResult<Connection> {
        self.calls.confirm_pairing.fetch_add(1, Ordering::SeqCst);
        let (device, config) = self
            .requested
            .lock()
            .clone()
            .ok_or_else(|| TransportError::Rejected("nothing requested".to_string()))?;
        let imsi = self.pairing_result.lock().clone()?;
        let connection = Connection {
            device,
            imsi,
            self_id: config.user_id,
        };
        *self.linked.lock() = Some(connection.clone());
        if self.emit_on_confirm {
            self.emit(TransportEvent::DeviceLinked(connection.clone()));
        }
        Ok(connection)
    }

    async fn remove_linked_device(&self) {
        *self.linked.lock() = None;
        self.emit(TransportEvent::DeviceUnlinked);
    }

    fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn create_content_bundle(
        &self,
        connection: &Connection,
        content: BundleContent,
    ) -> ContentBundle {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        ContentBundle {
            header: BundleHeader {
                sender: connection.imsi.clone(),
                sequence: *sequence,
                created_at: Utc::now(),
            },
            content,
        }
    }

    async fn send(
        &self,
        _connection: &Connection,
        bundle: ContentBundle,
    ) -> TransportResult<DeliveryResult> {
        self.calls.send.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.send_error.lock().clone() {
            return Err(e);
        }
        Ok(DeliveryResult {
            message_id: bundle.message_id(),
            code: DeliveryCode::Queued,
        })
    }
}
