// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-process relay device.
//!
//! Behaves like a paired satellite relay: it advertises during scans,
//! answers pairing requests, reports link status, accepts bundles and
//! optionally has the partner echo text messages back.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bundle::{BundleContent, BundleHeader, ContentBundle};
use super::types::{
    Connection, ConnectionStatus, DeliveryCode, DeliveryResult, DeviceInfo, Imsi, LinkState,
    PairingConfig, Peripheral, SatelliteState,
};
use super::{MessageEvent, Transport, TransportEvent};
use crate::config::SimulatorConfig;
use crate::error::{TransportError, TransportResult};
use crate::storage::LinkedDeviceStore;
use crate::user_id::UserId;

const FIRMWARE_VERSION: &str = "2.4.1";
/// Time the satellite link takes to come up after Bluetooth connects.
const SATELLITE_ACQUIRE_DELAY: Duration = Duration::from_millis(1_500);
/// Delay before the partner's echo arrives.
const ECHO_DELAY: Duration = Duration::from_secs(2);

/// Stable peripheral id for a simulated device name.
fn device_id(name: &str) -> Uuid {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// IMSI the device hands out, derived from its id.
fn device_imsi(id: &Uuid) -> Imsi {
    let digits: String = id
        .as_bytes()
        .iter()
        .take(10)
        .map(|b| char::from(b'0' + b % 10))
        .collect();
    Imsi(format!("00101{}", digits))
}

fn device_serial(id: &Uuid) -> String {
    format!("SR-{}", &id.simple().to_string()[..8].to_uppercase())
}

struct PendingPairing {
    peripheral: Peripheral,
    user_id: UserId,
    imsi: Imsi,
}

struct SimState {
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
    pending: Option<PendingPairing>,
    linked: Option<Connection>,
    /// Bumped on every link change so stale status tasks stop reporting.
    link_epoch: u64,
    status_started: bool,
    outgoing_sequence: u32,
    incoming_sequence: u32,
}

impl SimState {
    fn emit(&mut self, event: TransportEvent) {
        debug!("Simulated transport emits {}", event.name());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Simulated satellite relay transport.
#[derive(Clone)]
pub struct SimulatedTransport {
    config: SimulatorConfig,
    devices: Vec<Peripheral>,
    state: Arc<Mutex<SimState>>,
    storage: Option<LinkedDeviceStore>,
}

impl SimulatedTransport {
    /// Create a transport whose link survives restarts through `storage`.
    pub fn new(config: SimulatorConfig, storage: Option<LinkedDeviceStore>) -> Self {
        let mut devices: Vec<Peripheral> = config
            .devices
            .iter()
            .map(|name| Peripheral {
                id: device_id(name),
                name: Some(name.clone()),
            })
            .collect();
        devices.extend((0..config.unnamed_advertisers).map(|n| Peripheral {
            id: device_id(&format!("unnamed-{}", n)),
            name: None,
        }));

        let linked = storage
            .as_ref()
            .and_then(|s| s.load_or_forget())
            .map(|record| record.connection);
        if let Some(connection) = &linked {
            info!(
                "Restored linked device {}",
                connection.device.display_name()
            );
        }

        Self {
            config,
            devices,
            state: Arc::new(Mutex::new(SimState {
                subscribers: Vec::new(),
                pending: None,
                linked,
                link_epoch: 0,
                status_started: false,
                outgoing_sequence: 0,
                incoming_sequence: 0,
            })),
            storage,
        }
    }

    /// Peripherals this transport advertises, named or not.
    pub fn devices(&self) -> &[Peripheral] {
        &self.devices
    }

    fn status(
        connection: &Connection,
        bluetooth: LinkState,
        satellite: SatelliteState,
    ) -> ConnectionStatus {
        ConnectionStatus {
            bluetooth,
            satellite,
            device: DeviceInfo {
                name: connection.device.name.clone(),
                imsi: Some(connection.imsi.0.clone()),
                firmware_version: Some(FIRMWARE_VERSION.to_string()),
                serial_number: Some(device_serial(&connection.device.id)),
            },
        }
    }

    /// Report the link coming up: Bluetooth first, then the satellite.
    fn spawn_status_reports(&self, connection: Connection) {
        let state = self.state.clone();
        let epoch = state.lock().link_epoch;

        tokio::spawn(async move {
            let steps = [
                (Duration::ZERO, SatelliteState::Searching),
                (SATELLITE_ACQUIRE_DELAY, SatelliteState::Connected),
            ];
            for (delay, satellite) in steps {
                tokio::time::sleep(delay).await;
                let mut state = state.lock();
                if state.link_epoch != epoch {
                    return;
                }
                let status = Self::status(&connection, LinkState::Connected, satellite);
                state.emit(TransportEvent::DeviceStatusUpdate {
                    connection: connection.clone(),
                    status,
                });
            }
        });
    }

    /// Deliver the report for `result` and, for text, the partner's echo.
    fn spawn_delivery_followup(
        &self,
        connection: Connection,
        result: DeliveryResult,
        echo: Option<BundleContent>,
    ) {
        let state = self.state.clone();
        let epoch = state.lock().link_epoch;

        tokio::spawn(async move {
            {
                let mut state = state.lock();
                if state.link_epoch != epoch {
                    return;
                }
                state.emit(TransportEvent::Message {
                    connection: connection.clone(),
                    event: MessageEvent::DeliveryReport(DeliveryResult {
                        code: DeliveryCode::Delivered,
                        ..result
                    }),
                });
            }

            let Some(content) = echo else {
                return;
            };
            tokio::time::sleep(ECHO_DELAY).await;

            let mut state = state.lock();
            if state.link_epoch != epoch {
                return;
            }
            state.incoming_sequence += 1;
            let header = BundleHeader {
                sender: Imsi(format!("partner-{}", content.partner_id())),
                sequence: state.incoming_sequence,
                created_at: Utc::now(),
            };
            state.emit(TransportEvent::Message {
                connection,
                event: MessageEvent::BundleReceived(ContentBundle { header, content }),
            });
        });
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn list_devices(&self) -> BoxStream<'static, TransportResult<Peripheral>> {
        let devices = self.devices.clone();
        let interval = self.config.advertisement_interval();
        let deadline = Instant::now() + self.config.scan_duration();

        stream::unfold(0usize, move |index| {
            let devices = devices.clone();
            async move {
                if devices.is_empty() {
                    tokio::time::sleep_until(deadline).await;
                    return None;
                }
                tokio::time::sleep(interval).await;
                if Instant::now() >= deadline {
                    return None;
                }
                let sighting = devices[index % devices.len()].clone();
                Some((Ok(sighting), index + 1))
            }
        })
        .boxed()
    }

    async fn get_linked_device(&self) -> TransportResult<Option<Connection>> {
        let (linked, start_reports) = {
            let mut state = self.state.lock();
            let start_reports = state.linked.is_some() && !state.status_started;
            state.status_started |= start_reports;
            (state.linked.clone(), start_reports)
        };

        if let (Some(connection), true) = (&linked, start_reports) {
            self.spawn_status_reports(connection.clone());
        }
        Ok(linked)
    }

    async fn request_pairing(
        &self,
        peripheral: &Peripheral,
        config: &PairingConfig,
    ) -> TransportResult<Imsi> {
        info!(
            "Pairing request to {} as {} (check-in {:?} -> {})",
            peripheral.display_name(),
            config.user_id,
            config.check_in_message,
            config.check_in_number
        );
        tokio::time::sleep(self.config.pairing_delay()).await;

        if !self.devices.iter().any(|d| d.id == peripheral.id) {
            return Err(TransportError::Bluetooth(format!(
                "peripheral {} is out of range",
                peripheral.id
            )));
        }
        if self.config.reject_pairing {
            return Err(TransportError::Rejected(
                "pairing declined by device".to_string(),
            ));
        }

        let imsi = device_imsi(&peripheral.id);
        self.state.lock().pending = Some(PendingPairing {
            peripheral: peripheral.clone(),
            user_id: config.user_id.clone(),
            imsi: imsi.clone(),
        });
        Ok(imsi)
    }

    async fn confirm_pairing(&self) -> TransportResult<Connection> {
        tokio::time::sleep(self.config.pairing_delay() / 2).await;

        let connection = {
            let mut state = self.state.lock();
            let pending = state
                .pending
                .take()
                .ok_or_else(|| TransportError::Rejected("no pairing in progress".to_string()))?;
            let connection = Connection {
                device: pending.peripheral,
                imsi: pending.imsi,
                self_id: pending.user_id,
            };
            state.linked = Some(connection.clone());
            state.link_epoch += 1;
            state.status_started = true;
            state.outgoing_sequence = 0;
            state.emit(TransportEvent::DeviceLinked(connection.clone()));
            connection
        };

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.store(&connection) {
                warn!("Failed to persist linked device: {}", e);
            }
        }
        self.spawn_status_reports(connection.clone());
        Ok(connection)
    }

    async fn remove_linked_device(&self) {
        {
            let mut state = self.state.lock();
            state.linked = None;
            state.pending = None;
            state.link_epoch += 1;
            state.status_started = false;
            state.emit(TransportEvent::DeviceUnlinked);
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.clear() {
                warn!("Failed to remove linked device record: {}", e);
            }
        }
    }

    fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().subscribers.push(tx);
        rx
    }

    fn create_content_bundle(
        &self,
        connection: &Connection,
        content: BundleContent,
    ) -> ContentBundle {
        let mut state = self.state.lock();
        state.outgoing_sequence += 1;
        ContentBundle {
            header: BundleHeader {
                sender: connection.imsi.clone(),
                sequence: state.outgoing_sequence,
                created_at: Utc::now(),
            },
            content,
        }
    }

    async fn send(
        &self,
        connection: &Connection,
        bundle: ContentBundle,
    ) -> TransportResult<DeliveryResult> {
        if self.state.lock().linked.as_ref() != Some(connection) {
            return Err(TransportError::NotLinked);
        }

        tokio::time::sleep(self.config.send_delay()).await;

        if self.state.lock().linked.as_ref() != Some(connection) {
            return Err(TransportError::Disconnected);
        }
        let failure_rate = self.config.send_failure_rate.clamp(0.0, 1.0);
        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate) {
            return Err(TransportError::Timeout);
        }

        let result = DeliveryResult {
            message_id: bundle.message_id(),
            code: DeliveryCode::Queued,
        };

        let echo = match &bundle.content {
            BundleContent::Text { partner_id, text } if self.config.echo_replies => {
                Some(BundleContent::text(partner_id.clone(), format!("Echo: {}", text)))
            }
            _ => None,
        };
        self.spawn_delivery_followup(connection.clone(), result.clone(), echo);

        Ok(result)
    }
}
