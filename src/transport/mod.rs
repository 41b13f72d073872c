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

//! Satellite relay transport.
//!
//! The radio and satellite protocol live behind [`Transport`]. This crate
//! only sees its public surface: a scan stream, pairing calls, bundle
//! send, and one global event stream.

mod bundle;
mod discovery;
pub mod simulated;
mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

pub use bundle::{BundleContent, BundleHeader, ContentBundle, MessageId};
pub use discovery::NamedPeripherals;
pub use simulated::SimulatedTransport;
pub use types::{
    Connection, ConnectionStatus, DeliveryCode, DeliveryResult, DeviceInfo, Imsi, LinkState,
    PairingConfig, Peripheral, SatelliteState,
};

use crate::error::TransportResult;

/// Events pushed by the satellite link for the linked device.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    /// A bundle arrived from the satellite network.
    BundleReceived(ContentBundle),
    /// The network reported progress on an earlier send.
    DeliveryReport(DeliveryResult),
}

/// Global transport events, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    DeviceLinked(Connection),
    DeviceUnlinked,
    DeviceStatusUpdate {
        connection: Connection,
        status: ConnectionStatus,
    },
    Message {
        connection: Connection,
        event: MessageEvent,
    },
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::DeviceLinked(_) => "device_linked",
            TransportEvent::DeviceUnlinked => "device_unlinked",
            TransportEvent::DeviceStatusUpdate { .. } => "device_status_update",
            TransportEvent::Message { .. } => "message",
        }
    }
}

/// Public surface of the satellite relay transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan for relay peripherals.
    ///
    /// The stream is time-bounded by the transport; ending is the normal
    /// way a scan finishes.
    fn list_devices(&self) -> BoxStream<'static, TransportResult<Peripheral>>;

    /// The device linked in a previous session, if any.
    async fn get_linked_device(&self) -> TransportResult<Option<Connection>>;

    /// Ask `peripheral` to pair. May take as long as the device needs.
    async fn request_pairing(
        &self,
        peripheral: &Peripheral,
        config: &PairingConfig,
    ) -> TransportResult<Imsi>;

    /// Complete the pairing started by [`Transport::request_pairing`].
    async fn confirm_pairing(&self) -> TransportResult<Connection>;

    /// Forget the linked device. The transport follows up with
    /// [`TransportEvent::DeviceUnlinked`].
    async fn remove_linked_device(&self);

    /// Subscribe to the global event stream.
    fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Wrap `content` in a bundle with a fresh header for `connection`.
    fn create_content_bundle(
        &self,
        connection: &Connection,
        content: BundleContent,
    ) -> ContentBundle;

    /// Hand a bundle to the satellite link.
    async fn send(
        &self,
        connection: &Connection,
        bundle: ContentBundle,
    ) -> TransportResult<DeliveryResult>;
}
