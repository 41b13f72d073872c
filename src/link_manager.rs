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

//! Link manager.
//!
//! One task owns the linked connection and its status. It applies the
//! transport's global events in arrival order and publishes a snapshot
//! for readers.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::{LinkSnapshot, SharedLinkState};
use crate::storage::{Message, MessageStore};
use crate::transport::{
    BundleContent, Connection, ContentBundle, MessageEvent, Transport, TransportEvent,
};
use crate::ui::{UiEvent, UiSink};

/// Commands applied by the link task alongside transport events.
#[derive(Debug)]
enum LinkCommand {
    Adopt {
        connection: Connection,
        unlinks_seen: u64,
        done: oneshot::Sender<()>,
    },
}

/// Handle to the link manager task.
#[derive(Clone)]
pub struct LinkManager {
    state: Arc<SharedLinkState>,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedSender<LinkCommand>,
    shutdown: CancellationToken,
}

impl LinkManager {
    /// Subscribe to `transport`, adopt any already-linked device and start
    /// applying events.
    pub async fn spawn(
        transport: Arc<dyn Transport>,
        store: MessageStore,
        ui: UiSink,
    ) -> Self {
        let state = SharedLinkState::new();
        let events = transport.events();
        let processor = LinkEventProcessor::new(state.clone(), store, ui);

        match transport.get_linked_device().await {
            Ok(Some(connection)) => {
                info!(
                    "Adopting linked device {}",
                    connection.device.display_name()
                );
                processor.link(connection);
            }
            Ok(None) => info!("No linked device"),
            Err(e) => warn!("Could not query linked device: {}", e),
        }

        let (commands, command_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        tokio::spawn(run(processor, events, command_rx, shutdown.clone()));

        Self {
            state,
            transport,
            commands,
            shutdown,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.state.is_linked()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn connection(&self) -> Option<Connection> {
        self.state.connection()
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.state.snapshot()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Unlinks applied so far. Read it before confirming a pairing and pass
    /// it to [`adopt`](Self::adopt).
    pub fn unlink_count(&self) -> u64 {
        self.state.unlinks()
    }

    /// Apply a connection obtained by pairing.
    ///
    /// Goes through the link task, so it is ordered with transport events.
    /// The transport also reports the link; applying both is harmless. If an
    /// unlink was applied after `unlinks_seen` was read, the connection is
    /// already gone and is not adopted.
    pub async fn adopt(&self, connection: Connection, unlinks_seen: u64) {
        let (done, applied) = oneshot::channel();
        if self
            .commands
            .send(LinkCommand::Adopt {
                connection,
                unlinks_seen,
                done,
            })
            .is_err()
        {
            warn!("Link manager stopped, connection not adopted");
            return;
        }
        let _ = applied.await;
    }

    /// Ask the transport to drop the linked device.
    ///
    /// Local state is cleared when the transport reports the unlink.
    pub async fn forget(&self) {
        info!("Forgetting linked device");
        self.transport.remove_linked_device().await;
    }

    /// Stop applying events.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn run(
    processor: LinkEventProcessor,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,
            Some(event) = events.recv() => processor.process_event(event),
            Some(command) = commands.recv() => match command {
                LinkCommand::Adopt {
                    connection,
                    unlinks_seen,
                    done,
                } => {
                    processor.adopt(connection, unlinks_seen);
                    let _ = done.send(());
                }
            },
            else => break,
        }
    }
    info!("Link manager stopped");
}

/// Applies transport events to the shared link state.
pub(crate) struct LinkEventProcessor {
    state: Arc<SharedLinkState>,
    store: MessageStore,
    ui: UiSink,
}

impl LinkEventProcessor {
    pub(crate) fn new(state: Arc<SharedLinkState>, store: MessageStore, ui: UiSink) -> Self {
        Self { state, store, ui }
    }

    pub(crate) fn process_event(&self, event: TransportEvent) {
        debug!("Applying {}", event.name());
        match event {
            TransportEvent::DeviceLinked(connection) => {
                info!("Device linked: {}", connection.device.display_name());
                self.link(connection);
            }
            TransportEvent::DeviceUnlinked => {
                info!("Device unlinked");
                let snapshot = self.state.clear();
                self.ui.notify(UiEvent::LinkChanged(snapshot));
            }
            TransportEvent::DeviceStatusUpdate { connection, status } => {
                match self.state.set_status(&connection, status) {
                    Some(snapshot) => self.ui.notify(UiEvent::LinkChanged(snapshot)),
                    None => warn!(
                        "Dropping status update for {}, not the linked device",
                        connection.device.display_name()
                    ),
                }
            }
            TransportEvent::Message { event, .. } => match event {
                MessageEvent::BundleReceived(bundle) => self.handle_bundle(bundle),
                MessageEvent::DeliveryReport(result) => {
                    info!(message_id = %result.message_id, "Delivery report: {:?}", result.code);
                }
            },
        }
    }

    fn link(&self, connection: Connection) {
        let snapshot = self.state.set_connection(connection);
        self.ui.notify(UiEvent::LinkChanged(snapshot));
    }

    /// Returns whether `connection` was applied.
    fn adopt(&self, connection: Connection, unlinks_seen: u64) -> bool {
        if self.state.unlinks() != unlinks_seen {
            info!(
                "Not adopting {}, unlinked since pairing",
                connection.device.display_name()
            );
            return false;
        }
        self.link(connection);
        true
    }

    fn handle_bundle(&self, bundle: ContentBundle) {
        let message_id = bundle.message_id();
        match bundle.content {
            BundleContent::Text { partner_id, text } => {
                let message = Message::incoming(message_id, partner_id, text);
                match self.store.insert(&message) {
                    Ok(true) => {
                        info!(message_id = %message.message_id, "Message received from {}", message.partner);
                        self.ui.notify(UiEvent::MessageStored(message));
                    }
                    Ok(false) => {
                        debug!(message_id = %message.message_id, "Duplicate message ignored");
                    }
                    Err(e) => {
                        error!(message_id = %message.message_id, "Failed to store received message: {}", e);
                    }
                }
            }
            other => {
                warn!(message_id = %message_id, "Not handling {} bundle", other.kind());
            }
        }
    }
}
